//! Method body assembly.
//!
//! Drives the lifting of one method: instructions are checked, the
//! control flow graph and reaching definitions are computed, reachable
//! instructions are lowered in code order, the collected constraints are
//! solved and the statements are rewritten over typed locals. Exception
//! handlers are then mapped onto statement ranges.

use crate::controlflow::Cfg;
use crate::dataflow::{forward, ReachingDefs};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{Body, Local, Slot, Stmt, Trap};
use crate::lowering::{self, Lowered, Lowerer};
use crate::{solver, splitter, Options};
use dl_bytecode::code::MethodCode;
use dl_bytecode::pool::ConstantPool;
use dl_bytecode::Addr;
use std::collections::{BTreeMap, BTreeSet};

/// Rejects unknown opcodes, operands that do not match their opcode
/// format and registers out of the method frame.
fn validate(code: &MethodCode) -> LiftResult<()> {
    for instr in code.iter_instructions() {
        let opcode = instr.opcode().ok_or_else(|| LiftError::UnknownOpcode {
            addr: instr.addr,
            opcode: instr.opcode,
            raw: instr.raw(),
        })?;
        instr
            .check_shape(opcode)
            .map_err(|err| LiftError::malformed(instr, err.to_string()))?;
        if let Some(reg) = instr
            .regs
            .iter()
            .find(|reg| reg.value() >= code.registers_size)
        {
            return Err(LiftError::out_of_bounds(instr, *reg, code.registers_size));
        }
    }
    Ok(())
}

/// Index of the first statement of every lowered instruction.
fn labels_of(stmts: &[(Option<Addr>, Stmt<Local>)]) -> BTreeMap<Addr, usize> {
    let mut labels = BTreeMap::new();
    for (i, (addr, _)) in stmts.iter().enumerate() {
        if let Some(addr) = addr {
            labels.entry(*addr).or_insert(i);
        }
    }
    labels
}

fn traps_of(
    code: &MethodCode,
    stmts: &[(Option<Addr>, Stmt<Local>)],
    labels: &BTreeMap<Addr, usize>,
) -> Vec<Trap> {
    let index_from = |addr: Addr| {
        stmts
            .iter()
            .position(|(a, _)| a.map_or(false, |a| a >= addr))
            .unwrap_or(stmts.len())
    };
    let mut traps = Vec::new();
    for item in code.iter_tries() {
        let begin = index_from(item.start);
        let end = index_from(item.end);
        if begin >= end {
            log::debug!("try block {}..{} covers no statement", item.start, item.end);
            continue;
        }
        for handler in item.iter_handlers() {
            match labels.get(&handler.addr) {
                Some(target) => traps.push(Trap {
                    exception: handler.exception,
                    begin,
                    end,
                    handler: *target,
                }),
                None => log::debug!("handler at {} was pruned", handler.addr),
            }
        }
    }
    traps
}

/// Lifts the code of one method into a typed body.
///
/// # Errors
///
/// Any malformed instruction, register out of the method frame or branch
/// out of the method code fails the whole method. In strict mode, a
/// conflicting class fails it too.
pub fn lift(code: &MethodCode, pool: &dyn ConstantPool, options: &Options) -> LiftResult<Body> {
    validate(code)?;

    let cfg = Cfg::build(code, pool)?;
    log::debug!(
        "method #{}: {} instructions, {} blocks",
        code.method.as_usize(),
        code.instructions().len(),
        cfg.blocks_count()
    );
    let live: BTreeSet<Addr> = if options.prune_unreachable {
        cfg.reachable()
    } else {
        code.iter_instructions().map(|instr| instr.addr).collect()
    };

    let frame = lowering::frame(code, pool)?;
    let dataflow = forward::<ReachingDefs>(&cfg, &frame)?;

    let mut lowerer = Lowerer::new(code, pool, &cfg, &dataflow.entries);
    let mut stmts: Vec<(Option<Addr>, Stmt<Slot>)> = lowerer
        .lower_params()?
        .into_iter()
        .map(|stmt| (None, stmt))
        .collect();
    let instrs = code.instructions();
    for (i, instr) in instrs.iter().enumerate() {
        if !live.contains(&instr.addr) {
            log::debug!("skipping unreachable instruction at {}", instr.addr);
            continue;
        }
        let lowered = lowerer.lower(instr, instrs.get(i + 1))?;
        if lowered.is_empty() && cfg.is_target(instr.addr) {
            stmts.push((Some(instr.addr), Stmt::Nop));
        }
        stmts.extend(lowered.into_iter().map(|stmt| (Some(instr.addr), stmt)));
    }

    let Lowered {
        values,
        collector,
        merges,
    } = lowerer.finish();
    let solution = solver::solve(&values, &collector);
    log::debug!(
        "{} values, {} constraints, {} classes, {} diagnostics",
        values.len(),
        collector.len(),
        solution.classes_count(),
        solution.diagnostics().len()
    );
    if options.strict {
        if let Some(conflict) = solution.conflicts().next() {
            return Err(LiftError::Conflict {
                addr: conflict.addrs.first().copied().unwrap_or_else(Addr::entry),
                register: conflict.register,
                message: conflict.message.clone(),
            });
        }
    }

    let (locals, stmts) = splitter::split(stmts, &values, &merges, &solution);
    let labels = labels_of(&stmts);
    let traps = traps_of(code, &stmts, &labels);
    Ok(Body {
        method: code.method,
        locals,
        stmts,
        labels,
        traps,
        diagnostics: solution.into_diagnostics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IdentitySource;
    use dl_bytecode::parse_assembly;

    #[test]
    fn handlers_cover_statements() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    :start
    invoke-static {}, La/B;->g()V
    :end
    return-void
    :handler
    move-exception v0
    throw v0
    .catch Ljava/io/IOException; {:start .. :end} :handler
.end method
"#,
        )
        .unwrap();
        let body = lift(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        assert_eq!(body.traps.len(), 1);
        let trap = &body.traps[0];
        assert_eq!((trap.begin, trap.end), (0, 1));
        assert!(trap.exception.is_some());
        assert!(matches!(
            body.stmts[trap.handler].1,
            Stmt::Identity {
                source: IdentitySource::CaughtException,
                ..
            }
        ));
    }

    #[test]
    fn registers_are_checked_against_the_frame() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v3, 0x1
    return-void
.end method
"#,
        )
        .unwrap();
        let err = lift(&asm.methods[0], &asm.pool, &Options::default());
        assert!(matches!(err, Err(LiftError::RegisterOutOfBounds { size: 1, .. })));
    }

    #[test]
    fn strict_mode_fails_on_conflicts() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v0, 0x1
    invoke-static {v0}, La/B;->g(Ljava/lang/Object;)V
    return-void
.end method
"#,
        )
        .unwrap();
        let err = lift(&asm.methods[0], &asm.pool, &Options::default().strict(true));
        match err {
            Err(LiftError::Conflict { addr, .. }) => assert_eq!(addr, Addr(0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_targets_keep_a_label() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(I)V
    .registers 1
    if-eqz p0, :skip
    invoke-static {}, La/B;->g()V
    :skip
    nop
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        let nop = body.stmt_index(Addr(5)).unwrap();
        assert_eq!(body.stmts[nop].1, Stmt::Nop);
    }
}
