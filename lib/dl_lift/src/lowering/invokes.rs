use super::{Current, Lowerer};
use crate::constraints::{Constraint, Origin};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{Expr, InvokeKind, LValue, Operand, Slot, Stmt};
use crate::kinds::{Kind, KindSet};
use dl_bytecode::opcodes::Family;
use dl_bytecode::registers::Width;

/// Reads the register operands of an invoke or `filled-new-array`, one
/// per expected kind; wide values take two consecutive registers.
fn arguments(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
    kinds: &[Kind],
) -> LiftResult<Vec<Slot>> {
    let expected: usize = kinds
        .iter()
        .map(|k| usize::from(k.width().slots()))
        .sum();
    let found = at.instr.regs.len();
    if expected != found {
        return Err(LiftError::ArityMismatch {
            addr: at.addr(),
            mnemonic: at.opcode.mnemonic(),
            expected,
            found,
            raw: at.instr.raw(),
        });
    }
    let mut args = Vec::with_capacity(kinds.len());
    let mut i = 0;
    for kind in kinds {
        let reg = at.reg(i)?;
        if kind.width() == Width::Wide && at.reg(i + 1)? != reg.next() {
            return Err(LiftError::malformed(
                at.instr,
                format!("wide argument #{} not in consecutive registers", args.len()),
            ));
        }
        let mut arg = l.read_as(at, reg, kind.set(), Origin::Anchor)?;
        arg.contract = kind.set();
        args.push(arg);
        i += usize::from(kind.width().slots());
    }
    Ok(args)
}

/// Merges the `move-result*` following the instruction, if any: the
/// result is then defined at the `move-result*` address. A `move-result*`
/// that control can reach from elsewhere is left alone.
fn result(l: &mut Lowerer<'_, '_>, at: &Current<'_>, kind: Kind) -> LiftResult<Option<Slot>> {
    let Some(next) = at.next else {
        return Ok(None);
    };
    let Some(opcode) = next.opcode() else {
        return Ok(None);
    };
    if opcode.family() != Family::MoveResult || l.cfg.is_target(next.addr) {
        return Ok(None);
    }
    let reg = next
        .regs
        .first()
        .copied()
        .ok_or_else(|| LiftError::malformed(next, "missing register operand #0"))?;
    let mut dest = l.write_at(at, next.addr, reg, kind.set(), Origin::Anchor)?;
    let declared = opcode.kind().map_or(KindSet::NARROW, KindSet::from_operand);
    if let Some(c) = Constraint::restricting(dest.value, declared) {
        l.constrain(Some(next.addr), c, Origin::Opcode);
    }
    dest.contract = kind.set();
    l.folded.insert(next.addr);
    Ok(Some(dest))
}

pub(super) fn lower_invoke(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let kind = InvokeKind::from_mnemonic(at.opcode.mnemonic())
        .ok_or_else(|| LiftError::malformed(at.instr, "unknown invoke kind"))?;
    let method = at.method_ref()?;
    let pool = l.pool;
    let proto = &pool.method(method)?.proto;

    let mut kinds = Vec::with_capacity(proto.params.len() + 1);
    if kind.has_receiver() {
        kinds.push(Kind::Object);
    }
    for param in &proto.params {
        kinds.push(l.declared(at, param)?);
    }
    let mut args = arguments(l, at, &kinds)?.into_iter().map(Operand::Local);
    let receiver = if kind.has_receiver() { args.next() } else { None };
    let expr = Expr::Invoke {
        kind,
        method,
        receiver,
        args: args.collect(),
    };

    let dest = match Kind::from_type(&proto.ret) {
        Some(ret) => result(l, at, ret)?,
        None => None,
    };
    if let Some(dest) = &dest {
        l.declare(dest.value, &proto.ret);
    }
    Ok(vec![match dest {
        Some(dest) => Stmt::Assign {
            dest: LValue::Local(dest),
            expr,
        },
        None => Stmt::Invoke(expr),
    }])
}

pub(super) fn lower_filled_new_array(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let type_ = at.type_ref()?;
    let pool = l.pool;
    let element = pool
        .type_(type_)?
        .element_type()
        .ok_or_else(|| LiftError::malformed(at.instr, "not an array type"))?;
    let kind = l.declared(at, &element)?;
    let count = at.instr.regs.len();
    let elements = arguments(l, at, &vec![kind; count])?
        .into_iter()
        .map(Operand::Local)
        .collect();
    let expr = Expr::NewFilledArray { type_, elements };
    Ok(match result(l, at, Kind::Object)? {
        Some(dest) => {
            l.declare(dest.value, pool.type_(type_)?);
            vec![Stmt::Assign {
                dest: LValue::Local(dest),
                expr,
            }]
        }
        None => {
            log::warn!("result of {} at {} is discarded", at.opcode, at.addr());
            vec![Stmt::Nop]
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::errors::LiftError;
    use crate::ir::{CastMode, Expr, Operand, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::parse_assembly;

    #[test]
    fn int_result_passed_as_float() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v0, 0x1
    invoke-static {v0}, La/B;->g(I)V
    invoke-static {v0}, La/B;->h(F)V
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert_eq!(body.diagnostics.len(), 1);
        assert!(body.diagnostics[0].is_conflict());
        let casts: Vec<(Kind, Kind, CastMode)> = body
            .iter_stmts()
            .filter_map(|s| match s {
                Stmt::Invoke(Expr::Invoke { args, .. }) => match args.first() {
                    Some(Operand::Cast { from, to, mode, .. }) => Some((*from, *to, *mode)),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(casts, vec![(Kind::Int, Kind::Float, CastMode::Reinterpret)]);
    }

    #[test]
    fn wide_arguments_use_register_pairs() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(J)V
    .registers 4
    invoke-static {p0, v0}, La/B;->g(J)V
    return-void
.end method
"#,
        )
        .unwrap();
        let err = lift_method(&asm.methods[0], &asm.pool, &Options::default());
        assert!(matches!(err, Err(LiftError::MalformedInstruction { .. })));
    }

    #[test]
    fn filled_arrays_are_folded() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(II)[I
    .registers 3
    filled-new-array {p0, p1}, [I
    move-result-object v0
    return-object v0
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        assert_eq!(body.stmts.len(), 4);
        assert!(body.iter_stmts().any(|s| matches!(
            s,
            Stmt::Assign {
                expr: Expr::NewFilledArray { .. },
                ..
            }
        )));
    }
}
