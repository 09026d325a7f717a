//! The instruction lowering table.
//!
//! Each opcode family is lowered by a single rule, picked by [`rule`]. A
//! rule reads the operands of one decoded instruction, resolves its
//! registers through the register file and returns the provisional
//! statements for it, while recording in the collector the typing
//! constraints implied by the opcode and by the declared types it refers
//! to.

use crate::constraints::{Collector, Constraint, Origin};
use crate::controlflow::Cfg;
use crate::dataflow::{Frame, ReachingDefs};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{IdentitySource, Slot, Stmt, ValueId};
use crate::kinds::{Kind, KindSet};
use crate::registers::{ProvisionalValue, RegisterFile};
use dl_bytecode::code::MethodCode;
use dl_bytecode::instrs::DecodedInstr;
use dl_bytecode::opcodes::{Family, Opcode};
use dl_bytecode::pool::{ConstantPool, FieldRef, Index, MethodRef, PoolRef, PrettyPrinter};
use dl_bytecode::registers::{Reg, Width};
use dl_bytecode::types::Type;
use dl_bytecode::Addr;
use std::collections::{BTreeMap, BTreeSet};

mod arith;
mod branches;
mod constants;
mod invokes;
mod moves;
mod objects;

/// The instruction being lowered, and the one following it in code order.
#[derive(Debug, Clone, Copy)]
pub struct Current<'i> {
    pub instr: &'i DecodedInstr,
    pub opcode: Opcode,
    pub next: Option<&'i DecodedInstr>,
}

impl<'i> Current<'i> {
    #[inline]
    const fn addr(&self) -> Addr {
        self.instr.addr
    }

    /// Register operand at position `i`.
    fn reg(&self, i: usize) -> LiftResult<Reg> {
        self.instr
            .regs
            .get(i)
            .copied()
            .ok_or_else(|| LiftError::malformed(self.instr, format!("missing register operand #{i}")))
    }

    fn literal(&self) -> LiftResult<i64> {
        self.instr
            .literal
            .ok_or_else(|| LiftError::malformed(self.instr, "missing literal"))
    }

    fn target(&self) -> LiftResult<Addr> {
        let offset = self
            .instr
            .offset
            .ok_or_else(|| LiftError::malformed(self.instr, "missing branch offset"))?;
        self.instr
            .target()
            .ok_or_else(|| LiftError::bad_target(self.instr, i64::from(offset)))
    }

    fn type_ref(&self) -> LiftResult<Index<Type>> {
        match self.instr.reference {
            Some(PoolRef::Type(idx)) => Ok(idx),
            _ => Err(LiftError::malformed(self.instr, "expected a type reference")),
        }
    }

    fn string_ref(&self) -> LiftResult<Index<String>> {
        match self.instr.reference {
            Some(PoolRef::String(idx)) => Ok(idx),
            _ => Err(LiftError::malformed(self.instr, "expected a string reference")),
        }
    }

    fn field_ref(&self) -> LiftResult<Index<FieldRef>> {
        match self.instr.reference {
            Some(PoolRef::Field(idx)) => Ok(idx),
            _ => Err(LiftError::malformed(self.instr, "expected a field reference")),
        }
    }

    fn method_ref(&self) -> LiftResult<Index<MethodRef>> {
        match self.instr.reference {
            Some(PoolRef::Method(idx)) => Ok(idx),
            _ => Err(LiftError::malformed(self.instr, "expected a method reference")),
        }
    }

    /// Contract of the operand kind declared by the opcode.
    fn contract(&self) -> KindSet {
        self.opcode
            .kind()
            .map_or(KindSet::NARROW, KindSet::from_operand)
    }
}

/// A lowering rule.
pub type Rule = fn(&mut Lowerer<'_, '_>, &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>>;

/// Returns the lowering rule of an opcode family.
#[must_use]
pub fn rule(family: Family) -> Rule {
    match family {
        Family::Nop => moves::lower_nop,
        Family::Move => moves::lower_move,
        Family::MoveResult => moves::lower_move_result,
        Family::MoveException => moves::lower_move_exception,
        Family::ReturnVoid => moves::lower_return_void,
        Family::Return => moves::lower_return,
        Family::Const => constants::lower_const,
        Family::ConstString => constants::lower_const_string,
        Family::ConstClass => constants::lower_const_class,
        Family::MonitorEnter => objects::lower_monitor_enter,
        Family::MonitorExit => objects::lower_monitor_exit,
        Family::CheckCast => objects::lower_check_cast,
        Family::InstanceOf => objects::lower_instance_of,
        Family::ArrayLength => objects::lower_array_length,
        Family::NewInstance => objects::lower_new_instance,
        Family::NewArray => objects::lower_new_array,
        Family::FilledNewArray => invokes::lower_filled_new_array,
        Family::FillArrayData => objects::lower_fill_array_data,
        Family::Throw => branches::lower_throw,
        Family::Goto => branches::lower_goto,
        Family::Switch => branches::lower_switch,
        Family::Cmp => arith::lower_cmp,
        Family::If => branches::lower_if,
        Family::IfZ => branches::lower_ifz,
        Family::Aget => objects::lower_aget,
        Family::Aput => objects::lower_aput,
        Family::Iget => objects::lower_iget,
        Family::Iput => objects::lower_iput,
        Family::Sget => objects::lower_sget,
        Family::Sput => objects::lower_sput,
        Family::Invoke => invokes::lower_invoke,
        Family::Neg => arith::lower_neg,
        Family::Not => arith::lower_not,
        Family::Convert => arith::lower_convert,
        Family::Binop | Family::Binop2addr | Family::BinopLit => arith::lower_binop,
    }
}

/// An incoming argument of the lifted method.
#[derive(Debug, Clone)]
struct Incoming {
    reg: Reg,
    width: Width,
    kind: Kind,
    source: IdentitySource,
}

fn incoming(code: &MethodCode, pool: &dyn ConstantPool) -> LiftResult<Vec<Incoming>> {
    let method = pool.method(code.method)?;
    let mut reg = code.first_param_reg(pool)?;
    let mut args = Vec::new();
    if !code.is_static() {
        args.push(Incoming {
            reg,
            width: Width::Narrow,
            kind: Kind::Object,
            source: IdentitySource::This,
        });
        reg = reg.next();
    }
    for (index, type_) in method.proto.params.iter().enumerate() {
        let (Some(width), Some(kind)) = (type_.width(), Kind::from_type(type_)) else {
            continue;
        };
        args.push(Incoming {
            reg,
            width,
            kind,
            source: IdentitySource::Parameter {
                index,
                type_: type_.clone(),
            },
        });
        reg = Reg::from(reg.value().saturating_add(width.slots()));
    }
    Ok(args)
}

/// The frame of a method, with its incoming arguments registers.
pub fn frame(code: &MethodCode, pool: &dyn ConstantPool) -> LiftResult<Frame> {
    Ok(Frame {
        registers: code.registers_size,
        params: incoming(code, pool)?
            .into_iter()
            .map(|arg| (arg.reg, arg.width))
            .collect(),
    })
}

/// What lowering leaves to the solver and the splitter.
#[derive(Debug)]
pub struct Lowered {
    pub values: Vec<ProvisionalValue>,
    pub collector: Collector,
    /// Definitions reaching a common read: they end up in a same local.
    pub merges: Vec<(ValueId, ValueId)>,
}

/// Per method lowering state.
#[derive(Debug)]
pub struct Lowerer<'a, 'd> {
    pool: &'a dyn ConstantPool,
    code: &'a MethodCode,
    cfg: &'a Cfg<'a>,
    regs: RegisterFile<'d>,
    collector: Collector,
    merges: Vec<(ValueId, ValueId)>,
    /// `move-result*` instructions merged into their producer.
    folded: BTreeSet<Addr>,
    /// Declared types of the array values defined so far.
    arrays: BTreeMap<ValueId, Type>,
}

impl<'a, 'd> Lowerer<'a, 'd> {
    #[must_use]
    pub fn new(
        code: &'a MethodCode,
        pool: &'a dyn ConstantPool,
        cfg: &'a Cfg<'a>,
        states: &'d BTreeMap<Addr, ReachingDefs>,
    ) -> Self {
        Self {
            pool,
            code,
            cfg,
            regs: RegisterFile::new(states),
            collector: Collector::new(),
            merges: Vec::new(),
            folded: BTreeSet::new(),
            arrays: BTreeMap::new(),
        }
    }

    /// Lowers the incoming arguments into identity statements.
    pub fn lower_params(&mut self) -> LiftResult<Vec<Stmt<Slot>>> {
        let mut stmts = Vec::new();
        for arg in incoming(self.code, self.pool)? {
            let value = self.regs.define_param(arg.reg, arg.width);
            self.collector
                .anchor(None, Constraint::Exactly(value, arg.kind));
            if let IdentitySource::Parameter { type_, .. } = &arg.source {
                self.declare(value, type_);
            }
            stmts.push(Stmt::Identity {
                dest: Slot {
                    value,
                    contract: arg.kind.set(),
                },
                source: arg.source,
            });
        }
        Ok(stmts)
    }

    /// Lowers one instruction; `next` is the instruction following it in
    /// code order.
    pub fn lower(
        &mut self,
        instr: &DecodedInstr,
        next: Option<&DecodedInstr>,
    ) -> LiftResult<Vec<Stmt<Slot>>> {
        let opcode = instr.opcode().ok_or_else(|| LiftError::UnknownOpcode {
            addr: instr.addr,
            opcode: instr.opcode,
            raw: instr.raw(),
        })?;
        log::trace!("{}: {}", instr.addr, PrettyPrinter(instr, self.pool));
        let current = Current {
            instr,
            opcode,
            next,
        };
        rule(opcode.family())(self, &current)
    }

    #[must_use]
    pub fn finish(self) -> Lowered {
        Lowered {
            values: self.regs.values().to_vec(),
            collector: self.collector,
            merges: self.merges,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_folded(&self, addr: Addr) -> bool {
        self.folded.contains(&addr)
    }

    fn constrain(&mut self, addr: Option<Addr>, constraint: Constraint, origin: Origin) {
        match origin {
            Origin::Opcode => self.collector.record(addr, constraint),
            Origin::Anchor => self.collector.anchor(addr, constraint),
        }
    }

    fn check_bounds(&self, at: &Current, reg: Reg, width: Width) -> LiftResult<()> {
        let end = u32::from(reg.value()) + u32::from(width.slots());
        if end > u32::from(self.code.registers_size) {
            return Err(LiftError::out_of_bounds(
                at.instr,
                reg,
                self.code.registers_size,
            ));
        }
        Ok(())
    }

    /// Reads `reg` as a value the instruction deals with as `contract`.
    fn read(&mut self, at: &Current, reg: Reg, contract: KindSet) -> LiftResult<Slot> {
        self.read_as(at, reg, contract, Origin::Opcode)
    }

    fn read_as(
        &mut self,
        at: &Current,
        reg: Reg,
        contract: KindSet,
        origin: Origin,
    ) -> LiftResult<Slot> {
        self.read_reaching(at, reg, contract, origin)
            .map(|(slot, _)| slot)
    }

    /// Reads `reg`, along with the declared type of the array it holds
    /// when every definition reaching the read agrees on one.
    fn read_array(
        &mut self,
        at: &Current,
        reg: Reg,
        contract: KindSet,
    ) -> LiftResult<(Slot, Option<Type>)> {
        let (slot, reaching) = self.read_reaching(at, reg, contract, Origin::Opcode)?;
        let mut types = reaching.iter().map(|value| self.arrays.get(value));
        let type_ = match types.next() {
            Some(Some(first)) if types.all(|t| t == Some(first)) => Some(first.clone()),
            _ => None,
        };
        Ok((slot, type_))
    }

    /// Reads `reg` and returns all the values reaching the read, the
    /// value of the slot first.
    fn read_reaching(
        &mut self,
        at: &Current,
        reg: Reg,
        contract: KindSet,
        origin: Origin,
    ) -> LiftResult<(Slot, Vec<ValueId>)> {
        let width = contract.width();
        self.check_bounds(at, reg, width)?;
        let resolved = self.regs.resolve(reg, at.addr(), width);
        let mut reaching = vec![resolved.value];
        for alias in resolved.aliases {
            self.collector
                .record(Some(at.addr()), Constraint::SameAs(alias, resolved.value));
            self.merges.push((alias, resolved.value));
            reaching.push(alias);
        }
        if let Some(c) = Constraint::restricting(resolved.value, contract) {
            self.constrain(Some(at.addr()), c, origin);
        }
        let slot = Slot {
            value: resolved.value,
            contract,
        };
        Ok((slot, reaching))
    }

    /// Records the declared type of a value, when it is an array type.
    fn declare(&mut self, value: ValueId, type_: &Type) {
        if matches!(type_, Type::Array(_, _)) {
            self.arrays.insert(value, type_.clone());
        }
    }

    /// Defines `reg` with a value the instruction produces as `contract`.
    fn write(&mut self, at: &Current, reg: Reg, contract: KindSet) -> LiftResult<Slot> {
        self.write_at(at, at.addr(), reg, contract, Origin::Opcode)
    }

    /// Defines `reg` at `addr`, which is the address of the instruction
    /// being lowered or of a folded `move-result*`.
    fn write_at(
        &mut self,
        at: &Current,
        addr: Addr,
        reg: Reg,
        contract: KindSet,
        origin: Origin,
    ) -> LiftResult<Slot> {
        let width = contract.width();
        self.check_bounds(at, reg, width)?;
        let value = self.regs.define(reg, addr, width);
        if let Some(c) = Constraint::restricting(value, contract) {
            self.constrain(Some(addr), c, origin);
        }
        Ok(Slot { value, contract })
    }

    fn same_kind(&mut self, at: &Current, a: Slot, b: Slot) {
        if a.value != b.value {
            self.collector
                .record(Some(at.addr()), Constraint::SameAs(a.value, b.value));
        }
    }

    /// Anchors an operand to a declared kind, which becomes its contract.
    fn anchor(&mut self, at: &Current, slot: &mut Slot, kind: Kind) {
        self.collector
            .anchor(Some(at.addr()), Constraint::Exactly(slot.value, kind));
        slot.contract = kind.set();
    }

    /// Anchors an array element to the kind of the array declared element
    /// type. An element kind of another width than the accessor still
    /// constrains the value, leaving the accessor contract untouched.
    fn anchor_element(&mut self, at: &Current, slot: &mut Slot, kind: Kind) {
        if kind.width() == slot.contract.width() {
            self.anchor(at, slot, kind);
        } else {
            self.collector
                .anchor(Some(at.addr()), Constraint::Exactly(slot.value, kind));
        }
    }

    /// Kind of a declared type used as an anchor; sub-int types are ints.
    fn declared(&self, at: &Current, type_: &Type) -> LiftResult<Kind> {
        Kind::from_type(type_)
            .ok_or_else(|| LiftError::malformed(at.instr, "void operand type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::forward;
    use crate::ir::{Expr, LValue, Operand};
    use dl_bytecode::parse_assembly;

    struct Output {
        stmts: Vec<Stmt<Slot>>,
        values: Vec<ProvisionalValue>,
        collector: Collector,
    }

    fn lower_text(text: &str) -> LiftResult<Output> {
        let asm = parse_assembly(text)?;
        let code = &asm.methods[0];
        let cfg = Cfg::build(code, &asm.pool)?;
        let frame = frame(code, &asm.pool)?;
        let dataflow = forward::<ReachingDefs>(&cfg, &frame)?;
        let mut lowerer = Lowerer::new(code, &asm.pool, &cfg, &dataflow.entries);
        let mut stmts = lowerer.lower_params()?;
        let instrs = code.instructions();
        for (i, instr) in instrs.iter().enumerate() {
            stmts.extend(lowerer.lower(instr, instrs.get(i + 1))?);
        }
        let lowered = lowerer.finish();
        Ok(Output {
            stmts,
            values: lowered.values,
            collector: lowered.collector,
        })
    }

    fn exactly(collector: &Collector) -> Vec<(Option<Addr>, Kind)> {
        collector
            .iter()
            .filter_map(|r| match r.constraint {
                Constraint::Exactly(_, kind) => Some((r.addr, kind)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn negations_fix_both_operands() {
        let lowered = lower_text(
            r#"
.class La/B;
.method static f(F)F
    .registers 2
    neg-float v0, p0
    return v0
.end method
"#,
        )
        .unwrap();
        let at_neg: Vec<Constraint> = lowered
            .collector
            .iter()
            .filter(|r| r.addr == Some(Addr(0)))
            .map(|r| r.constraint)
            .collect();
        assert_eq!(at_neg.len(), 2);
        for c in at_neg {
            assert_eq!(c.kinds(), Some(KindSet::FLOAT));
        }
        assert!(matches!(
            lowered.stmts[1],
            Stmt::Assign {
                expr: Expr::Neg(_),
                ..
            }
        ));
    }

    #[test]
    fn not_idiom() {
        let lowered = lower_text(
            r#"
.class La/B;
.method static f(J)J
    .registers 4
    not-long v0, p0
    return-wide v0
.end method
"#,
        )
        .unwrap();
        let same: Vec<&Constraint> = lowered
            .collector
            .iter()
            .map(|r| &r.constraint)
            .filter(|c| matches!(c, Constraint::SameAs(_, _)))
            .collect();
        assert_eq!(same.len(), 1);
        assert!(exactly(&lowered.collector).contains(&(Some(Addr(0)), Kind::Long)));
        match &lowered.stmts[1] {
            Stmt::Assign {
                expr: Expr::Binop { rhs, .. },
                ..
            } => assert_eq!(*rhs, Operand::Constant(crate::ir::Constant::Long(-1))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invoke_results_are_folded() {
        let lowered = lower_text(
            r#"
.class La/B;
.method static f()V
    .registers 2
    invoke-static {}, La/B;->g()F
    move-result v0
    invoke-static {v0}, La/B;->h(F)V
    return-void
.end method
"#,
        )
        .unwrap();
        assert_eq!(lowered.stmts.len(), 3);
        assert!(matches!(
            &lowered.stmts[0],
            Stmt::Assign {
                dest: LValue::Local(_),
                expr: Expr::Invoke { .. }
            }
        ));
        assert!(matches!(&lowered.stmts[1], Stmt::Invoke(_)));
        // result anchored by the callee return type, argument by the parameter
        let anchors: Vec<Kind> = lowered
            .collector
            .iter()
            .filter(|r| r.origin == Origin::Anchor)
            .filter_map(|r| r.constraint.kinds().and_then(KindSet::single))
            .collect();
        assert_eq!(anchors, vec![Kind::Float, Kind::Float]);
        assert_eq!(lowered.values.len(), 1);
    }

    #[test]
    fn arity_is_checked() {
        let err = lower_text(
            r#"
.class La/B;
.method static f()V
    .registers 2
    invoke-static {v0, v1}, La/B;->g(I)V
    return-void
.end method
"#,
        );
        assert!(matches!(
            err,
            Err(LiftError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn parameters_are_anchored() {
        let lowered = lower_text(
            r#"
.class La/B;
.method g(JLjava/lang/String;)V
    .registers 5
    return-void
.end method
"#,
        )
        .unwrap();
        assert_eq!(lowered.stmts.len(), 4);
        assert_eq!(
            exactly(&lowered.collector),
            vec![(None, Kind::Object), (None, Kind::Long), (None, Kind::Object)]
        );
        let widths: Vec<Width> = lowered.values.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![Width::Narrow, Width::Wide, Width::Narrow]);
        let regs: Vec<u16> = lowered.values.iter().map(|v| v.reg.value()).collect();
        assert_eq!(regs, vec![1, 2, 4]);
    }

    #[test]
    fn wide_register_out_of_frame() {
        let err = lower_text(
            r#"
.class La/B;
.method static f()V
    .registers 2
    const-wide/16 v1, 0x1
    return-void
.end method
"#,
        );
        assert!(matches!(err, Err(LiftError::RegisterOutOfBounds { size: 2, .. })));
    }
}
