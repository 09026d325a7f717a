use super::{Current, Lowerer};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{CmpOp, Operand, Slot, Stmt};
use crate::kinds::KindSet;

fn comparison(at: &Current<'_>) -> LiftResult<CmpOp> {
    CmpOp::from_mnemonic(at.opcode.mnemonic())
        .ok_or_else(|| LiftError::malformed(at.instr, "unknown comparison"))
}

/// Kinds two registers can be compared as: references can only be tested
/// for equality.
const fn comparable(op: CmpOp) -> KindSet {
    match op {
        CmpOp::Eq | CmpOp::Ne => KindSet::NARROW,
        CmpOp::Lt | CmpOp::Ge | CmpOp::Gt | CmpOp::Le => KindSet::PRIMITIVE_NARROW,
    }
}

pub(super) fn lower_if(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let op = comparison(at)?;
    let target = at.target()?;
    let contract = comparable(op);
    let lhs = l.read(at, at.reg(0)?, contract)?;
    let rhs = l.read(at, at.reg(1)?, contract)?;
    l.same_kind(at, lhs, rhs);
    Ok(vec![Stmt::If {
        op,
        lhs: Operand::Local(lhs),
        rhs: Operand::Local(rhs),
        target,
    }])
}

/// The zero of `if-*z` is typed as the compared value: `0`, `0.0F` or `null`.
pub(super) fn lower_ifz(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let op = comparison(at)?;
    let target = at.target()?;
    let lhs = l.read(at, at.reg(0)?, comparable(op))?;
    Ok(vec![Stmt::If {
        op,
        lhs: Operand::Local(lhs),
        rhs: Operand::Literal {
            bits: 0,
            wide: false,
            peer: lhs,
        },
        target,
    }])
}

pub(super) fn lower_goto(_: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    Ok(vec![Stmt::Goto(at.target()?)])
}

pub(super) fn lower_switch(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let payload = at
        .instr
        .payload
        .as_ref()
        .ok_or_else(|| LiftError::malformed(at.instr, "missing switch payload"))?;
    let cases = payload
        .cases()
        .into_iter()
        .map(|(key, offset)| {
            at.addr()
                .checked_offset(offset)
                .map(|target| (key, target))
                .ok_or_else(|| LiftError::bad_target(at.instr, i64::from(offset)))
        })
        .collect::<LiftResult<Vec<_>>>()?;
    let key = l.read(at, at.reg(0)?, KindSet::INT)?;
    Ok(vec![Stmt::Switch {
        key: Operand::Local(key),
        cases,
        default: at.instr.next_addr(),
    }])
}

pub(super) fn lower_throw(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let exception = l.read(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::Throw(Operand::Local(exception))])
}

#[cfg(test)]
mod tests {
    use crate::ir::{Constant, Operand, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::{parse_assembly, Addr};

    #[test]
    fn zero_tests_follow_the_tested_kind() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(Ljava/lang/Object;F)V
    .registers 2
    if-eqz p0, :done
    if-nez p1, :done
    :done
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        let zeros: Vec<Operand<_>> = body
            .iter_stmts()
            .filter_map(|s| match s {
                Stmt::If { rhs, .. } => Some(rhs.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            zeros,
            vec![
                Operand::Constant(Constant::Null),
                Operand::Constant(Constant::Float(0))
            ]
        );
    }

    #[test]
    fn switches_target_statements() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(I)I
    .registers 2
    packed-switch p0, :table
    const/4 v0, 0x0
    return v0
    :one
    const/4 v0, 0x1
    return v0
    :table
    .packed-switch 0x1
        :one
    .end packed-switch
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        match body.stmts_at(Addr(0)).next() {
            Some(Stmt::Switch { cases, default, .. }) => {
                assert_eq!(cases, &vec![(1, Addr(5))]);
                assert_eq!(*default, Addr(3));
                assert!(body.stmt_index(Addr(5)).is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(body.local_defined_at(Addr(5)).map(|l| l.kind), Some(Kind::Int));
    }
}
