use super::{Current, Lowerer};
use crate::constraints::Origin;
use crate::errors::LiftResult;
use crate::ir::{Expr, IdentitySource, LValue, Operand, Slot, Stmt};
use crate::kinds::{Kind, KindSet};

pub(super) fn lower_nop(_: &mut Lowerer<'_, '_>, _: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    Ok(vec![])
}

/// Moves propagate a kind without fixing it.
pub(super) fn lower_move(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let contract = match at.contract() {
        KindSet::PRIMITIVE_NARROW => KindSet::NARROW,
        other => other,
    };
    let (src, type_) = l.read_array(at, at.reg(1)?, contract)?;
    let dest = l.write(at, at.reg(0)?, contract)?;
    l.same_kind(at, dest, src);
    if let Some(type_) = &type_ {
        l.declare(dest.value, type_);
    }
    Ok(vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr: Expr::Use(Operand::Local(src)),
    }])
}

/// A `move-result*` that was not merged into its producer: the result is
/// lost, but the register is still defined.
pub(super) fn lower_move_result(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    if l.is_folded(at.addr()) {
        return Ok(vec![]);
    }
    log::warn!(
        "{} at {} does not follow a result producing instruction",
        at.opcode,
        at.addr()
    );
    l.write(at, at.reg(0)?, at.contract())?;
    Ok(vec![Stmt::Nop])
}

pub(super) fn lower_move_exception(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let dest = l.write_at(at, at.addr(), at.reg(0)?, KindSet::OBJECT, Origin::Anchor)?;
    Ok(vec![Stmt::Identity {
        dest,
        source: IdentitySource::CaughtException,
    }])
}

pub(super) fn lower_return_void(
    _: &mut Lowerer<'_, '_>,
    _: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    Ok(vec![Stmt::Return(None)])
}

/// The returned value is anchored by the declared return type.
pub(super) fn lower_return(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let pool = l.pool;
    let ret = &pool.method(l.code.method)?.proto.ret;
    let kind = l.declared(at, ret)?;
    let contract = match at.contract() {
        KindSet::PRIMITIVE_NARROW if kind == Kind::Object => KindSet::NARROW,
        other => other,
    };
    let mut value = l.read(at, at.reg(0)?, contract)?;
    l.anchor(at, &mut value, kind);
    Ok(vec![Stmt::Return(Some(Operand::Local(value)))])
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::{parse_assembly, Addr};

    #[test]
    fn moves_propagate_anchors() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(D)D
    .registers 6
    move-wide v0, p0
    move-wide v2, v0
    return-wide v2
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        assert_eq!(body.local_defined_at(Addr(1)).map(|l| l.kind), Some(Kind::Double));
        // one web per register
        assert_eq!(body.locals.len(), 3);
    }

    #[test]
    fn dangling_move_result() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    move-result v0
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert_eq!(body.stmts.len(), 2);
        assert_eq!(body.diagnostics.len(), 1);
        assert_eq!(body.diagnostics[0].kind, DiagnosticKind::Ambiguous);
    }
}
