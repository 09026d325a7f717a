use super::{Current, Lowerer};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{BinOp, Constant, Expr, LValue, Operand, Slot, Stmt};
use crate::kinds::KindSet;
use dl_bytecode::opcodes::{Family, OperandKind};
use dl_bytecode::types::Type;

fn assign(dest: Slot, expr: Expr<Slot>) -> Vec<Stmt<Slot>> {
    vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr,
    }]
}

pub(super) fn lower_neg(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let contract = at.contract();
    let src = l.read(at, at.reg(1)?, contract)?;
    let dest = l.write(at, at.reg(0)?, contract)?;
    Ok(assign(dest, Expr::Neg(Operand::Local(src))))
}

/// `not-int` and `not-long` are integer xors with all ones.
pub(super) fn lower_not(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let contract = at.contract();
    let ones = if contract == KindSet::LONG {
        Constant::Long(-1)
    } else {
        Constant::Int(-1)
    };
    let src = l.read(at, at.reg(1)?, contract)?;
    let dest = l.write(at, at.reg(0)?, contract)?;
    l.same_kind(at, dest, src);
    Ok(assign(
        dest,
        Expr::Binop {
            op: BinOp::Xor,
            lhs: Operand::Local(src),
            rhs: Operand::Constant(ones),
        },
    ))
}

const fn operand_type(kind: OperandKind) -> Option<Type> {
    match kind {
        OperandKind::Int => Some(Type::Int),
        OperandKind::Long => Some(Type::Long),
        OperandKind::Float => Some(Type::Float),
        OperandKind::Double => Some(Type::Double),
        OperandKind::Boolean => Some(Type::Boolean),
        OperandKind::Byte => Some(Type::Byte),
        OperandKind::Char => Some(Type::Char),
        OperandKind::Short => Some(Type::Short),
        OperandKind::Object | OperandKind::Narrow | OperandKind::Wide => None,
    }
}

pub(super) fn lower_convert(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let target = at
        .opcode
        .target_kind()
        .ok_or_else(|| LiftError::malformed(at.instr, "conversion without a target kind"))?;
    let to = operand_type(target)
        .ok_or_else(|| LiftError::malformed(at.instr, "conversion to a non numeric kind"))?;
    let src = l.read(at, at.reg(1)?, at.contract())?;
    let dest = l.write(at, at.reg(0)?, KindSet::from_operand(target))?;
    Ok(assign(
        dest,
        Expr::Convert {
            value: Operand::Local(src),
            to,
        },
    ))
}

/// Three registers, two-address and literal arithmetic.
pub(super) fn lower_binop(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let mnemonic = at.opcode.mnemonic();
    let op = BinOp::from_mnemonic(mnemonic)
        .ok_or_else(|| LiftError::malformed(at.instr, "unknown arithmetic operator"))?;
    let contract = at.contract();
    // shift distances are ints, whatever the shifted kind
    let rhs_contract = if op.is_shift() { KindSet::INT } else { contract };

    let (dest_reg, lhs, rhs) = match at.opcode.family() {
        Family::Binop => {
            let lhs = l.read(at, at.reg(1)?, contract)?;
            let rhs = l.read(at, at.reg(2)?, rhs_contract)?;
            (at.reg(0)?, Operand::Local(lhs), Operand::Local(rhs))
        }
        Family::Binop2addr => {
            let lhs = l.read(at, at.reg(0)?, contract)?;
            let rhs = l.read(at, at.reg(1)?, rhs_contract)?;
            (at.reg(0)?, Operand::Local(lhs), Operand::Local(rhs))
        }
        _ => {
            let src = Operand::Local(l.read(at, at.reg(1)?, contract)?);
            let literal = Operand::Constant(Constant::Int(at.literal()? as i32));
            if mnemonic.starts_with("rsub") {
                (at.reg(0)?, literal, src)
            } else {
                (at.reg(0)?, src, literal)
            }
        }
    };
    let dest = l.write(at, dest_reg, contract)?;
    Ok(assign(dest, Expr::Binop { op, lhs, rhs }))
}

/// Three-way comparisons produce an int.
pub(super) fn lower_cmp(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let op = BinOp::from_mnemonic(at.opcode.mnemonic())
        .ok_or_else(|| LiftError::malformed(at.instr, "unknown comparison"))?;
    let contract = at.contract();
    let lhs = l.read(at, at.reg(1)?, contract)?;
    let rhs = l.read(at, at.reg(2)?, contract)?;
    let dest = l.write(at, at.reg(0)?, KindSet::INT)?;
    Ok(assign(
        dest,
        Expr::Binop {
            op,
            lhs: Operand::Local(lhs),
            rhs: Operand::Local(rhs),
        },
    ))
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::ir::{BinOp, Constant, Expr, Operand, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::registers::Reg;
    use dl_bytecode::{parse_assembly, Addr};

    fn lift(text: &str) -> crate::ir::Body {
        let asm = parse_assembly(text).unwrap();
        lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap()
    }

    #[test]
    fn negate_int_constant() {
        let body = lift(
            r#"
.class La/B;
.method static f()I
    .registers 2
    const/4 v0, 0x5
    neg-int v1, v0
    return v1
.end method
"#,
        );
        assert!(body.diagnostics.is_empty());
        let at_neg: Vec<&Stmt<_>> = body.stmts_at(Addr(1)).collect();
        assert_eq!(at_neg.len(), 1);
        assert!(matches!(
            at_neg[0],
            Stmt::Assign {
                expr: Expr::Neg(Operand::Local(_)),
                ..
            }
        ));
        assert_eq!(body.local_defined_at(Addr(1)).map(|l| l.kind), Some(Kind::Int));
        assert_eq!(body.local_defined_at(Addr(0)).map(|l| l.kind), Some(Kind::Int));
    }

    #[test]
    fn not_on_a_float_result_conflicts() {
        let body = lift(
            r#"
.class La/B;
.method static f()I
    .registers 2
    invoke-static {}, La/B;->g()F
    move-result v0
    not-int v1, v0
    return v1
.end method
"#,
        );
        assert_eq!(body.diagnostics.len(), 1);
        let diag = &body.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::Conflict);
        assert_eq!(diag.register, Reg::from(0u16));
        // invoke-static @0, move-result @3, not-int @4
        assert!(diag.addrs.contains(&Addr(4)));
        assert_eq!(diag.resolved, Kind::Int);
    }

    #[test]
    fn reverse_subtraction_and_shifts() {
        let body = lift(
            r#"
.class La/B;
.method static f(J)J
    .registers 5
    rsub-int/lit8 v0, v0, 0x3
    shl-long v1, p0, v0
    return-wide v1
.end method
"#,
        );
        match body.stmts_at(Addr(0)).next() {
            Some(Stmt::Assign {
                expr: Expr::Binop { op, lhs, .. },
                ..
            }) => {
                assert_eq!(*op, BinOp::Sub);
                assert_eq!(*lhs, Operand::Constant(Constant::Int(3)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(body.local_defined_at(Addr(2)).map(|l| l.kind), Some(Kind::Long));
    }
}
