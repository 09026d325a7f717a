use super::{Current, Lowerer};
use crate::errors::LiftResult;
use crate::ir::{Constant, Expr, LValue, Operand, Slot, Stmt};
use crate::kinds::KindSet;

/// Untyped literals keep their bit pattern until the kind of their
/// destination is solved. Only a zero can be a null reference.
pub(super) fn lower_const(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let literal = at.literal()?;
    let wide = at.contract() == KindSet::WIDE;
    let (bits, contract) = if wide {
        (literal as u64, KindSet::WIDE)
    } else if literal == 0 {
        (0, KindSet::NARROW)
    } else {
        (u64::from(literal as i32 as u32), KindSet::PRIMITIVE_NARROW)
    };
    let dest = l.write(at, at.reg(0)?, contract)?;
    Ok(vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr: Expr::Use(Operand::Literal {
            bits,
            wide,
            peer: dest,
        }),
    }])
}

pub(super) fn lower_const_string(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let string = at.string_ref()?;
    let dest = l.write(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr: Expr::Use(Operand::Constant(Constant::String(string))),
    }])
}

pub(super) fn lower_const_class(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let class = at.type_ref()?;
    let dest = l.write(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr: Expr::Use(Operand::Constant(Constant::Class(class))),
    }])
}

#[cfg(test)]
mod tests {
    use crate::ir::{Constant, Expr, LValue, Operand, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::{parse_assembly, Addr};

    #[test]
    fn float_literals_keep_their_bits() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()F
    .registers 1
    const/high16 v0, 1.5f
    return v0
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        match body.stmts_at(Addr(0)).next() {
            Some(Stmt::Assign {
                dest: LValue::Local(local),
                expr: Expr::Use(Operand::Constant(c)),
            }) => {
                assert_eq!(local.kind, Kind::Float);
                assert_eq!(*c, Constant::Float(0x3fc0_0000));
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    #[test]
    fn zero_can_be_null() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()Ljava/lang/Object;
    .registers 1
    const/4 v0, 0x0
    return-object v0
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        assert!(matches!(
            body.stmts_at(Addr(0)).next(),
            Some(Stmt::Assign {
                expr: Expr::Use(Operand::Constant(Constant::Null)),
                ..
            })
        ));
    }
}
