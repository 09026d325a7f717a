use super::{Current, Lowerer};
use crate::errors::{LiftError, LiftResult};
use crate::ir::{Constant, Expr, LValue, Operand, Slot, Stmt};
use crate::kinds::{Kind, KindSet};
use dl_bytecode::instrs::Payload;
use dl_bytecode::types::Type;

fn assign(dest: Slot, expr: Expr<Slot>) -> Vec<Stmt<Slot>> {
    vec![Stmt::Assign {
        dest: LValue::Local(dest),
        expr,
    }]
}

pub(super) fn lower_monitor_enter(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let object = l.read(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::EnterMonitor(Operand::Local(object))])
}

pub(super) fn lower_monitor_exit(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let object = l.read(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::ExitMonitor(Operand::Local(object))])
}

/// `check-cast` redefines the register it checks.
pub(super) fn lower_check_cast(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let type_ = at.type_ref()?;
    let reg = at.reg(0)?;
    let value = l.read(at, reg, KindSet::OBJECT)?;
    let dest = l.write(at, reg, KindSet::OBJECT)?;
    let pool = l.pool;
    l.declare(dest.value, pool.type_(type_)?);
    Ok(assign(
        dest,
        Expr::CheckCast {
            value: Operand::Local(value),
            type_,
        },
    ))
}

pub(super) fn lower_instance_of(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let type_ = at.type_ref()?;
    let value = l.read(at, at.reg(1)?, KindSet::OBJECT)?;
    let dest = l.write(at, at.reg(0)?, KindSet::INT)?;
    Ok(assign(
        dest,
        Expr::InstanceOf {
            value: Operand::Local(value),
            type_,
        },
    ))
}

pub(super) fn lower_array_length(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let array = l.read(at, at.reg(1)?, KindSet::OBJECT)?;
    let dest = l.write(at, at.reg(0)?, KindSet::INT)?;
    Ok(assign(dest, Expr::Length(Operand::Local(array))))
}

pub(super) fn lower_new_instance(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let type_ = at.type_ref()?;
    let dest = l.write(at, at.reg(0)?, KindSet::OBJECT)?;
    Ok(assign(dest, Expr::NewInstance(type_)))
}

pub(super) fn lower_new_array(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let type_ = at.type_ref()?;
    let size = l.read(at, at.reg(1)?, KindSet::INT)?;
    let dest = l.write(at, at.reg(0)?, KindSet::OBJECT)?;
    let pool = l.pool;
    l.declare(dest.value, pool.type_(type_)?);
    Ok(assign(
        dest,
        Expr::NewArray {
            type_,
            size: Operand::Local(size),
        },
    ))
}

/// Array data elements as constants of the array element type; with no
/// known array type, they are ints or longs depending on their width.
fn array_constant(element: Option<&Type>, width: u16, bits: u64) -> Constant {
    match (element, width) {
        (Some(Type::Float), _) => Constant::Float(bits as u32),
        (Some(Type::Double), _) => Constant::Double(bits),
        (Some(Type::Long), _) | (None, 8) => Constant::Long(bits as i64),
        (Some(Type::Boolean | Type::Char), _) => Constant::Int(bits as u32 as i32),
        (_, 1) => Constant::Int(i32::from(bits as u8 as i8)),
        (_, 2) => Constant::Int(i32::from(bits as u16 as i16)),
        _ => Constant::Int(bits as u32 as i32),
    }
}

pub(super) fn lower_fill_array_data(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<Vec<Stmt<Slot>>> {
    let (width, elements) = match &at.instr.payload {
        Some(Payload::ArrayData { width, elements }) => (*width, elements),
        _ => return Err(LiftError::malformed(at.instr, "missing array data payload")),
    };
    let (array, type_) = l.read_array(at, at.reg(0)?, KindSet::OBJECT)?;
    let element = type_.as_ref().and_then(Type::element_type);
    Ok(vec![Stmt::FillArray {
        array: Operand::Local(array),
        width,
        elements: elements
            .iter()
            .map(|bits| array_constant(element.as_ref(), width, *bits))
            .collect(),
    }])
}

/// Reads the array and index operands of an array access, with the
/// declared element type of the array when it is known. Without it, the
/// element is only typed by the accessor opcode: `aget` and `aput` deal
/// with ints or floats, `-wide` variants with longs or doubles.
fn element(
    l: &mut Lowerer<'_, '_>,
    at: &Current<'_>,
) -> LiftResult<(Operand<Slot>, Operand<Slot>, Option<Type>)> {
    let (array, type_) = l.read_array(at, at.reg(1)?, KindSet::OBJECT)?;
    let index = l.read(at, at.reg(2)?, KindSet::INT)?;
    let element = type_.as_ref().and_then(Type::element_type);
    Ok((Operand::Local(array), Operand::Local(index), element))
}

pub(super) fn lower_aget(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let (array, index, element) = element(l, at)?;
    let mut dest = l.write(at, at.reg(0)?, at.contract())?;
    if let Some(element) = element {
        let kind = l.declared(at, &element)?;
        l.anchor_element(at, &mut dest, kind);
        l.declare(dest.value, &element);
    }
    Ok(assign(dest, Expr::ArrayRef { array, index }))
}

pub(super) fn lower_aput(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let mut value = l.read(at, at.reg(0)?, at.contract())?;
    let (array, index, element) = element(l, at)?;
    if let Some(element) = element {
        let kind = l.declared(at, &element)?;
        l.anchor_element(at, &mut value, kind);
    }
    Ok(vec![Stmt::Assign {
        dest: LValue::ArrayElem { array, index },
        expr: Expr::Use(Operand::Local(value)),
    }])
}

/// Declared type of the field an instruction refers to, and its kind.
fn field_type<'p>(l: &Lowerer<'p, '_>, at: &Current<'_>) -> LiftResult<(&'p Type, Kind)> {
    let pool = l.pool;
    let field = pool.field(at.field_ref()?)?;
    Ok((&field.type_, l.declared(at, &field.type_)?))
}

pub(super) fn lower_iget(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let field = at.field_ref()?;
    let (type_, kind) = field_type(l, at)?;
    let object = l.read(at, at.reg(1)?, KindSet::OBJECT)?;
    let mut dest = l.write(at, at.reg(0)?, at.contract())?;
    l.anchor(at, &mut dest, kind);
    l.declare(dest.value, type_);
    Ok(assign(
        dest,
        Expr::InstanceField {
            object: Operand::Local(object),
            field,
        },
    ))
}

pub(super) fn lower_iput(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let field = at.field_ref()?;
    let (_, kind) = field_type(l, at)?;
    let mut value = l.read(at, at.reg(0)?, at.contract())?;
    l.anchor(at, &mut value, kind);
    let object = l.read(at, at.reg(1)?, KindSet::OBJECT)?;
    Ok(vec![Stmt::Assign {
        dest: LValue::InstanceField {
            object: Operand::Local(object),
            field,
        },
        expr: Expr::Use(Operand::Local(value)),
    }])
}

pub(super) fn lower_sget(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let field = at.field_ref()?;
    let (type_, kind) = field_type(l, at)?;
    let mut dest = l.write(at, at.reg(0)?, at.contract())?;
    l.anchor(at, &mut dest, kind);
    l.declare(dest.value, type_);
    Ok(assign(dest, Expr::StaticField(field)))
}

pub(super) fn lower_sput(l: &mut Lowerer<'_, '_>, at: &Current<'_>) -> LiftResult<Vec<Stmt<Slot>>> {
    let field = at.field_ref()?;
    let (_, kind) = field_type(l, at)?;
    let mut value = l.read(at, at.reg(0)?, at.contract())?;
    l.anchor(at, &mut value, kind);
    Ok(vec![Stmt::Assign {
        dest: LValue::StaticField(field),
        expr: Expr::Use(Operand::Local(value)),
    }])
}

#[cfg(test)]
mod tests {
    use super::array_constant;
    use crate::diagnostics::DiagnosticKind;
    use crate::ir::{Body, Constant, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::types::Type;
    use dl_bytecode::{parse_assembly, Addr};

    #[test]
    fn register_reuse_opens_generations() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 4
    const/16 v3, 0x2a
    sput v3, La/B;->count:I
    new-instance v3, La/B;
    sput-object v3, La/B;->last:La/B;
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert!(body.diagnostics.is_empty());
        let int = body.local_defined_at(Addr(0)).unwrap();
        let object = body.local_defined_at(Addr(4)).unwrap();
        assert_eq!(int.kind, Kind::Int);
        assert_eq!(object.kind, Kind::Object);
        assert_ne!(int, object);
    }

    fn lift(text: &str) -> Body {
        let asm = parse_assembly(text).unwrap();
        lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap()
    }

    #[test]
    fn int_array_elements_are_not_floats() {
        let body = lift(
            r#"
.class La/B;
.method static f([I)V
    .registers 3
    const/4 v0, 0x0
    aget v1, p0, v0
    sput v1, La/B;->x:F
    return-void
.end method
"#,
        );
        assert_eq!(body.diagnostics.len(), 1);
        assert_eq!(body.diagnostics[0].kind, DiagnosticKind::Conflict);
        assert_eq!(body.local_defined_at(Addr(1)).map(|l| l.kind), Some(Kind::Int));
    }

    #[test]
    fn array_copies_keep_the_element_kind() {
        let body = lift(
            r#"
.class La/B;
.method static f([F[F)V
    .registers 4
    const/4 v0, 0x0
    aget v1, p0, v0
    aput v1, p1, v0
    return-void
.end method
"#,
        );
        assert!(body.diagnostics.is_empty());
        assert_eq!(body.local_defined_at(Addr(1)).map(|l| l.kind), Some(Kind::Float));
    }

    #[test]
    fn new_arrays_type_their_elements() {
        let body = lift(
            r#"
.class La/B;
.method static f()V
    .registers 4
    const/4 v0, 0x2
    new-array v1, v0, [D
    move-object v3, v1
    const/4 v0, 0x0
    aget-wide v1, v3, v0
    aput-wide v1, v3, v0
    return-void
.end method
"#,
        );
        assert!(body.diagnostics.is_empty());
        assert_eq!(body.local_defined_at(Addr(5)).map(|l| l.kind), Some(Kind::Double));
    }

    #[test]
    fn array_data_follows_the_array_type() {
        let body = lift(
            r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v0, 0x2
    new-array v0, v0, [F
    fill-array-data v0, :data
    return-void
    :data
    .array-data 4
        1.5f -2.0f
    .end array-data
.end method
"#,
        );
        let elements = body.iter_stmts().find_map(|s| match s {
            Stmt::FillArray { elements, .. } => Some(elements.clone()),
            _ => None,
        });
        assert_eq!(
            elements,
            Some(vec![
                Constant::Float(1.5f32.to_bits()),
                Constant::Float((-2.0f32).to_bits())
            ])
        );
        assert_eq!(array_constant(None, 2, 0xffff), Constant::Int(-1));
        assert_eq!(array_constant(Some(&Type::Char), 2, 0xffff), Constant::Int(0xffff));
    }
}
