//! This crate lifts Dalvik method code into a typed three-address
//! representation for the `dexlift` project.
//!
//! Registers of the bytecode carry no type: the lifter maps them to
//! provisional values, collects typing constraints from the opcodes and
//! from the declared types of the referenced methods and fields, solves
//! them and finally rewrites the method over typed locals, inserting casts
//! where a value is used as another kind.

pub mod assembler;
pub mod constraints;
pub mod controlflow;
pub mod dataflow;
pub mod diagnostics;
pub mod errors;
pub mod ir;
pub mod kinds;
pub mod lowering;
pub mod registers;
pub mod solver;
pub mod splitter;

use crate::errors::LiftResult;
use dl_bytecode::code::MethodCode;
use dl_bytecode::pool::ConstantPool;
use serde::Serialize;

/// Lifting options, passed along with every method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Options {
    /// Fail methods with conflicting classes instead of defaulting them.
    pub strict: bool,
    /// Drop instructions unreachable from the method entry before lowering.
    pub prune_unreachable: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict: false,
            prune_unreachable: true,
        }
    }
}

impl Options {
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub const fn prune_unreachable(mut self, prune: bool) -> Self {
        self.prune_unreachable = prune;
        self
    }
}

/// Lifts one method.
///
/// # Errors
///
/// See [`assembler::lift`].
pub fn lift_method(
    code: &MethodCode,
    pool: &dyn ConstantPool,
    options: &Options,
) -> LiftResult<ir::Body> {
    assembler::lift(code, pool, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LiftError;
    use crate::ir::{CastMode, Expr, Operand, Stmt};
    use crate::kinds::Kind;
    use dl_bytecode::code::AccessFlags;
    use dl_bytecode::formats::Format;
    use dl_bytecode::instrs::DecodedInstr;
    use dl_bytecode::registers::Reg;
    use dl_bytecode::{parse_assembly, Addr};

    // the int constant passed as an object is dead code
    const DEAD_REUSE: &str = r#"
.class La/B;
.method static f()F
    .registers 1
    const/high16 v0, 1.5f
    return v0
    const/4 v0, 0x1
    invoke-static {v0}, La/B;->g(Ljava/lang/Object;)V
    return-void
.end method
"#;

    #[test]
    fn dead_code_does_not_conflict() {
        let asm = parse_assembly(DEAD_REUSE).unwrap();
        let code = &asm.methods[0];

        let pruned = lift_method(code, &asm.pool, &Options::default()).unwrap();
        assert!(pruned.diagnostics.is_empty());
        assert_eq!(pruned.stmts.len(), 2);

        let kept = lift_method(code, &asm.pool, &Options::default().prune_unreachable(false))
            .unwrap();
        assert_eq!(kept.stmts.len(), 5);
        assert_eq!(kept.diagnostics.iter().filter(|d| d.is_conflict()).count(), 1);
    }

    #[test]
    fn lifting_is_deterministic() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(IF)I
    .registers 4
    if-lez p0, :neg
    move v0, p1
    sput v0, La/B;->x:F
    goto :end
    :neg
    const/4 v0, 0x0
    :end
    invoke-static {v0}, La/B;->h(I)I
    move-result v1
    return v1
.end method
"#,
        )
        .unwrap();
        let first = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        let second = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert_eq!(first.locals, second.locals);
        assert_eq!(first.stmts, second.stmts);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.diagnostics.len(), 1);
    }

    #[test]
    fn malformed_shape_is_fatal() {
        let mut pool = dl_bytecode::pool::Pool::new();
        let method = pool.intern_method(dl_bytecode::pool::MethodRef {
            class: dl_bytecode::types::Type::Class("a/B".to_string()),
            name: "f".to_string(),
            proto: dl_bytecode::types::Proto {
                params: Vec::new(),
                ret: dl_bytecode::types::Type::Void,
            },
        });
        // neg-int with a single register operand
        let instrs = vec![
            DecodedInstr {
                addr: Addr(0),
                opcode: 0x7b,
                format: Format::F12x,
                regs: vec![Reg::from(0u16)],
                literal: None,
                offset: None,
                reference: None,
                payload: None,
                units: vec![0x007b],
            },
            DecodedInstr {
                addr: Addr(1),
                opcode: 0x0e,
                format: Format::F10x,
                regs: Vec::new(),
                literal: None,
                offset: None,
                reference: None,
                payload: None,
                units: vec![0x000e],
            },
        ];
        let code = MethodCode::new(method, AccessFlags::STATIC, 2, instrs, Vec::new());
        match lift_method(&code, &pool, &Options::default()) {
            Err(LiftError::MalformedInstruction {
                addr,
                mnemonic,
                raw,
                ..
            }) => {
                assert_eq!(addr, Addr(0));
                assert_eq!(mnemonic, "neg-int");
                assert_eq!(raw, "7b00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_opcodes_are_fatal() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f()V
    .registers 1
    return-void
.end method
"#,
        )
        .unwrap();
        let mut instrs = asm.methods[0].instructions().to_vec();
        instrs[0].opcode = 0x3e;
        let code = MethodCode::new(
            asm.methods[0].method,
            AccessFlags::STATIC,
            1,
            instrs,
            Vec::new(),
        );
        assert!(matches!(
            lift_method(&code, &asm.pool, &Options::default()),
            Err(LiftError::UnknownOpcode { opcode: 0x3e, .. })
        ));
    }

    #[test]
    fn int_passed_as_float_is_reinterpreted() {
        let asm = parse_assembly(
            r#"
.class La/B;
.method static f(I)V
    .registers 1
    invoke-static {p0}, La/B;->g(F)V
    return-void
.end method
"#,
        )
        .unwrap();
        let body = lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap();
        assert_eq!(body.diagnostics.len(), 1);
        assert_eq!(body.locals.len(), 1);
        assert_eq!(body.locals[0].kind, Kind::Int);
        let args = match body.stmts_at(Addr(0)).next() {
            Some(Stmt::Invoke(Expr::Invoke { args, .. })) => args.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(
            args,
            vec![Operand::Cast {
                value: body.locals[0],
                from: Kind::Int,
                to: Kind::Float,
                mode: CastMode::Reinterpret,
            }]
        );
    }
}
