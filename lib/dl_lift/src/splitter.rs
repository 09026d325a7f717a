//! Local splitting and cast insertion.
//!
//! Provisional values are grouped into webs: values whose definitions
//! reach a common read form a single web, and each web becomes one final
//! local of its solved kind. Other values of a same class, such as the
//! source and destination of a `move`, keep distinct locals.
//!
//! Operands whose local kind is not accepted by their consumer are wrapped
//! into casts, and definitions whose producer cannot yield the local kind
//! go through a temporary of the produced kind. Casts between kinds of a
//! same width reinterpret bits; the other ones only occur on conflicting
//! classes and refer to the diagnostic reporting the conflict.

use crate::ir::{CastMode, Constant, Expr, LValue, Local, Operand, Slot, Stmt, ValueId};
use crate::kinds::Kind;
use crate::registers::ProvisionalValue;
use crate::solver::Solution;
use dl_bytecode::Addr;
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

struct Splitter<'s> {
    solution: &'s Solution,
    webs: Vec<usize>,
    locals: BTreeMap<usize, Local>,
    counts: BTreeMap<Kind, usize>,
    declared: Vec<Local>,
}

impl<'s> Splitter<'s> {
    fn fresh(&mut self, kind: Kind) -> Local {
        let count = self.counts.entry(kind).or_default();
        let local = Local {
            kind,
            index: *count,
        };
        *count += 1;
        self.declared.push(local);
        local
    }

    fn local_of(&mut self, value: ValueId) -> Local {
        let web = self.webs[value.as_usize()];
        if let Some(local) = self.locals.get(&web) {
            return *local;
        }
        let local = self.fresh(self.solution.kind_of(value));
        self.locals.insert(web, local);
        local
    }

    fn mode(&self, from: Kind, to: Kind, value: ValueId) -> CastMode {
        if from.bit_compatible(to) {
            CastMode::Reinterpret
        } else {
            CastMode::Coerce {
                diagnostic: self.solution.diagnostic_of(value),
            }
        }
    }

    fn use_slot(&mut self, slot: Slot) -> Operand<Local> {
        let local = self.local_of(slot.value);
        if slot.contract.contains(local.kind.set()) {
            return Operand::Local(local);
        }
        match slot.contract.preferred() {
            Some(to) => Operand::Cast {
                value: local,
                from: local.kind,
                to,
                mode: self.mode(local.kind, to, slot.value),
            },
            None => Operand::Local(local),
        }
    }

    /// Local written by a definition, and the cast to append when the
    /// producer cannot yield the solved kind.
    fn define(&mut self, slot: Slot) -> (Local, Option<Stmt<Local>>) {
        let local = self.local_of(slot.value);
        match slot.contract.preferred() {
            Some(produced) if !slot.contract.contains(local.kind.set()) => {
                let temp = self.fresh(produced);
                let mode = self.mode(produced, local.kind, slot.value);
                let cast = Stmt::Assign {
                    dest: LValue::Local(local),
                    expr: Expr::Use(Operand::Cast {
                        value: temp,
                        from: produced,
                        to: local.kind,
                        mode,
                    }),
                };
                (temp, Some(cast))
            }
            _ => (local, None),
        }
    }

    fn operand(&mut self, op: Operand<Slot>) -> Operand<Local> {
        match op {
            Operand::Local(slot) => self.use_slot(slot),
            Operand::Constant(c) => Operand::Constant(c),
            Operand::Literal { bits, peer, .. } => {
                Operand::Constant(Constant::from_bits(self.solution.kind_of(peer.value), bits))
            }
            Operand::Cast {
                value,
                from,
                to,
                mode,
            } => Operand::Cast {
                value: self.local_of(value.value),
                from,
                to,
                mode,
            },
        }
    }

    fn operands(&mut self, ops: Vec<Operand<Slot>>) -> Vec<Operand<Local>> {
        ops.into_iter().map(|op| self.operand(op)).collect()
    }

    fn expr(&mut self, expr: Expr<Slot>) -> Expr<Local> {
        match expr {
            Expr::Use(op) => Expr::Use(self.operand(op)),
            Expr::Binop { op, lhs, rhs } => Expr::Binop {
                op,
                lhs: self.operand(lhs),
                rhs: self.operand(rhs),
            },
            Expr::Neg(op) => Expr::Neg(self.operand(op)),
            Expr::Convert { value, to } => Expr::Convert {
                value: self.operand(value),
                to,
            },
            Expr::CheckCast { value, type_ } => Expr::CheckCast {
                value: self.operand(value),
                type_,
            },
            Expr::InstanceOf { value, type_ } => Expr::InstanceOf {
                value: self.operand(value),
                type_,
            },
            Expr::Length(op) => Expr::Length(self.operand(op)),
            Expr::NewInstance(t) => Expr::NewInstance(t),
            Expr::NewArray { type_, size } => Expr::NewArray {
                type_,
                size: self.operand(size),
            },
            Expr::NewFilledArray { type_, elements } => Expr::NewFilledArray {
                type_,
                elements: self.operands(elements),
            },
            Expr::ArrayRef { array, index } => Expr::ArrayRef {
                array: self.operand(array),
                index: self.operand(index),
            },
            Expr::InstanceField { object, field } => Expr::InstanceField {
                object: self.operand(object),
                field,
            },
            Expr::StaticField(field) => Expr::StaticField(field),
            Expr::Invoke {
                kind,
                method,
                receiver,
                args,
            } => Expr::Invoke {
                kind,
                method,
                receiver: receiver.map(|r| self.operand(r)),
                args: self.operands(args),
            },
        }
    }

    fn lvalue(&mut self, lvalue: LValue<Slot>) -> (LValue<Local>, Option<Stmt<Local>>) {
        match lvalue {
            LValue::Local(slot) => {
                let (local, cast) = self.define(slot);
                (LValue::Local(local), cast)
            }
            LValue::ArrayElem { array, index } => (
                LValue::ArrayElem {
                    array: self.operand(array),
                    index: self.operand(index),
                },
                None,
            ),
            LValue::InstanceField { object, field } => (
                LValue::InstanceField {
                    object: self.operand(object),
                    field,
                },
                None,
            ),
            LValue::StaticField(field) => (LValue::StaticField(field), None),
        }
    }

    fn stmt(&mut self, stmt: Stmt<Slot>) -> (Stmt<Local>, Option<Stmt<Local>>) {
        let stmt = match stmt {
            Stmt::Nop => Stmt::Nop,
            Stmt::Identity { dest, source } => {
                let (dest, cast) = self.define(dest);
                return (Stmt::Identity { dest, source }, cast);
            }
            Stmt::Assign { dest, expr } => {
                let expr = self.expr(expr);
                let (dest, cast) = self.lvalue(dest);
                return (Stmt::Assign { dest, expr }, cast);
            }
            Stmt::Invoke(expr) => Stmt::Invoke(self.expr(expr)),
            Stmt::If {
                op,
                lhs,
                rhs,
                target,
            } => Stmt::If {
                op,
                lhs: self.operand(lhs),
                rhs: self.operand(rhs),
                target,
            },
            Stmt::Goto(target) => Stmt::Goto(target),
            Stmt::Switch {
                key,
                cases,
                default,
            } => Stmt::Switch {
                key: self.operand(key),
                cases,
                default,
            },
            Stmt::Return(op) => Stmt::Return(op.map(|op| self.operand(op))),
            Stmt::Throw(op) => Stmt::Throw(self.operand(op)),
            Stmt::EnterMonitor(op) => Stmt::EnterMonitor(self.operand(op)),
            Stmt::ExitMonitor(op) => Stmt::ExitMonitor(self.operand(op)),
            Stmt::FillArray {
                array,
                width,
                elements,
            } => Stmt::FillArray {
                array: self.operand(array),
                width,
                elements,
            },
        };
        (stmt, None)
    }
}

/// Rewrites provisional statements over final typed locals.
///
/// Returns the declared locals, in order of first appearance, and the
/// rewritten statements. Each inserted cast statement follows the
/// statement it completes and carries the same address.
#[must_use]
pub fn split(
    stmts: Vec<(Option<Addr>, Stmt<Slot>)>,
    values: &[ProvisionalValue],
    merges: &[(ValueId, ValueId)],
    solution: &Solution,
) -> (Vec<Local>, Vec<(Option<Addr>, Stmt<Local>)>) {
    let mut union_find: UnionFind<usize> = UnionFind::new(values.len());
    for (a, b) in merges {
        union_find.union(a.as_usize(), b.as_usize());
    }
    let mut splitter = Splitter {
        solution,
        webs: union_find.into_labeling(),
        locals: BTreeMap::new(),
        counts: BTreeMap::new(),
        declared: Vec::new(),
    };

    let mut res = Vec::with_capacity(stmts.len());
    for (addr, stmt) in stmts {
        let (stmt, cast) = splitter.stmt(stmt);
        res.push((addr, stmt));
        if let Some(cast) = cast {
            log::trace!("cast inserted after definition at {addr:?}");
            res.push((addr, cast));
        }
    }
    (splitter.declared, res)
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::ir::{CastMode, Expr, LValue, Operand, Stmt};
    use crate::kinds::Kind;
    use crate::{lift_method, Options};
    use dl_bytecode::{parse_assembly, Addr};

    fn lift(text: &str) -> crate::ir::Body {
        let asm = parse_assembly(text).unwrap();
        lift_method(&asm.methods[0], &asm.pool, &Options::default()).unwrap()
    }

    #[test]
    fn merged_definitions_share_a_local() {
        let body = lift(
            r#"
.class La/B;
.method static f(I)I
    .registers 2
    if-eqz p0, :a
    const/4 v0, 0x1
    goto :b
    :a
    const/4 v0, 0x2
    :b
    return v0
.end method
"#,
        );
        assert!(body.diagnostics.is_empty());
        let first = body.local_defined_at(Addr(2)).unwrap();
        let second = body.local_defined_at(Addr(4)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.kind, Kind::Int);
        assert_eq!(body.locals.len(), 2);
    }

    #[test]
    fn conflicting_definitions_are_cast_after_their_producer() {
        let body = lift(
            r#"
.class La/B;
.method static f()V
    .registers 1
    invoke-static {}, La/B;->g()F
    move-result v0
    invoke-static {v0}, La/B;->h(I)V
    return-void
.end method
"#,
        );
        assert_eq!(body.diagnostics.len(), 1);
        assert_eq!(body.diagnostics[0].kind, DiagnosticKind::Conflict);
        let at_invoke: Vec<&Stmt<_>> = body.stmts_at(Addr(0)).collect();
        assert_eq!(at_invoke.len(), 2);
        let temp = match at_invoke[0] {
            Stmt::Assign {
                dest: LValue::Local(temp),
                expr: Expr::Invoke { .. },
            } => *temp,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(temp.kind, Kind::Float);
        match at_invoke[1] {
            Stmt::Assign {
                dest: LValue::Local(local),
                expr: Expr::Use(Operand::Cast { value, mode, .. }),
            } => {
                assert_eq!(local.kind, Kind::Int);
                assert_eq!(*value, temp);
                assert_eq!(*mode, CastMode::Reinterpret);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn incompatible_uses_are_coerced() {
        let body = lift(
            r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v0, 0x1
    invoke-static {v0}, La/B;->g(Ljava/lang/Object;)V
    return-void
.end method
"#,
        );
        assert_eq!(body.diagnostics.len(), 1);
        match body.stmts_at(Addr(1)).next() {
            Some(Stmt::Invoke(Expr::Invoke { args, .. })) => {
                assert!(matches!(
                    args[0],
                    Operand::Cast {
                        from: Kind::Int,
                        to: Kind::Object,
                        mode: CastMode::Coerce {
                            diagnostic: Some(0)
                        },
                        ..
                    }
                ));
            }
            other => panic!("unexpected {other:?}"),
        };
    }
}
