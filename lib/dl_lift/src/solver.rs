//! Constraint solver.
//!
//! Values linked by `same-kind-as` constraints are merged into classes with
//! a union-find, then the kind sets of the other constraints are
//! intersected per class, in recording order. The first constraint that
//! empties the intersection of a class makes it conflicting. Since classes
//! are built before any intersection, the result does not depend on the
//! order in which the `same-kind-as` constraints were recorded.

use crate::constraints::{Collector, Constraint, Origin};
use crate::dataflow::Site;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::ValueId;
use crate::kinds::{Kind, KindSet};
use crate::registers::ProvisionalValue;
use dl_bytecode::registers::Width;
use dl_bytecode::Addr;
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct Class {
    members: Vec<ValueId>,
    kinds: KindSet,
    width: Width,
    constrained: bool,
    culprit: Option<usize>,
    conflicting: bool,
    kind: Kind,
    diagnostic: Option<usize>,
}

impl Class {
    fn new(width: Width) -> Self {
        let kinds = match width {
            Width::Narrow => KindSet::NARROW,
            Width::Wide => KindSet::WIDE,
        };
        Self {
            members: Vec::new(),
            kinds,
            width,
            constrained: false,
            culprit: None,
            conflicting: false,
            kind: default_kind(width),
            diagnostic: None,
        }
    }
}

/// Kind of the conflicting and unconstrained classes.
#[must_use]
pub const fn default_kind(width: Width) -> Kind {
    match width {
        Width::Narrow => Kind::DEFAULT,
        Width::Wide => Kind::Long,
    }
}

/// The solved kinds of all values.
#[derive(Debug, Clone)]
pub struct Solution {
    class_of: Vec<usize>,
    classes: Vec<Class>,
    diagnostics: Vec<Diagnostic>,
}

impl Solution {
    /// Equivalence class of a value.
    #[inline]
    #[must_use]
    pub fn class_of(&self, value: ValueId) -> usize {
        self.class_of[value.as_usize()]
    }

    #[inline]
    #[must_use]
    pub fn kind_of(&self, value: ValueId) -> Kind {
        self.classes[self.class_of(value)].kind
    }

    #[inline]
    #[must_use]
    pub fn classes_count(&self) -> usize {
        self.classes.len()
    }

    /// Index of the diagnostic reported for the class of a value.
    #[inline]
    #[must_use]
    pub fn diagnostic_of(&self, value: ValueId) -> Option<usize> {
        self.classes[self.class_of(value)].diagnostic
    }

    /// Checks if the class of a value is conflicting.
    #[inline]
    #[must_use]
    pub fn is_conflicting(&self, value: ValueId) -> bool {
        self.classes[self.class_of(value)].conflicting
    }

    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[inline]
    pub fn conflicts(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_conflict())
    }

    #[inline]
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Solves the constraints recorded over the given values.
#[must_use]
pub fn solve(values: &[ProvisionalValue], collector: &Collector) -> Solution {
    let mut union_find: UnionFind<usize> = UnionFind::new(values.len());
    for recorded in collector.iter() {
        if let Constraint::SameAs(a, b) = recorded.constraint {
            union_find.union(a.as_usize(), b.as_usize());
        }
    }

    // classes are numbered in order of their first value
    let mut ids: BTreeMap<usize, usize> = BTreeMap::new();
    let mut classes: Vec<Class> = Vec::new();
    let mut class_of = Vec::with_capacity(values.len());
    for (i, label) in union_find.into_labeling().into_iter().enumerate() {
        let width = values[i].width;
        let id = *ids.entry(label).or_insert_with(|| {
            classes.push(Class::new(width));
            classes.len() - 1
        });
        let class = &mut classes[id];
        class.members.push(ValueId(i));
        if class.width != width && !class.conflicting {
            class.conflicting = true;
            class.kinds = KindSet::empty();
        }
        class_of.push(id);
    }

    for (i, recorded) in collector.iter().enumerate() {
        let Some(kinds) = recorded.constraint.kinds() else {
            continue;
        };
        let class = &mut classes[class_of[recorded.constraint.owner().as_usize()]];
        class.constrained = true;
        if class.conflicting {
            continue;
        }
        let narrowed = class.kinds & kinds;
        if narrowed.is_empty() {
            class.conflicting = true;
            class.culprit = Some(i);
        } else {
            class.kinds = narrowed;
        }
    }

    let recorded: Vec<_> = collector.iter().collect();
    let mut diagnostics = Vec::new();
    for (id, class) in classes.iter_mut().enumerate() {
        let first = class.members[0];
        let register = values[first.as_usize()].reg;
        let (kind, report) = if class.conflicting {
            let default = default_kind(class.width);
            let report = match class.culprit {
                Some(culprit) => {
                    let r = recorded[culprit];
                    // kinds() is always set for a culprit
                    let required = r.constraint.kinds().unwrap_or_default();
                    let addrs: BTreeSet<Addr> = recorded[..=culprit]
                        .iter()
                        .filter(|c| {
                            c.constraint.kinds().is_some()
                                && class_of[c.constraint.owner().as_usize()] == id
                        })
                        .filter_map(|c| c.addr)
                        .collect();
                    let declared = recorded[..culprit].iter().any(|c| {
                        c.origin == Origin::Anchor
                            && class_of[c.constraint.owner().as_usize()] == id
                    });
                    let message = format!(
                        "{required} required where only {}{} remained",
                        class.kinds,
                        if declared { " (declared)" } else { "" }
                    );
                    (
                        DiagnosticKind::Conflict,
                        values[r.constraint.owner().as_usize()].reg,
                        addrs.into_iter().collect(),
                        message,
                    )
                }
                None => (
                    DiagnosticKind::Conflict,
                    register,
                    definition_addrs(values, &class.members),
                    "narrow and wide values merged".to_string(),
                ),
            };
            (default, Some(report))
        } else if !class.constrained {
            let report = (
                DiagnosticKind::Unconstrained,
                register,
                definition_addrs(values, &class.members),
                "no constraint recorded".to_string(),
            );
            (default_kind(class.width), Some(report))
        } else if let Some(kind) = class.kinds.single() {
            (kind, None)
        } else {
            let kind = class
                .kinds
                .preferred()
                .unwrap_or_else(|| default_kind(class.width));
            let report = (
                DiagnosticKind::Ambiguous,
                register,
                definition_addrs(values, &class.members),
                format!("still one of {}", class.kinds),
            );
            (kind, Some(report))
        };
        class.kind = kind;
        if let Some((diag_kind, register, addrs, message)) = report {
            let diagnostic = Diagnostic {
                kind: diag_kind,
                register,
                addrs,
                resolved: kind,
                message,
            };
            log::debug!("{diagnostic}");
            class.diagnostic = Some(diagnostics.len());
            diagnostics.push(diagnostic);
        }
    }

    Solution {
        class_of,
        classes,
        diagnostics,
    }
}

fn definition_addrs(values: &[ProvisionalValue], members: &[ValueId]) -> Vec<Addr> {
    let addrs: BTreeSet<Addr> = members
        .iter()
        .filter_map(|v| match values[v.as_usize()].site {
            Some(Site::At(addr)) => Some(addr),
            _ => None,
        })
        .collect();
    addrs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_bytecode::registers::Reg;

    fn narrow(reg: u16, addr: usize) -> ProvisionalValue {
        ProvisionalValue {
            reg: Reg::from(reg),
            generation: 0,
            site: Some(Site::At(Addr(addr))),
            width: Width::Narrow,
        }
    }

    #[test]
    fn move_chains_propagate() {
        let values = vec![narrow(0, 0), narrow(1, 1), narrow(2, 2)];
        let mut collector = Collector::new();
        collector.record(Some(Addr(1)), Constraint::SameAs(ValueId(1), ValueId(0)));
        collector.record(Some(Addr(2)), Constraint::SameAs(ValueId(2), ValueId(1)));
        collector.anchor(Some(Addr(3)), Constraint::Exactly(ValueId(2), Kind::Float));
        let solution = solve(&values, &collector);
        assert_eq!(solution.classes_count(), 1);
        assert_eq!(solution.kind_of(ValueId(0)), Kind::Float);
        assert!(solution.diagnostics().is_empty());
    }

    #[test]
    fn conflicts_default_to_int() {
        let values = vec![narrow(0, 0), narrow(1, 2)];
        let mut collector = Collector::new();
        collector.anchor(Some(Addr(0)), Constraint::Exactly(ValueId(0), Kind::Float));
        collector.record(Some(Addr(2)), Constraint::Exactly(ValueId(0), Kind::Int));
        collector.record(Some(Addr(2)), Constraint::SameAs(ValueId(1), ValueId(0)));
        collector.record(Some(Addr(2)), Constraint::Exactly(ValueId(1), Kind::Int));
        let solution = solve(&values, &collector);
        assert_eq!(solution.kind_of(ValueId(1)), Kind::Int);
        assert_eq!(solution.diagnostics().len(), 1);
        let diag = &solution.diagnostics()[0];
        assert_eq!(diag.kind, DiagnosticKind::Conflict);
        assert_eq!(diag.register, Reg::from(0u16));
        assert_eq!(diag.addrs, vec![Addr(0), Addr(2)]);
        assert!(diag.message.contains("declared"));
        assert_eq!(solution.diagnostic_of(ValueId(1)), Some(0));
        assert!(solution.is_conflicting(ValueId(0)));
    }

    #[test]
    fn unconstrained_and_ambiguous() {
        let mut wide = narrow(2, 4);
        wide.width = Width::Wide;
        let values = vec![narrow(0, 0), narrow(1, 1), wide];
        let mut collector = Collector::new();
        collector.record(Some(Addr(1)), Constraint::OneOf(ValueId(1), KindSet::PRIMITIVE_NARROW));
        let solution = solve(&values, &collector);
        let kinds: Vec<DiagnosticKind> = solution.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::Unconstrained,
                DiagnosticKind::Ambiguous,
                DiagnosticKind::Unconstrained
            ]
        );
        assert_eq!(solution.kind_of(ValueId(0)), Kind::Int);
        assert_eq!(solution.kind_of(ValueId(1)), Kind::Int);
        assert_eq!(solution.kind_of(ValueId(2)), Kind::Long);
        assert_eq!(solution.conflicts().count(), 0);
    }

    #[test]
    fn order_of_merges_does_not_matter() {
        let values = vec![narrow(0, 0), narrow(1, 1), narrow(2, 2)];
        let constraints = [
            Constraint::SameAs(ValueId(0), ValueId(1)),
            Constraint::SameAs(ValueId(2), ValueId(1)),
            Constraint::OneOf(ValueId(0), KindSet::FLOAT | KindSet::OBJECT),
            Constraint::OneOf(ValueId(2), KindSet::PRIMITIVE_NARROW),
        ];
        let mut forward = Collector::new();
        let mut backward = Collector::new();
        for c in constraints {
            forward.record(None, c);
        }
        backward.record(None, constraints[1]);
        backward.record(None, constraints[0]);
        backward.record(None, constraints[2]);
        backward.record(None, constraints[3]);
        let (a, b) = (solve(&values, &forward), solve(&values, &backward));
        for v in 0..3 {
            assert_eq!(a.kind_of(ValueId(v)), Kind::Float);
            assert_eq!(b.kind_of(ValueId(v)), Kind::Float);
        }
        assert_eq!(a.diagnostics(), b.diagnostics());
    }
}
