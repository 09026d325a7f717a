//! Typing constraints and their collector.

use crate::ir::ValueId;
use crate::kinds::{Kind, KindSet};
use dl_bytecode::Addr;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Constraint {
    Exactly(ValueId, Kind),
    SameAs(ValueId, ValueId),
    OneOf(ValueId, KindSet),
}

impl Constraint {
    /// Constraint restricting a value to a set of kinds, `None` when the
    /// set only states the value width.
    #[must_use]
    pub fn restricting(value: ValueId, kinds: KindSet) -> Option<Self> {
        if kinds.is_width_only() {
            None
        } else if let Some(kind) = kinds.single() {
            Some(Self::Exactly(value, kind))
        } else {
            Some(Self::OneOf(value, kinds))
        }
    }

    /// The value the constraint is owned by.
    #[must_use]
    pub const fn owner(&self) -> ValueId {
        match self {
            Self::Exactly(v, _) | Self::SameAs(v, _) | Self::OneOf(v, _) => *v,
        }
    }

    /// Kinds allowed by a restricting constraint.
    #[must_use]
    pub const fn kinds(&self) -> Option<KindSet> {
        match self {
            Self::Exactly(_, kind) => Some(kind.set()),
            Self::OneOf(_, kinds) => Some(*kinds),
            Self::SameAs(_, _) => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exactly(v, kind) => write!(f, "{v} is {kind}"),
            Self::SameAs(v, w) => write!(f, "{v} same kind as {w}"),
            Self::OneOf(v, kinds) => write!(f, "{v} one of {kinds}"),
        }
    }
}

/// What a constraint is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    /// Semantics of the opcode.
    Opcode,
    /// Declared type of a method, field or type reference.
    Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recorded {
    /// Instruction the constraint was derived from, `None` for the method
    /// signature.
    pub addr: Option<Addr>,
    pub constraint: Constraint,
    pub origin: Origin,
}

/// Accumulates constraints, in recording order.
#[derive(Debug, Default)]
pub struct Collector {
    recorded: Vec<Recorded>,
}

impl Collector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, addr: Option<Addr>, constraint: Constraint) {
        log::trace!("constraint: {constraint}");
        self.recorded.push(Recorded {
            addr,
            constraint,
            origin: Origin::Opcode,
        });
    }

    /// Records a constraint taken from declared types.
    pub fn anchor(&mut self, addr: Option<Addr>, constraint: Constraint) {
        log::trace!("anchor: {constraint}");
        self.recorded.push(Recorded {
            addr,
            constraint,
            origin: Origin::Anchor,
        });
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Recorded> {
        self.recorded.iter()
    }

    /// Constraints owned by a value, in recording order.
    pub fn constraints_of(&self, value: ValueId) -> impl Iterator<Item = &Recorded> {
        self.recorded
            .iter()
            .filter(move |r| r.constraint.owner() == value)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricting_constraints() {
        let v = ValueId(0);
        assert_eq!(Constraint::restricting(v, KindSet::NARROW), None);
        assert_eq!(Constraint::restricting(v, KindSet::WIDE), None);
        assert_eq!(
            Constraint::restricting(v, KindSet::FLOAT),
            Some(Constraint::Exactly(v, Kind::Float))
        );
        assert_eq!(
            Constraint::restricting(v, KindSet::PRIMITIVE_NARROW),
            Some(Constraint::OneOf(v, KindSet::PRIMITIVE_NARROW))
        );
    }

    #[test]
    fn insertion_order() {
        let mut collector = Collector::new();
        let (a, b) = (ValueId(0), ValueId(1));
        collector.record(Some(Addr(2)), Constraint::Exactly(a, Kind::Int));
        collector.anchor(None, Constraint::Exactly(b, Kind::Float));
        collector.record(Some(Addr(1)), Constraint::SameAs(a, b));
        collector.record(Some(Addr(3)), Constraint::OneOf(a, KindSet::WIDE));
        let owned: Vec<Option<Addr>> = collector.constraints_of(a).map(|r| r.addr).collect();
        assert_eq!(owned, vec![Some(Addr(2)), Some(Addr(1)), Some(Addr(3))]);
        assert_eq!(collector.len(), 4);
        assert_eq!(collector.iter().nth(1).map(|r| r.origin), Some(Origin::Anchor));
    }
}
