//! Value kinds: the primitive or reference categories IR values are typed as.

use bitflags::bitflags;
use dl_bytecode::opcodes::OperandKind;
use dl_bytecode::registers::Width;
use dl_bytecode::types::Type;
use serde::Serialize;
use std::fmt;

/// The kind of a final local.
///
/// There is no `unknown` kind: a class left unconstrained or in conflict
/// is folded into the default policy (int, long for wide classes) with a
/// diagnostic, so `unknown` never appears in `Diagnostic::resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Kind {
    Int,
    Long,
    Float,
    Double,
    Object,
}

impl Kind {
    /// All kinds, in resolution preference order.
    pub const ALL: [Self; 5] = [Self::Int, Self::Long, Self::Float, Self::Double, Self::Object];

    /// Kind used for classes that cannot be resolved otherwise.
    pub const DEFAULT: Self = Self::Int;

    #[must_use]
    pub const fn width(self) -> Width {
        match self {
            Self::Long | Self::Double => Width::Wide,
            _ => Width::Narrow,
        }
    }

    /// Prefix of the names of final locals of this kind.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Int => 'i',
            Self::Long => 'l',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::Object => 'r',
        }
    }

    /// Kind of the values of a declared type; sub-int types are ints.
    #[must_use]
    pub const fn from_type(t: &Type) -> Option<Self> {
        match t {
            Type::Void => None,
            Type::Boolean | Type::Byte | Type::Short | Type::Char | Type::Int => Some(Self::Int),
            Type::Long => Some(Self::Long),
            Type::Float => Some(Self::Float),
            Type::Double => Some(Self::Double),
            Type::Array(_, _) | Type::Class(_) => Some(Self::Object),
        }
    }

    /// Checks if a value of kind `self` can be reinterpreted as `other`
    /// without changing its bit pattern.
    #[must_use]
    pub const fn bit_compatible(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Int | Self::Float, Self::Int | Self::Float)
                | (Self::Long | Self::Double, Self::Long | Self::Double)
        )
    }

    #[must_use]
    pub const fn set(self) -> KindSet {
        match self {
            Self::Int => KindSet::INT,
            Self::Long => KindSet::LONG,
            Self::Float => KindSet::FLOAT,
            Self::Double => KindSet::DOUBLE,
            Self::Object => KindSet::OBJECT,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Object => write!(f, "object"),
        }
    }
}

bitflags! {
    /// A set of kinds, as carried by `one-of` constraints.
    #[derive(Default, Serialize)]
    pub struct KindSet: u8 {
        const INT = 0b0_0001;
        const LONG = 0b0_0010;
        const FLOAT = 0b0_0100;
        const DOUBLE = 0b0_1000;
        const OBJECT = 0b1_0000;

        /// Kinds a single register can hold.
        const NARROW = Self::INT.bits | Self::FLOAT.bits | Self::OBJECT.bits;
        /// Kinds a register pair can hold.
        const WIDE = Self::LONG.bits | Self::DOUBLE.bits;
        /// Untyped 32-bit primitive values (`move`, `aget`, `const`...).
        const PRIMITIVE_NARROW = Self::INT.bits | Self::FLOAT.bits;
    }
}

impl KindSet {
    /// Returns the kind of a singleton set.
    #[must_use]
    pub fn single(self) -> Option<Kind> {
        let mut kinds = self.iter();
        match (kinds.next(), kinds.next()) {
            (Some(k), None) => Some(k),
            _ => None,
        }
    }

    /// Iterates over the kinds of the set, in preference order.
    pub fn iter(self) -> impl Iterator<Item = Kind> {
        Kind::ALL.into_iter().filter(move |k| self.contains(k.set()))
    }

    /// Returns the preferred kind of the set.
    #[must_use]
    pub fn preferred(self) -> Option<Kind> {
        self.iter().next()
    }

    /// Register width needed to hold the set kinds, wide only when every
    /// kind of the (non-empty) set is wide.
    #[must_use]
    pub fn width(self) -> Width {
        if !self.is_empty() && Self::WIDE.contains(self) {
            Width::Wide
        } else {
            Width::Narrow
        }
    }

    /// Checks if the set only states a register width.
    #[must_use]
    pub fn is_width_only(self) -> bool {
        self == Self::NARROW || self == Self::WIDE
    }

    /// Kinds accepted by an opcode operand of the given declared kind.
    #[must_use]
    pub const fn from_operand(kind: OperandKind) -> Self {
        match kind {
            OperandKind::Int
            | OperandKind::Boolean
            | OperandKind::Byte
            | OperandKind::Char
            | OperandKind::Short => Self::INT,
            OperandKind::Long => Self::LONG,
            OperandKind::Float => Self::FLOAT,
            OperandKind::Double => Self::DOUBLE,
            OperandKind::Object => Self::OBJECT,
            OperandKind::Narrow => Self::PRIMITIVE_NARROW,
            OperandKind::Wide => Self::WIDE,
        }
    }
}

impl From<Kind> for KindSet {
    fn from(kind: Kind) -> Self {
        kind.set()
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, kind) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_sets() {
        assert_eq!(KindSet::INT.single(), Some(Kind::Int));
        assert_eq!(KindSet::NARROW.single(), None);
        assert_eq!(KindSet::NARROW.preferred(), Some(Kind::Int));
        assert_eq!((KindSet::FLOAT | KindSet::OBJECT).preferred(), Some(Kind::Float));
        assert_eq!(KindSet::WIDE.width(), Width::Wide);
        assert_eq!(KindSet::empty().width(), Width::Narrow);
        assert_eq!((KindSet::INT | KindSet::DOUBLE).to_string(), "{int, double}");
        assert!(KindSet::WIDE.is_width_only());
        assert!(!KindSet::PRIMITIVE_NARROW.is_width_only());
    }

    #[test]
    fn kinds_of_types() {
        assert_eq!(Kind::from_type(&Type::Char), Some(Kind::Int));
        assert_eq!(Kind::from_type(&Type::Void), None);
        assert_eq!(
            Kind::from_type(&Type::Array(1, Box::new(Type::Int))),
            Some(Kind::Object)
        );
        assert!(Kind::Int.bit_compatible(Kind::Float));
        assert!(!Kind::Int.bit_compatible(Kind::Object));
        assert!(!Kind::Long.bit_compatible(Kind::Float));
    }
}
