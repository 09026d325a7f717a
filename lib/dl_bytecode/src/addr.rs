//! Code address representation.
//!
//! Addresses are expressed in 16-bit code units from the start of the
//! method's instruction array, as branch offsets are.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl Addr {
    #[inline]
    #[must_use]
    pub const fn entry() -> Self {
        Self(0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl Addr {
    /// Applies a signed branch offset, returning `None` when the result
    /// would be negative.
    #[must_use]
    pub const fn checked_offset(self, offset: i32) -> Option<Self> {
        if offset.is_negative() {
            match self.0.checked_sub(offset.unsigned_abs() as usize) {
                Some(a) => Some(Self(a)),
                None => None,
            }
        } else {
            Some(Self(self.0 + offset.unsigned_abs() as usize))
        }
    }

    /// Moves forward by a number of code units.
    #[inline]
    #[must_use]
    pub const fn advance(self, units: usize) -> Self {
        Self(self.0 + units)
    }

    /// Signed distance in code units from `self` to `target`.
    #[must_use]
    pub fn distance_to(self, target: Self) -> i64 {
        target.0 as i64 - self.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(Addr(10).checked_offset(-4), Some(Addr(6)));
        assert_eq!(Addr(10).checked_offset(5), Some(Addr(15)));
        assert_eq!(Addr(2).checked_offset(-3), None);
        assert_eq!(Addr(3).distance_to(Addr(1)), -2);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Addr(26).to_string(), "001a");
    }
}
