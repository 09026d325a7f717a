//! Types definitions to address Dalvik registers.
//!
//! In Dalvik bytecode, registers (or register pairs) are addressed on 4, 8 or 16 bits
//! depending on the instruction format. To ease the bytecode manipulation, we define a
//! [register](Reg) wrapper over an 16 bits integer. This also allows to differentiate
//! registers from constant values in decoded instructions.

use serde::Serialize;
use std::fmt;

/// The register type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Reg(u16);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for Reg {
    fn from(r: u8) -> Self {
        Self(u16::from(r))
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(r)
    }
}

impl From<Reg> for u16 {
    fn from(r: Reg) -> Self {
        r.0
    }
}

impl Reg {
    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the following register.
    ///
    /// This function is used to address register pairs without manipulating slot
    /// numbers directly.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if the register number can be encoded on the given number of bits.
    #[inline]
    #[must_use]
    pub const fn fits(self, bits: u32) -> bool {
        bits >= 16 || (self.0 as u32) < (1 << bits)
    }
}

/// Register access width: narrow values use one slot, wide values (long and double)
/// use a pair of consecutive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Width {
    Narrow,
    Wide,
}

impl Width {
    #[inline]
    #[must_use]
    pub const fn slots(self) -> u16 {
        match self {
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Narrow => write!(f, "narrow"),
            Self::Wide => write!(f, "wide"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_fits() {
        assert!(Reg::from(15u16).fits(4));
        assert!(!Reg::from(16u16).fits(4));
        assert!(Reg::from(255u16).fits(8));
        assert!(Reg::from(65535u16).fits(16));
    }

    #[test]
    fn register_pair() {
        let r = Reg::from(3u8);
        assert_eq!(r.next().value(), 4);
        assert_eq!(format!("{r}"), "v3");
    }
}
