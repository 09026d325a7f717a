//! Dalvik instruction formats.
//!
//! A format names the layout of an instruction in code units: the first
//! digit is the size in code units, the second one the number of registers
//! (or register count limit), and the letter the kind of extra operand
//! (`x` none, `n`/`s`/`i`/`h`/`b`/`l` literal, `t` branch offset, `c`
//! constant pool reference, `rc` register range plus reference).

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    F10x,
    F12x,
    F11n,
    F11x,
    F10t,
    F20t,
    F22x,
    F21t,
    F21s,
    F21h,
    F21c,
    F23x,
    F22b,
    F22t,
    F22s,
    F22c,
    F32x,
    F30t,
    F31t,
    F31i,
    F31c,
    F35c,
    F3rc,
    F51l,
}

/// Register operand count expected by a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterCount {
    Exact(usize),
    UpTo(usize),
    Any,
}

impl RegisterCount {
    #[must_use]
    pub const fn accepts(self, n: usize) -> bool {
        match self {
            Self::Exact(m) => n == m,
            Self::UpTo(m) => n <= m,
            Self::Any => true,
        }
    }
}

impl fmt::Display for RegisterCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::UpTo(n) => write!(f, "at most {n}"),
            Self::Any => write!(f, "any number of"),
        }
    }
}

/// The operands a decoded instruction of a given format carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub registers: RegisterCount,
    pub literal: bool,
    pub offset: bool,
    pub reference: bool,
    pub payload: bool,
}

impl Shape {
    const fn regs(n: usize) -> Self {
        Self {
            registers: RegisterCount::Exact(n),
            literal: false,
            offset: false,
            reference: false,
            payload: false,
        }
    }

    const fn with_literal(mut self) -> Self {
        self.literal = true;
        self
    }

    const fn with_offset(mut self) -> Self {
        self.offset = true;
        self
    }

    const fn with_reference(mut self) -> Self {
        self.reference = true;
        self
    }

    const fn with_payload(mut self) -> Self {
        self.payload = true;
        self
    }
}

impl Format {
    /// Instruction size in 16-bit code units.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::F10x | Self::F12x | Self::F11n | Self::F11x | Self::F10t => 1,
            Self::F20t
            | Self::F22x
            | Self::F21t
            | Self::F21s
            | Self::F21h
            | Self::F21c
            | Self::F23x
            | Self::F22b
            | Self::F22t
            | Self::F22s
            | Self::F22c => 2,
            Self::F32x
            | Self::F30t
            | Self::F31t
            | Self::F31i
            | Self::F31c
            | Self::F35c
            | Self::F3rc => 3,
            Self::F51l => 5,
        }
    }

    #[must_use]
    pub const fn shape(self) -> Shape {
        match self {
            Self::F10x => Shape::regs(0),
            Self::F12x | Self::F22x | Self::F32x => Shape::regs(2),
            Self::F11n | Self::F21s | Self::F21h | Self::F31i | Self::F51l => {
                Shape::regs(1).with_literal()
            }
            Self::F11x => Shape::regs(1),
            Self::F10t | Self::F20t | Self::F30t => Shape::regs(0).with_offset(),
            Self::F21t => Shape::regs(1).with_offset(),
            Self::F21c | Self::F31c => Shape::regs(1).with_reference(),
            Self::F23x => Shape::regs(3),
            Self::F22b | Self::F22s => Shape::regs(2).with_literal(),
            Self::F22t => Shape::regs(2).with_offset(),
            Self::F22c => Shape::regs(2).with_reference(),
            Self::F31t => Shape::regs(1).with_offset().with_payload(),
            Self::F35c => Shape {
                registers: RegisterCount::UpTo(5),
                ..Shape::regs(0).with_reference()
            },
            Self::F3rc => Shape {
                registers: RegisterCount::Any,
                ..Shape::regs(0).with_reference()
            },
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = format!("{self:?}");
        write!(f, "{}", name.trim_start_matches('F'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sizes() {
        assert_eq!(Format::F12x.size(), 1);
        assert_eq!(Format::F22t.size(), 2);
        assert_eq!(Format::F3rc.size(), 3);
        assert_eq!(Format::F51l.size(), 5);
    }

    #[test]
    fn format_shapes() {
        let s = Format::F22c.shape();
        assert_eq!(s.registers, RegisterCount::Exact(2));
        assert!(s.reference && !s.literal && !s.offset);
        assert!(Format::F35c.shape().registers.accepts(0));
        assert!(!Format::F35c.shape().registers.accepts(6));
        assert!(Format::F31t.shape().payload);
        assert_eq!(Format::F3rc.to_string(), "3rc");
    }
}
