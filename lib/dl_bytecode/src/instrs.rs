//! Decoded Dalvik instructions.
//!
//! A [`DecodedInstr`] is the structured form of one instruction as handed
//! over by a decoder: raw opcode value, code address, operand registers in
//! encoding order (destination first), and the optional literal, branch
//! offset, pool reference and attached payload. It is immutable once built.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::formats::Format;
use crate::hexlify::hexlify_units;
use crate::opcodes::{Family, Opcode, ReferenceKind};
use crate::pool::{ConstantPool, PoolRef, PrettyPrint};
use crate::registers::Reg;
use crate::Addr;
use serde::Serialize;
use std::fmt;

/// Data tables referenced by `packed-switch`, `sparse-switch` and `fill-array-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    PackedSwitch { first_key: i32, targets: Vec<i32> },
    SparseSwitch { keys: Vec<i32>, targets: Vec<i32> },
    ArrayData { width: u16, elements: Vec<u64> },
}

impl Payload {
    /// Size of the payload pseudo-instruction in code units.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::PackedSwitch { targets, .. } => 4 + 2 * targets.len(),
            Self::SparseSwitch { keys, .. } => 2 + 4 * keys.len(),
            Self::ArrayData { width, elements } => {
                4 + (elements.len() * usize::from(*width) + 1) / 2
            }
        }
    }

    /// Switch cases as `(key, branch offset)` pairs.
    #[must_use]
    pub fn cases(&self) -> Vec<(i32, i32)> {
        match self {
            Self::PackedSwitch { first_key, targets } => targets
                .iter()
                .enumerate()
                .map(|(i, t)| (first_key.wrapping_add(i as i32), *t))
                .collect(),
            Self::SparseSwitch { keys, targets } => {
                keys.iter().copied().zip(targets.iter().copied()).collect()
            }
            Self::ArrayData { .. } => Vec::new(),
        }
    }

    const fn is_switch(&self) -> bool {
        matches!(self, Self::PackedSwitch { .. } | Self::SparseSwitch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedInstr {
    pub addr: Addr,
    pub opcode: u8,
    pub format: Format,
    pub regs: Vec<Reg>,
    pub literal: Option<i64>,
    pub offset: Option<i32>,
    pub reference: Option<PoolRef>,
    pub payload: Option<Payload>,
    pub units: Vec<u16>,
}

impl DecodedInstr {
    /// Returns the table opcode, `None` for unused or unsupported values.
    #[inline]
    #[must_use]
    pub const fn opcode(&self) -> Option<Opcode> {
        Opcode::from_value(self.opcode)
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.format.size()
    }

    #[inline]
    #[must_use]
    pub const fn next_addr(&self) -> Addr {
        self.addr.advance(self.size())
    }

    /// Branch target, for instructions that carry an offset.
    #[must_use]
    pub fn target(&self) -> Option<Addr> {
        self.offset.and_then(|o| self.addr.checked_offset(o))
    }

    /// Raw code units rendered in hexadecimal.
    #[must_use]
    pub fn raw(&self) -> String {
        hexlify_units(&self.units)
    }

    /// Checks that the decoded operands match the shape required by the
    /// given opcode: declared format, register count, and presence of the
    /// literal, offset, reference and payload operands.
    pub fn check_shape(&self, opcode: Opcode) -> BytecodeResult<()> {
        let expected = opcode.format();
        if self.format != expected {
            return Err(BytecodeError::Shape(format!(
                "decoded as format {} instead of {expected}",
                self.format
            )));
        }
        let shape = expected.shape();
        if !shape.registers.accepts(self.regs.len()) {
            return Err(BytecodeError::Shape(format!(
                "{} register operand(s) instead of {}",
                self.regs.len(),
                shape.registers
            )));
        }
        let checks = [
            ("literal", shape.literal, self.literal.is_some()),
            ("branch offset", shape.offset, self.offset.is_some()),
            ("pool reference", shape.reference, self.reference.is_some()),
            ("payload", shape.payload, self.payload.is_some()),
        ];
        for (name, expected, found) in checks {
            if expected != found {
                let what = if expected { "missing" } else { "unexpected" };
                return Err(BytecodeError::Shape(format!("{what} {name}")));
            }
        }
        if let Some(payload) = &self.payload {
            let switch = opcode.family() == Family::Switch;
            if switch != payload.is_switch() {
                return Err(BytecodeError::Shape("payload kind mismatch".to_string()));
            }
        }
        if let (Some(kind), Some(reference)) = (opcode.reference(), &self.reference) {
            let matching = matches!(
                (kind, reference),
                (ReferenceKind::String, PoolRef::String(_))
                    | (ReferenceKind::Type, PoolRef::Type(_))
                    | (ReferenceKind::Field, PoolRef::Field(_))
                    | (ReferenceKind::Method, PoolRef::Method(_))
            );
            if !matching {
                return Err(BytecodeError::Shape(format!(
                    "expected a {kind} reference"
                )));
            }
        }
        Ok(())
    }
}

impl PrettyPrint for DecodedInstr {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self.opcode() {
            Some(op) => write!(f, "{op}")?,
            None => write!(f, "<unknown {:#04x}>", self.opcode)?,
        }
        let mut sep = " ";
        if self.format == Format::F3rc && !self.regs.is_empty() {
            let first = self.regs[0];
            let last = self.regs[self.regs.len() - 1];
            write!(f, " {{{first} .. {last}}}")?;
            sep = ", ";
        } else if self.format == Format::F35c {
            write!(f, " {{")?;
            for (i, r) in self.regs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{r}")?;
            }
            write!(f, "}}")?;
            sep = ", ";
        } else {
            for r in &self.regs {
                write!(f, "{sep}{r}")?;
                sep = ", ";
            }
        }
        if let Some(lit) = self.literal {
            write!(f, "{sep}#{lit:#x}")?;
            sep = ", ";
        }
        if let Some(target) = self.target() {
            write!(f, "{sep}@{target}")?;
            sep = ", ";
        }
        if let Some(reference) = &self.reference {
            write!(f, "{sep}")?;
            reference.pp(f, pool)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Index, Pool};

    fn instr(opcode: Opcode, regs: &[u16]) -> DecodedInstr {
        DecodedInstr {
            addr: Addr(4),
            opcode: opcode.value(),
            format: opcode.format(),
            regs: regs.iter().map(|r| Reg::from(*r)).collect(),
            literal: None,
            offset: None,
            reference: None,
            payload: None,
            units: vec![],
        }
    }

    #[test]
    fn shape_checks() {
        assert!(instr(Opcode::NegInt, &[0, 1]).check_shape(Opcode::NegInt).is_ok());
        assert!(instr(Opcode::NegInt, &[0]).check_shape(Opcode::NegInt).is_err());
        // decoded with a three register shape
        assert!(instr(Opcode::AddInt, &[0, 1, 2])
            .check_shape(Opcode::NegInt)
            .is_err());

        let mut goto = instr(Opcode::Goto, &[]);
        assert!(goto.check_shape(Opcode::Goto).is_err());
        goto.offset = Some(-2);
        assert!(goto.check_shape(Opcode::Goto).is_ok());
        assert_eq!(goto.target(), Some(Addr(2)));

        let mut sget = instr(Opcode::Sget, &[0]);
        sget.reference = Some(PoolRef::Method(Index::new(0)));
        assert!(sget.check_shape(Opcode::Sget).is_err());
    }

    #[test]
    fn switch_payload_cases() {
        let payload = Payload::PackedSwitch {
            first_key: 10,
            targets: vec![4, 8],
        };
        assert_eq!(payload.cases(), vec![(10, 4), (11, 8)]);
        assert_eq!(payload.size(), 8);
        let data = Payload::ArrayData {
            width: 1,
            elements: vec![1, 2, 3],
        };
        assert_eq!(data.size(), 6);
    }

    #[test]
    fn pretty_print() {
        let pool = Pool::new();
        let mut i = instr(Opcode::AddIntLit8, &[0, 1]);
        i.literal = Some(5);
        assert_eq!(
            crate::pool::PrettyPrinter(&i, &pool).to_string(),
            "add-int/lit8 v0, v1, #0x5"
        );
    }
}
