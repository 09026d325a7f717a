//! Code units encoder.
//!
//! Produces the raw code units of an instruction from its operands, checking
//! that every operand fits in the bit fields of the opcode's format.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::formats::Format;
use crate::opcodes::Opcode;
use crate::registers::Reg;

/// Operands of an instruction to encode.
#[derive(Debug, Clone, Default)]
pub struct Operands<'a> {
    pub regs: &'a [Reg],
    pub literal: Option<i64>,
    pub offset: Option<i32>,
    pub index: Option<usize>,
}

struct Encoder {
    opcode: Opcode,
}

impl Encoder {
    fn error<S: Into<String>>(&self, reason: S) -> BytecodeError {
        BytecodeError::Encoding {
            mnemonic: self.opcode.mnemonic(),
            reason: reason.into(),
        }
    }

    fn reg(&self, regs: &[Reg], i: usize, bits: u32) -> BytecodeResult<u16> {
        let reg = regs
            .get(i)
            .ok_or_else(|| self.error(format!("missing register operand #{i}")))?;
        if reg.fits(bits) {
            Ok(reg.value())
        } else {
            Err(self.error(format!("{reg} does not fit on {bits} bits")))
        }
    }

    fn signed(&self, value: Option<i64>, bits: u32, what: &str) -> BytecodeResult<u64> {
        let value = value.ok_or_else(|| self.error(format!("missing {what}")))?;
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if i128::from(value) < min || i128::from(value) > max {
            return Err(self.error(format!("{what} {value} does not fit on {bits} bits")));
        }
        Ok((value as u64) & (u64::MAX >> (64 - bits)))
    }

    fn index(&self, value: Option<usize>, bits: u32) -> BytecodeResult<u64> {
        let value = value.ok_or_else(|| self.error("missing pool reference"))?;
        if bits < 64 && (value as u64) >> bits != 0 {
            return Err(self.error(format!("pool index {value} does not fit on {bits} bits")));
        }
        Ok(value as u64)
    }
}

fn split32(value: u64) -> [u16; 2] {
    [(value & 0xffff) as u16, ((value >> 16) & 0xffff) as u16]
}

/// Encodes an instruction into its code units.
pub fn encode_units(opcode: Opcode, operands: &Operands) -> BytecodeResult<Vec<u16>> {
    let enc = Encoder { opcode };
    let op = u16::from(opcode.value());
    let regs = operands.regs;
    let offset = operands.offset.map(i64::from);
    let shape = opcode.format().shape();
    if !shape.registers.accepts(regs.len()) {
        return Err(enc.error(format!(
            "{} register operand(s) instead of {}",
            regs.len(),
            shape.registers
        )));
    }

    let units = match opcode.format() {
        Format::F10x => vec![op],
        Format::F12x => vec![op | enc.reg(regs, 0, 4)? << 8 | enc.reg(regs, 1, 4)? << 12],
        Format::F11n => {
            let lit = enc.signed(operands.literal, 4, "literal")? as u16;
            vec![op | enc.reg(regs, 0, 4)? << 8 | lit << 12]
        }
        Format::F11x => vec![op | enc.reg(regs, 0, 8)? << 8],
        Format::F10t => vec![op | (enc.signed(offset, 8, "offset")? as u16) << 8],
        Format::F20t => vec![op, enc.signed(offset, 16, "offset")? as u16],
        Format::F22x => vec![op | enc.reg(regs, 0, 8)? << 8, enc.reg(regs, 1, 16)?],
        Format::F21t => vec![
            op | enc.reg(regs, 0, 8)? << 8,
            enc.signed(offset, 16, "offset")? as u16,
        ],
        Format::F21s => vec![
            op | enc.reg(regs, 0, 8)? << 8,
            enc.signed(operands.literal, 16, "literal")? as u16,
        ],
        Format::F21h => {
            let shift = opcode.literal_shift();
            let lit = operands
                .literal
                .ok_or_else(|| enc.error("missing literal"))?;
            if lit & ((1i64 << shift) - 1) != 0 {
                return Err(enc.error(format!("literal {lit:#x} has non-zero low bits")));
            }
            vec![
                op | enc.reg(regs, 0, 8)? << 8,
                enc.signed(Some(lit >> shift), 16, "literal")? as u16,
            ]
        }
        Format::F21c => vec![
            op | enc.reg(regs, 0, 8)? << 8,
            enc.index(operands.index, 16)? as u16,
        ],
        Format::F23x => vec![
            op | enc.reg(regs, 0, 8)? << 8,
            enc.reg(regs, 1, 8)? | enc.reg(regs, 2, 8)? << 8,
        ],
        Format::F22b => vec![
            op | enc.reg(regs, 0, 8)? << 8,
            enc.reg(regs, 1, 8)? | (enc.signed(operands.literal, 8, "literal")? as u16) << 8,
        ],
        Format::F22t => vec![
            op | enc.reg(regs, 0, 4)? << 8 | enc.reg(regs, 1, 4)? << 12,
            enc.signed(offset, 16, "offset")? as u16,
        ],
        Format::F22s => vec![
            op | enc.reg(regs, 0, 4)? << 8 | enc.reg(regs, 1, 4)? << 12,
            enc.signed(operands.literal, 16, "literal")? as u16,
        ],
        Format::F22c => vec![
            op | enc.reg(regs, 0, 4)? << 8 | enc.reg(regs, 1, 4)? << 12,
            enc.index(operands.index, 16)? as u16,
        ],
        Format::F32x => vec![op, enc.reg(regs, 0, 16)?, enc.reg(regs, 1, 16)?],
        Format::F30t => {
            let [lo, hi] = split32(enc.signed(offset, 32, "offset")?);
            vec![op, lo, hi]
        }
        Format::F31t => {
            let [lo, hi] = split32(enc.signed(offset, 32, "offset")?);
            vec![op | enc.reg(regs, 0, 8)? << 8, lo, hi]
        }
        Format::F31i => {
            let [lo, hi] = split32(enc.signed(operands.literal, 32, "literal")?);
            vec![op | enc.reg(regs, 0, 8)? << 8, lo, hi]
        }
        Format::F31c => {
            let [lo, hi] = split32(enc.index(operands.index, 32)?);
            vec![op | enc.reg(regs, 0, 8)? << 8, lo, hi]
        }
        Format::F35c => {
            let mut nibbles = [0u16; 5];
            for (i, nibble) in nibbles.iter_mut().enumerate().take(regs.len()) {
                *nibble = enc.reg(regs, i, 4)?;
            }
            let count = regs.len() as u16;
            vec![
                op | nibbles[4] << 8 | count << 12,
                enc.index(operands.index, 16)? as u16,
                nibbles[0] | nibbles[1] << 4 | nibbles[2] << 8 | nibbles[3] << 12,
            ]
        }
        Format::F3rc => {
            if regs.len() > 255 {
                return Err(enc.error("too many registers in range"));
            }
            let first = regs.first().map_or(0, |r| r.value());
            for (i, r) in regs.iter().enumerate() {
                if usize::from(r.value()) != usize::from(first) + i {
                    return Err(enc.error("registers are not consecutive"));
                }
            }
            vec![
                op | (regs.len() as u16) << 8,
                enc.index(operands.index, 16)? as u16,
                first,
            ]
        }
        Format::F51l => {
            let lit = operands
                .literal
                .ok_or_else(|| enc.error("missing literal"))? as u64;
            vec![
                op | enc.reg(regs, 0, 8)? << 8,
                (lit & 0xffff) as u16,
                ((lit >> 16) & 0xffff) as u16,
                ((lit >> 32) & 0xffff) as u16,
                ((lit >> 48) & 0xffff) as u16,
            ]
        }
    };
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs(rs: &[u16]) -> Vec<Reg> {
        rs.iter().map(|r| Reg::from(*r)).collect()
    }

    #[test]
    fn encode_12x() {
        let r = regs(&[1, 2]);
        let units = encode_units(
            Opcode::NegInt,
            &Operands {
                regs: &r,
                ..Operands::default()
            },
        )
        .unwrap();
        assert_eq!(units, vec![0x217b]);
    }

    #[test]
    fn encode_literals() {
        let r = regs(&[0]);
        let units = encode_units(
            Opcode::Const4,
            &Operands {
                regs: &r,
                literal: Some(-1),
                ..Operands::default()
            },
        )
        .unwrap();
        assert_eq!(units, vec![0xf012]);

        let units = encode_units(
            Opcode::ConstHigh16,
            &Operands {
                regs: &r,
                literal: Some(0x3f80_0000),
                ..Operands::default()
            },
        )
        .unwrap();
        assert_eq!(units, vec![0x0015, 0x3f80]);

        assert!(encode_units(
            Opcode::Const4,
            &Operands {
                regs: &r,
                literal: Some(8),
                ..Operands::default()
            },
        )
        .is_err());
    }

    #[test]
    fn encode_invoke() {
        let r = regs(&[1, 2, 3]);
        let units = encode_units(
            Opcode::InvokeStatic,
            &Operands {
                regs: &r,
                index: Some(7),
                ..Operands::default()
            },
        )
        .unwrap();
        assert_eq!(units, vec![0x3071, 0x0007, 0x0321]);

        let r = regs(&[4, 6]);
        assert!(encode_units(
            Opcode::InvokeStaticRange,
            &Operands {
                regs: &r,
                index: Some(7),
                ..Operands::default()
            },
        )
        .is_err());
    }

    #[test]
    fn register_overflow() {
        let r = regs(&[16, 0]);
        assert!(encode_units(
            Opcode::NegInt,
            &Operands {
                regs: &r,
                ..Operands::default()
            },
        )
        .is_err());
    }
}
