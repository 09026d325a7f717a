//! Binary decoder: raw Dalvik code units into [`DecodedInstr`] values.
//!
//! Payload pseudo-instructions (switch tables and array data) are not part
//! of the returned instruction stream; they are attached to the `31t`
//! instructions that reference them. Decoding stops at the first opcode
//! value absent from the table, which is kept in the stream so that the
//! lifter can report it.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::formats::Format;
use crate::instrs::{DecodedInstr, Payload};
use crate::opcodes::{Opcode, ReferenceKind};
use crate::pool::{Index, PoolRef};
use crate::registers::Reg;
use crate::Addr;
use nom::bits::bits;
use nom::bits::complete::take as take_bits;
use nom::multi::count;
use nom::number::complete::{le_i16, le_i32, le_i64, le_i8, le_u16, le_u32, le_u8};
use nom::sequence::pair;
use nom::{Finish, IResult, Offset};
use std::collections::BTreeMap;

/// Operands decoded from the bytes following the opcode byte.
#[derive(Debug, Default)]
struct Fields {
    regs: Vec<Reg>,
    literal: Option<i64>,
    offset: Option<i32>,
    index: Option<usize>,
}

/// Decodes a method's instruction array, given as little-endian bytes.
pub fn decode_instructions(input: &[u8]) -> BytecodeResult<Vec<DecodedInstr>> {
    log::trace!("decoding {} code units...", input.len() / 2);

    let mut instrs = Vec::new();
    let mut payloads = BTreeMap::new();
    let mut rest = input;

    while rest.len() >= 2 {
        let addr = Addr(input.offset(rest) / 2);
        let (op, high) = (rest[0], rest[1]);

        if op == 0x00 && (1..=3).contains(&high) {
            let (r, payload) = payload_parser(&rest[2..], high).finish()?;
            payloads.insert(addr, payload);
            rest = r;
            continue;
        }

        let Some(opcode) = Opcode::from_value(op) else {
            log::debug!("unknown opcode {op:#04x} at {addr}, decoding stopped");
            instrs.push(DecodedInstr {
                addr,
                opcode: op,
                format: Format::F10x,
                regs: Vec::new(),
                literal: None,
                offset: None,
                reference: None,
                payload: None,
                units: vec![u16::from_le_bytes([op, high])],
            });
            break;
        };

        let size = opcode.format().size() * 2;
        if rest.len() < size {
            return Err(BytecodeError::Decoding {
                remaining: rest.len(),
                kind: nom::error::ErrorKind::Eof,
            });
        }
        let (_, fields) = fields_parser(opcode, &rest[1..size]).finish()?;
        let units = rest[..size]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let reference = fields
            .index
            .zip(opcode.reference())
            .map(|(idx, kind)| match kind {
                ReferenceKind::String => PoolRef::String(Index::new(idx)),
                ReferenceKind::Type => PoolRef::Type(Index::new(idx)),
                ReferenceKind::Field => PoolRef::Field(Index::new(idx)),
                ReferenceKind::Method => PoolRef::Method(Index::new(idx)),
            });
        instrs.push(DecodedInstr {
            addr,
            opcode: op,
            format: opcode.format(),
            regs: fields.regs,
            literal: fields.literal,
            offset: fields.offset,
            reference,
            payload: None,
            units,
        });
        rest = &rest[size..];
    }

    // attach payloads to the instructions referencing them
    for instr in &mut instrs {
        if instr.format == Format::F31t {
            instr.payload = instr.target().and_then(|t| payloads.get(&t)).cloned();
        }
    }

    Ok(instrs)
}

fn fields_parser(opcode: Opcode, input: &[u8]) -> IResult<&[u8], Fields, BytecodeError> {
    let regs = |rs: &[u16]| rs.iter().map(|r| Reg::from(*r)).collect::<Vec<_>>();
    match opcode.format() {
        Format::F10x => {
            let (input, _) = le_u8(input)?;
            Ok((input, Fields::default()))
        }
        Format::F12x => {
            let (input, (a, b)) = parse_nibbles(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into(), b.into()]),
                    ..Fields::default()
                },
            ))
        }
        Format::F11n => {
            let (input, (a, b)) = parse_nibbles(input)?;
            // sign extension of the 4-bit literal
            let lit = i64::from(((b << 4) as i8) >> 4);
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    literal: Some(lit),
                    ..Fields::default()
                },
            ))
        }
        Format::F11x => {
            let (input, a) = le_u8(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    ..Fields::default()
                },
            ))
        }
        Format::F10t => {
            let (input, off) = le_i8(input)?;
            Ok((
                input,
                Fields {
                    offset: Some(off.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F20t => {
            let (input, (_, off)) = pair(le_u8, le_i16)(input)?;
            Ok((
                input,
                Fields {
                    offset: Some(off.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F22x => {
            let (input, (a, b)) = pair(le_u8, le_u16)(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into(), b]),
                    ..Fields::default()
                },
            ))
        }
        Format::F21t => {
            let (input, (a, off)) = pair(le_u8, le_i16)(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    offset: Some(off.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F21s | Format::F21h => {
            let (input, (a, lit)) = pair(le_u8, le_i16)(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    literal: Some(i64::from(lit) << opcode.literal_shift()),
                    ..Fields::default()
                },
            ))
        }
        Format::F21c => {
            let (input, (a, idx)) = pair(le_u8, le_u16)(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    index: Some(idx.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F23x => {
            let (input, (a, (b, c))) = pair(le_u8, pair(le_u8, le_u8))(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into(), b.into(), c.into()]),
                    ..Fields::default()
                },
            ))
        }
        Format::F22b => {
            let (input, (a, (b, lit))) = pair(le_u8, pair(le_u8, le_i8))(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into(), b.into()]),
                    literal: Some(lit.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F22t | Format::F22s | Format::F22c => {
            let (input, ((a, b), c)) = pair(parse_nibbles, le_u16)(input)?;
            let mut fields = Fields {
                regs: regs(&[a.into(), b.into()]),
                ..Fields::default()
            };
            match opcode.format() {
                Format::F22t => fields.offset = Some((c as i16).into()),
                Format::F22s => fields.literal = Some((c as i16).into()),
                _ => fields.index = Some(c.into()),
            }
            Ok((input, fields))
        }
        Format::F32x => {
            let (input, (_, (a, b))) = pair(le_u8, pair(le_u16, le_u16))(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a, b]),
                    ..Fields::default()
                },
            ))
        }
        Format::F30t => {
            let (input, (_, off)) = pair(le_u8, le_i32)(input)?;
            Ok((
                input,
                Fields {
                    offset: Some(off),
                    ..Fields::default()
                },
            ))
        }
        Format::F31t | Format::F31i | Format::F31c => {
            let (input, (a, b)) = pair(le_u8, le_u32)(input)?;
            let mut fields = Fields {
                regs: regs(&[a.into()]),
                ..Fields::default()
            };
            match opcode.format() {
                Format::F31t => fields.offset = Some(b as i32),
                Format::F31i => fields.literal = Some((b as i32).into()),
                _ => fields.index = Some(b as usize),
            }
            Ok((input, fields))
        }
        Format::F35c => {
            let (input, (g, count_)) = parse_nibbles(input)?;
            let (input, idx) = le_u16(input)?;
            let (input, (c, d)) = parse_nibbles(input)?;
            let (input, (e, f)) = parse_nibbles(input)?;
            let all = [c, d, e, f, g];
            let n = usize::from(count_).min(5);
            Ok((
                input,
                Fields {
                    regs: all[..n].iter().map(|r| Reg::from(*r)).collect(),
                    index: Some(idx.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F3rc => {
            let (input, (n, (idx, first))) = pair(le_u8, pair(le_u16, le_u16))(input)?;
            let regs = (0..u16::from(n))
                .map(|i| Reg::from(first.saturating_add(i)))
                .collect();
            Ok((
                input,
                Fields {
                    regs,
                    index: Some(idx.into()),
                    ..Fields::default()
                },
            ))
        }
        Format::F51l => {
            let (input, (a, lit)) = pair(le_u8, le_i64)(input)?;
            Ok((
                input,
                Fields {
                    regs: regs(&[a.into()]),
                    literal: Some(lit),
                    ..Fields::default()
                },
            ))
        }
    }
}

// Splits a byte into its (low, high) nibbles, i.e. the (A, B) fields of
// the `B|A` byte notation.
fn parse_nibbles<'a>(input: &'a [u8]) -> IResult<&'a [u8], (u8, u8), BytecodeError> {
    bits(
        |input: (&'a [u8], usize)| -> IResult<(&'a [u8], usize), (u8, u8), BytecodeError> {
            let (input, b) = take_bits(4_usize)(input)?;
            let (input, a) = take_bits(4_usize)(input)?;
            Ok((input, (a, b)))
        },
    )(input)
}

fn payload_parser(input: &[u8], ident: u8) -> IResult<&[u8], Payload, BytecodeError> {
    match ident {
        0x01 => {
            let (input, size) = le_u16(input)?;
            let (input, first_key) = le_i32(input)?;
            let (input, targets) = count(le_i32, size as usize)(input)?;
            Ok((input, Payload::PackedSwitch { first_key, targets }))
        }
        0x02 => {
            let (input, size) = le_u16(input)?;
            let (input, keys) = count(le_i32, size as usize)(input)?;
            let (input, targets) = count(le_i32, size as usize)(input)?;
            Ok((input, Payload::SparseSwitch { keys, targets }))
        }
        _ => {
            let (i, width) = le_u16(input)?;
            let (i, size) = le_u32(i)?;
            let (i, data) = count(count(le_u8, width as usize), size as usize)(i)?;
            let elements = data
                .iter()
                .map(|bytes| {
                    bytes
                        .iter()
                        .rev()
                        .fold(0u64, |acc, b| acc.wrapping_shl(8) | u64::from(*b))
                })
                .collect();
            // array data is padded to a whole number of code units
            let parsed = input.offset(i);
            let padding = parsed % 2;
            let i = if i.len() >= padding { &i[padding..] } else { i };
            Ok((i, Payload::ArrayData { width, elements }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(units: &[u16]) -> Vec<u8> {
        units.iter().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn nibbles_parser() {
        let (_, (a, b)) = parse_nibbles(&[0x21]).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn decode_simple_stream() {
        // const/4 v0, -1 ; neg-int v1, v0 ; return v1
        let code = bytes(&[0xf012, 0x017b, 0x010f]);
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[0].literal, Some(-1));
        assert_eq!(instrs[1].opcode(), Some(Opcode::NegInt));
        assert_eq!(instrs[1].regs, vec![Reg::from(1u16), Reg::from(0u16)]);
        assert_eq!(instrs[2].addr, Addr(2));
        assert_eq!(instrs[1].units, vec![0x017b]);
    }

    #[test]
    fn decode_invoke_and_high16() {
        // invoke-static {v1, v2, v3}, method@7 ; const/high16 v0, 0x3f800000
        let code = bytes(&[0x3071, 0x0007, 0x0321, 0x0015, 0x3f80]);
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(
            instrs[0].regs,
            vec![Reg::from(1u16), Reg::from(2u16), Reg::from(3u16)]
        );
        assert_eq!(instrs[0].reference, Some(PoolRef::Method(Index::new(7))));
        assert_eq!(instrs[1].literal, Some(0x3f80_0000));
    }

    #[test]
    fn decode_attaches_switch_payload() {
        // packed-switch v0, +4 ; return-void ; payload(first_key=1, targets=[-3])
        let code = bytes(&[0x002b, 0x0004, 0x0000, 0x000e, 0x0100, 0x0001, 0x0001, 0x0000, 0xfffd, 0xffff]);
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(
            instrs[0].payload,
            Some(Payload::PackedSwitch {
                first_key: 1,
                targets: vec![-3]
            })
        );
    }

    #[test]
    fn decode_stops_on_unknown_opcode() {
        let code = bytes(&[0x000e, 0x00fa, 0x000e]);
        let instrs = decode_instructions(&code).unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[1].opcode(), None);
        assert_eq!(instrs[1].opcode, 0xfa);
    }

    #[test]
    fn decode_truncated() {
        let code = bytes(&[0x0014]);
        assert!(decode_instructions(&code).is_err());
    }
}
