//! Assembly front end.
//!
//! Parses a smali-like text representation of methods into a constant
//! [`Pool`] and a list of [`MethodCode`] values. Instruction addresses are
//! computed from the formats sizes, and the raw code units of every
//! instruction are produced by the [encoder](crate::writers::encode_units),
//! so that an instruction whose operands do not fit its format is rejected
//! as a syntax error. Payload blocks (`.packed-switch`, `.sparse-switch`,
//! `.array-data`) occupy code addresses where they are written, without
//! alignment.
//!
//! Debug and metadata directives (`.line`, `.local`, `.param`, `.source`,
//! `.field`, annotations...) are accepted and ignored.

use crate::code::{AccessFlags, Handler, MethodCode, TryItem};
use crate::errors::{BytecodeError, BytecodeResult};
use crate::formats::Format;
use crate::instrs::{DecodedInstr, Payload};
use crate::opcodes::{Family, Opcode, OperandKind, ReferenceKind};
use crate::pool::{FieldRef, MethodRef, Pool, PoolRef};
use crate::registers::Reg;
use crate::types::{Proto, Type};
use crate::writers::{encode_units, Operands};
use crate::Addr;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, one_of, space0, space1};
use nom::combinator::{all_consuming, map, map_opt, not, opt, verify};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::IResult;
use std::collections::BTreeMap;

type PResult<'a, T> = IResult<&'a str, T, BytecodeError>;

/// The result of parsing an assembly file.
#[derive(Debug, Default)]
pub struct Assembly {
    pub pool: Pool,
    pub methods: Vec<MethodCode>,
}

/// Parses an assembly text.
pub fn parse_assembly(input: &str) -> BytecodeResult<Assembly> {
    let mut parser = AsmParser::default();
    let mut last = 0;
    for (i, raw) in input.lines().enumerate() {
        last = i + 1;
        parser.line(last, strip_comment(raw).trim())?;
    }
    parser.finish(last)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lit {
    Int(i64),
    Float(f32),
    Double(f64),
}

#[derive(Debug, Clone, Copy)]
struct RegTok {
    param: bool,
    n: u16,
}

#[derive(Debug, Clone)]
enum Tok {
    Reg(RegTok),
    List(Vec<RegTok>),
    Range(RegTok, RegTok),
    Label(String),
    Lit(Lit),
    Str(String),
    Desc(String),
}

#[derive(Debug)]
struct PendingInstr {
    line: usize,
    addr: Addr,
    opcode: Opcode,
    toks: Vec<Tok>,
}

#[derive(Debug)]
enum PendingPayload {
    Packed { first_key: i32, labels: Vec<String> },
    Sparse { entries: Vec<(i32, String)> },
    Array { width: u16, elements: Vec<u64> },
}

impl PendingPayload {
    fn size(&self) -> usize {
        match self {
            Self::Packed { labels, .. } => 4 + 2 * labels.len(),
            Self::Sparse { entries } => 2 + 4 * entries.len(),
            Self::Array { width, elements } => 4 + (elements.len() * usize::from(*width) + 1) / 2,
        }
    }

    const fn end_directive(&self) -> &'static str {
        match self {
            Self::Packed { .. } => ".end packed-switch",
            Self::Sparse { .. } => ".end sparse-switch",
            Self::Array { .. } => ".end array-data",
        }
    }
}

#[derive(Debug)]
struct PendingCatch {
    line: usize,
    exception: Option<Type>,
    start: String,
    end: String,
    handler: String,
}

#[derive(Debug)]
struct PendingMethod {
    line: usize,
    method: MethodRef,
    flags: AccessFlags,
    registers: Option<u16>,
    locals: Option<u16>,
    addr: Addr,
    labels: BTreeMap<String, Addr>,
    instrs: Vec<PendingInstr>,
    payloads: BTreeMap<Addr, PendingPayload>,
    catches: Vec<PendingCatch>,
    block: Option<(Addr, PendingPayload)>,
}

#[derive(Debug, Default)]
struct AsmParser {
    assembly: Assembly,
    class: Option<Type>,
    method: Option<PendingMethod>,
    skip: Option<&'static str>,
}

impl AsmParser {
    fn line(&mut self, lineno: usize, line: &str) -> BytecodeResult<()> {
        if line.is_empty() {
            return Ok(());
        }
        if let Some(end) = self.skip {
            if line == end {
                self.skip = None;
            }
            return Ok(());
        }
        if let Some(method) = &mut self.method {
            if method.block.is_some() {
                return method.payload_line(lineno, line);
            }
        }

        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));
        match word {
            ".class" => {
                let name = rest.split_whitespace().last().unwrap_or_default();
                self.class = Some(parse_type(lineno, name)?);
            }
            ".super" | ".source" | ".implements" | ".field" | ".line" | ".prologue"
            | ".epilogue" | ".local" | ".restart" | ".param" => (),
            ".annotation" | ".subannotation" => self.skip = Some(".end annotation"),
            ".end" => match rest {
                "method" => self.end_method(lineno)?,
                "field" | "param" | "local" => (),
                _ => return Err(BytecodeError::syntax(lineno, format!("unexpected {line}"))),
            },
            ".method" => self.start_method(lineno, rest)?,
            _ => {
                let method = self.method.as_mut().ok_or_else(|| {
                    BytecodeError::syntax(lineno, format!("{word} outside of a method"))
                })?;
                method.code_line(lineno, word, rest, line)?;
            }
        }
        Ok(())
    }

    fn start_method(&mut self, lineno: usize, rest: &str) -> BytecodeResult<()> {
        if self.method.is_some() {
            return Err(BytecodeError::syntax(lineno, "nested .method"));
        }
        let class = self
            .class
            .clone()
            .ok_or_else(|| BytecodeError::syntax(lineno, ".method before .class"))?;
        let mut words: Vec<&str> = rest.split_whitespace().collect();
        let signature = words
            .pop()
            .ok_or_else(|| BytecodeError::syntax(lineno, "missing method signature"))?;
        let mut flags = AccessFlags::empty();
        for word in words {
            flags |= AccessFlags::from_keyword(word).ok_or_else(|| {
                BytecodeError::syntax(lineno, format!("unknown access flag {word:?}"))
            })?;
        }
        let paren = signature
            .find('(')
            .ok_or_else(|| BytecodeError::syntax(lineno, "missing method prototype"))?;
        let proto = Proto::try_from(&signature[paren..])
            .map_err(|e| BytecodeError::syntax(lineno, e.to_string()))?;
        self.method = Some(PendingMethod {
            line: lineno,
            method: MethodRef {
                class,
                name: signature[..paren].to_string(),
                proto,
            },
            flags,
            registers: None,
            locals: None,
            addr: Addr::entry(),
            labels: BTreeMap::new(),
            instrs: Vec::new(),
            payloads: BTreeMap::new(),
            catches: Vec::new(),
            block: None,
        });
        Ok(())
    }

    fn end_method(&mut self, lineno: usize) -> BytecodeResult<()> {
        let pending = self
            .method
            .take()
            .ok_or_else(|| BytecodeError::syntax(lineno, ".end method outside of a method"))?;
        if pending.instrs.is_empty() {
            log::debug!("skipping method {} without code", pending.method);
            return Ok(());
        }
        let code = pending.assemble(&mut self.assembly.pool)?;
        self.assembly.methods.push(code);
        Ok(())
    }

    fn finish(self, lineno: usize) -> BytecodeResult<Assembly> {
        if let Some(method) = self.method {
            return Err(BytecodeError::syntax(
                method.line,
                format!("method {} is never closed", method.method.name),
            ));
        }
        if let Some(end) = self.skip {
            return Err(BytecodeError::syntax(lineno, format!("missing {end}")));
        }
        Ok(self.assembly)
    }
}

impl PendingMethod {
    fn code_line(&mut self, lineno: usize, word: &str, rest: &str, line: &str) -> BytecodeResult<()> {
        match word {
            ".registers" | ".locals" => {
                let n = rest.parse::<u16>().map_err(|_| {
                    BytecodeError::syntax(lineno, format!("invalid register count {rest:?}"))
                })?;
                if word == ".registers" {
                    self.registers = Some(n);
                } else {
                    self.locals = Some(n);
                }
            }
            ".catch" | ".catchall" => {
                let (_, catch) = all_consuming(catch_directive)(line)
                    .map_err(|_| BytecodeError::syntax(lineno, format!("invalid {word} directive")))?;
                let (exception, (start, end), handler) = catch;
                let exception = exception.map(|t| parse_type(lineno, &t)).transpose()?;
                self.catches.push(PendingCatch {
                    line: lineno,
                    exception,
                    start,
                    end,
                    handler,
                });
            }
            ".packed-switch" => {
                let key = parse_key(lineno, rest)?;
                self.block = Some((
                    self.addr,
                    PendingPayload::Packed {
                        first_key: key,
                        labels: Vec::new(),
                    },
                ));
            }
            ".sparse-switch" => {
                self.block = Some((self.addr, PendingPayload::Sparse { entries: Vec::new() }));
            }
            ".array-data" => {
                let width = rest
                    .parse::<u16>()
                    .ok()
                    .filter(|w| matches!(w, 1 | 2 | 4 | 8))
                    .ok_or_else(|| {
                        BytecodeError::syntax(lineno, format!("invalid element width {rest:?}"))
                    })?;
                self.block = Some((
                    self.addr,
                    PendingPayload::Array {
                        width,
                        elements: Vec::new(),
                    },
                ));
            }
            _ if word.starts_with(':') => {
                let name = word[1..].to_string();
                if self.labels.insert(name, self.addr).is_some() {
                    return Err(BytecodeError::syntax(lineno, format!("duplicate label {word}")));
                }
            }
            _ if word.starts_with('.') => {
                return Err(BytecodeError::syntax(lineno, format!("unknown directive {word}")));
            }
            _ => {
                let (_, (mnemonic, toks)) = all_consuming(instruction)(line)
                    .map_err(|_| BytecodeError::syntax(lineno, format!("cannot parse {line:?}")))?;
                let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| {
                    BytecodeError::syntax(lineno, format!("unknown instruction {mnemonic:?}"))
                })?;
                self.instrs.push(PendingInstr {
                    line: lineno,
                    addr: self.addr,
                    opcode,
                    toks,
                });
                self.addr = self.addr.advance(opcode.format().size());
            }
        }
        Ok(())
    }

    fn payload_line(&mut self, lineno: usize, line: &str) -> BytecodeResult<()> {
        let Some((start, payload)) = &mut self.block else {
            return Ok(());
        };
        if line == payload.end_directive() {
            let start = *start;
            if let Some((_, payload)) = self.block.take() {
                self.addr = start.advance(payload.size());
                self.payloads.insert(start, payload);
            }
            return Ok(());
        }
        let invalid = || BytecodeError::syntax(lineno, format!("invalid payload entry {line:?}"));
        match payload {
            PendingPayload::Packed { labels, .. } => {
                let (_, l) = all_consuming(label)(line).map_err(|_| invalid())?;
                labels.push(l);
            }
            PendingPayload::Sparse { entries } => {
                let (_, (key, l)) =
                    all_consuming(separated_pair(number, tuple((space0, tag("->"), space0)), label))(line)
                        .map_err(|_| invalid())?;
                let key = match key {
                    Lit::Int(k) => narrow_int(k).ok_or_else(invalid)?,
                    _ => return Err(invalid()),
                };
                entries.push((key, l));
            }
            PendingPayload::Array { width, elements } => {
                let (_, lits) = all_consuming(separated_list1(space1, number))(line)
                    .map_err(|_| invalid())?;
                let mask = if *width == 8 {
                    u64::MAX
                } else {
                    (1u64 << (8 * *width)) - 1
                };
                for lit in lits {
                    let bits = match lit {
                        Lit::Int(v) => v as u64,
                        Lit::Float(f) => u64::from(f.to_bits()),
                        Lit::Double(d) => d.to_bits(),
                    };
                    elements.push(bits & mask);
                }
            }
        }
        Ok(())
    }

    fn ins_size(&self) -> u16 {
        let this = u16::from(!self.flags.contains(AccessFlags::STATIC));
        self.method.proto.params_slots() as u16 + this
    }

    fn label_addr(&self, lineno: usize, name: &str) -> BytecodeResult<Addr> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| BytecodeError::syntax(lineno, format!("unknown label :{name}")))
    }

    fn assemble(self, pool: &mut Pool) -> BytecodeResult<MethodCode> {
        let registers_size = match (self.registers, self.locals) {
            (Some(n), _) => n,
            (None, Some(n)) => n.saturating_add(self.ins_size()),
            (None, None) => {
                return Err(BytecodeError::syntax(self.line, "missing .registers or .locals"))
            }
        };
        let ins = self.ins_size();
        let reg = |lineno: usize, r: RegTok| -> BytecodeResult<Reg> {
            if !r.param {
                return Ok(Reg::from(r.n));
            }
            if r.n >= ins || ins > registers_size {
                return Err(BytecodeError::syntax(lineno, format!("invalid parameter register p{}", r.n)));
            }
            Ok(Reg::from(registers_size - ins + r.n))
        };

        let mut instrs = Vec::with_capacity(self.instrs.len());
        for pending in &self.instrs {
            let lineno = pending.line;
            let opcode = pending.opcode;
            let mut regs = Vec::new();
            let mut literal = None;
            let mut target = None;
            let mut reference = None;
            for tok in &pending.toks {
                match tok {
                    Tok::Reg(r) => regs.push(reg(lineno, *r)?),
                    Tok::List(rs) => {
                        for r in rs {
                            regs.push(reg(lineno, *r)?);
                        }
                    }
                    Tok::Range(first, last) => {
                        let (first, last) = (reg(lineno, *first)?, reg(lineno, *last)?);
                        if last < first {
                            return Err(BytecodeError::syntax(lineno, "empty register range"));
                        }
                        regs.extend((first.value()..=last.value()).map(Reg::from));
                    }
                    Tok::Label(l) => target = Some(self.label_addr(lineno, l)?),
                    Tok::Lit(l) => literal = Some(literal_value(lineno, opcode, *l)?),
                    Tok::Str(s) => reference = Some(PoolRef::String(pool.intern_string(s.as_str()))),
                    Tok::Desc(d) => reference = Some(parse_reference(lineno, pool, opcode, d)?),
                }
            }

            let shape = opcode.format().shape();
            let checks = [
                ("literal", shape.literal, literal.is_some()),
                ("label", shape.offset, target.is_some()),
                ("reference", shape.reference, reference.is_some()),
            ];
            for (name, expected, found) in checks {
                if expected != found {
                    let what = if expected { "missing" } else { "unexpected" };
                    return Err(BytecodeError::syntax(lineno, format!("{what} {name} for {opcode}")));
                }
            }
            if let (Some(kind), Some(PoolRef::String(_))) = (opcode.reference(), reference) {
                if kind != ReferenceKind::String {
                    return Err(BytecodeError::syntax(lineno, format!("expected a {kind} reference")));
                }
            }

            let offset = target
                .map(|t| {
                    i32::try_from(pending.addr.distance_to(t))
                        .map_err(|_| BytecodeError::syntax(lineno, "branch offset overflow"))
                })
                .transpose()?;
            let payload = match (opcode.format(), target) {
                (Format::F31t, Some(t)) => Some(self.payload_at(lineno, opcode, pending.addr, t)?),
                _ => None,
            };
            let units = encode_units(
                opcode,
                &Operands {
                    regs: &regs,
                    literal,
                    offset,
                    index: reference.map(|r| r.as_usize()),
                },
            )
            .map_err(|e| BytecodeError::syntax(lineno, e.to_string()))?;

            instrs.push(DecodedInstr {
                addr: pending.addr,
                opcode: opcode.value(),
                format: opcode.format(),
                regs,
                literal,
                offset,
                reference,
                payload,
                units,
            });
        }

        let mut tries: Vec<TryItem> = Vec::new();
        for catch in &self.catches {
            let start = self.label_addr(catch.line, &catch.start)?;
            let end = self.label_addr(catch.line, &catch.end)?;
            let handler = Handler {
                exception: catch.exception.clone().map(|t| pool.intern_type(t)),
                addr: self.label_addr(catch.line, &catch.handler)?,
            };
            match tries.iter_mut().find(|t| t.start == start && t.end == end) {
                Some(item) => item.handlers.push(handler),
                None => tries.push(TryItem {
                    start,
                    end,
                    handlers: vec![handler],
                }),
            }
        }

        log::debug!(
            "assembled method {} ({} instructions, {} try blocks)",
            self.method,
            instrs.len(),
            tries.len()
        );
        let method = pool.intern_method(self.method);
        Ok(MethodCode::new(method, self.flags, registers_size, instrs, tries))
    }

    fn payload_at(&self, lineno: usize, opcode: Opcode, addr: Addr, target: Addr) -> BytecodeResult<Payload> {
        let pending = self
            .payloads
            .get(&target)
            .ok_or_else(|| BytecodeError::syntax(lineno, format!("no payload at {target}")))?;
        let relative = |l: &String| -> BytecodeResult<i32> {
            let t = self.label_addr(lineno, l)?;
            i32::try_from(addr.distance_to(t))
                .map_err(|_| BytecodeError::syntax(lineno, "branch offset overflow"))
        };
        let payload = match pending {
            PendingPayload::Packed { first_key, labels } => Payload::PackedSwitch {
                first_key: *first_key,
                targets: labels.iter().map(relative).collect::<BytecodeResult<_>>()?,
            },
            PendingPayload::Sparse { entries } => Payload::SparseSwitch {
                keys: entries.iter().map(|(k, _)| *k).collect(),
                targets: entries
                    .iter()
                    .map(|(_, l)| relative(l))
                    .collect::<BytecodeResult<_>>()?,
            },
            PendingPayload::Array { width, elements } => Payload::ArrayData {
                width: *width,
                elements: elements.clone(),
            },
        };
        let switch = opcode.family() == Family::Switch;
        if switch == matches!(payload, Payload::ArrayData { .. }) {
            return Err(BytecodeError::syntax(lineno, format!("wrong payload kind for {opcode}")));
        }
        Ok(payload)
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '#' if !quoted => return &line[..i],
            _ => (),
        }
    }
    line
}

fn parse_type(lineno: usize, s: &str) -> BytecodeResult<Type> {
    Type::try_from(s).map_err(|e| BytecodeError::syntax(lineno, e.to_string()))
}

fn parse_key(lineno: usize, s: &str) -> BytecodeResult<i32> {
    match all_consuming(number)(s) {
        Ok((_, Lit::Int(k))) => narrow_int(k),
        _ => None,
    }
    .ok_or_else(|| BytecodeError::syntax(lineno, format!("invalid switch key {s:?}")))
}

// 32-bit values are accepted both signed and unsigned.
fn narrow_int(v: i64) -> Option<i32> {
    i32::try_from(v)
        .ok()
        .or_else(|| u32::try_from(v).ok().map(|u| u as i32))
}

fn literal_value(lineno: usize, opcode: Opcode, lit: Lit) -> BytecodeResult<i64> {
    let wide = opcode.kind().map_or(false, OperandKind::is_wide);
    let value = match (lit, wide) {
        (Lit::Int(v), true) => v,
        (Lit::Int(v), false) => narrow_int(v).map_or(v, i64::from),
        (Lit::Float(f), true) => f64::from(f).to_bits() as i64,
        (Lit::Float(f), false) => i64::from(f.to_bits() as i32),
        (Lit::Double(d), true) => d.to_bits() as i64,
        (Lit::Double(d), false) => i64::from((d as f32).to_bits() as i32),
    };
    if !wide && i32::try_from(value).is_err() {
        return Err(BytecodeError::syntax(lineno, format!("literal {value:#x} too large for {opcode}")));
    }
    Ok(value)
}

fn parse_reference(lineno: usize, pool: &mut Pool, opcode: Opcode, s: &str) -> BytecodeResult<PoolRef> {
    let invalid = |what: &str| BytecodeError::syntax(lineno, format!("invalid {what} reference {s:?}"));
    match opcode.reference() {
        Some(ReferenceKind::Type) => Ok(PoolRef::Type(pool.intern_type(parse_type(lineno, s)?))),
        Some(ReferenceKind::Field) => {
            let (class, member) = s.split_once("->").ok_or_else(|| invalid("field"))?;
            let (name, type_) = member.split_once(':').ok_or_else(|| invalid("field"))?;
            let field = FieldRef {
                class: parse_type(lineno, class)?,
                name: name.to_string(),
                type_: parse_type(lineno, type_)?,
            };
            Ok(PoolRef::Field(pool.intern_field(field)))
        }
        Some(ReferenceKind::Method) => {
            let (class, member) = s.split_once("->").ok_or_else(|| invalid("method"))?;
            let paren = member.find('(').ok_or_else(|| invalid("method"))?;
            let method = MethodRef {
                class: parse_type(lineno, class)?,
                name: member[..paren].to_string(),
                proto: Proto::try_from(&member[paren..])
                    .map_err(|e| BytecodeError::syntax(lineno, e.to_string()))?,
            };
            Ok(PoolRef::Method(pool.intern_method(method)))
        }
        Some(ReferenceKind::String) | None => Err(BytecodeError::syntax(
            lineno,
            format!("unexpected operand {s:?} for {opcode}"),
        )),
    }
}

fn register(input: &str) -> PResult<RegTok> {
    map(
        pair(
            one_of("vp"),
            map_opt(digit1, |d: &str| d.parse::<u16>().ok()),
        ),
        |(c, n)| RegTok { param: c == 'p', n },
    )(input)
}

fn register_list(input: &str) -> PResult<Tok> {
    delimited(
        pair(char('{'), space0),
        alt((
            map(
                separated_pair(register, tuple((space0, tag(".."), space0)), register),
                |(a, b)| Tok::Range(a, b),
            ),
            map(
                separated_list0(tuple((space0, char(','), space0)), register),
                Tok::List,
            ),
        )),
        pair(space0, char('}')),
    )(input)
}

fn label(input: &str) -> PResult<String> {
    map(
        preceded(
            char(':'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        ),
        str::to_string,
    )(input)
}

fn number(input: &str) -> PResult<Lit> {
    map_opt(
        verify(
            take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')),
            |s: &str| s.starts_with(|c: char| c == '-' || c.is_ascii_digit() || c == 'I' || c == 'N'),
        ),
        parse_number,
    )(input)
}

fn parse_number(s: &str) -> Option<Lit> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(b) => (true, b),
        None => (false, s),
    };
    let sign = |v: u64| if negative { (v as i64).wrapping_neg() } else { v as i64 };

    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let hex = hex.trim_end_matches(|c| matches!(c, 'L' | 'l' | 't' | 'T' | 's' | 'S'));
        return u64::from_str_radix(hex, 16).ok().map(|v| Lit::Int(sign(v)));
    }

    let special = |b: &str| match b {
        "Infinity" => Some(f64::INFINITY),
        "NaN" => Some(f64::NAN),
        _ => None,
    };
    if let Some(b) = body.strip_suffix(|c| c == 'f' || c == 'F') {
        let f = special(b).map(|f| f as f32).or_else(|| b.parse::<f32>().ok())?;
        return Some(Lit::Float(if negative { -f } else { f }));
    }
    let (double, b) = match body.strip_suffix(|c| c == 'd' || c == 'D') {
        Some(b) => (true, b),
        None => (false, body),
    };
    if double || b.contains(['.', 'e', 'E']) || special(b).is_some() {
        let d = special(b).or_else(|| b.parse::<f64>().ok())?;
        return Some(Lit::Double(if negative { -d } else { d }));
    }
    let b = b.trim_end_matches(|c| matches!(c, 'L' | 'l' | 't' | 'T' | 's' | 'S'));
    b.parse::<u64>().ok().map(|v| Lit::Int(sign(v)))
}

fn string_literal(input: &str) -> PResult<String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    let fail = |i: &str| nom::Err::Error(BytecodeError::from_error_kind(i, ErrorKind::Escaped));
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(fail(rest)),
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('b') => out.push('\u{8}'),
                    Some('f') => out.push('\u{c}'),
                    Some('0') => out.push('\0'),
                    Some('u') => {
                        let hex = chars.as_str().get(..4).ok_or_else(|| fail(rest))?;
                        let c = u32::from_str_radix(hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| fail(rest))?;
                        out.push(c);
                        chars = chars.as_str()[4..].chars();
                    }
                    Some(c @ ('"' | '\'' | '\\')) => out.push(c),
                    _ => return Err(fail(rest)),
                }
            }
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

fn descriptor(input: &str) -> PResult<String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !matches!(c, ',' | '{' | '}')),
        str::to_string,
    )(input)
}

fn operand(input: &str) -> PResult<Tok> {
    alt((
        register_list,
        map(terminated(register, not(descriptor)), Tok::Reg),
        map(label, Tok::Label),
        map(string_literal, Tok::Str),
        map(number, Tok::Lit),
        map(descriptor, Tok::Desc),
    ))(input)
}

fn instruction(input: &str) -> PResult<(&str, Vec<Tok>)> {
    pair(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '/'),
        map(
            opt(preceded(
                space1,
                terminated(
                    separated_list0(tuple((space0, char(','), space0)), operand),
                    space0,
                ),
            )),
            Option::unwrap_or_default,
        ),
    )(input)
}

#[allow(clippy::type_complexity)]
fn catch_directive(input: &str) -> PResult<(Option<String>, (String, String), String)> {
    tuple((
        alt((
            map(pair(tag(".catch"), pair(space1, descriptor)), |(_, (_, t))| Some(t)),
            map(tag(".catchall"), |_| None),
        )),
        preceded(
            space0,
            delimited(
                pair(char('{'), space0),
                separated_pair(label, tuple((space0, tag(".."), space0)), label),
                pair(space0, char('}')),
            ),
        ),
        preceded(space0, label),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ConstantPool;

    const SAMPLE: &str = r#"
.class public La/Sample;
.super Ljava/lang/Object;
.source "Sample.java"

# computes things
.method public static compute(IF)I
    .registers 5
    .annotation runtime La/Marker;
        value = "x"
    .end annotation
    .line 12
    const/4 v0, 0x5
    neg-int v1, v0
    if-eqz p0, :end
    invoke-static {p0, p1}, La/Sample;->helper(IF)F
    move-result v2
    const v2, 1.5f
    :end
    return v1
.end method

.method public abstract nothing()V
.end method
"#;

    #[test]
    fn parse_sample() {
        let asm = parse_assembly(SAMPLE).unwrap();
        assert_eq!(asm.methods.len(), 1);
        let code = &asm.methods[0];
        assert_eq!(code.registers_size, 5);
        assert!(code.is_static());
        let method = asm.pool.method(code.method).unwrap();
        assert_eq!(method.to_string(), "La/Sample;->compute(IF)I");

        let instrs = code.instructions();
        assert_eq!(instrs.len(), 7);
        assert_eq!(instrs[0].units, vec![0x5012]);
        assert_eq!(instrs[1].addr, Addr(1));
        assert_eq!(instrs[1].units, vec![0x017b]);
        // p0 is v3 in a frame of five registers with two parameters
        assert_eq!(instrs[2].regs, vec![Reg::from(3u16)]);
        assert_eq!(instrs[2].target(), Some(Addr(11)));
        assert_eq!(instrs[3].regs, vec![Reg::from(3u16), Reg::from(4u16)]);
        assert_eq!(instrs[5].literal, Some(0x3fc0_0000));
        assert_eq!(instrs[6].addr, Addr(11));
    }

    #[test]
    fn parse_switch_and_catches() {
        let text = r#"
.class La/B;
.method static f(I)V
    .locals 1
    :try_start
    packed-switch p0, :table
    :try_end
    .catch Ljava/lang/Exception; {:try_start .. :try_end} :handler
    .catchall {:try_start .. :try_end} :handler
    return-void
    :case
    return-void
    :handler
    move-exception v0
    throw v0
    :table
    .packed-switch 0x2
        :case
        :handler
    .end packed-switch
.end method
"#;
        let asm = parse_assembly(text).unwrap();
        let code = &asm.methods[0];
        assert_eq!(code.registers_size, 2);
        let switch = &code.instructions()[0];
        assert_eq!(switch.target(), Some(Addr(7)));
        assert_eq!(
            switch.payload,
            Some(Payload::PackedSwitch {
                first_key: 2,
                targets: vec![4, 5]
            })
        );
        let tries: Vec<_> = code.iter_tries().collect();
        assert_eq!(tries.len(), 1);
        assert_eq!((tries[0].start, tries[0].end), (Addr(0), Addr(3)));
        assert_eq!(tries[0].handlers.len(), 2);
        assert_eq!(tries[0].handlers[1].exception, None);
        assert_eq!(code.end_addr(), Addr(7));
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse_number("0x10"), Some(Lit::Int(16)));
        assert_eq!(parse_number("-0x1L"), Some(Lit::Int(-1)));
        assert_eq!(parse_number("42"), Some(Lit::Int(42)));
        assert_eq!(parse_number("1.5f"), Some(Lit::Float(1.5)));
        assert_eq!(parse_number("-2.0"), Some(Lit::Double(-2.0)));
        assert_eq!(parse_number("Infinityf"), Some(Lit::Float(f32::INFINITY)));
        assert_eq!(parse_number("Ix"), None);
        assert_eq!(
            literal_value(0, Opcode::Const, Lit::Int(0xffff_ffff)).unwrap(),
            -1
        );
        assert_eq!(
            literal_value(0, Opcode::ConstWide, Lit::Double(1.0)).unwrap(),
            0x3ff0_0000_0000_0000
        );
    }

    #[test]
    fn parse_strings() {
        let (_, s) = string_literal(r#""a\"b\nA" rest"#).unwrap();
        assert_eq!(s, "a\"b\nA");
        assert_eq!(
            strip_comment(r##"const-string v0, "#no" # yes"##),
            r##"const-string v0, "#no" "##
        );
    }

    #[test]
    fn syntax_errors() {
        let header = ".class La/B;\n.method static f()V\n.registers 20\n";
        let bad = [
            "neg-int v17, v0\n",
            "goto :nowhere\n",
            "frobnicate v0\n",
            "const/4 v0, 0x10\n",
            "sget v0, La/B;->m()V\n",
        ];
        for line in bad {
            let text = format!("{header}{line}return-void\n.end method\n");
            match parse_assembly(&text) {
                Err(BytecodeError::Syntax { line, .. }) => assert_eq!(line, 4),
                other => panic!("{line:?} accepted: {other:?}"),
            }
        }
        assert!(parse_assembly(".class La/B;\n.method static f()V\n.registers 1\nreturn-void\n").is_err());
    }
}
