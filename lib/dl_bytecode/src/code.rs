//! Method code: instructions, exception handlers and register layout.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::instrs::DecodedInstr;
use crate::pool::{ConstantPool, Index, MethodRef};
use crate::registers::Reg;
use crate::types::Type;
use crate::Addr;
use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Method access flags, as found in dex `encoded_method` items.
    #[derive(Default, Serialize)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        const BRIDGE = 0x40;
        const VARARGS = 0x80;
        const NATIVE = 0x100;
        const ABSTRACT = 0x400;
        const STRICT = 0x800;
        const SYNTHETIC = 0x1000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags {
    /// Parses a smali access flag keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "public" => Some(Self::PUBLIC),
            "private" => Some(Self::PRIVATE),
            "protected" => Some(Self::PROTECTED),
            "static" => Some(Self::STATIC),
            "final" => Some(Self::FINAL),
            "synchronized" => Some(Self::SYNCHRONIZED),
            "bridge" => Some(Self::BRIDGE),
            "varargs" => Some(Self::VARARGS),
            "native" => Some(Self::NATIVE),
            "abstract" => Some(Self::ABSTRACT),
            "strictfp" => Some(Self::STRICT),
            "synthetic" => Some(Self::SYNTHETIC),
            "constructor" => Some(Self::CONSTRUCTOR),
            "declared-synchronized" => Some(Self::DECLARED_SYNCHRONIZED),
            _ => None,
        }
    }
}

/// One handler of a try block: a typed catch, or a catch-all when
/// `exception` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub exception: Option<Index<Type>>,
    pub addr: Addr,
}

/// An exception handler range, covering instructions in `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TryItem {
    pub start: Addr,
    pub end: Addr,
    pub handlers: Vec<Handler>,
}

impl TryItem {
    #[inline]
    #[must_use]
    pub fn covers(&self, addr: Addr) -> bool {
        addr >= self.start && addr < self.end
    }

    #[inline]
    pub fn iter_handlers(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter()
    }
}

/// The code of one method, as handed over by a decoder.
#[derive(Debug, Clone, Serialize)]
pub struct MethodCode {
    pub method: Index<MethodRef>,
    pub flags: AccessFlags,
    pub registers_size: u16,
    pub(crate) instrs: Vec<DecodedInstr>,
    pub(crate) tries: Vec<TryItem>,
}

impl MethodCode {
    /// Builds a method code; instructions are sorted by address.
    #[must_use]
    pub fn new(
        method: Index<MethodRef>,
        flags: AccessFlags,
        registers_size: u16,
        mut instrs: Vec<DecodedInstr>,
        tries: Vec<TryItem>,
    ) -> Self {
        instrs.sort_by_key(|i| i.addr);
        Self {
            method,
            flags,
            registers_size,
            instrs,
            tries,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    #[inline]
    #[must_use]
    pub fn instructions_count(&self) -> usize {
        self.instrs.len()
    }

    #[inline]
    pub fn iter_instructions(&self) -> impl Iterator<Item = &DecodedInstr> {
        self.instrs.iter()
    }

    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[DecodedInstr] {
        &self.instrs
    }

    /// Position of the instruction starting at `addr` in the instructions array.
    pub fn position_of(&self, addr: Addr) -> BytecodeResult<usize> {
        self.instrs
            .binary_search_by(|item| item.addr.cmp(&addr))
            .map_err(|_| BytecodeError::InstructionNotFound(addr))
    }

    #[inline]
    pub fn instruction_at(&self, addr: Addr) -> BytecodeResult<&DecodedInstr> {
        let index = self.position_of(addr)?;
        Ok(&self.instrs[index])
    }

    #[inline]
    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }

    /// Address following the last instruction.
    #[must_use]
    pub fn end_addr(&self) -> Addr {
        self.instrs
            .last()
            .map_or(Addr::entry(), DecodedInstr::next_addr)
    }

    /// Number of register slots holding incoming arguments (including `this`).
    pub fn ins_size(&self, pool: &dyn ConstantPool) -> BytecodeResult<usize> {
        let method = pool.method(self.method)?;
        let this = usize::from(!self.is_static());
        Ok(method.proto.params_slots() + this)
    }

    /// First register holding incoming arguments: arguments occupy the
    /// highest-numbered registers of the frame.
    pub fn first_param_reg(&self, pool: &dyn ConstantPool) -> BytecodeResult<Reg> {
        let ins = self.ins_size(pool)?;
        let size = usize::from(self.registers_size);
        if ins > size {
            return Err(BytecodeError::Conversion {
                from: format!("{ins} argument slots"),
                to: format!("a frame of {size} registers"),
            });
        }
        Ok(Reg::from((size - ins) as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::types::Proto;

    #[test]
    fn parameter_registers() {
        let mut pool = Pool::new();
        let method = pool.intern_method(MethodRef {
            class: Type::Class("a/B".to_string()),
            name: "f".to_string(),
            proto: Proto::try_from("(JI)V").unwrap(),
        });
        let code = MethodCode::new(method, AccessFlags::PUBLIC, 6, vec![], vec![]);
        assert_eq!(code.ins_size(&pool).unwrap(), 4);
        assert_eq!(code.first_param_reg(&pool).unwrap(), Reg::from(2u16));

        let code = MethodCode::new(method, AccessFlags::STATIC, 2, vec![], vec![]);
        assert!(code.is_static());
        assert!(code.first_param_reg(&pool).is_err());
    }

    #[test]
    fn access_flag_keywords() {
        assert_eq!(AccessFlags::from_keyword("static"), Some(AccessFlags::STATIC));
        assert_eq!(AccessFlags::from_keyword("nope"), None);
    }
}
