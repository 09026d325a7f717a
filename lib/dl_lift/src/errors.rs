//! Lifting errors definitions.
//!
//! Every variant is fatal for the method being lifted only: the caller is
//! expected to report it and go on with the other methods.

use dl_bytecode::errors::BytecodeError;
use dl_bytecode::instrs::DecodedInstr;
use dl_bytecode::opcodes::Opcode;
use dl_bytecode::registers::Reg;
use dl_bytecode::Addr;
use thiserror::Error;

/// An alias for result that can be a [`LiftError`].
pub type LiftResult<T> = Result<T, LiftError>;

/// The lifting error type.
#[derive(Debug, Error)]
pub enum LiftError {
    /// Error that can be returned when accessing the constant pool or
    /// the method code.
    #[error("bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("the method has no instructions")]
    NoCode,

    #[error("unknown opcode {opcode:#04x} at {addr} [{raw}]")]
    UnknownOpcode { addr: Addr, opcode: u8, raw: String },

    #[error("malformed {mnemonic} at {addr} [{raw}]: {reason}")]
    MalformedInstruction {
        addr: Addr,
        mnemonic: &'static str,
        reason: String,
        raw: String,
    },

    #[error("{mnemonic} at {addr} [{raw}] uses {reg} out of a {size} registers frame")]
    RegisterOutOfBounds {
        addr: Addr,
        mnemonic: &'static str,
        reg: Reg,
        size: u16,
        raw: String,
    },

    #[error("{mnemonic} at {addr} [{raw}] branches out of the method (offset {offset})")]
    BadTarget {
        addr: Addr,
        mnemonic: &'static str,
        offset: i64,
        raw: String,
    },

    #[error("{mnemonic} at {addr} [{raw}] passes {found} argument registers, {expected} expected")]
    ArityMismatch {
        addr: Addr,
        mnemonic: &'static str,
        expected: usize,
        found: usize,
        raw: String,
    },

    #[error("conflicting kinds for {register} at {addr}: {message}")]
    Conflict {
        addr: Addr,
        register: Reg,
        message: String,
    },
}

fn mnemonic_of(instr: &DecodedInstr) -> &'static str {
    instr.opcode().map_or("<unknown>", Opcode::mnemonic)
}

impl LiftError {
    pub(crate) fn malformed<S: Into<String>>(instr: &DecodedInstr, reason: S) -> Self {
        Self::MalformedInstruction {
            addr: instr.addr,
            mnemonic: mnemonic_of(instr),
            reason: reason.into(),
            raw: instr.raw(),
        }
    }

    pub(crate) fn bad_target(instr: &DecodedInstr, offset: i64) -> Self {
        Self::BadTarget {
            addr: instr.addr,
            mnemonic: mnemonic_of(instr),
            offset,
            raw: instr.raw(),
        }
    }

    pub(crate) fn out_of_bounds(instr: &DecodedInstr, reg: Reg, size: u16) -> Self {
        Self::RegisterOutOfBounds {
            addr: instr.addr,
            mnemonic: mnemonic_of(instr),
            reg,
            size,
            raw: instr.raw(),
        }
    }

    /// Code address the error is attached to, if any.
    #[must_use]
    pub const fn addr(&self) -> Option<Addr> {
        match self {
            Self::Bytecode(BytecodeError::InstructionNotFound(addr))
            | Self::UnknownOpcode { addr, .. }
            | Self::MalformedInstruction { addr, .. }
            | Self::RegisterOutOfBounds { addr, .. }
            | Self::BadTarget { addr, .. }
            | Self::ArityMismatch { addr, .. }
            | Self::Conflict { addr, .. } => Some(*addr),
            Self::Bytecode(_) | Self::NoCode => None,
        }
    }
}
