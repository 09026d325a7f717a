//! Bytecode errors definitions.

use crate::Addr;
use std::fmt;
use thiserror::Error;

/// An alias for result that can be a [`BytecodeError`].
pub type BytecodeResult<T> = Result<T, BytecodeError>;

/// The bytecode error type.
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Error that can be returned when formatting bytecode parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Error that can be returned at binary decoding.
    #[error("decoding error ({remaining} bytes left): {kind:?}")]
    Decoding {
        remaining: usize,
        kind: nom::error::ErrorKind,
    },

    /// Error that can be returned by the assembly front end.
    #[error("syntax error (line {line}): {message}")]
    Syntax { line: usize, message: String },

    #[error("could not convert {} into {}", from, to)]
    Conversion { from: String, to: String },

    #[error("resource not found in constant pool: {0}")]
    ResNotFound(String),

    #[error("cannot encode {mnemonic}: {reason}")]
    Encoding {
        mnemonic: &'static str,
        reason: String,
    },

    #[error("instruction shape mismatch: {0}")]
    Shape(String),

    #[error("Instruction not found (address: {0})")]
    InstructionNotFound(Addr),
}

impl BytecodeError {
    pub(crate) fn syntax<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

impl nom::error::ParseError<&[u8]> for BytecodeError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Decoding {
            remaining: input.len(),
            kind,
        }
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::error::ParseError<(&[u8], usize)> for BytecodeError {
    fn from_error_kind(input: (&[u8], usize), kind: nom::error::ErrorKind) -> Self {
        Self::Decoding {
            remaining: input.0.len(),
            kind,
        }
    }

    fn append(_: (&[u8], usize), _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::error::ParseError<&str> for BytecodeError {
    fn from_error_kind(input: &str, kind: nom::error::ErrorKind) -> Self {
        Self::Syntax {
            line: 0,
            message: format!("unexpected input {input:?} ({kind:?})"),
        }
    }

    fn append(_: &str, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::ErrorConvert<Self> for BytecodeError {
    fn convert(self) -> Self {
        self
    }
}
