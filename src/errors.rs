//! Top-level error type of the command line tools.
//!
//! `dl_bytecode` and `dl_lift` each define their own error type; both
//! convert into [`DlError`] so that tools can use `?` on any of them.
//!
//! ```rust
//! use dexlift::prelude::*;
//!
//! fn main() -> DlResult<()> { // can return a DlError
//!    let _asm = dexlift::bytecode::parse_assembly(".class La/B;")?; // can return a BytecodeError
//!    Ok(())
//! }
//! ```

use dl_bytecode::errors::BytecodeError;
use dl_lift::errors::LiftError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DlError`].
pub type DlResult<T> = Result<T, DlError>;

/// Errors reported by the `dexlift` tools, mostly transparent wrappers
/// over the errors of the libraries they call.
#[derive(Debug, Error)]
pub enum DlError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned when serializing lifted bodies.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error that can be returned when setting up the worker threads.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Error that can be returned from [`dl_bytecode`] functions.
    #[error(transparent)]
    Bytecode(#[from] BytecodeError),

    /// Error that can be returned from [`dl_lift`] functions.
    #[error(transparent)]
    Lift(#[from] LiftError),
}
