//! Non-fatal diagnostics reported alongside a lifted body.

use crate::kinds::Kind;
use dl_bytecode::registers::Reg;
use dl_bytecode::Addr;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// The constraints of a class have an empty intersection.
    Conflict,
    /// No constraint was ever recorded on the class.
    Unconstrained,
    /// Several kinds remain possible for the class.
    Ambiguous,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Unconstrained => write!(f, "unconstrained"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// A defaulted or conflicting class of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub register: Reg,
    /// Code addresses involved, in increasing order.
    pub addrs: Vec<Addr>,
    pub resolved: Kind,
    pub message: String,
}

impl Diagnostic {
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind == DiagnosticKind::Conflict
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} on {}", self.kind, self.register)?;
        if !self.addrs.is_empty() {
            write!(f, " at ")?;
            for (i, addr) in self.addrs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{addr}")?;
            }
        }
        write!(f, ": {}, resolved as {}", self.message, self.resolved)
    }
}
