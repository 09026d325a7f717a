//! Forward dataflow framework and the reaching definitions analysis
//! the register file is built on.

use dl_bytecode::Addr;
use std::collections::BTreeMap;

mod forward;
mod reaching;

pub use forward::{forward, AbstractForwardState};
pub use reaching::{definition, Def, Frame, Half, ReachingDefs, Site};

/// Fixpoint of a dataflow analysis: the abstract state before and after
/// each instruction of the method, keyed by instruction address.
#[derive(Debug, Clone)]
pub struct Dataflow<S> {
    pub entries: BTreeMap<Addr, S>,
    pub exits: BTreeMap<Addr, S>,
}
