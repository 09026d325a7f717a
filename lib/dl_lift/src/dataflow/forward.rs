use crate::controlflow::{Branch, Cfg};
use crate::dataflow::Dataflow;
use crate::errors::{LiftError, LiftResult};
use dl_bytecode::instrs::DecodedInstr;
use dl_bytecode::Addr;
use petgraph::graph::NodeIndex;
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// The abstract state that is carried along the control flow graph
/// during forward dataflow analysis.
pub trait AbstractForwardState<'a>: Eq + Sized {
    type Context<'c>;
    type Error;

    /// The state initialization function, giving the state at the method
    /// entry.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if the context does not
    /// allow a proper state initialization.
    fn init(ctx: &Self::Context<'a>) -> Result<Self, Self::Error>;

    /// The state join operation function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given states
    /// cannot be joined properly with respect to the context.
    fn join(&mut self, other: &Self, ctx: &Self::Context<'a>) -> Result<(), Self::Error>;

    /// The control flow branch transfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given branch
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_branch(
        &mut self,
        branch: &Branch,
        ctx: &Self::Context<'a>,
    ) -> Result<(), Self::Error>;

    /// The instruction tranfer function.
    ///
    /// # Errors
    ///
    /// This method should return a `Self::Error` if given instruction
    /// cannot be passed with the current state with respect to the
    /// context.
    fn transfer_instr(
        &mut self,
        instr: &DecodedInstr,
        ctx: &Self::Context<'a>,
    ) -> Result<(), Self::Error>;
}

/// Performs a forward dataflow analysis.
///
/// The analysis parameters are given by the `AbstractForwardState` trait
/// methods passed as a type parameter. Blocks that cannot be reached from
/// the method entry are analyzed too, starting from the initial state.
///
/// # Errors
///
/// This function may generate errors resulting of an underlying
/// abstract state error (at initialization, join or transfer
/// operation). Also, the exact type of the error is parameterized
/// through an `AbstractState` trait associated type.
pub fn forward<'a, S>(cfg: &Cfg, context: &S::Context<'a>) -> LiftResult<Dataflow<S>>
where
    S: AbstractForwardState<'a> + Clone + fmt::Display,
    S::Error: Into<LiftError>,
{
    let cfgraph = &cfg.inner;
    let start = cfg.start_index();

    let mut block_entries: BTreeMap<NodeIndex, S> = BTreeMap::new();
    let mut block_exits: BTreeMap<NodeIndex, S> = BTreeMap::new();
    let mut entries: BTreeMap<Addr, S> = BTreeMap::new();
    let mut exits: BTreeMap<Addr, S> = BTreeMap::new();

    // For forward dataflow, optimal order is reverse postorder.
    // The postorder here is reversed when we pop_back from the deque.
    // Blocks unreachable from the entry are queued in front, so that they
    // are processed last.
    let mut worklist: VecDeque<NodeIndex> = VecDeque::new();
    let mut postorder = DfsPostOrder::new(cfgraph, start);
    while let Some(id) = postorder.next(cfgraph) {
        worklist.push_back(id);
    }
    for id in cfgraph.node_indices() {
        if !postorder.discovered.contains(id.index()) {
            postorder.move_to(id);
            let mut unreachable = Vec::new();
            while let Some(id) = postorder.next(cfgraph) {
                unreachable.push(id);
            }
            for id in unreachable.into_iter().rev() {
                worklist.push_front(id);
            }
        }
    }

    while let Some(id) = worklist.pop_back() {
        let block = &cfgraph[id];
        log::trace!("    ---- block@{}", block.start_addr());

        // join states of already computed predecessors: exit states for
        // normal edges, entry states for exception edges
        let mut new_state: Option<S> = if id == start {
            Some(S::init(context).map_err(S::Error::into)?)
        } else {
            None
        };
        for edge in cfgraph.edges_directed(id, Direction::Incoming) {
            let computed = if edge.weight().is_catch() {
                block_entries.get(&edge.source())
            } else {
                block_exits.get(&edge.source())
            };
            if let Some(state) = computed {
                let mut previous = state.clone();
                previous
                    .transfer_branch(edge.weight(), context)
                    .map_err(S::Error::into)?;
                new_state = Some(match new_state.take() {
                    Some(mut entry) => {
                        entry.join(&previous, context).map_err(S::Error::into)?;
                        entry
                    }
                    None => previous,
                });
            }
        }
        let mut new_state = match new_state {
            Some(state) => state,
            None => S::init(context).map_err(S::Error::into)?,
        };
        let entry_state = new_state.clone();

        log::trace!("    -- ENTRY STATE:");
        for line in format!("{new_state}").split('\n') {
            log::trace!("      {line}");
        }

        // then apply transfer function for each instruction of the block
        // while saving intermediate states
        for instr in block.instructions() {
            entries.insert(instr.addr, new_state.clone());
            new_state
                .transfer_instr(instr, context)
                .map_err(S::Error::into)?;
            exits.insert(instr.addr, new_state.clone());
        }
        log::trace!("    -- EXIT STATE:");
        for line in format!("{new_state}").split('\n') {
            log::trace!("      {line}");
        }

        // successors already computed must be treated again when the
        // entry (for exception edges) or exit state changed
        let changed = block_entries.get(&id) != Some(&entry_state)
            || block_exits.get(&id) != Some(&new_state);
        if changed {
            for edge in cfgraph.edges_directed(id, Direction::Outgoing) {
                let target = edge.target();
                if block_exits.contains_key(&target) && !worklist.contains(&target) {
                    worklist.push_front(target);
                }
            }
        }

        block_entries.insert(id, entry_state);
        block_exits.insert(id, new_state);
    }

    Ok(Dataflow { entries, exits })
}
