//! Control flow graph representation.

use crate::errors::{LiftError, LiftResult};
use dl_bytecode::code::MethodCode;
use dl_bytecode::errors::BytecodeError;
use dl_bytecode::instrs::DecodedInstr;
use dl_bytecode::opcodes::{Family, Opcode};
use dl_bytecode::pool::{ConstantPool, PrettyPrint};
use dl_bytecode::types::Type;
use dl_bytecode::Addr;
use fixedbitset::FixedBitSet;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, NodeRef};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write;

#[derive(Debug)]
pub struct Block<'a> {
    pool: &'a dyn ConstantPool,
    instrs: &'a [DecodedInstr],
    can_throw: bool,
}

impl<'a> fmt::Display for Block<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for instr in self.instrs {
            write!(f, "{}: ", instr.addr)?;
            instr.pp(f, self.pool).map_err(|_| fmt::Error)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<'a> Block<'a> {
    fn new(instrs: &'a [DecodedInstr], pool: &'a dyn ConstantPool) -> Self {
        let can_throw = instrs.first().map_or(false, instruction_can_throw);
        Self {
            pool,
            instrs,
            can_throw,
        }
    }

    #[inline]
    pub fn instructions(&self) -> impl Iterator<Item = &'a DecodedInstr> {
        self.instrs.iter()
    }

    /// Address of the block leader; blocks are never empty.
    #[must_use]
    pub fn start_addr(&self) -> Addr {
        self.instrs.first().map_or(Addr::entry(), |instr| instr.addr)
    }

    #[inline]
    #[must_use]
    pub const fn can_throw(&self) -> bool {
        self.can_throw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    IfTrue,
    IfFalse,
    Switch(i32),
    SwitchDefault,
    Jmp,
    Sequence,
    Catch(Type),
    CatchAll,
}

impl Branch {
    #[inline]
    #[must_use]
    pub const fn is_catch(&self) -> bool {
        matches!(self, Self::Catch(_) | Self::CatchAll)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IfTrue => write!(f, "<true>"),
            Self::IfFalse => write!(f, "<false>"),
            Self::Switch(key) => write!(f, "<switch {key}>"),
            Self::SwitchDefault => write!(f, "<switch _>"),
            Self::Jmp => write!(f, "<jmp>"),
            Self::Sequence => write!(f, "<seq>"),
            Self::Catch(typ) => write!(f, "<catch {}>", typ.to_java_string()),
            Self::CatchAll => write!(f, "<catch *>"),
        }
    }
}

#[derive(Debug)]
pub struct Cfg<'a> {
    pub(crate) inner: DiGraph<Block<'a>, Branch>,
    node_ids: BTreeMap<Addr, NodeIndex>,
    start: NodeIndex,
    targets: BTreeSet<Addr>,
}

impl<'a> Cfg<'a> {
    #[inline]
    pub(crate) const fn start_index(&self) -> NodeIndex {
        self.start
    }

    pub fn iter_ordered_blocks(&self) -> impl Iterator<Item = &Block> {
        self.node_ids.values().map(move |id| &self.inner[*id])
    }

    #[inline]
    #[must_use]
    pub fn blocks_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Checks if the instruction at `addr` is a branch target or an
    /// exception handler.
    #[inline]
    #[must_use]
    pub fn is_target(&self, addr: Addr) -> bool {
        self.targets.contains(&addr)
    }

    /// Addresses of the instructions reachable from the method entry,
    /// exception edges included.
    #[must_use]
    pub fn reachable(&self) -> BTreeSet<Addr> {
        let mut dfs = Dfs::new(&self.inner, self.start);
        while dfs.next(&self.inner).is_some() {}
        let seen: &FixedBitSet = &dfs.discovered;
        self.inner
            .node_indices()
            .filter(|id| seen.contains(id.index()))
            .flat_map(|id| self.inner[id].instructions().map(|instr| instr.addr))
            .collect()
    }

    pub fn to_dot(&self) -> LiftResult<String> {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  splines=ortho;\n");
        res.push_str("  nodesep=2;\n");
        write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly, Config::EdgeNoLabel],
                &|_, edge| {
                    let color = match edge.weight() {
                        Branch::IfTrue => "green",
                        Branch::IfFalse => "red",
                        Branch::Switch(_) | Branch::SwitchDefault => "purple",
                        Branch::Jmp => "blue",
                        Branch::Catch(_) | Branch::CatchAll => "orchid",
                        Branch::Sequence => "black",
                    };
                    format!("color={},xlabel=\"{}\"", color, edge.weight())
                },
                &|_, node| if node.weight().can_throw() {
                    String::from("shape=box,color=blue")
                } else {
                    String::from("shape=box,color=black")
                }
            )
        )
        .map_err(BytecodeError::from)?;
        res.push('}');
        Ok(res)
    }

    /// Builds the graph of the basic blocks of a method.
    ///
    /// Branch targets, fall-through successors and exception handlers must
    /// all be instruction addresses of the method: a method branching or
    /// falling out of its code is rejected with [`LiftError::BadTarget`].
    pub fn build(code: &'a MethodCode, pool: &'a dyn ConstantPool) -> LiftResult<Self> {
        if code.instructions().is_empty() {
            return Err(LiftError::NoCode);
        }

        let mut cfgraph = DiGraph::new();
        let mut blocks_map = BTreeMap::new();

        let (leaders, targets) = compute_block_leaders(code)?;
        for block in split_into_blocks(code, pool, &leaders) {
            blocks_map.insert(block.start_addr(), cfgraph.add_node(block));
        }

        let breakers: Vec<(NodeIndex, &'a DecodedInstr)> = cfgraph
            .node_indices()
            .filter_map(|id| {
                let instrs: &'a [DecodedInstr] = cfgraph[id].instrs;
                instrs.last().map(|instr| (id, instr))
            })
            .collect();
        for (src_id, instr) in breakers {
            let mut edges = instruction_branching(code, instr)?;
            if edges.is_empty() && !instruction_ends_flow(instr) {
                edges.push((Branch::Sequence, fallthrough(code, instr)?));
            }
            edges.extend(instruction_catches(code, pool, instr)?);
            for (branch, dst) in edges {
                let dst_id = blocks_map
                    .get(&dst)
                    .copied()
                    .ok_or(BytecodeError::InstructionNotFound(dst))?;
                cfgraph.add_edge(src_id, dst_id, branch);
            }
        }

        let start = blocks_map
            .get(&Addr::entry())
            .copied()
            .ok_or(BytecodeError::InstructionNotFound(Addr::entry()))?;
        Ok(Self {
            inner: cfgraph,
            node_ids: blocks_map,
            start,
            targets,
        })
    }
}

// Block leaders are block first instructions addresses:
//   - target address of a branching instruction is a leader
//   - address following a branching or returning instruction is a leader
//   - throwing instructions are leaders, so that the state before them is
//     the entry state of their block
//   - try boundaries and handlers are leaders
fn compute_block_leaders(code: &MethodCode) -> LiftResult<(BTreeSet<Addr>, BTreeSet<Addr>)> {
    let mut leaders = BTreeSet::new();
    let mut targets = BTreeSet::new();

    for instr in code.iter_instructions() {
        let branching = instruction_branching(code, instr)?;
        let can_throw = instruction_can_throw(instr);
        if !branching.is_empty() || can_throw || instruction_ends_flow(instr) {
            leaders.insert(instr.next_addr());
        }
        if branching.is_empty() && !instruction_ends_flow(instr) {
            fallthrough(code, instr)?;
        }
        for (_, dst) in branching {
            leaders.insert(dst);
            targets.insert(dst);
        }
        if can_throw {
            leaders.insert(instr.addr);
        }
    }

    for try_ in code.iter_tries() {
        leaders.insert(try_.start);
        leaders.insert(try_.end);
        for handler in try_.iter_handlers() {
            leaders.insert(handler.addr);
            targets.insert(handler.addr);
        }
    }

    Ok((leaders, targets))
}

fn split_into_blocks<'a>(
    code: &'a MethodCode,
    pool: &'a dyn ConstantPool,
    leaders: &BTreeSet<Addr>,
) -> Vec<Block<'a>> {
    let instrs = code.instructions();
    let mut blocks = Vec::new();
    let mut first = 0;
    for (i, instr) in instrs.iter().enumerate().skip(1) {
        if leaders.contains(&instr.addr) {
            blocks.push(Block::new(&instrs[first..i], pool));
            first = i;
        }
    }
    blocks.push(Block::new(&instrs[first..], pool));
    blocks
}

fn instruction_ends_flow(instr: &DecodedInstr) -> bool {
    instr.opcode().map_or(false, Opcode::ends_flow)
}

fn instruction_can_throw(instr: &DecodedInstr) -> bool {
    instr.opcode().map_or(false, Opcode::can_throw)
}

fn jump_target(code: &MethodCode, instr: &DecodedInstr, offset: i32) -> LiftResult<Addr> {
    instr
        .addr
        .checked_offset(offset)
        .filter(|addr| code.position_of(*addr).is_ok())
        .ok_or_else(|| LiftError::bad_target(instr, i64::from(offset)))
}

fn fallthrough(code: &MethodCode, instr: &DecodedInstr) -> LiftResult<Addr> {
    let next = instr.next_addr();
    if code.position_of(next).is_ok() {
        Ok(next)
    } else {
        Err(LiftError::bad_target(instr, instr.size() as i64))
    }
}

fn instruction_branching(
    code: &MethodCode,
    instr: &DecodedInstr,
) -> LiftResult<Vec<(Branch, Addr)>> {
    let family = match instr.opcode() {
        Some(opcode) => opcode.family(),
        None => return Ok(vec![]),
    };
    match (family, instr.offset) {
        (Family::Goto, Some(offset)) => Ok(vec![(Branch::Jmp, jump_target(code, instr, offset)?)]),
        (Family::If | Family::IfZ, Some(offset)) => Ok(vec![
            (Branch::IfTrue, jump_target(code, instr, offset)?),
            (Branch::IfFalse, fallthrough(code, instr)?),
        ]),
        (Family::Switch, Some(_)) => {
            let cases = instr
                .payload
                .as_ref()
                .ok_or_else(|| LiftError::malformed(instr, "missing switch payload"))?
                .cases();
            std::iter::once(Ok((Branch::SwitchDefault, fallthrough(code, instr)?)))
                .chain(cases.into_iter().map(|(key, offset)| {
                    jump_target(code, instr, offset).map(|dst| (Branch::Switch(key), dst))
                }))
                .collect()
        }
        _ => Ok(vec![]),
    }
}

fn instruction_catches(
    code: &MethodCode,
    pool: &dyn ConstantPool,
    instr: &DecodedInstr,
) -> LiftResult<Vec<(Branch, Addr)>> {
    if !instruction_can_throw(instr) {
        return Ok(vec![]);
    }
    let mut catches = Vec::new();
    for try_ in code.iter_tries().filter(|try_| try_.covers(instr.addr)) {
        for handler in try_.iter_handlers() {
            if code.position_of(handler.addr).is_err() {
                return Err(LiftError::bad_target(
                    instr,
                    instr.addr.distance_to(handler.addr),
                ));
            }
            let branch = match handler.exception {
                Some(exception) => Branch::Catch(pool.type_(exception)?.clone()),
                None => Branch::CatchAll,
            };
            catches.push((branch, handler.addr));
        }
    }
    Ok(catches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_bytecode::parse_assembly;

    const LOOP: &str = r#"
.class La/B;
.method static f(I)I
    .registers 3
    const/4 v0, 0x0
    :loop
    if-ge v0, p0, :done
    :try_start
    div-int/lit8 v1, p0, 0x2
    :try_end
    .catch Ljava/lang/ArithmeticException; {:try_start .. :try_end} :handler
    add-int/lit8 v0, v0, 0x1
    goto :loop
    :done
    return v0
    :handler
    move-exception v1
    throw v1
    :dead
    return v0
.end method
"#;

    #[test]
    fn blocks_and_edges() {
        let asm = parse_assembly(LOOP).unwrap();
        let code = &asm.methods[0];
        let cfg = Cfg::build(code, &asm.pool).unwrap();

        let starts: Vec<Addr> = cfg.iter_ordered_blocks().map(Block::start_addr).collect();
        assert_eq!(
            starts,
            vec![Addr(0), Addr(1), Addr(3), Addr(5), Addr(8), Addr(9), Addr(10), Addr(11)]
        );
        assert!(cfg.is_target(Addr(1)));
        assert!(cfg.is_target(Addr(9)));
        assert!(!cfg.is_target(Addr(5)));

        let div = cfg.node_ids[&Addr(3)];
        assert!(cfg.inner[div].can_throw());
        let branches: Vec<&Branch> = cfg.inner.edges(div).map(|e| e.weight()).collect();
        assert_eq!(branches.len(), 2);
        assert!(branches.contains(&&Branch::Sequence));
        assert!(branches
            .iter()
            .any(|b| matches!(b, Branch::Catch(Type::Class(name)) if name == "java/lang/ArithmeticException")));
    }

    #[test]
    fn reachability() {
        let asm = parse_assembly(LOOP).unwrap();
        let cfg = Cfg::build(&asm.methods[0], &asm.pool).unwrap();
        let reachable = cfg.reachable();
        assert!(reachable.contains(&Addr(9)));
        assert!(reachable.contains(&Addr(10)));
        assert!(!reachable.contains(&Addr(11)));
    }

    #[test]
    fn out_of_method_targets() {
        let text = r#"
.class La/B;
.method static f()V
    .registers 1
    const/4 v0, 0x0
.end method
"#;
        let asm = parse_assembly(text).unwrap();
        match Cfg::build(&asm.methods[0], &asm.pool) {
            Err(LiftError::BadTarget { addr, offset, .. }) => {
                assert_eq!(addr, Addr(0));
                assert_eq!(offset, 1);
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    #[test]
    fn dot_export() {
        let asm = parse_assembly(LOOP).unwrap();
        let cfg = Cfg::build(&asm.methods[0], &asm.pool).unwrap();
        let dot = cfg.to_dot().unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("color=orchid"));
        assert!(dot.contains("color=green"));
    }
}
