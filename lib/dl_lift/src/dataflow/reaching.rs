//! Reaching definitions.
//!
//! The register model relies on this analysis to tell apart the values a
//! reused register holds: two reads of a register share a value exactly
//! when a common definition reaches both.

use crate::controlflow::Branch;
use crate::dataflow::AbstractForwardState;
use crate::errors::LiftError;
use dl_bytecode::instrs::DecodedInstr;
use dl_bytecode::opcodes::{Family, OperandKind};
use dl_bytecode::registers::{Reg, Width};
use dl_bytecode::Addr;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Where a register value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Site {
    /// Incoming argument, set up by the caller.
    Param,
    At(Addr),
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Param => write!(f, "param"),
            Self::At(addr) => write!(f, "@{addr}"),
        }
    }
}

/// Part of a definition held by one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Half {
    Narrow,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Def {
    pub site: Site,
    /// First register written by the definition.
    pub reg: Reg,
    pub half: Half,
}

/// The frame of the analyzed method.
#[derive(Debug, Clone)]
pub struct Frame {
    pub registers: u16,
    /// Registers holding incoming arguments, with their width.
    pub params: Vec<(Reg, Width)>,
}

/// Register written by an instruction, with the width of the written value.
///
/// Invokes and `filled-new-array` define nothing themselves: their result
/// is defined by the following `move-result*`.
#[must_use]
pub fn definition(instr: &DecodedInstr) -> Option<(Reg, Width)> {
    let opcode = instr.opcode()?;
    let dest = *instr.regs.first()?;
    let wide = match opcode.family() {
        Family::Move
        | Family::MoveResult
        | Family::Const
        | Family::Aget
        | Family::Iget
        | Family::Sget
        | Family::Neg
        | Family::Not
        | Family::Binop
        | Family::Binop2addr
        | Family::BinopLit => opcode.kind().map_or(false, OperandKind::is_wide),
        Family::Convert => opcode.target_kind().map_or(false, OperandKind::is_wide),
        Family::MoveException
        | Family::ConstString
        | Family::ConstClass
        | Family::CheckCast
        | Family::InstanceOf
        | Family::ArrayLength
        | Family::NewInstance
        | Family::NewArray
        | Family::Cmp => false,
        Family::Nop
        | Family::ReturnVoid
        | Family::Return
        | Family::MonitorEnter
        | Family::MonitorExit
        | Family::FilledNewArray
        | Family::FillArrayData
        | Family::Throw
        | Family::Goto
        | Family::Switch
        | Family::If
        | Family::IfZ
        | Family::Aput
        | Family::Iput
        | Family::Sput
        | Family::Invoke => return None,
    };
    Some((dest, if wide { Width::Wide } else { Width::Narrow }))
}

/// Definitions reaching a program point, per register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachingDefs {
    regs: Vec<BTreeSet<Def>>,
}

impl ReachingDefs {
    #[must_use]
    pub fn new(registers: u16) -> Self {
        Self {
            regs: vec![BTreeSet::new(); usize::from(registers)],
        }
    }

    /// Definitions whose value can be read from `reg` with the given width:
    /// narrow definitions, or wide ones whose both halves are still in place.
    #[must_use]
    pub fn readable(&self, reg: Reg, width: Width) -> Vec<Def> {
        let r = usize::from(reg.value());
        let Some(defs) = self.regs.get(r) else {
            return Vec::new();
        };
        match width {
            Width::Narrow => defs
                .iter()
                .filter(|d| d.half == Half::Narrow)
                .copied()
                .collect(),
            Width::Wide => {
                let high = match self.regs.get(r + 1) {
                    Some(high) => high,
                    None => return Vec::new(),
                };
                defs.iter()
                    .filter(|d| {
                        d.half == Half::Low
                            && high.contains(&Def {
                                half: Half::High,
                                ..**d
                            })
                    })
                    .copied()
                    .collect()
            }
        }
    }

    /// Checks if no definition at all reaches `reg`.
    #[must_use]
    pub fn is_undefined(&self, reg: Reg) -> bool {
        self.regs
            .get(usize::from(reg.value()))
            .map_or(true, BTreeSet::is_empty)
    }

    fn write(&mut self, site: Site, reg: Reg, width: Width) {
        let r = usize::from(reg.value());
        let slots = usize::from(width.slots());
        if r + slots > self.regs.len() {
            return;
        }
        // pairs partially overwritten are lost
        if r > 0 {
            self.regs[r - 1].retain(|d| d.half != Half::Low);
        }
        if let Some(after) = self.regs.get_mut(r + slots) {
            after.retain(|d| d.half != Half::High);
        }
        let def = |half| Def { site, reg, half };
        match width {
            Width::Narrow => {
                self.regs[r] = BTreeSet::from([def(Half::Narrow)]);
            }
            Width::Wide => {
                self.regs[r] = BTreeSet::from([def(Half::Low)]);
                self.regs[r + 1] = BTreeSet::from([def(Half::High)]);
            }
        }
    }
}

impl fmt::Display for ReachingDefs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (r, defs) in self.regs.iter().enumerate() {
            if defs.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "v{r}:")?;
            for def in defs {
                match def.half {
                    Half::Narrow => write!(f, " {}", def.site)?,
                    Half::Low => write!(f, " {}(lo)", def.site)?,
                    Half::High => write!(f, " {}(hi)", def.site)?,
                }
            }
        }
        Ok(())
    }
}

impl<'a> AbstractForwardState<'a> for ReachingDefs {
    type Context<'c> = Frame;
    type Error = LiftError;

    fn init(frame: &Frame) -> Result<Self, LiftError> {
        let mut state = Self::new(frame.registers);
        for (reg, width) in &frame.params {
            state.write(Site::Param, *reg, *width);
        }
        Ok(state)
    }

    fn join(&mut self, other: &Self, _frame: &Frame) -> Result<(), LiftError> {
        if self.regs.len() < other.regs.len() {
            self.regs.resize(other.regs.len(), BTreeSet::new());
        }
        for (mine, theirs) in self.regs.iter_mut().zip(other.regs.iter()) {
            mine.extend(theirs.iter().copied());
        }
        Ok(())
    }

    fn transfer_branch(&mut self, _branch: &Branch, _frame: &Frame) -> Result<(), LiftError> {
        Ok(())
    }

    fn transfer_instr(&mut self, instr: &DecodedInstr, _frame: &Frame) -> Result<(), LiftError> {
        if let Some((reg, width)) = definition(instr) {
            self.write(Site::At(instr.addr), reg, width);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlflow::Cfg;
    use crate::dataflow::forward;
    use dl_bytecode::parse_assembly;

    fn reg(r: u16) -> Reg {
        Reg::from(r)
    }

    #[test]
    fn pairs_are_broken_by_narrow_writes() {
        let mut state = ReachingDefs::new(4);
        state.write(Site::At(Addr(0)), reg(1), Width::Wide);
        assert_eq!(state.readable(reg(1), Width::Wide).len(), 1);
        assert!(state.readable(reg(1), Width::Narrow).is_empty());

        state.write(Site::At(Addr(2)), reg(2), Width::Narrow);
        assert!(state.readable(reg(1), Width::Wide).is_empty());
        assert!(state.is_undefined(reg(1)));
        assert_eq!(state.readable(reg(2), Width::Narrow).len(), 1);

        state.write(Site::At(Addr(4)), reg(0), Width::Wide);
        state.write(Site::At(Addr(6)), reg(0), Width::Narrow);
        assert!(state.is_undefined(reg(1)));
    }

    #[test]
    fn join_keeps_both_paths() {
        let frame = Frame {
            registers: 2,
            params: vec![(reg(1), Width::Narrow)],
        };
        let mut left = ReachingDefs::init(&frame).unwrap();
        let mut right = left.clone();
        left.write(Site::At(Addr(1)), reg(0), Width::Narrow);
        right.write(Site::At(Addr(3)), reg(0), Width::Narrow);
        left.join(&right, &frame).unwrap();
        let sites: Vec<Site> = left
            .readable(reg(0), Width::Narrow)
            .into_iter()
            .map(|d| d.site)
            .collect();
        assert_eq!(sites, vec![Site::At(Addr(1)), Site::At(Addr(3))]);
        assert_eq!(left.readable(reg(1), Width::Narrow)[0].site, Site::Param);
    }

    #[test]
    fn loop_fixpoint() {
        let text = r#"
.class La/B;
.method static f(I)I
    .registers 3
    const/4 v0, 0x0
    :loop
    if-ge v0, p0, :done
    add-int/lit8 v0, v0, 0x1
    goto :loop
    :done
    return v0
.end method
"#;
        let asm = parse_assembly(text).unwrap();
        let code = &asm.methods[0];
        let cfg = Cfg::build(code, &asm.pool).unwrap();
        let frame = Frame {
            registers: 3,
            params: vec![(reg(2), Width::Narrow)],
        };
        let dataflow = forward::<ReachingDefs>(&cfg, &frame).unwrap();
        // const/4 @0, if-ge @1, add-int/lit8 @3, goto @5, return @6
        let at_return = &dataflow.entries[&Addr(6)];
        let sites: Vec<Site> = at_return
            .readable(reg(0), Width::Narrow)
            .into_iter()
            .map(|d| d.site)
            .collect();
        assert_eq!(sites, vec![Site::At(Addr(0)), Site::At(Addr(3))]);
        assert_eq!(
            dataflow.entries[&Addr(1)].readable(reg(2), Width::Narrow)[0].site,
            Site::Param
        );
    }

    #[test]
    fn definitions() {
        let text = r#"
.class La/B;
.method static f(J)V
    .registers 6
    long-to-int v0, p0
    int-to-double v2, v0
    invoke-static {p0, p1}, La/B;->g(J)V
    cmp-long v1, p0, p0
    return-void
.end method
"#;
        let asm = parse_assembly(text).unwrap();
        let instrs = asm.methods[0].instructions();
        assert_eq!(definition(&instrs[0]), Some((reg(0), Width::Narrow)));
        assert_eq!(definition(&instrs[1]), Some((reg(2), Width::Wide)));
        assert_eq!(definition(&instrs[2]), None);
        assert_eq!(definition(&instrs[3]), Some((reg(1), Width::Narrow)));
        assert_eq!(definition(&instrs[4]), None);
    }
}
