//! The register file model.
//!
//! Maps the registers read and written by each instruction to provisional
//! values. A value is created per definition point (including incoming
//! arguments); every definition of a register opens a new generation of
//! it. Reads are resolved through the reaching definitions: when several
//! definitions reach a read, the first one is returned and the others are
//! reported as aliases to be merged by the caller. A read no definition of
//! the right width reaches opens a fresh generation, disjoint from all the
//! others.

use crate::dataflow::{ReachingDefs, Site};
use crate::ir::ValueId;
use dl_bytecode::registers::{Reg, Width};
use dl_bytecode::Addr;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProvisionalValue {
    pub reg: Reg,
    pub generation: usize,
    /// Definition point, `None` for reads of undefined registers.
    pub site: Option<Site>,
    pub width: Width,
}

/// A resolved register read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: ValueId,
    /// Values of the other definitions reaching the read.
    pub aliases: Vec<ValueId>,
}

#[derive(Debug)]
pub struct RegisterFile<'d> {
    states: &'d BTreeMap<Addr, ReachingDefs>,
    values: Vec<ProvisionalValue>,
    by_def: BTreeMap<(Site, Reg), ValueId>,
    generations: BTreeMap<Reg, usize>,
}

impl<'d> RegisterFile<'d> {
    /// Builds a register file over the states reaching every instruction.
    #[must_use]
    pub fn new(states: &'d BTreeMap<Addr, ReachingDefs>) -> Self {
        Self {
            states,
            values: Vec::new(),
            by_def: BTreeMap::new(),
            generations: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[ProvisionalValue] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&ProvisionalValue> {
        self.values.get(id.as_usize())
    }

    fn open(&mut self, reg: Reg, site: Option<Site>, width: Width) -> ValueId {
        let generation = self.generations.entry(reg).or_insert(0);
        let value = ProvisionalValue {
            reg,
            generation: *generation,
            site,
            width,
        };
        *generation += 1;
        let id = ValueId(self.values.len());
        self.values.push(value);
        id
    }

    fn value_of_def(&mut self, site: Site, reg: Reg, width: Width) -> ValueId {
        if let Some(id) = self.by_def.get(&(site, reg)) {
            return *id;
        }
        let id = self.open(reg, Some(site), width);
        self.by_def.insert((site, reg), id);
        id
    }

    /// Returns the value held by `reg` when read with the given width by
    /// the instruction at `addr`.
    pub fn resolve(&mut self, reg: Reg, addr: Addr, width: Width) -> Resolved {
        let defs = self
            .states
            .get(&addr)
            .map(|state| state.readable(reg, width))
            .unwrap_or_default();
        let mut values: Vec<ValueId> = defs
            .into_iter()
            .map(|def| self.value_of_def(def.site, def.reg, width))
            .collect();
        match values.first().copied() {
            Some(value) => Resolved {
                value,
                aliases: values.split_off(1),
            },
            None => {
                let value = self.open(reg, None, width);
                log::debug!(
                    "{reg} read at {addr} with no reaching {width} definition: fresh generation {}",
                    self.values[value.as_usize()].generation
                );
                Resolved {
                    value,
                    aliases: Vec::new(),
                }
            }
        }
    }

    /// Returns the value defined in `reg` by the instruction at `addr`.
    pub fn define(&mut self, reg: Reg, addr: Addr, width: Width) -> ValueId {
        self.value_of_def(Site::At(addr), reg, width)
    }

    /// Returns the value of an incoming argument.
    pub fn define_param(&mut self, reg: Reg, width: Width) -> ValueId {
        self.value_of_def(Site::Param, reg, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlflow::Cfg;
    use crate::dataflow::{forward, Frame};
    use dl_bytecode::parse_assembly;

    #[test]
    fn generations() {
        let text = r#"
.class La/B;
.method static f(Z)V
    .registers 4
    if-eqz p0, :other
    const/4 v0, 0x1
    goto :join
    :other
    const/4 v0, 0x2
    :join
    neg-int v1, v0
    new-instance v0, La/B;
    return-void
.end method
"#;
        let asm = parse_assembly(text).unwrap();
        let code = &asm.methods[0];
        let cfg = Cfg::build(code, &asm.pool).unwrap();
        let frame = Frame {
            registers: 4,
            params: vec![(Reg::from(3u16), Width::Narrow)],
        };
        let dataflow = forward::<ReachingDefs>(&cfg, &frame).unwrap();
        let mut regs = RegisterFile::new(&dataflow.entries);
        let v0 = Reg::from(0u16);

        // if-eqz @0, const/4 @2, goto @3, const/4 @4, neg-int @5
        let first = regs.define(v0, Addr(2), Width::Narrow);
        let read = regs.resolve(v0, Addr(5), Width::Narrow);
        assert_eq!(read.value, first);
        assert_eq!(read.aliases.len(), 1);
        let second = regs.define(v0, Addr(4), Width::Narrow);
        assert_eq!(read.aliases[0], second);
        assert_eq!(regs.value(second).unwrap().generation, 1);

        // a wide read of a narrow register, and a read of an undefined one
        let wide = regs.resolve(v0, Addr(5), Width::Wide);
        assert!(wide.aliases.is_empty());
        assert_eq!(regs.value(wide.value).unwrap().site, None);
        let undefined = regs.resolve(Reg::from(2u16), Addr(5), Width::Narrow);
        assert_ne!(undefined.value, wide.value);

        let param = regs.resolve(Reg::from(3u16), Addr(0), Width::Narrow);
        assert_eq!(param.value, regs.define_param(Reg::from(3u16), Width::Narrow));
        assert_eq!(regs.values().len(), 5);
    }
}
