// SPDX-License-Identifier: BSD-3-Clause
//! Flow-insensitive, Andersen-style points-to analysis with a derived
//! nullness classification per SSA name.
//!
//! Facts only ever grow, so the fixpoint terminates once the total fact
//! count and the nullness table stop changing.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::domain::Nullness;
use crate::config::AnalysisConfig;
use crate::ir::{instruction, Function, Opcode, Operand, ValueName};

/// An abstract memory location: either the distinguished null address or an
/// allocation site named after the instruction or parameter that introduced
/// it.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Address {
    Null,
    Site(ValueName),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Null => write!(f, "null"),
            Address::Site(name) => write!(f, "*{}", name),
        }
    }
}

pub type PointsToSet = BTreeSet<Address>;

pub struct PointerAnalysis {
    /// SSA name → addresses it may hold.
    points_to: BTreeMap<ValueName, PointsToSet>,
    /// Allocation site → addresses that may be stored in it.
    contents: BTreeMap<ValueName, PointsToSet>,
    nullness: BTreeMap<ValueName, Nullness>,
    max_depth: u32,
}

fn classify(set: &PointsToSet) -> Nullness {
    let has_null = set.contains(&Address::Null);
    let has_site = set.iter().any(|a| matches!(a, Address::Site(_)));
    match (has_null, has_site) {
        (true, false) => Nullness::Null,
        (false, true) => Nullness::NotNull,
        (true, true) => Nullness::MaybeNull,
        (false, false) => Nullness::Unknown,
    }
}

impl PointerAnalysis {
    /// Run the fixpoint over `function`.
    pub fn run(function: &Function, config: &AnalysisConfig) -> Self {
        let mut pa = PointerAnalysis {
            points_to: BTreeMap::new(),
            contents: BTreeMap::new(),
            nullness: BTreeMap::new(),
            max_depth: config.max_pointer_recursion_depth,
        };

        for p in &function.parameters {
            if p.ty.is_pointer() {
                pa.points_to
                    .entry(p.name.clone())
                    .or_default()
                    .insert(Address::Site(p.name.clone()));
            }
        }

        let mut old_facts = pa.fact_count();
        loop {
            for block in &function.blocks {
                for instr in &block.instrs {
                    pa.transfer(instr);
                }
            }
            let new_facts = pa.fact_count();
            let null_changed = pa.refresh_nullness();
            if new_facts == old_facts && !null_changed {
                break;
            }
            old_facts = new_facts;
        }
        tracing::debug!(
            function = %function.name,
            facts = old_facts,
            "points-to fixpoint reached"
        );
        pa
    }

    /// Addresses an operand may evaluate to.
    fn operand_targets(&self, op: &Operand) -> PointsToSet {
        match op {
            Operand::Null => [Address::Null].into_iter().collect(),
            Operand::Local { name, ty } if ty.is_pointer() => {
                self.points_to.get(name).cloned().unwrap_or_default()
            }
            _ => PointsToSet::new(),
        }
    }

    fn transfer(&mut self, instr: &instruction::Instruction) {
        match &instr.opcode {
            Opcode::Alloca(_) => {
                let Some(result) = instr.result.as_ref() else {
                    return;
                };
                self.points_to
                    .entry(result.clone())
                    .or_default()
                    .insert(Address::Site(result.clone()));
            }

            Opcode::Store(store) => {
                if !store.value.is_pointer() {
                    return;
                }
                let rhs = self.operand_targets(&store.value);
                let Some(pointer) = store.pointer.name() else {
                    return;
                };
                let lhs = self.points_to.get(pointer).cloned().unwrap_or_default();
                for target in lhs {
                    // Stores through the null address have no modeled cell.
                    if let Address::Site(site) = target {
                        self.contents.entry(site).or_default().extend(rhs.clone());
                    }
                }
            }

            Opcode::Load(load) => {
                if !instr.defines_pointer() {
                    return;
                }
                let result = instr.result.clone().unwrap();
                let Some(pointer) = load.pointer.name() else {
                    return;
                };
                let mut loaded = PointsToSet::new();
                if let Some(targets) = self.points_to.get(pointer) {
                    for target in targets {
                        if let Address::Site(site) = target {
                            if let Some(stored) = self.contents.get(site) {
                                loaded.extend(stored.iter().cloned());
                            }
                        }
                    }
                }
                self.points_to.entry(result).or_default().extend(loaded);
            }

            // Every pointer-returning call is modeled as a fresh abstract
            // cell; freshness is the dataflow engine's concern.
            Opcode::Call(_) => {
                if instr.defines_pointer() {
                    let result = instr.result.clone().unwrap();
                    self.points_to
                        .entry(result.clone())
                        .or_default()
                        .insert(Address::Site(result));
                }
            }

            Opcode::Cast(cast) => {
                if instr.defines_pointer() {
                    let targets = self.operand_targets(&cast.operand);
                    self.points_to
                        .entry(instr.result.clone().unwrap())
                        .or_default()
                        .extend(targets);
                }
            }

            Opcode::Offset(offset) => {
                if instr.defines_pointer() {
                    let targets = self.operand_targets(&offset.base);
                    self.points_to
                        .entry(instr.result.clone().unwrap())
                        .or_default()
                        .extend(targets);
                }
            }

            Opcode::Phi(phi) => {
                if !instr.defines_pointer() {
                    return;
                }
                let mut merged = PointsToSet::new();
                for (incoming, _) in &phi.incoming {
                    if incoming.is_pointer() {
                        merged.extend(self.operand_targets(incoming));
                    }
                }
                self.points_to
                    .entry(instr.result.clone().unwrap())
                    .or_default()
                    .extend(merged);
            }

            Opcode::Compare(_) | Opcode::Binary(_) | Opcode::Other => {}
        }
    }

    fn fact_count(&self) -> usize {
        self.points_to.values().map(BTreeSet::len).sum::<usize>()
            + self.contents.values().map(BTreeSet::len).sum::<usize>()
    }

    /// Recompute the nullness table; true if any entry changed.
    fn refresh_nullness(&mut self) -> bool {
        let mut changed = false;
        for (name, set) in &self.points_to {
            let state = classify(set);
            if self.nullness.get(name) != Some(&state) {
                self.nullness.insert(name.clone(), state);
                changed = true;
            }
        }
        changed
    }

    pub fn points_to(&self, name: &ValueName) -> Option<&PointsToSet> {
        self.points_to.get(name)
    }

    pub fn nullness(&self, name: &ValueName) -> Nullness {
        self.nullness.get(name).copied().unwrap_or_default()
    }

    /// True iff the two names' points-to sets intersect.
    pub fn alias(&self, a: &ValueName, b: &ValueName) -> bool {
        match (self.points_to.get(a), self.points_to.get(b)) {
            (Some(sa), Some(sb)) => sa.intersection(sb).next().is_some(),
            _ => false,
        }
    }

    /// Transitive variant of the nullness query: does `name` reach the null
    /// address through at most `max_pointer_recursion_depth` loads?
    pub fn may_point_to_null(&self, name: &ValueName) -> bool {
        match self.points_to.get(name) {
            Some(set) => self.set_reaches_null(set, self.max_depth),
            None => false,
        }
    }

    fn set_reaches_null(&self, set: &PointsToSet, depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        for address in set {
            match address {
                Address::Null => return true,
                Address::Site(site) => {
                    if let Some(stored) = self.contents.get(site) {
                        if self.set_reaches_null(stored, depth - 1) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Final points-to facts in name order, for debug printing.
    pub fn facts(&self) -> impl Iterator<Item = (&ValueName, &PointsToSet)> {
        self.points_to.iter()
    }

    /// Final nullness classifications in name order.
    pub fn nullness_summary(&self) -> impl Iterator<Item = (&ValueName, Nullness)> {
        self.nullness.iter().map(|(name, state)| (name, *state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        instruction::{Cast, Instruction, Load, Store},
        Block, Parameter, Terminator, TypeKind,
    };

    fn run(instrs: Vec<Instruction>, parameters: Vec<Parameter>) -> PointerAnalysis {
        let f = Function {
            name: "test".into(),
            parameters,
            blocks: vec![Block {
                name: "entry".into(),
                instrs,
                terminator: Terminator::ret(None),
            }],
        };
        assert_eq!(Ok(()), f.validate());
        PointerAnalysis::run(&f, &AnalysisConfig::default())
    }

    #[test]
    fn argument_gets_unique_site() {
        let pa = run(vec![], vec![Parameter::pointer("p")]);
        let set = pa.points_to(&"p".into()).unwrap();
        assert_eq!(1, set.len());
        assert!(set.contains(&Address::Site("p".into())));
        assert_eq!(Nullness::NotNull, pa.nullness(&"p".into()));
    }

    #[test]
    fn store_null_then_load_is_null() {
        // slot = alloca; *slot = null; x = load slot
        let pa = run(
            vec![
                Instruction::new(
                    Some("slot".into()),
                    TypeKind::Pointer,
                    Opcode::Alloca(instruction::Alloca {
                        allocated: TypeKind::Pointer,
                    }),
                ),
                Instruction::new(
                    None,
                    TypeKind::Scalar,
                    Opcode::Store(Store {
                        value: Operand::Null,
                        pointer: Operand::pointer("slot"),
                    }),
                ),
                Instruction::new(
                    Some("x".into()),
                    TypeKind::Pointer,
                    Opcode::Load(Load {
                        pointer: Operand::pointer("slot"),
                    }),
                ),
            ],
            vec![],
        );
        assert_eq!(Nullness::NotNull, pa.nullness(&"slot".into()));
        assert_eq!(Nullness::Null, pa.nullness(&"x".into()));
        assert!(pa.may_point_to_null(&"slot".into()));
    }

    #[test]
    fn casts_alias_their_operand() {
        let pa = run(
            vec![Instruction::new(
                Some("q".into()),
                TypeKind::Pointer,
                Opcode::Cast(Cast {
                    operand: Operand::pointer("p"),
                }),
            )],
            vec![Parameter::pointer("p")],
        );
        assert!(pa.alias(&"p".into(), &"q".into()));
        assert!(!pa.alias(&"p".into(), &"r".into()));
    }

    #[test]
    fn stores_through_aliases_merge() {
        // q = cast p; *p = a; x = load q  -- x sees a's site
        let pa = run(
            vec![
                Instruction::new(
                    Some("q".into()),
                    TypeKind::Pointer,
                    Opcode::Cast(Cast {
                        operand: Operand::pointer("p"),
                    }),
                ),
                Instruction::new(
                    None,
                    TypeKind::Scalar,
                    Opcode::Store(Store {
                        value: Operand::pointer("a"),
                        pointer: Operand::pointer("p"),
                    }),
                ),
                Instruction::new(
                    Some("x".into()),
                    TypeKind::Pointer,
                    Opcode::Load(Load {
                        pointer: Operand::pointer("q"),
                    }),
                ),
            ],
            vec![Parameter::pointer("p"), Parameter::pointer("a")],
        );
        assert!(pa
            .points_to(&"x".into())
            .unwrap()
            .contains(&Address::Site("a".into())));
        assert!(pa.alias(&"x".into(), &"a".into()));
    }
}
