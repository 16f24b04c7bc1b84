// SPDX-License-Identifier: BSD-3-Clause
//! Forward chaotic-iteration dataflow over the freshness × nullness
//! product lattice. Alias queries against the points-to result propagate
//! deallocation across may-aliases.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexSet;

use crate::analysis::domain::{AbstractValue, Freshness, Nullness};
use crate::analysis::guards::NullGuards;
use crate::analysis::pointer::PointerAnalysis;
use crate::config::AnalysisConfig;
use crate::ir::{Cfg, Function, InstLoc, Instruction, Opcode, Operand, ValueName};

/// Abstract memory: SSA name → abstract value. Missing names read as the
/// lattice bottom.
pub type AbstractMemory = BTreeMap<ValueName, AbstractValue>;

fn get(memory: &AbstractMemory, name: &ValueName) -> AbstractValue {
    memory.get(name).copied().unwrap_or_default()
}

/// Evaluate an operand against a memory. The null constant reads as
/// definitely-null with no freshness information.
pub(crate) fn operand_value(memory: &AbstractMemory, op: &Operand) -> AbstractValue {
    match op {
        Operand::Local { name, .. } => get(memory, name),
        Operand::Null => AbstractValue::new(Freshness::Uninit, Nullness::Null),
        _ => AbstractValue::bottom(),
    }
}

/// Join `other` into `memory`, key by key.
fn join_into(memory: &mut AbstractMemory, other: &AbstractMemory) {
    for (name, value) in other {
        let merged = get(memory, name).join(*value);
        memory.insert(name.clone(), merged);
    }
}

/// Memory equality with missing keys reading as bottom.
fn memory_equal(a: &AbstractMemory, b: &AbstractMemory) -> bool {
    a.iter().all(|(name, v)| get(b, name) == *v) && b.iter().all(|(name, v)| get(a, name) == *v)
}

/// Walk back through cast and offset chains to the underlying value; if
/// that value is a load, its pointer operand is the slot whose freshness a
/// deallocation updates. This is what tracks `free(cast(load p))` back to
/// the stack slot `p`.
fn base_slot(defs: &HashMap<&ValueName, &Instruction>, op: &Operand) -> Option<ValueName> {
    let mut name = op.name()?;
    loop {
        match defs.get(name).map(|i| &i.opcode) {
            Some(Opcode::Cast(c)) => name = c.operand.name()?,
            Some(Opcode::Offset(o)) => name = o.base.name()?,
            Some(Opcode::Load(l)) => return l.pointer.name().cloned(),
            _ => return None,
        }
    }
}

/// Per-instruction solved states.
pub struct DataflowResult {
    in_map: HashMap<InstLoc, AbstractMemory>,
    out_map: HashMap<InstLoc, AbstractMemory>,
}

impl DataflowResult {
    pub fn value_in(&self, loc: InstLoc, name: &ValueName) -> AbstractValue {
        self.in_map.get(&loc).map(|m| get(m, name)).unwrap_or_default()
    }

    pub fn value_out(&self, loc: InstLoc, name: &ValueName) -> AbstractValue {
        self.out_map.get(&loc).map(|m| get(m, name)).unwrap_or_default()
    }

    pub fn memory_in(&self, loc: InstLoc) -> Option<&AbstractMemory> {
        self.in_map.get(&loc)
    }

    pub fn memory_out(&self, loc: InstLoc) -> Option<&AbstractMemory> {
        self.out_map.get(&loc)
    }

    /// Evaluate an operand against the in-state of `loc`.
    pub fn operand_in(&self, loc: InstLoc, op: &Operand) -> AbstractValue {
        match self.in_map.get(&loc) {
            Some(memory) => operand_value(memory, op),
            None => operand_value(&AbstractMemory::new(), op),
        }
    }
}

pub struct DataflowEngine<'f> {
    function: &'f Function,
    cfg: &'f Cfg<'f>,
    pointer: &'f PointerAnalysis,
    guards: &'f NullGuards,
    config: &'f AnalysisConfig,
    defs: HashMap<&'f ValueName, &'f Instruction>,
    pointer_names: Vec<&'f ValueName>,
    in_map: HashMap<InstLoc, AbstractMemory>,
    out_map: HashMap<InstLoc, AbstractMemory>,
    warned_unknown: bool,
}

impl<'f> DataflowEngine<'f> {
    pub fn new(
        function: &'f Function,
        cfg: &'f Cfg<'f>,
        pointer: &'f PointerAnalysis,
        guards: &'f NullGuards,
        config: &'f AnalysisConfig,
    ) -> Self {
        DataflowEngine {
            function,
            cfg,
            pointer,
            guards,
            config,
            defs: function.definitions(),
            pointer_names: function.pointer_names(),
            in_map: HashMap::new(),
            out_map: HashMap::new(),
            warned_unknown: false,
        }
    }

    /// Drain the worklist to the least fixpoint.
    pub fn solve(mut self) -> DataflowResult {
        let mut worklist: IndexSet<InstLoc> = self.function.locs().collect();

        while let Some(loc) = worklist.pop() {
            let in_mem = self.flow_in(loc);
            let out_mem = self.transfer(loc, &in_mem);
            self.in_map.insert(loc, in_mem);

            let old_out = self.out_map.get(&loc);
            if old_out.map_or(true, |old| !memory_equal(old, &out_mem)) {
                self.out_map.insert(loc, out_mem);
                for succ in self.cfg.loc_succs(loc) {
                    worklist.insert(succ);
                }
            }
        }

        DataflowResult {
            in_map: self.in_map,
            out_map: self.out_map,
        }
    }

    /// Join predecessor out-states, seed entry locations with the pointer
    /// arguments, then apply the block's null-guard refinement.
    fn flow_in(&self, loc: InstLoc) -> AbstractMemory {
        let mut in_mem = AbstractMemory::new();
        let preds = self.cfg.loc_preds(loc);
        if preds.is_empty() {
            for p in &self.function.parameters {
                if p.ty.is_pointer() {
                    in_mem.insert(
                        p.name.clone(),
                        AbstractValue::new(Freshness::Live, self.pointer.nullness(&p.name)),
                    );
                }
            }
        } else {
            for pred in preds {
                if let Some(out) = self.out_map.get(&pred) {
                    join_into(&mut in_mem, out);
                }
            }
        }

        for name in self.guards.guarded(loc.block) {
            let value = get(&in_mem, name);
            if matches!(value.nullness, Nullness::Unknown | Nullness::MaybeNull) {
                in_mem.insert(name.clone(), value.with_nullness(Nullness::NotNull));
            }
        }
        in_mem
    }

    fn transfer(&mut self, loc: InstLoc, in_mem: &AbstractMemory) -> AbstractMemory {
        let mut out = in_mem.clone();
        let Some(instr) = self.function.instruction(loc) else {
            // Terminators have no modeled effect on memory.
            return out;
        };

        match &instr.opcode {
            Opcode::Call(call) if self.config.is_allocator(&call.callee) => {
                if instr.defines_pointer() {
                    out.insert(
                        instr.result.clone().unwrap(),
                        AbstractValue::new(Freshness::Live, Nullness::NotNull),
                    );
                }
            }

            Opcode::Call(call) if self.config.is_deallocator(&call.callee) => {
                let Some(arg) = call.args.first() else {
                    return out;
                };
                let prev = operand_value(in_mem, arg);
                let freshness = match prev.freshness {
                    Freshness::MaybeFreed => Freshness::MaybeFreed,
                    _ => Freshness::Freed,
                };
                if let Some(name) = arg.name() {
                    out.insert(name.clone(), AbstractValue::new(freshness, prev.nullness));

                    // Aggressive may-alias propagation: everything that may
                    // share an address with the freed pointer is now freed.
                    for &q in &self.pointer_names {
                        if q != name && self.pointer.alias(name, q) {
                            let nullness = get(in_mem, q).nullness;
                            out.insert(q.clone(), AbstractValue::new(Freshness::Freed, nullness));
                        }
                    }
                }
                if let Some(slot) = base_slot(&self.defs, arg) {
                    let nullness = get(in_mem, &slot).nullness;
                    out.insert(slot, AbstractValue::new(Freshness::Freed, nullness));
                }
            }

            // Results of unmodeled calls could have been freed already.
            Opcode::Call(_) => {
                if instr.defines_pointer() {
                    out.insert(
                        instr.result.clone().unwrap(),
                        AbstractValue::new(Freshness::MaybeFreed, Nullness::Unknown),
                    );
                }
            }

            Opcode::Phi(phi) => {
                if instr.defines_pointer() {
                    let mut joined = AbstractValue::bottom();
                    for (incoming, _) in &phi.incoming {
                        joined = joined.join(operand_value(in_mem, incoming));
                    }
                    out.insert(instr.result.clone().unwrap(), joined);
                }
            }

            Opcode::Cast(cast) => {
                if instr.defines_pointer() {
                    out.insert(
                        instr.result.clone().unwrap(),
                        operand_value(in_mem, &cast.operand),
                    );
                }
            }

            Opcode::Offset(offset) => {
                if instr.defines_pointer() {
                    out.insert(
                        instr.result.clone().unwrap(),
                        operand_value(in_mem, &offset.base),
                    );
                }
            }

            Opcode::Load(load) => {
                if instr.defines_pointer() {
                    out.insert(
                        instr.result.clone().unwrap(),
                        operand_value(in_mem, &load.pointer),
                    );
                }
            }

            Opcode::Store(store) => {
                if store.value.is_pointer() {
                    if let Some(pointer) = store.pointer.name() {
                        let slot = get(in_mem, pointer);
                        let stored = if store.value.is_null() {
                            AbstractValue::new(slot.freshness, Nullness::Null)
                        } else {
                            operand_value(in_mem, &store.value)
                        };
                        out.insert(pointer.clone(), slot.join(stored));
                    }
                }
            }

            Opcode::Alloca(_) | Opcode::Compare(_) | Opcode::Binary(_) => {}

            Opcode::Other => {
                if !self.warned_unknown {
                    self.warned_unknown = true;
                    tracing::warn!(
                        function = %self.function.name,
                        at = %self.function.format_loc(loc),
                        "unmodeled opcode, treating as identity"
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        instruction::{Call, Cast, Load},
        Block, Terminator, TypeKind,
    };

    fn solve(f: &Function) -> DataflowResult {
        assert_eq!(Ok(()), f.validate());
        let config = AnalysisConfig::default();
        let cfg = Cfg::new(f);
        let pointer = PointerAnalysis::run(f, &config);
        let guards = NullGuards::extract(f, &cfg);
        DataflowEngine::new(f, &cfg, &pointer, &guards, &config).solve()
    }

    fn call(result: Option<&str>, callee: &str, args: Vec<Operand>) -> Instruction {
        Instruction::new(
            result.map(Into::into),
            TypeKind::Pointer,
            Opcode::Call(Call {
                callee: callee.into(),
                args,
            }),
        )
    }

    #[test]
    fn allocation_is_live_and_not_null() {
        let f = Function {
            name: "f".into(),
            parameters: vec![],
            blocks: vec![Block {
                name: "entry".into(),
                instrs: vec![call(Some("r"), "malloc", vec![Operand::Int(4)])],
                terminator: Terminator::ret(None),
            }],
        };
        let result = solve(&f);
        let after = InstLoc { block: 0, index: 0 };
        assert_eq!(
            AbstractValue::new(Freshness::Live, Nullness::NotNull),
            result.value_out(after, &"r".into())
        );
    }

    #[test]
    fn free_marks_argument_freed() {
        let f = Function {
            name: "f".into(),
            parameters: vec![],
            blocks: vec![Block {
                name: "entry".into(),
                instrs: vec![
                    call(Some("r"), "malloc", vec![Operand::Int(4)]),
                    call(None, "free", vec![Operand::pointer("r")]),
                ],
                terminator: Terminator::ret(None),
            }],
        };
        let result = solve(&f);
        let free_loc = InstLoc { block: 0, index: 1 };
        assert_eq!(
            Freshness::Live,
            result.value_in(free_loc, &"r".into()).freshness
        );
        assert_eq!(
            Freshness::Freed,
            result.value_out(free_loc, &"r".into()).freshness
        );
    }

    #[test]
    fn free_through_cast_recovers_slot() {
        // slot = alloca; store r, slot; raw = load slot; c = cast raw; free(c)
        let f = Function {
            name: "f".into(),
            parameters: vec![],
            blocks: vec![Block {
                name: "entry".into(),
                instrs: vec![
                    Instruction::new(
                        Some("slot".into()),
                        TypeKind::Pointer,
                        Opcode::Alloca(crate::ir::instruction::Alloca {
                            allocated: TypeKind::Pointer,
                        }),
                    ),
                    call(Some("r"), "malloc", vec![Operand::Int(4)]),
                    Instruction::new(
                        None,
                        TypeKind::Scalar,
                        Opcode::Store(crate::ir::instruction::Store {
                            value: Operand::pointer("r"),
                            pointer: Operand::pointer("slot"),
                        }),
                    ),
                    Instruction::new(
                        Some("raw".into()),
                        TypeKind::Pointer,
                        Opcode::Load(Load {
                            pointer: Operand::pointer("slot"),
                        }),
                    ),
                    Instruction::new(
                        Some("c".into()),
                        TypeKind::Pointer,
                        Opcode::Cast(Cast {
                            operand: Operand::pointer("raw"),
                        }),
                    ),
                    call(None, "free", vec![Operand::pointer("c")]),
                ],
                terminator: Terminator::ret(None),
            }],
        };
        let result = solve(&f);
        let free_loc = InstLoc { block: 0, index: 5 };
        assert_eq!(
            Freshness::Freed,
            result.value_out(free_loc, &"slot".into()).freshness
        );
        assert_eq!(
            Freshness::Freed,
            result.value_out(free_loc, &"c".into()).freshness
        );
    }

    #[test]
    fn unknown_call_result_is_conservative() {
        let f = Function {
            name: "f".into(),
            parameters: vec![],
            blocks: vec![Block {
                name: "entry".into(),
                instrs: vec![call(Some("r"), "opaque_source", vec![])],
                terminator: Terminator::ret(None),
            }],
        };
        let result = solve(&f);
        assert_eq!(
            AbstractValue::new(Freshness::MaybeFreed, Nullness::Unknown),
            result.value_out(InstLoc { block: 0, index: 0 }, &"r".into())
        );
    }
}
