// SPDX-License-Identifier: BSD-3-Clause
//! Extraction of block-local non-null facts from explicit null-comparison
//! branches. These refine the flow-insensitive nullness information on
//! block entry.

use std::collections::{HashMap, HashSet};

use crate::ir::{
    instruction::Predicate, Cfg, Function, Opcode, Operand, TerminatorOpcode, ValueName,
};

/// A recognized null check: `cmp = icmp eq/ne p, null; br cmp, then, else`.
struct NullCheck<'f> {
    tested: &'f ValueName,
    /// True for `== null`, false for `!= null`.
    is_eq: bool,
}

fn null_check_of<'f>(
    defs: &HashMap<&'f ValueName, &'f crate::ir::Instruction>,
    condition: &Operand,
) -> Option<NullCheck<'f>> {
    let instr = defs.get(condition.name()?)?;
    let Opcode::Compare(cmp) = &instr.opcode else {
        return None;
    };
    let is_eq = match cmp.predicate {
        Predicate::Eq => true,
        Predicate::Ne => false,
        Predicate::Other => return None,
    };
    let tested = match (&cmp.lhs, &cmp.rhs) {
        (Operand::Null, other) | (other, Operand::Null) if other.is_pointer() => other.name()?,
        _ => return None,
    };
    Some(NullCheck { tested, is_eq })
}

/// Per-basic-block sets of SSA names known `NotNull` on entry.
pub struct NullGuards {
    guarded: Vec<HashSet<ValueName>>,
}

impl NullGuards {
    pub fn extract(function: &Function, cfg: &Cfg) -> Self {
        let defs = function.definitions();

        // Guards carried by individual CFG edges. Only the edge on which
        // the comparison proves the pointer non-null gets the fact.
        let mut edge_guards: HashMap<(usize, usize), HashSet<ValueName>> = HashMap::new();
        for (b, block) in function.blocks.iter().enumerate() {
            let TerminatorOpcode::CondBr(br) = &block.terminator.opcode else {
                continue;
            };
            // A degenerate conditional branch reaches its target either way.
            if br.then_dest == br.else_dest {
                continue;
            }
            let Some(check) = null_check_of(&defs, &br.condition) else {
                continue;
            };
            let dest = if check.is_eq {
                &br.else_dest
            } else {
                &br.then_dest
            };
            if let Some(target) = cfg.block_index(dest) {
                edge_guards
                    .entry((b, target))
                    .or_default()
                    .insert(check.tested.clone());
            }
        }

        // A name is guarded on entry only when every predecessor edge
        // establishes it, either by its own comparison or because the
        // predecessor was already guarded. Sets only grow, so this
        // converges.
        let mut guarded: Vec<HashSet<ValueName>> = vec![HashSet::new(); function.blocks.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for b in 0..function.blocks.len() {
                let preds = cfg.block_preds(b);
                if preds.is_empty() {
                    continue;
                }
                let mut incoming: Option<HashSet<ValueName>> = None;
                for &p in preds {
                    let mut along_edge = guarded[p].clone();
                    if let Some(extra) = edge_guards.get(&(p, b)) {
                        along_edge.extend(extra.iter().cloned());
                    }
                    incoming = Some(match incoming {
                        None => along_edge,
                        Some(acc) => acc.intersection(&along_edge).cloned().collect(),
                    });
                }
                for name in incoming.unwrap_or_default() {
                    if guarded[b].insert(name) {
                        changed = true;
                    }
                }
            }
        }

        NullGuards { guarded }
    }

    pub fn guarded(&self, block: usize) -> &HashSet<ValueName> {
        &self.guarded[block]
    }

    pub fn is_guarded(&self, block: usize, name: &ValueName) -> bool {
        self.guarded[block].contains(name)
    }
}
