// SPDX-License-Identifier: BSD-3-Clause
//! Post-fixpoint checkers. Each is a pure predicate over the solved
//! dataflow states; warnings come out in linear IR order.

use std::collections::HashMap;

use crate::analysis::domain::Nullness;
use crate::analysis::engine::DataflowResult;
use crate::analysis::guards::NullGuards;
use crate::analysis::pointer::PointerAnalysis;
use crate::config::AnalysisConfig;
use crate::ir::{Function, InstLoc, Opcode, Operand, ValueName};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum CheckKind {
    DoubleFree,
    UseAfterFree,
    NullDeref,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::DoubleFree => write!(f, "double free"),
            CheckKind::UseAfterFree => write!(f, "use after free"),
            CheckKind::NullDeref => write!(f, "null dereference"),
        }
    }
}

/// One flagged instruction. Severity and suppression are the host's
/// concern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub kind: CheckKind,
    pub loc: InstLoc,
    /// The offending pointer operand.
    pub pointer: Operand,
    /// The flagged instruction, rendered.
    pub site: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "possible {} of {} at {}", self.kind, self.pointer, self.site)
    }
}

fn warning(kind: CheckKind, function: &Function, loc: InstLoc, pointer: &Operand) -> Warning {
    Warning {
        kind,
        loc,
        pointer: pointer.clone(),
        site: function.format_loc(loc),
    }
}

/// Accesses through an `alloca` result touch stack memory, which is always
/// valid and non-null; the slot's tracked state describes its contents, not
/// the slot itself. Such operands are exempt from the use and dereference
/// checks (`p = NULL` after `free(p)` is not a use-after-free).
fn is_stack_slot(defs: &HashMap<&ValueName, &crate::ir::Instruction>, op: &Operand) -> bool {
    op.name()
        .and_then(|name| defs.get(name))
        .map_or(false, |instr| matches!(instr.opcode, Opcode::Alloca(_)))
}

/// Flag every deallocation whose argument may already be freed.
pub fn double_free(
    function: &Function,
    dataflow: &DataflowResult,
    config: &AnalysisConfig,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for loc in function.locs() {
        let Some(instr) = function.instruction(loc) else {
            continue;
        };
        let Opcode::Call(call) = &instr.opcode else {
            continue;
        };
        if !config.is_deallocator(&call.callee) {
            continue;
        }
        let Some(arg) = call.args.first() else {
            continue;
        };
        if dataflow.operand_in(loc, arg).freshness.is_possibly_freed() {
            warnings.push(warning(CheckKind::DoubleFree, function, loc, arg));
        }
    }
    warnings
}

/// Flag loads, stores, and pointer arguments of non-deallocator calls
/// whose pointer may already be freed.
pub fn use_after_free(
    function: &Function,
    dataflow: &DataflowResult,
    config: &AnalysisConfig,
) -> Vec<Warning> {
    let defs = function.definitions();
    let mut warnings = Vec::new();
    for loc in function.locs() {
        let Some(instr) = function.instruction(loc) else {
            continue;
        };
        let pointer = match &instr.opcode {
            Opcode::Load(load) => Some(&load.pointer),
            Opcode::Store(store) => Some(&store.pointer),
            Opcode::Call(call) => {
                if config.is_deallocator(&call.callee) {
                    // The double-free checker owns this case.
                    None
                } else {
                    call.args.iter().find(|arg| {
                        arg.is_pointer()
                            && !is_stack_slot(&defs, arg)
                            && dataflow.operand_in(loc, arg).freshness.is_possibly_freed()
                    })
                }
            }
            _ => None,
        };
        let Some(pointer) = pointer else {
            continue;
        };
        if is_stack_slot(&defs, pointer) {
            continue;
        }
        if dataflow
            .operand_in(loc, pointer)
            .freshness
            .is_possibly_freed()
        {
            warnings.push(warning(CheckKind::UseAfterFree, function, loc, pointer));
        }
    }
    warnings
}

/// Flag dereferences (loads, stores, pointer-offset computations) through
/// a possibly-null pointer, after null-guard refinement.
pub fn null_deref(
    function: &Function,
    dataflow: &DataflowResult,
    pointer_analysis: &PointerAnalysis,
    guards: &NullGuards,
) -> Vec<Warning> {
    let defs = function.definitions();
    let mut warnings = Vec::new();
    for loc in function.locs() {
        let Some(instr) = function.instruction(loc) else {
            continue;
        };
        let dereferenced = match &instr.opcode {
            Opcode::Load(load) => Some(&load.pointer),
            Opcode::Store(store) => Some(&store.pointer),
            Opcode::Offset(offset) => Some(&offset.base),
            _ => None,
        };
        let Some(op) = dereferenced else {
            continue;
        };
        if is_stack_slot(&defs, op) {
            continue;
        }

        // Flow-sensitive state first; fall back to the flow-insensitive
        // classification when the dataflow has nothing on this name.
        let mut nullness = dataflow.operand_in(loc, op).nullness;
        if nullness == Nullness::Unknown {
            if let Some(name) = op.name() {
                nullness = pointer_analysis.nullness(name);
                if nullness == Nullness::Unknown && pointer_analysis.may_point_to_null(name) {
                    nullness = Nullness::MaybeNull;
                }
            }
        }
        if let Some(name) = op.name() {
            if guards.is_guarded(loc.block, name) && nullness != Nullness::Null {
                nullness = Nullness::NotNull;
            }
        }

        if nullness.is_possibly_null() {
            warnings.push(warning(CheckKind::NullDeref, function, loc, op));
        }
    }
    warnings
}
