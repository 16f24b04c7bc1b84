// SPDX-License-Identifier: BSD-3-Clause
//! Static detection of double-free, use-after-free, and null-pointer
//! dereference defects in a small typed SSA IR.
//!
//! The pipeline per function: a flow-insensitive points-to fixpoint, a
//! null-guard extraction pass over conditional branches, a forward
//! chaotic-iteration dataflow over a freshness × nullness lattice, and
//! three post-fixpoint checkers over the solved states.

pub mod analysis;
pub mod config;
pub mod ir;

pub use analysis::checks::{CheckKind, Warning};
pub use analysis::domain::{AbstractValue, Freshness, Nullness};
pub use analysis::pointer::{Address, PointerAnalysis, PointsToSet};
pub use analysis::{analyze_function, analyze_module, FunctionAnalysis, ModuleAnalysis};
pub use config::AnalysisConfig;
pub use ir::{
    Block, BlockName, Cfg, Function, FunctionName, InstLoc, Instruction, Module, Opcode, Operand,
    Parameter, Terminator, TypeKind, ValueName,
};
