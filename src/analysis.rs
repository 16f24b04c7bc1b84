// SPDX-License-Identifier: BSD-3-Clause
//! The per-function analysis pipeline: points-to fixpoint, null-guard
//! extraction, dataflow fixpoint, then the three checkers. Functions are
//! analyzed independently; nothing persists between them.

pub mod checks;
pub mod domain;
pub mod engine;
pub mod guards;
pub mod pointer;

use crate::config::AnalysisConfig;
use crate::ir::{self, Cfg, Function, FunctionName, Module};

use checks::Warning;
use engine::{DataflowEngine, DataflowResult};
use guards::NullGuards;
use pointer::PointerAnalysis;

/// Everything the analysis produced for one function: the warning sets
/// plus the solved intermediate state for debugging output.
pub struct FunctionAnalysis {
    pub function: FunctionName,
    pub double_free: Vec<Warning>,
    pub use_after_free: Vec<Warning>,
    pub null_deref: Vec<Warning>,
    pub pointer: PointerAnalysis,
    pub dataflow: DataflowResult,
}

impl FunctionAnalysis {
    pub fn warning_count(&self) -> usize {
        self.double_free.len() + self.use_after_free.len() + self.null_deref.len()
    }
}

/// Run the whole pipeline on one function.
pub fn analyze_function(
    function: &Function,
    config: &AnalysisConfig,
) -> Result<FunctionAnalysis, ir::Error> {
    function.validate()?;
    let cfg = Cfg::new(function);

    let pointer = PointerAnalysis::run(function, config);
    let guards = NullGuards::extract(function, &cfg);
    let dataflow = DataflowEngine::new(function, &cfg, &pointer, &guards, config).solve();

    let double_free = checks::double_free(function, &dataflow, config);
    let use_after_free = checks::use_after_free(function, &dataflow, config);
    let null_deref = checks::null_deref(function, &dataflow, &pointer, &guards);

    Ok(FunctionAnalysis {
        function: function.name.clone(),
        double_free,
        use_after_free,
        null_deref,
        pointer,
        dataflow,
    })
}

pub struct ModuleAnalysis {
    pub functions: Vec<FunctionAnalysis>,
    /// Functions rejected as malformed, with the reason.
    pub skipped: Vec<(FunctionName, ir::Error)>,
}

impl ModuleAnalysis {
    pub fn warning_count(&self) -> usize {
        self.functions.iter().map(FunctionAnalysis::warning_count).sum()
    }
}

/// Analyze every function in the module. A malformed function is logged
/// and skipped; the rest of the module is still analyzed.
pub fn analyze_module(module: &Module, config: &AnalysisConfig) -> ModuleAnalysis {
    let mut functions = Vec::with_capacity(module.functions.len());
    let mut skipped = Vec::new();
    for function in &module.functions {
        match analyze_function(function, config) {
            Ok(analysis) => functions.push(analysis),
            Err(error) => {
                tracing::warn!(function = %function.name, %error, "skipping function");
                skipped.push((function.name.clone(), error));
            }
        }
    }
    ModuleAnalysis { functions, skipped }
}
