// SPDX-License-Identifier: BSD-3-Clause
use std::collections::BTreeSet;

/// Tunables for the analyses. Deserialized from JSON by the host; every
/// field falls back to its default when absent.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Call targets whose pointer-typed result is a fresh live allocation.
    pub allocator_names: BTreeSet<String>,
    /// Call targets that deallocate their first argument.
    pub deallocator_names: BTreeSet<String>,
    /// Cap on how deeply the transitive may-point-to-null query follows
    /// points-to chains through loads.
    pub max_pointer_recursion_depth: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            allocator_names: ["malloc", "calloc", "realloc"]
                .into_iter()
                .map(String::from)
                .collect(),
            deallocator_names: ["free"].into_iter().map(String::from).collect(),
            max_pointer_recursion_depth: 3,
        }
    }
}

impl AnalysisConfig {
    pub fn is_allocator(&self, name: &crate::ir::FunctionName) -> bool {
        self.allocator_names.contains(name.get())
    }

    pub fn is_deallocator(&self, name: &crate::ir::FunctionName) -> bool {
        self.deallocator_names.contains(name.get())
    }
}
