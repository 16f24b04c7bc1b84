// SPDX-License-Identifier: BSD-3-Clause
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Check {
    All,
    DoubleFree,
    UseAfterFree,
    NullDeref,
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::All => write!(f, "all"),
            Check::DoubleFree => write!(f, "double-free"),
            Check::UseAfterFree => write!(f, "use-after-free"),
            Check::NullDeref => write!(f, "null-deref"),
        }
    }
}

/// Memory-safety analysis for SSA IR modules
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Which checker's warnings to report
    #[arg(long, default_value_t = Check::All)]
    pub check: Check,

    /// Print per-function points-to facts, nullness, and instruction states
    #[arg(long)]
    pub debug: bool,

    /// Quiet
    #[arg(long)]
    pub quiet: bool,

    /// IR module (JSON)
    #[arg()]
    pub module: PathBuf,

    /// Analyzer configuration (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tracing
    #[arg(long)]
    pub tracing: bool,
}
