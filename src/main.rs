// SPDX-License-Identifier: BSD-3-Clause
use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use heaplint::analysis::checks::CheckKind;
use heaplint::{analyze_module, AnalysisConfig, FunctionAnalysis, Module};

fn setup_global_subscriber() {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("heaplint=debug"));
    let fmt_layer = fmt::Layer::default().with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn selected(check: &cli::Check, kind: CheckKind) -> bool {
    matches!(
        (check, kind),
        (cli::Check::All, _)
            | (cli::Check::DoubleFree, CheckKind::DoubleFree)
            | (cli::Check::UseAfterFree, CheckKind::UseAfterFree)
            | (cli::Check::NullDeref, CheckKind::NullDeref)
    )
}

fn print_section(
    stdout: &mut impl Write,
    title: &str,
    warnings: &[heaplint::Warning],
) -> Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }
    writeln!(stdout, "{}", title)?;
    writeln!(stdout, "{}", "-".repeat(title.len()))?;
    for w in warnings {
        writeln!(stdout, "{}", w)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn print_debug(
    stdout: &mut impl Write,
    module: &Module,
    fa: &FunctionAnalysis,
) -> Result<()> {
    let function = module
        .get(&fa.function)
        .expect("analysis of unknown function");

    writeln!(stdout, "points-to")?;
    writeln!(stdout, "---------")?;
    for (name, set) in fa.pointer.facts() {
        write!(stdout, "{}: {{ ", name)?;
        for address in set {
            write!(stdout, "{}; ", address)?;
        }
        writeln!(stdout, "}}")?;
    }
    writeln!(stdout)?;

    writeln!(stdout, "nullness")?;
    writeln!(stdout, "--------")?;
    for (name, state) in fa.pointer.nullness_summary() {
        writeln!(stdout, "{}: {}", name, state)?;
    }
    writeln!(stdout)?;

    writeln!(stdout, "instruction states")?;
    writeln!(stdout, "------------------")?;
    for loc in function.locs() {
        writeln!(stdout, "{}", function.format_loc(loc))?;
        if let Some(memory) = fa.dataflow.memory_in(loc) {
            for (name, value) in memory {
                writeln!(stdout, "  {} {}", name, value)?;
            }
        }
    }
    writeln!(stdout)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    if args.tracing {
        setup_global_subscriber();
    }

    let config = if let Some(config_path) = &args.config {
        let config_string = std::fs::read_to_string(config_path)
            .context("Couldn't read analyzer configuration")?;
        serde_json::from_str(&config_string)
            .context("Couldn't deserialize analyzer configuration")?
    } else {
        AnalysisConfig::default()
    };

    let module_string = std::fs::read_to_string(&args.module).with_context(|| {
        format!("Couldn't read IR module at {}", args.module.display())
    })?;
    let module: Module = serde_json::from_str(&module_string).with_context(|| {
        format!("Couldn't deserialize IR module at {}", args.module.display())
    })?;

    let results = analyze_module(&module, &config);

    let mut total = 0usize;
    {
        let mut stdout = io::stdout().lock();
        for fa in &results.functions {
            let mut sections: Vec<(&str, &[heaplint::Warning])> = Vec::new();
            if selected(&args.check, CheckKind::DoubleFree) {
                sections.push(("double free", &fa.double_free));
            }
            if selected(&args.check, CheckKind::UseAfterFree) {
                sections.push(("use after free", &fa.use_after_free));
            }
            if selected(&args.check, CheckKind::NullDeref) {
                sections.push(("null dereference", &fa.null_deref));
            }
            let count: usize = sections.iter().map(|(_, w)| w.len()).sum();
            total += count;

            if !args.quiet && (count > 0 || args.debug) {
                writeln!(stdout, "{}", fa.function)?;
                writeln!(stdout, "{}", "=".repeat(fa.function.get().len() + 1))?;
                for (title, warnings) in sections {
                    print_section(&mut stdout, title, warnings)?;
                }
                if args.debug {
                    print_debug(&mut stdout, &module, fa)?;
                }
            }
        }

        if !args.quiet {
            for (name, error) in &results.skipped {
                writeln!(stdout, "skipped {}: {}", name, error)?;
            }
        }
    }

    if total > 0 {
        return Err(anyhow!("{} potential memory-safety defects", total));
    }

    Ok(())
}
