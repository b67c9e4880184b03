//! quadify backends command - list solver backends.

use anyhow::Result;
use colored::Colorize;
use quadify::SolverBackend;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct BackendInfo {
    name: &'static str,
    available: bool,
    default: bool,
}

pub fn run(cli: &Cli) -> Result<()> {
    let backends: Vec<BackendInfo> = SolverBackend::ALL
        .iter()
        .map(|b| BackendInfo {
            name: b.name(),
            available: b.is_available(),
            default: *b == SolverBackend::default(),
        })
        .collect();

    match cli.format {
        OutputFormat::Json => output::print(&backends, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Solver Backends".bold().underline());
                for b in &backends {
                    let status = if b.available {
                        "available".green()
                    } else {
                        "not compiled in".yellow()
                    };
                    let marker = if b.default { " (default)" } else { "" };
                    println!("  {}{}: {}", b.name.cyan(), marker, status);
                }
            }
        }
    }

    Ok(())
}
