//! quadify: command-line triangle-to-quad conversion.
//!
//! Loads a mesh, selects every face, picks the edges to dissolve with the
//! integer-programming optimizer and writes the result.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=quadify=info` - Basic operation logging
//! - `RUST_LOG=quadify=debug` - Model sizes, run states, solver summaries
//! - `RUST_LOG=quadify::timing=info` - Performance timing
//! - `RUST_LOG=quadify::solver=trace` - Every branch-and-bound node
//!
//! # Example
//!
//! ```bash
//! # Convert with the default 1% gap and 60 s limit
//! quadify convert scan.obj -o scan_quads.obj
//!
//! # Prove optimality, but give up after 10 seconds
//! quadify -v convert scan.obj -o scan_quads.obj --gap 0 --time-limit 10
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{analyze, backends, convert};

/// quadify - Convert triangle pairs to quads by optimal edge selection.
#[derive(Parser)]
#[command(name = "quadify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge triangle pairs into quads and save the result
    Convert {
        /// Input mesh file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Relative optimality gap (0 proves optimality)
        #[arg(long)]
        gap: Option<f64>,

        /// Solver time limit in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Solver backend (branch-and-bound, highs)
        #[arg(long)]
        backend: Option<String>,

        /// Optimizer config file (.toml or .json); flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for backends with randomized heuristics
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Count candidate edges and constraints without solving
    Analyze {
        /// Input mesh file
        input: PathBuf,
    },

    /// List solver backends and whether this build provides them
    Backends,
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "quadify=info",
            2 => "quadify=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Convert {
            input,
            output,
            gap,
            time_limit,
            backend,
            config,
            seed,
        } => convert::run(
            input,
            output,
            &convert::SolverOverrides {
                gap: *gap,
                time_limit: *time_limit,
                backend: backend.as_deref(),
                config: config.as_deref(),
                seed: *seed,
                verbose: cli.verbose >= 2,
            },
            &cli,
        ),
        Commands::Analyze { input } => analyze::run(input, &cli),
        Commands::Backends => backends::run(&cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(quad_err) = e.downcast_ref::<quadify::QuadError>() {
                eprintln!("{}: {}", "Error".red().bold(), quad_err);
                eprintln!("  {}: {}", "Code".cyan(), quad_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    quad_err.recovery_suggestion()
                );
                if let Some(location) = quad_err.location() {
                    eprintln!("  {}: {}", "Location".yellow(), location);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
