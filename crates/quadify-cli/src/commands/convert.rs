//! quadify convert command - merge triangle pairs into quads.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use quadify::{ConversionOutcome, OptimizerConfig, PolyMesh, SolverBackend};
use serde::Serialize;
use tracing::debug;

use crate::{Cli, OutputFormat, output};

/// Solver settings given on the command line.
pub struct SolverOverrides<'a> {
    pub gap: Option<f64>,
    pub time_limit: Option<f64>,
    pub backend: Option<&'a str>,
    pub config: Option<&'a Path>,
    pub seed: Option<u64>,
    pub verbose: bool,
}

#[derive(Serialize)]
struct ConvertResult {
    input: String,
    output: String,
    outcome: String,
    backend: &'static str,
    candidates: usize,
    edges_dissolved: usize,
    objective: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    solver_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gap: Option<f64>,
    nodes: u64,
    solve_ms: f64,
    faces_before: usize,
    faces_after: usize,
    triangles_remaining: usize,
}

/// Merge the file's config (if any) with the flags.
fn resolve_config(overrides: &SolverOverrides<'_>) -> Result<OptimizerConfig> {
    let mut config = match overrides.config {
        Some(path) => OptimizerConfig::from_file(path).with_context(|| {
            format!("Failed to load optimizer config from {:?}", path)
        })?,
        None => OptimizerConfig::default(),
    };

    if let Some(name) = overrides.backend {
        config.backend = name.parse::<SolverBackend>()?;
    }
    if let Some(gap) = overrides.gap {
        config.solver.relative_gap = gap;
    }
    if let Some(seconds) = overrides.time_limit {
        config.solver.time_limit = seconds;
    }
    if let Some(seed) = overrides.seed {
        config.solver.seed = seed;
    }
    config.solver.verbose |= overrides.verbose;
    Ok(config)
}

pub fn run(
    input: &Path,
    output_path: &Path,
    overrides: &SolverOverrides<'_>,
    cli: &Cli,
) -> Result<()> {
    let config = resolve_config(overrides)?;
    debug!(?config, "Resolved optimizer config");
    let optimizer = config.build_optimizer()?;

    let mut mesh =
        PolyMesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;
    mesh.select_all();

    let report = mesh.tris_to_quads(&optimizer)?;

    mesh.save(output_path)
        .with_context(|| format!("Failed to save mesh to {:?}", output_path))?;

    let result = ConvertResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        outcome: report.outcome.to_string(),
        backend: optimizer.solver_name(),
        candidates: report.candidates,
        edges_dissolved: report.edges_dissolved(),
        objective: report.objective,
        solver_status: report.solve.solver_status.map(|s| s.to_string()),
        gap: report.solve.gap,
        nodes: report.solve.nodes,
        solve_ms: report.solve.elapsed.as_secs_f64() * 1000.0,
        faces_before: report.dissolve.faces_before,
        faces_after: report.dissolve.faces_after,
        triangles_remaining: report.dissolve.triangles_remaining,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            match report.outcome {
                ConversionOutcome::Dissolved { edges } => output::success(
                    &format!("Dissolved {} edges, wrote {}", edges, output_path.display()),
                    cli.format,
                    cli.quiet,
                ),
                _ => output::info(
                    &format!("{} Mesh written unchanged.", report.outcome),
                    cli.format,
                    cli.quiet,
                ),
            }
            println!("  {}: {}", "Backend".cyan(), result.backend);
            println!("  {}: {}", "Candidates".cyan(), result.candidates);
            if let Some(status) = &result.solver_status {
                println!("  {}: {}", "Solver status".cyan(), status);
            }
            if let Some(gap) = result.gap {
                println!("  {}: {:.3}%", "Gap".cyan(), gap * 100.0);
            }
            println!(
                "  {}: {} nodes in {:.1} ms",
                "Search".cyan(),
                result.nodes,
                result.solve_ms
            );
            println!(
                "  {}: {} → {} ({} triangles left)",
                "Faces".cyan(),
                result.faces_before,
                result.faces_after,
                result.triangles_remaining
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_overrides() -> SolverOverrides<'static> {
        SolverOverrides {
            gap: None,
            time_limit: None,
            backend: None,
            config: None,
            seed: None,
            verbose: false,
        }
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = resolve_config(&no_overrides()).unwrap();
        assert_eq!(config, OptimizerConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[solver]\nrelative_gap = 0.2\ntime_limit = 30.0").unwrap();

        let overrides = SolverOverrides {
            gap: Some(0.0),
            config: Some(file.path()),
            ..no_overrides()
        };
        let config = resolve_config(&overrides).unwrap();
        assert_eq!(config.solver.relative_gap, 0.0);
        assert_eq!(config.solver.time_limit, 30.0);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let overrides = SolverOverrides {
            backend: Some("gurobi"),
            ..no_overrides()
        };
        let err = resolve_config(&overrides).unwrap_err();
        assert!(err.downcast_ref::<quadify::QuadError>().is_some());
    }
}
