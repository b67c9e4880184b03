//! quadify analyze command - report the pairing problem without solving it.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use quadify::{IntegerProgram, PolyMesh, find_candidates};
use serde::Serialize;

use crate::{Cli, OutputFormat};

#[derive(Serialize)]
struct AnalyzeResult {
    path: String,
    vertices: usize,
    faces: usize,
    triangles: usize,
    quads: usize,
    ngons: usize,
    candidates: usize,
    contested_triangles: usize,
    variables: usize,
    constraints: usize,
    /// Independent sub-programs the solver searches separately.
    blocks: usize,
    /// Merges possible if no triangle were contested.
    upper_bound: usize,
}

pub fn run(input: &Path, cli: &Cli) -> Result<()> {
    let mut mesh =
        PolyMesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;
    mesh.select_all();

    let stats = mesh.stats();
    let candidates = find_candidates(&mesh);
    let program = IntegerProgram::from_candidates(&candidates);

    let result = AnalyzeResult {
        path: input.display().to_string(),
        vertices: stats.vertices,
        faces: stats.faces,
        triangles: stats.triangles,
        quads: stats.quads,
        ngons: stats.ngons,
        candidates: candidates.len(),
        contested_triangles: candidates.contested_triangle_count(),
        variables: program.num_variables(),
        constraints: program.num_constraints(),
        blocks: program.split_components().len(),
        upper_bound: candidates.len().min(stats.triangles / 2),
    };

    match cli.format {
        OutputFormat::Json => {
            crate::output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Pairing Analysis".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!(
                    "  {}: {} ({} triangles, {} quads, {} n-gons)",
                    "Faces".cyan(),
                    result.faces,
                    result.triangles,
                    result.quads,
                    result.ngons
                );
                println!("  {}: {}", "Candidate edges".cyan(), result.candidates);
                println!(
                    "  {}: {}",
                    "Contested triangles".cyan(),
                    result.contested_triangles
                );
                println!(
                    "  {}: {} variables, {} constraints, {} blocks",
                    "Program".cyan(),
                    result.variables,
                    result.constraints,
                    result.blocks
                );
                println!("  {}: {}", "Max quads".cyan(), result.upper_bound);
            }
        }
    }

    Ok(())
}
