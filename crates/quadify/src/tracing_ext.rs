//! Tracing extensions for quad conversion.
//!
//! Structured events are emitted under these targets:
//!
//! - `quadify::candidates`: candidate scan results
//! - `quadify::model`: program size and run state transitions
//! - `quadify::solver`: backend progress (node logging at trace, or debug
//!   with `SolverConfig::verbose`)
//! - `quadify::dissolve`: mesh edits
//! - `quadify::timing`: operation durations
//!
//! # Usage
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=quadify=debug for run state transitions
//! // RUST_LOG=quadify::solver=trace for every branch-and-bound node
//! ```

use crate::candidates::CandidateSet;
use crate::model::IntegerProgram;
use crate::optimizer::{Solution, SolutionStatus};
use crate::types::PolyMesh;
use std::time::Instant;
use tracing::{Span, debug, info};

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// use quadify::tracing_ext::OperationTimer;
///
/// fn expensive_operation() {
///     let _timer = OperationTimer::new("expensive_operation");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("quad_operation", operation = name);
        debug!(target: "quadify::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that records the candidate count.
    pub fn with_candidates(name: &'static str, candidates: usize) -> Self {
        let span = tracing::info_span!("quad_operation", operation = name, candidates);
        debug!(
            target: "quadify::timing",
            operation = name,
            candidates,
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "quadify::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log candidate scan statistics at debug level.
pub fn log_candidate_stats(candidates: &CandidateSet) {
    let total_length: f64 = candidates.iter().map(|c| c.length).sum();
    let mean_length = if candidates.is_empty() {
        0.0
    } else {
        total_length / candidates.len() as f64
    };

    debug!(
        target: "quadify::candidates",
        candidates = candidates.len(),
        contested_triangles = candidates.contested_triangle_count(),
        max_length = format!("{:.4}", candidates.max_length()),
        mean_length = format!("{:.4}", mean_length),
        "Candidate set"
    );
}

/// Log the size of an integer program at debug level.
pub fn log_model_stats(program: &IntegerProgram) {
    debug!(
        target: "quadify::model",
        variables = program.num_variables(),
        constraints = program.num_constraints(),
        nonzeros = program.num_nonzeros(),
        "Model built"
    );
}

/// Log an optimization result.
pub fn log_solution(solution: &Solution) {
    let stats = solution.stats();
    match solution.status() {
        SolutionStatus::Solved => info!(
            target: "quadify::model",
            backend = stats.backend,
            selected = solution.dissolve_count(),
            candidates = solution.decisions().len(),
            objective = format!("{:.4}", solution.objective()),
            gap = stats.gap.map(|g| format!("{:.4}", g)),
            nodes = stats.nodes,
            "Optimization solved"
        ),
        SolutionStatus::NoSolution => info!(
            target: "quadify::model",
            backend = stats.backend,
            solver_status = stats.solver_status.map(|s| s.as_str()),
            "Optimization did not find a solution"
        ),
        SolutionStatus::NoCandidates => info!(
            target: "quadify::model",
            "No valid triangle pairs found"
        ),
    }
}

/// Log mesh statistics at debug level.
pub fn log_mesh_stats(mesh: &PolyMesh, context: &str) {
    let stats = mesh.stats();
    debug!(
        target: "quadify::dissolve",
        context = context,
        vertices = stats.vertices,
        faces = stats.faces,
        triangles = stats.triangles,
        quads = stats.quads,
        ngons = stats.ngons,
        selected_faces = stats.selected_faces,
        "Mesh state"
    );
}
