//! Triangle-to-quad conversion by optimal edge selection.
//!
//! Converting a triangulated region to quads means removing diagonals: every
//! removed edge merges the two triangles on either side into one quad. A
//! triangle can take part in at most one merge, so the choice of edges is a
//! matching problem. This crate solves it as a 0/1 integer program instead of
//! picking edges greedily, which maximizes the number of quads produced and,
//! among equally good selections, prefers the longer diagonals.
//!
//! # Pipeline
//!
//! 1. [`find_candidates`] scans a selected region through the
//!    [`RegionReader`] trait and collects the edges shared by exactly two
//!    selected triangles.
//! 2. [`QuadOptimizer`] builds the program (one binary variable per
//!    candidate, one `<= 1` constraint per triangle touched by several
//!    candidates) and solves it with a [`MipSolver`] backend.
//! 3. [`apply_solution`] dissolves the chosen edges on a [`PolyMesh`] and
//!    selects the faces that are still not quads.
//!
//! [`convert_tris_to_quads`] runs all three steps.
//!
//! # Quick Start
//!
//! ```no_run
//! use quadify::{PolyMesh, QuadOptimizer};
//!
//! let mut mesh = PolyMesh::load("triangulated.obj").unwrap();
//! let report = mesh.tris_to_quads(&QuadOptimizer::default()).unwrap();
//! println!("{}", report.outcome);
//! mesh.save("quads.obj").unwrap();
//! ```
//!
//! # Solver backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | [`SolverBackend::BranchAndBound`] | always | Pure Rust, `microlp` relaxations |
//! | [`SolverBackend::Highs`] | `highs` | Native HiGHS library |
//!
//! Both honor [`SolverConfig::relative_gap`] and [`SolverConfig::time_limit`].
//! When a limit stops the search, the best selection found so far is used.
//!
//! # Background runs
//!
//! [`OptimizationTask`] runs a solve on a worker thread and can be polled and
//! cancelled, for hosts that must keep an event loop responsive.
//!
//! # Logging
//!
//! All operations emit [`tracing`] events under the `quadify::*` targets.
//! Install any subscriber to see them; see [`tracing_ext`] for helpers.

mod builder;
mod candidates;
#[cfg(feature = "config")]
mod config;
mod convert;
mod dissolve;
mod error;
mod model;
mod optimizer;
mod task;
mod types;

pub mod io;
pub mod progress;
pub mod solver;
pub mod tracing_ext;

pub use builder::QuadOptimizerBuilder;
pub use candidates::{CandidateEdge, CandidateSet, eligible_faces, find_candidates, variable_name};
#[cfg(feature = "config")]
pub use config::OptimizerConfig;
pub use convert::{ConversionOutcome, ConversionReport, convert_tris_to_quads};
pub use dissolve::{DissolveReport, apply_solution, merge_triangles};
pub use error::{ErrorCode, MeshLocation, QuadError, QuadResult, RecoverySuggestion};
pub use model::{
    Constraint, FEASIBILITY_TOLERANCE, IntegerProgram, ProgramBlock, SELECTION_THRESHOLD,
    Variable, objective_weight, round_selection,
};
pub use optimizer::{EdgeDecision, QuadOptimizer, Solution, SolutionStatus, SolveStats};
pub use progress::{CancellationToken, Progress, ProgressCallback};
pub use solver::{MipSolver, SolverBackend, SolverConfig, SolverOutput, SolverStatus};
pub use task::OptimizationTask;
pub use types::{Edge, EdgeId, Face, FaceId, MeshStats, PolyMesh, RegionReader};

use std::path::Path;

impl PolyMesh {
    /// Load a mesh, detecting the format from the extension.
    ///
    /// All faces are selected after loading.
    pub fn load(path: impl AsRef<Path>) -> QuadResult<Self> {
        io::load_mesh(path.as_ref())
    }

    /// Save the mesh, detecting the format from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> QuadResult<()> {
        io::save_mesh(self, path.as_ref())
    }
}
