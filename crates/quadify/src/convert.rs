//! End-to-end triangle-to-quad conversion of a mesh selection.

use crate::candidates::find_candidates;
use crate::dissolve::{DissolveReport, apply_solution};
use crate::error::QuadResult;
use crate::optimizer::{QuadOptimizer, SolutionStatus, SolveStats};
use crate::tracing_ext::{OperationTimer, log_candidate_stats};
use crate::types::PolyMesh;
use tracing::info;

/// What happened to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// No selected triangle pair could be merged. Mesh unchanged.
    NoCandidates,
    /// The solver found no selection. Mesh unchanged.
    NoSolution,
    /// This many edges were dissolved.
    Dissolved { edges: usize },
}

impl std::fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionOutcome::NoCandidates => write!(f, "No valid triangle pairs found."),
            ConversionOutcome::NoSolution => write!(f, "Optimization did not find a solution."),
            ConversionOutcome::Dissolved { edges } => write!(f, "{} edges dissolved.", edges),
        }
    }
}

/// Result of [`convert_tris_to_quads`].
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub outcome: ConversionOutcome,
    /// Candidate edges found in the selection.
    pub candidates: usize,
    /// Objective of the applied selection, 0 when nothing was applied.
    pub objective: f64,
    pub solve: SolveStats,
    pub dissolve: DissolveReport,
}

impl ConversionReport {
    /// Edges dissolved, 0 unless the outcome is `Dissolved`.
    pub fn edges_dissolved(&self) -> usize {
        match self.outcome {
            ConversionOutcome::Dissolved { edges } => edges,
            _ => 0,
        }
    }
}

/// Find candidates in the selection, optimize, and dissolve the chosen edges.
///
/// The mesh is only modified when the solver produced a selection. Solver
/// errors are returned before any mutation.
pub fn convert_tris_to_quads(
    mesh: &mut PolyMesh,
    optimizer: &QuadOptimizer,
) -> QuadResult<ConversionReport> {
    let _timer = OperationTimer::new("tris_to_quads");

    let candidates = find_candidates(mesh);
    log_candidate_stats(&candidates);

    let solution = optimizer.optimize(&candidates)?;
    let faces = mesh.stats().faces;
    let untouched = DissolveReport {
        faces_before: faces,
        faces_after: faces,
        triangles_remaining: mesh.triangle_count(),
        ..DissolveReport::default()
    };

    let (outcome, dissolve) = match solution.status() {
        SolutionStatus::NoCandidates => (ConversionOutcome::NoCandidates, untouched),
        SolutionStatus::NoSolution => (ConversionOutcome::NoSolution, untouched),
        SolutionStatus::Solved => {
            let report = apply_solution(mesh, &solution)?;
            (
                ConversionOutcome::Dissolved {
                    edges: report.edges_dissolved,
                },
                report,
            )
        }
    };

    info!(target: "quadify::dissolve", candidates = candidates.len(), "{}", outcome);

    Ok(ConversionReport {
        outcome,
        candidates: candidates.len(),
        objective: if dissolve.edges_dissolved > 0 {
            solution.objective()
        } else {
            0.0
        },
        solve: solution.stats().clone(),
        dissolve,
    })
}

impl PolyMesh {
    /// Convert selected triangle pairs to quads with the given optimizer.
    ///
    /// See [`convert_tris_to_quads`].
    pub fn tris_to_quads(&mut self, optimizer: &QuadOptimizer) -> QuadResult<ConversionReport> {
        convert_tris_to_quads(self, optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuadError;
    use crate::model::IntegerProgram;
    use crate::progress::CancellationToken;
    use crate::solver::{MipSolver, SolverConfig, SolverOutput, SolverStatus};
    use crate::types::RegionReader;
    use nalgebra::Point3;
    use std::sync::Arc;
    use std::time::Duration;

    fn make_split_square() -> PolyMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        PolyMesh::from_triangles(vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    #[derive(Debug)]
    struct NoIncumbent;

    impl MipSolver for NoIncumbent {
        fn name(&self) -> &'static str {
            "none"
        }

        fn solve(
            &self,
            _program: &IntegerProgram,
            _config: &SolverConfig,
            _cancel: &CancellationToken,
        ) -> QuadResult<SolverOutput> {
            Ok(SolverOutput {
                status: SolverStatus::TimeLimit,
                values: None,
                objective: 0.0,
                best_bound: 1.0,
                nodes: 0,
                elapsed: Duration::ZERO,
            })
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl MipSolver for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn solve(
            &self,
            _program: &IntegerProgram,
            _config: &SolverConfig,
            _cancel: &CancellationToken,
        ) -> QuadResult<SolverOutput> {
            Err(QuadError::solver_failure("broken", "license expired"))
        }
    }

    #[test]
    fn test_convert_split_square() {
        let mut mesh = make_split_square();
        let report = mesh.tris_to_quads(&QuadOptimizer::default()).unwrap();
        assert_eq!(report.outcome, ConversionOutcome::Dissolved { edges: 1 });
        assert_eq!(report.candidates, 1);
        assert_eq!(report.edges_dissolved(), 1);
        assert!((report.objective - 1.1).abs() < 1e-9);
        assert_eq!(mesh.quad_count(), 1);
        assert_eq!(report.outcome.to_string(), "1 edges dissolved.");
    }

    #[test]
    fn test_no_candidates_message() {
        let mut mesh = make_split_square();
        mesh.deselect_all();
        let report = mesh.tris_to_quads(&QuadOptimizer::default()).unwrap();
        assert_eq!(report.outcome, ConversionOutcome::NoCandidates);
        assert_eq!(report.outcome.to_string(), "No valid triangle pairs found.");
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_no_solution_leaves_mesh() {
        let mut mesh = make_split_square();
        let optimizer = QuadOptimizer::with_solver(Arc::new(NoIncumbent));
        let report = mesh.tris_to_quads(&optimizer).unwrap();
        assert_eq!(report.outcome, ConversionOutcome::NoSolution);
        assert_eq!(
            report.outcome.to_string(),
            "Optimization did not find a solution."
        );
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(report.dissolve.faces_after, 2);
    }

    #[test]
    fn test_solver_failure_aborts_without_mutation() {
        let mut mesh = make_split_square();
        let optimizer = QuadOptimizer::with_solver(Arc::new(Broken));
        let err = mesh.tris_to_quads(&optimizer).unwrap_err();
        assert!(err.is_solver_error());
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.face_selected(0));
    }
}
