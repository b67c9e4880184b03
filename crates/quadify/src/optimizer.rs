//! Optimal edge selection for triangle pairing.
//!
//! [`QuadOptimizer`] turns a [`CandidateSet`] into an [`IntegerProgram`],
//! hands it to a [`MipSolver`] and maps the values back onto edges. A run
//! moves through `Built -> Solving -> {Solved, NoSolution, Failed}` and logs
//! each transition at debug level under `quadify::model`. There are no
//! retries and no heuristic fallback: a solver error aborts the run.
//!
//! # Example
//!
//! ```
//! use quadify::{PolyMesh, QuadOptimizer, SolutionStatus, find_candidates};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = PolyMesh::from_triangles(vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! let candidates = find_candidates(&mesh);
//! let solution = QuadOptimizer::default().optimize(&candidates).unwrap();
//! assert_eq!(solution.status(), SolutionStatus::Solved);
//! assert_eq!(solution.selected_edge_ids(), vec![mesh.find_edge(0, 2).unwrap()]);
//! ```

use crate::builder::QuadOptimizerBuilder;
use crate::candidates::{CandidateEdge, CandidateSet};
use crate::error::{QuadError, QuadResult};
use crate::model::{IntegerProgram, SELECTION_THRESHOLD};
use crate::progress::CancellationToken;
use crate::solver::{BranchAndBoundSolver, MipSolver, SolverBackend, SolverConfig, SolverStatus};
use crate::tracing_ext::{OperationTimer, log_model_stats, log_solution};
use crate::types::EdgeId;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// A feasible selection was found (optimal, within gap, or best at the
    /// limit).
    Solved,
    /// The solver ended without any feasible selection.
    NoSolution,
    /// There were no candidate edges; nothing was solved.
    NoCandidates,
}

impl SolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionStatus::Solved => "solved",
            SolutionStatus::NoSolution => "no solution",
            SolutionStatus::NoCandidates => "no candidates",
        }
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a candidate edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDecision {
    Dissolve,
    Keep,
}

/// Solver statistics attached to a [`Solution`].
#[derive(Debug, Clone, Default)]
pub struct SolveStats {
    /// Backend name, empty when no solve ran.
    pub backend: &'static str,
    /// Raw solver status, `None` when no solve ran.
    pub solver_status: Option<SolverStatus>,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub nodes: u64,
    pub best_bound: f64,
    /// Relative gap of the returned selection, when there is one.
    pub gap: Option<f64>,
    pub elapsed: Duration,
}

/// Immutable result of an optimization run.
#[derive(Debug, Clone)]
pub struct Solution {
    status: SolutionStatus,
    decisions: Vec<(CandidateEdge, EdgeDecision)>,
    objective: f64,
    stats: SolveStats,
}

impl Solution {
    fn without_selection(
        status: SolutionStatus,
        candidates: &CandidateSet,
        stats: SolveStats,
    ) -> Self {
        Self {
            status,
            decisions: candidates
                .iter()
                .map(|c| (*c, EdgeDecision::Keep))
                .collect(),
            objective: 0.0,
            stats,
        }
    }

    #[inline]
    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    #[inline]
    pub fn is_solved(&self) -> bool {
        self.status == SolutionStatus::Solved
    }

    /// Per-candidate decisions, in candidate order.
    #[inline]
    pub fn decisions(&self) -> &[(CandidateEdge, EdgeDecision)] {
        &self.decisions
    }

    /// Candidates chosen for dissolution.
    pub fn selected(&self) -> impl Iterator<Item = &CandidateEdge> + '_ {
        self.decisions
            .iter()
            .filter(|(_, d)| *d == EdgeDecision::Dissolve)
            .map(|(c, _)| c)
    }

    /// Ids of the edges to dissolve, ascending. Empty unless solved.
    pub fn selected_edge_ids(&self) -> Vec<EdgeId> {
        self.selected().map(|c| c.edge).collect()
    }

    /// Number of edges to dissolve.
    pub fn dissolve_count(&self) -> usize {
        self.selected().count()
    }

    /// Objective value of the selection.
    #[inline]
    pub fn objective(&self) -> f64 {
        self.objective
    }

    #[inline]
    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }
}

/// Selects which candidate edges to dissolve.
///
/// Holds the solver and its settings; it has no per-run state, so one
/// optimizer can serve many runs and threads.
#[derive(Debug, Clone)]
pub struct QuadOptimizer {
    solver: Arc<dyn MipSolver>,
    config: SolverConfig,
}

impl Default for QuadOptimizer {
    /// Built-in branch and bound with default limits.
    fn default() -> Self {
        Self::with_solver(Arc::new(BranchAndBoundSolver::new()))
    }
}

impl QuadOptimizer {
    /// Optimizer using a backend from the factory.
    ///
    /// Fails with [`QuadError::SolverUnavailable`] when the backend is not
    /// compiled in.
    pub fn with_backend(backend: SolverBackend) -> QuadResult<Self> {
        Ok(Self::with_solver(backend.create()?))
    }

    /// Optimizer using an injected solver.
    pub fn with_solver(solver: Arc<dyn MipSolver>) -> Self {
        Self {
            solver,
            config: SolverConfig::default(),
        }
    }

    /// Start a fluent builder.
    pub fn builder() -> QuadOptimizerBuilder {
        QuadOptimizerBuilder::new()
    }

    /// Replace the solver settings.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    #[inline]
    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Choose edges to dissolve. Blocks until the solver stops.
    pub fn optimize(&self, candidates: &CandidateSet) -> QuadResult<Solution> {
        self.optimize_with_cancel(candidates, &CancellationToken::new())
    }

    /// Like [`optimize`](Self::optimize), but stops early when `cancel`
    /// fires, keeping the best selection found so far.
    pub fn optimize_with_cancel(
        &self,
        candidates: &CandidateSet,
        cancel: &CancellationToken,
    ) -> QuadResult<Solution> {
        self.config.validate()?;

        if candidates.is_empty() {
            let solution = Solution::without_selection(
                SolutionStatus::NoCandidates,
                candidates,
                SolveStats::default(),
            );
            log_solution(&solution);
            return Ok(solution);
        }

        let _timer = OperationTimer::with_candidates("optimize", candidates.len());

        let program = IntegerProgram::from_candidates(candidates);
        log_model_stats(&program);
        debug!(target: "quadify::model", state = "built", backend = self.solver.name());

        debug!(
            target: "quadify::model",
            state = "solving",
            gap = self.config.relative_gap,
            time_limit = self.config.time_limit
        );
        let output = match self.solver.solve(&program, &self.config, cancel) {
            Ok(output) => output,
            Err(e) => {
                debug!(target: "quadify::model", state = "failed", error = %e);
                return Err(e);
            }
        };

        let mut stats = SolveStats {
            backend: self.solver.name(),
            solver_status: Some(output.status),
            num_variables: program.num_variables(),
            num_constraints: program.num_constraints(),
            nodes: output.nodes,
            best_bound: output.best_bound,
            gap: output.gap(),
            elapsed: output.elapsed,
        };

        let values = match output.values {
            Some(values) if output.status != SolverStatus::Infeasible => values,
            _ => {
                debug!(
                    target: "quadify::model",
                    state = "no_solution",
                    solver_status = %output.status
                );
                stats.gap = None;
                let solution =
                    Solution::without_selection(SolutionStatus::NoSolution, candidates, stats);
                log_solution(&solution);
                return Ok(solution);
            }
        };

        if values.len() != candidates.len() {
            let err = QuadError::solver_failure(
                self.solver.name(),
                format!(
                    "returned {} values for {} variables",
                    values.len(),
                    candidates.len()
                ),
            );
            debug!(target: "quadify::model", state = "failed", error = %err);
            return Err(err);
        }

        let selected: Vec<bool> = values.iter().map(|&x| x > SELECTION_THRESHOLD).collect();
        if !program.is_feasible_selection(&selected) {
            let err = QuadError::solver_failure(
                self.solver.name(),
                "returned a selection that merges a triangle twice",
            );
            debug!(target: "quadify::model", state = "failed", error = %err);
            return Err(err);
        }

        let decisions = candidates
            .iter()
            .zip(&selected)
            .map(|(c, &s)| {
                let decision = if s {
                    EdgeDecision::Dissolve
                } else {
                    EdgeDecision::Keep
                };
                (*c, decision)
            })
            .collect();

        let solution = Solution {
            status: SolutionStatus::Solved,
            decisions,
            objective: program.evaluate_selection(&selected),
            stats,
        };
        debug!(
            target: "quadify::model",
            state = "solved",
            selected = solution.dissolve_count()
        );
        log_solution(&solution);
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverOutput;

    fn candidate(edge: EdgeId, a: usize, b: usize, length: f64) -> CandidateEdge {
        CandidateEdge {
            edge,
            faces: [a, b],
            length,
        }
    }

    /// Strip of four triangles joined by three diagonals.
    fn strip() -> CandidateSet {
        CandidateSet::from_candidates(vec![
            candidate(10, 0, 1, 1.0),
            candidate(11, 1, 2, 1.0),
            candidate(12, 2, 3, 1.0),
        ])
    }

    /// Solver returning a fixed output.
    #[derive(Debug)]
    struct FixedSolver(SolverOutput);

    impl MipSolver for FixedSolver {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn solve(
            &self,
            _program: &IntegerProgram,
            _config: &SolverConfig,
            _cancel: &CancellationToken,
        ) -> QuadResult<SolverOutput> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct FailingSolver;

    impl MipSolver for FailingSolver {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(
            &self,
            _program: &IntegerProgram,
            _config: &SolverConfig,
            _cancel: &CancellationToken,
        ) -> QuadResult<SolverOutput> {
            Err(QuadError::solver_failure("failing", "crashed"))
        }
    }

    fn output(status: SolverStatus, values: Option<Vec<f64>>) -> SolverOutput {
        SolverOutput {
            status,
            values,
            objective: 0.0,
            best_bound: 0.0,
            nodes: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_no_candidates_skips_solver() {
        let optimizer = QuadOptimizer::with_solver(Arc::new(FailingSolver));
        let solution = optimizer.optimize(&CandidateSet::default()).unwrap();
        assert_eq!(solution.status(), SolutionStatus::NoCandidates);
        assert!(solution.selected_edge_ids().is_empty());
        assert!(solution.stats().solver_status.is_none());
    }

    #[test]
    fn test_strip_selects_outer_pair() {
        let solution = QuadOptimizer::default()
            .with_config(SolverConfig::exact())
            .optimize(&strip())
            .unwrap();
        assert_eq!(solution.status(), SolutionStatus::Solved);
        assert_eq!(solution.selected_edge_ids(), vec![10, 12]);
        assert!((solution.objective() - 2.2).abs() < 1e-9);
        assert_eq!(solution.decisions()[1].1, EdgeDecision::Keep);
        assert_eq!(solution.stats().backend, "branch-and-bound");
        assert_eq!(solution.stats().num_constraints, 2);
    }

    #[test]
    fn test_threshold_extraction() {
        let solver = FixedSolver(output(SolverStatus::GapLimit, Some(vec![0.51, 0.49, 0.9])));
        let solution = QuadOptimizer::with_solver(Arc::new(solver))
            .optimize(&strip())
            .unwrap();
        assert_eq!(solution.status(), SolutionStatus::Solved);
        assert_eq!(solution.selected_edge_ids(), vec![10, 12]);
    }

    #[test]
    fn test_no_incumbent_is_no_solution() {
        let solver = FixedSolver(output(SolverStatus::TimeLimit, None));
        let solution = QuadOptimizer::with_solver(Arc::new(solver))
            .optimize(&strip())
            .unwrap();
        assert_eq!(solution.status(), SolutionStatus::NoSolution);
        assert!(solution.selected_edge_ids().is_empty());
        assert_eq!(solution.decisions().len(), 3);
    }

    #[test]
    fn test_infeasible_is_no_solution() {
        let solver = FixedSolver(output(SolverStatus::Infeasible, Some(vec![1.0, 0.0, 0.0])));
        let solution = QuadOptimizer::with_solver(Arc::new(solver))
            .optimize(&strip())
            .unwrap();
        assert_eq!(solution.status(), SolutionStatus::NoSolution);
    }

    #[test]
    fn test_solver_error_propagates() {
        let err = QuadOptimizer::with_solver(Arc::new(FailingSolver))
            .optimize(&strip())
            .unwrap_err();
        assert!(matches!(err, QuadError::SolverFailure { .. }));
    }

    #[test]
    fn test_infeasible_values_rejected() {
        let solver = FixedSolver(output(SolverStatus::Optimal, Some(vec![1.0, 1.0, 0.0])));
        let err = QuadOptimizer::with_solver(Arc::new(solver))
            .optimize(&strip())
            .unwrap_err();
        assert!(matches!(err, QuadError::SolverFailure { .. }));
    }

    #[test]
    fn test_wrong_value_count_rejected() {
        let solver = FixedSolver(output(SolverStatus::Optimal, Some(vec![1.0])));
        let err = QuadOptimizer::with_solver(Arc::new(solver))
            .optimize(&strip())
            .unwrap_err();
        assert!(matches!(err, QuadError::SolverFailure { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = QuadOptimizer::default()
            .with_config(SolverConfig::default().with_gap(-1.0))
            .optimize(&strip())
            .unwrap_err();
        assert!(matches!(err, QuadError::InvalidConfig { .. }));
    }

    #[test]
    fn test_optimizer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QuadOptimizer>();
        assert_send_sync::<Solution>();
    }
}
