//! Fluent builder for [`QuadOptimizer`].
//!
//! # Example
//!
//! ```
//! use quadify::{QuadOptimizer, SolverBackend};
//!
//! let optimizer = QuadOptimizer::builder()
//!     .backend(SolverBackend::BranchAndBound)
//!     .relative_gap(0.0)      // prove optimality
//!     .time_limit(10.0)       // but give up after 10 seconds
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(optimizer.config().relative_gap, 0.0);
//! ```

use crate::error::QuadResult;
use crate::optimizer::QuadOptimizer;
use crate::progress::ProgressCallback;
use crate::solver::{BranchAndBoundSolver, MipSolver, SolverBackend, SolverConfig};
use std::sync::Arc;
use tracing::debug;

/// Where the builder gets its solver from.
#[derive(Debug, Clone)]
enum SolverSource {
    Backend(SolverBackend),
    Injected(Arc<dyn MipSolver>),
}

/// Fluent builder for [`QuadOptimizer`].
pub struct QuadOptimizerBuilder {
    source: SolverSource,
    config: SolverConfig,
    progress: Option<ProgressCallback>,
}

impl Default for QuadOptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadOptimizerBuilder {
    /// Builder with the built-in backend and default limits.
    pub fn new() -> Self {
        Self {
            source: SolverSource::Backend(SolverBackend::default()),
            config: SolverConfig::default(),
            progress: None,
        }
    }

    // =========================================================================
    // Solver selection
    // =========================================================================

    /// Use a backend from the factory.
    pub fn backend(mut self, backend: SolverBackend) -> Self {
        self.source = SolverSource::Backend(backend);
        self
    }

    /// Use an injected solver instead of the factory.
    pub fn solver(mut self, solver: Arc<dyn MipSolver>) -> Self {
        self.source = SolverSource::Injected(solver);
        self
    }

    // =========================================================================
    // Limits
    // =========================================================================

    /// Replace all solver settings at once.
    pub fn config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn relative_gap(mut self, gap: f64) -> Self {
        self.config.relative_gap = gap;
        self
    }

    /// Time limit in seconds.
    pub fn time_limit(mut self, seconds: f64) -> Self {
        self.config.time_limit = seconds;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Prove optimality.
    pub fn exact(mut self) -> Self {
        self.config.relative_gap = 0.0;
        self
    }

    /// Loose gap and a short budget.
    pub fn fast(mut self) -> Self {
        let fast = SolverConfig::fast();
        self.config.relative_gap = fast.relative_gap;
        self.config.time_limit = fast.time_limit;
        self
    }

    /// Report branch-and-bound progress. Ignored by other backends.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate the settings and create the optimizer.
    ///
    /// # Errors
    ///
    /// - [`QuadError::InvalidConfig`](crate::QuadError::InvalidConfig) for a
    ///   negative or non-finite gap or time limit
    /// - [`QuadError::SolverUnavailable`](crate::QuadError::SolverUnavailable)
    ///   when the backend is not compiled in
    pub fn build(self) -> QuadResult<QuadOptimizer> {
        self.config.validate()?;

        let solver: Arc<dyn MipSolver> = match (self.source, self.progress) {
            (SolverSource::Backend(SolverBackend::BranchAndBound), Some(progress)) => {
                Arc::new(BranchAndBoundSolver::new().with_progress(progress))
            }
            (SolverSource::Backend(backend), progress) => {
                if progress.is_some() {
                    debug!(
                        target: "quadify::solver",
                        backend = backend.name(),
                        "Backend does not report progress, callback ignored"
                    );
                }
                backend.create()?
            }
            (SolverSource::Injected(solver), _) => solver,
        };

        Ok(QuadOptimizer::with_solver(solver).with_config(self.config))
    }
}
