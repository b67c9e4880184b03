//! Mixed-integer solver backends.
//!
//! Solvers implement [`MipSolver`] and are obtained from the
//! [`SolverBackend`] factory. The factory reports availability up front, so a
//! missing backend surfaces as [`QuadError::SolverUnavailable`] before any
//! model is built.
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | `branch-and-bound` | always | Pure Rust, LP relaxations via `microlp` |
//! | `highs` | `highs` | Links the HiGHS C++ library |

mod branch_bound;
#[cfg(feature = "highs")]
mod highs;
mod lp;

pub use branch_bound::BranchAndBoundSolver;
#[cfg(feature = "highs")]
pub use highs::HighsSolver;

use crate::error::{QuadError, QuadResult};
use crate::model::IntegerProgram;
use crate::progress::{CancellationToken, relative_gap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Limits and switches handed to a solver for one solve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SolverConfig {
    /// Stop once `(bound - incumbent) / |incumbent|` is at most this value.
    pub relative_gap: f64,

    /// Wall-clock budget in seconds.
    pub time_limit: f64,

    /// Emit solver progress at debug level instead of trace.
    pub verbose: bool,

    /// Seed passed to backends with randomized heuristics.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            relative_gap: 0.01,
            time_limit: 60.0,
            verbose: false,
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Prove optimality (zero gap) with the default time limit.
    pub fn exact() -> Self {
        Self {
            relative_gap: 0.0,
            ..Self::default()
        }
    }

    /// Looser gap and a short budget for interactive use.
    pub fn fast() -> Self {
        Self {
            relative_gap: 0.05,
            time_limit: 5.0,
            ..Self::default()
        }
    }

    /// Set the relative gap.
    pub fn with_gap(mut self, gap: f64) -> Self {
        self.relative_gap = gap;
        self
    }

    /// Set the time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Time limit as a duration. Only meaningful after [`validate`](Self::validate).
    pub fn time_limit_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit).unwrap_or(Duration::MAX)
    }

    /// Reject negative or non-finite gap and time limit.
    pub fn validate(&self) -> QuadResult<()> {
        if !self.relative_gap.is_finite() || self.relative_gap < 0.0 {
            return Err(QuadError::invalid_config(format!(
                "relative gap must be a finite value >= 0, got {}",
                self.relative_gap
            )));
        }
        if !self.time_limit.is_finite() || self.time_limit < 0.0 {
            return Err(QuadError::invalid_config(format!(
                "time limit must be a finite number of seconds >= 0, got {}",
                self.time_limit
            )));
        }
        Ok(())
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Proven optimal.
    Optimal,
    /// Incumbent within the configured relative gap.
    GapLimit,
    /// Time limit reached. An incumbent may or may not exist.
    TimeLimit,
    /// Cancelled through the token. An incumbent may or may not exist.
    Cancelled,
    /// The program has no feasible point.
    Infeasible,
}

impl SolverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::GapLimit => "gap limit",
            SolverStatus::TimeLimit => "time limit",
            SolverStatus::Cancelled => "cancelled",
            SolverStatus::Infeasible => "infeasible",
        }
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw result of a solve.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub status: SolverStatus,

    /// Variable values of the best solution, `None` without an incumbent.
    pub values: Option<Vec<f64>>,

    /// Objective of `values`, 0.0 without an incumbent.
    pub objective: f64,

    /// Best proven upper bound on the optimum.
    pub best_bound: f64,

    /// Branch-and-bound nodes processed.
    pub nodes: u64,

    pub elapsed: Duration,
}

impl SolverOutput {
    /// Whether the solve produced a usable solution.
    #[inline]
    pub fn has_solution(&self) -> bool {
        self.status != SolverStatus::Infeasible && self.values.is_some()
    }

    /// Relative gap of the returned solution, 0 when proven optimal.
    pub fn gap(&self) -> Option<f64> {
        self.values
            .as_ref()
            .map(|_| relative_gap(self.best_bound, self.objective))
    }
}

/// A solver for 0/1 packing programs.
pub trait MipSolver: Send + Sync + std::fmt::Debug {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Solve the program. Blocks until a stop criterion is met.
    ///
    /// Running out of time or being cancelled is not an error; the output
    /// status says so. Errors mean the backend could not solve the model at
    /// all and no values may be used.
    fn solve(
        &self,
        program: &IntegerProgram,
        config: &SolverConfig,
        cancel: &CancellationToken,
    ) -> QuadResult<SolverOutput>;
}

/// Available solver implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "kebab-case"))]
pub enum SolverBackend {
    /// Built-in branch and bound over `microlp` relaxations.
    #[default]
    BranchAndBound,
    /// HiGHS, behind the `highs` cargo feature.
    Highs,
}

impl SolverBackend {
    /// All known backends, available or not.
    pub const ALL: [SolverBackend; 2] = [SolverBackend::BranchAndBound, SolverBackend::Highs];

    pub fn name(&self) -> &'static str {
        match self {
            SolverBackend::BranchAndBound => "branch-and-bound",
            SolverBackend::Highs => "highs",
        }
    }

    /// Whether this build can create the backend.
    pub fn is_available(&self) -> bool {
        match self {
            SolverBackend::BranchAndBound => true,
            SolverBackend::Highs => cfg!(feature = "highs"),
        }
    }

    /// Backends this build can create.
    pub fn available() -> impl Iterator<Item = SolverBackend> {
        Self::ALL.into_iter().filter(|b| b.is_available())
    }

    /// Instantiate the backend.
    pub fn create(&self) -> QuadResult<Arc<dyn MipSolver>> {
        match self {
            SolverBackend::BranchAndBound => Ok(Arc::new(BranchAndBoundSolver::new())),
            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Arc::new(HighsSolver::new())),
            #[cfg(not(feature = "highs"))]
            SolverBackend::Highs => Err(QuadError::solver_unavailable(
                self.name(),
                "this build was compiled without the `highs` feature",
            )),
        }
    }
}

impl std::fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverBackend {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "branch-and-bound" | "bnb" | "builtin" => Ok(SolverBackend::BranchAndBound),
            "highs" => Ok(SolverBackend::Highs),
            other => Err(QuadError::invalid_config(format!(
                "unknown solver backend '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.relative_gap, 0.01);
        assert_eq!(config.time_limit, 60.0);
        assert!(!config.verbose);
        assert_eq!(config.seed, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        assert_eq!(SolverConfig::exact().relative_gap, 0.0);
        let fast = SolverConfig::fast();
        assert_eq!(fast.relative_gap, 0.05);
        assert_eq!(fast.time_limit, 5.0);
        assert_eq!(fast.time_limit_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_validation() {
        let valid = |config: SolverConfig| config.validate().is_ok();
        assert!(!valid(SolverConfig::default().with_gap(-0.1)));
        assert!(!valid(SolverConfig::default().with_gap(f64::NAN)));
        assert!(!valid(SolverConfig::default().with_time_limit(-1.0)));
        let unbounded = SolverConfig::default().with_time_limit(f64::INFINITY);
        assert!(!valid(unbounded));
        assert!(valid(SolverConfig::default().with_time_limit(0.0)));

        let err = SolverConfig::default()
            .with_gap(-1.0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code().as_str(), "QUAD-4002");
    }

    #[test]
    fn test_builtin_backend_available() {
        assert!(SolverBackend::BranchAndBound.is_available());
        let solver = SolverBackend::BranchAndBound.create().unwrap();
        assert_eq!(solver.name(), "branch-and-bound");
        let mut available = SolverBackend::available();
        assert!(available.any(|b| b == SolverBackend::BranchAndBound));
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn test_highs_unavailable_without_feature() {
        assert!(!SolverBackend::Highs.is_available());
        let err = SolverBackend::Highs.create().unwrap_err();
        assert!(matches!(err, QuadError::SolverUnavailable { .. }));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(
            "branch-and-bound".parse::<SolverBackend>().unwrap(),
            SolverBackend::BranchAndBound
        );
        assert_eq!(
            "HiGHS".parse::<SolverBackend>().unwrap(),
            SolverBackend::Highs
        );
        assert!("cbc".parse::<SolverBackend>().is_err());
        assert_eq!(SolverBackend::default().to_string(), "branch-and-bound");
    }
}
