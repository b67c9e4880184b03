//! Progress reporting and cancellation for long-running solves.
//!
//! This module provides:
//! - [`CancellationToken`], a cloneable flag observed by solvers while they run
//! - [`Progress`] snapshots handed to a [`ProgressCallback`]
//! - [`ProgressThrottle`], which limits how often the callback fires
//!
//! # Example
//!
//! ```
//! use quadify::progress::{Progress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let callback: ProgressCallback = Arc::new(|progress: &Progress| {
//!     println!("{} nodes, gap {:?}", progress.nodes_explored, progress.gap());
//!     true // return false to stop the solve
//! });
//! # let _ = callback;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag.
///
/// Clones observe the same flag. Cancelling is permanent for the token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Snapshot of a running solve passed to callbacks.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Branch-and-bound nodes processed so far.
    pub nodes_explored: u64,

    /// Nodes still waiting in the queue.
    pub open_nodes: usize,

    /// Objective of the best known solution.
    pub incumbent: Option<f64>,

    /// Upper bound on the optimum.
    pub best_bound: f64,

    /// Elapsed time since the solve started.
    pub elapsed: Duration,

    /// Configured time limit.
    pub time_limit: Duration,
}

impl Progress {
    /// Relative gap between bound and incumbent, if there is an incumbent.
    pub fn gap(&self) -> Option<f64> {
        self.incumbent.map(|x| relative_gap(self.best_bound, x))
    }

    /// Fraction of the time budget used (0.0 to 1.0).
    #[inline]
    pub fn time_fraction(&self) -> f64 {
        if self.time_limit.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / self.time_limit.as_secs_f64()).min(1.0)
        }
    }
}

/// Relative gap `(bound - incumbent) / max(|incumbent|, 1e-9)`, never negative.
#[inline]
pub fn relative_gap(bound: f64, incumbent: f64) -> f64 {
    ((bound - incumbent) / incumbent.abs().max(1e-9)).max(0.0)
}

/// Callback function for progress reporting.
///
/// Returns `true` to continue, `false` to request cancellation.
pub type ProgressCallback = Arc<dyn Fn(&Progress) -> bool + Send + Sync>;

/// Rate limiter around an optional progress callback.
pub struct ProgressThrottle {
    callback: Option<ProgressCallback>,
    last_callback: Instant,
    interval: Duration,
}

impl ProgressThrottle {
    /// Default minimum time between callbacks.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self::with_interval(callback, Self::DEFAULT_INTERVAL)
    }

    /// Create a throttle with a custom callback interval.
    pub fn with_interval(callback: Option<ProgressCallback>, interval: Duration) -> Self {
        Self {
            callback,
            last_callback: Instant::now(),
            interval,
        }
    }

    /// Call the callback if enough time has passed since the last call.
    ///
    /// The snapshot is only built when the callback actually runs. Returns
    /// `false` if the callback requested cancellation.
    pub fn maybe_report(&mut self, snapshot: impl FnOnce() -> Progress) -> bool {
        let Some(callback) = &self.callback else {
            return true;
        };

        let now = Instant::now();
        if now.duration_since(self.last_callback) < self.interval {
            return true;
        }
        self.last_callback = now;

        callback(&snapshot())
    }
}

impl std::fmt::Debug for ProgressThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressThrottle")
            .field("has_callback", &self.callback.is_some())
            .field("interval", &self.interval)
            .finish()
    }
}
