//! Background optimization runs.
//!
//! [`OptimizationTask`] runs [`QuadOptimizer::optimize_with_cancel`] on a
//! named worker thread so an interactive host can keep its event loop alive,
//! poll for completion, and cancel. Cancelling ends the solve the same way a
//! time limit does: the best selection found so far is kept, or the run
//! reports `NoSolution`.
//!
//! ```
//! use quadify::{CandidateSet, OptimizationTask, QuadOptimizer, SolutionStatus};
//!
//! let task = OptimizationTask::spawn(QuadOptimizer::default(), CandidateSet::default()).unwrap();
//! let solution = task.wait().unwrap();
//! assert_eq!(solution.status(), SolutionStatus::NoCandidates);
//! ```

use crate::candidates::CandidateSet;
use crate::error::{QuadError, QuadResult};
use crate::optimizer::{QuadOptimizer, Solution};
use crate::progress::CancellationToken;
use std::thread::JoinHandle;
use tracing::debug;

/// Handle to an optimization running on a worker thread.
#[derive(Debug)]
pub struct OptimizationTask {
    handle: Option<JoinHandle<QuadResult<Solution>>>,
    cancel: CancellationToken,
    backend: &'static str,
}

impl OptimizationTask {
    /// Start optimizing `candidates` on a new thread.
    pub fn spawn(optimizer: QuadOptimizer, candidates: CandidateSet) -> QuadResult<Self> {
        Self::spawn_with_token(optimizer, candidates, CancellationToken::new())
    }

    /// Start a run observing an existing cancellation token.
    pub fn spawn_with_token(
        optimizer: QuadOptimizer,
        candidates: CandidateSet,
        cancel: CancellationToken,
    ) -> QuadResult<Self> {
        let backend = optimizer.solver_name();
        let token = cancel.clone();
        let handle = std::thread::Builder::new()
            .name("quadify-optimize".into())
            .spawn(move || optimizer.optimize_with_cancel(&candidates, &token))
            .map_err(|e| {
                QuadError::solver_failure(backend, format!("failed to spawn worker: {}", e))
            })?;

        debug!(target: "quadify::solver", backend, "Optimization task started");
        Ok(Self {
            handle: Some(handle),
            cancel,
            backend,
        })
    }

    /// Ask the solver to stop at the next node.
    pub fn cancel(&self) {
        debug!(target: "quadify::solver", backend = self.backend, "Optimization task cancelled");
        self.cancel.cancel();
    }

    /// Token observed by the worker.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the worker has finished (or the result was already taken).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Take the result if the worker has finished. Returns `None` while it is
    /// still running and after the result has been taken.
    pub fn try_take(&mut self) -> Option<QuadResult<Solution>> {
        if !self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            return None;
        }
        self.handle.take().map(|h| join(h, self.backend))
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> QuadResult<Solution> {
        match self.handle.take() {
            Some(h) => join(h, self.backend),
            None => Err(QuadError::solver_failure(
                self.backend,
                "result was already taken",
            )),
        }
    }
}

impl Drop for OptimizationTask {
    fn drop(&mut self) {
        // A dropped handle means nobody wants the result.
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

fn join(handle: JoinHandle<QuadResult<Solution>>, backend: &'static str) -> QuadResult<Solution> {
    handle.join().unwrap_or_else(|payload| {
        let details = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(QuadError::solver_failure(
            backend,
            format!("worker panicked: {}", details),
        ))
    })
}
