//! LP relaxations run on a helper thread.
//!
//! `microlp` has no time limit of its own, so a single simplex run on a large
//! relaxation can outlast the whole solve budget. [`LpWorker`] hands each
//! simplex job to a dedicated thread and waits for the result in short slices,
//! returning early once the deadline passes or the cancellation token fires.
//! An abandoned job finishes on its thread and its result is discarded.

use crate::error::{QuadError, QuadResult};
use crate::progress::CancellationToken;
use microlp::Solution;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// How often a waiting search re-checks the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A unit of simplex work: a cold solve, a fixing or a batch of cuts.
pub(super) type LpJob = Box<dyn FnOnce() -> Result<Solution, microlp::Error> + Send>;

type LpResult = Result<Solution, microlp::Error>;

/// Why a wait was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Interrupt {
    Deadline,
    Cancelled,
}

pub(super) enum LpOutcome {
    Solved(Solution),
    Infeasible,
    Interrupted(Interrupt),
}

/// Wall-clock budget shared by every relaxation of one solve.
#[derive(Debug, Clone)]
pub(super) struct Budget<'a> {
    /// `None` when the time limit is too large to represent.
    pub deadline: Option<Instant>,
    pub cancel: &'a CancellationToken,
}

impl Budget<'_> {
    /// The reason to stop now, if any. Cancellation wins over the deadline.
    pub fn interruption(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::Deadline),
            _ => None,
        }
    }
}

/// Owner of the simplex thread for one solve.
pub(super) struct LpWorker {
    backend: &'static str,
    jobs: Sender<LpJob>,
    results: Receiver<LpResult>,
    /// Jobs given up on whose results are still to arrive.
    abandoned: usize,
}

impl LpWorker {
    pub fn spawn(backend: &'static str) -> QuadResult<Self> {
        let (jobs, job_rx) = mpsc::channel::<LpJob>();
        let (result_tx, results) = mpsc::channel::<LpResult>();

        thread::Builder::new()
            .name("quadify-lp".to_string())
            .spawn(move || {
                for job in job_rx {
                    if result_tx.send(job()).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| {
                QuadError::solver_failure(backend, format!("failed to start LP thread: {}", e))
            })?;

        Ok(Self {
            backend,
            jobs,
            results,
            abandoned: 0,
        })
    }

    /// Run a job and wait for it within the budget.
    ///
    /// Nothing is sent once the budget is already exhausted.
    pub fn run(&mut self, job: LpJob, budget: &Budget<'_>) -> QuadResult<LpOutcome> {
        if let Some(stop) = budget.interruption() {
            return Ok(LpOutcome::Interrupted(stop));
        }
        self.jobs
            .send(job)
            .map_err(|_| self.failure("LP thread stopped".to_string()))?;

        loop {
            let wait = match budget.deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };

            match self.results.recv_timeout(wait) {
                Ok(_) if self.abandoned > 0 => self.abandoned -= 1,
                Ok(Ok(solution)) => return Ok(LpOutcome::Solved(solution)),
                Ok(Err(microlp::Error::Infeasible)) => return Ok(LpOutcome::Infeasible),
                Ok(Err(e)) => return Err(self.failure(format!("LP relaxation failed: {}", e))),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.failure("LP thread panicked".to_string()));
                }
            }

            if let Some(stop) = budget.interruption() {
                self.abandoned += 1;
                debug!(target: "quadify::solver", ?stop, "Abandoned running relaxation");
                return Ok(LpOutcome::Interrupted(stop));
            }
        }
    }

    fn failure(&self, details: String) -> QuadError {
        QuadError::solver_failure(self.backend, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microlp::{ComparisonOp, OptimizationDirection, Problem};

    fn small_problem() -> Problem {
        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let x = problem.add_var(1.0, (0.0, 1.0));
        let y = problem.add_var(2.0, (0.0, 1.0));
        problem.add_constraint([(x, 1.0), (y, 1.0)], ComparisonOp::Le, 1.0);
        problem
    }

    fn unlimited(cancel: &CancellationToken) -> Budget<'_> {
        Budget {
            deadline: None,
            cancel,
        }
    }

    #[test]
    fn test_solves_job() {
        let cancel = CancellationToken::new();
        let mut worker = LpWorker::spawn("test").unwrap();
        let problem = small_problem();
        let outcome = worker
            .run(Box::new(move || problem.solve()), &unlimited(&cancel))
            .unwrap();
        let LpOutcome::Solved(solution) = outcome else {
            panic!("expected a solution");
        };
        assert!((solution.objective() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_job() {
        let cancel = CancellationToken::new();
        let mut worker = LpWorker::spawn("test").unwrap();
        let outcome = worker
            .run(
                Box::new(|| -> LpResult { Err(microlp::Error::Infeasible) }),
                &unlimited(&cancel),
            )
            .unwrap();
        assert!(matches!(outcome, LpOutcome::Infeasible));
    }

    #[test]
    fn test_expired_budget_sends_nothing() {
        let cancel = CancellationToken::new();
        let budget = Budget {
            deadline: Some(Instant::now()),
            cancel: &cancel,
        };
        let mut worker = LpWorker::spawn("test").unwrap();
        let outcome = worker
            .run(
                Box::new(|| -> LpResult { panic!("job ran after the deadline") }),
                &budget,
            )
            .unwrap();
        assert!(matches!(
            outcome,
            LpOutcome::Interrupted(Interrupt::Deadline)
        ));
    }

    #[test]
    fn test_slow_job_abandoned_at_deadline() {
        let cancel = CancellationToken::new();
        let budget = Budget {
            deadline: Some(Instant::now() + Duration::from_millis(20)),
            cancel: &cancel,
        };
        let mut worker = LpWorker::spawn("test").unwrap();
        let problem = small_problem();
        let started = Instant::now();
        let outcome = worker
            .run(
                Box::new(move || {
                    thread::sleep(Duration::from_secs(2));
                    problem.solve()
                }),
                &budget,
            )
            .unwrap();
        assert!(matches!(
            outcome,
            LpOutcome::Interrupted(Interrupt::Deadline)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_while_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut worker = LpWorker::spawn("test").unwrap();
        let problem = small_problem();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });
        let started = Instant::now();
        let outcome = worker
            .run(
                Box::new(move || {
                    thread::sleep(Duration::from_secs(2));
                    problem.solve()
                }),
                &unlimited(&cancel),
            )
            .unwrap();
        assert!(matches!(
            outcome,
            LpOutcome::Interrupted(Interrupt::Cancelled)
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_panicking_job_is_failure() {
        let cancel = CancellationToken::new();
        let mut worker = LpWorker::spawn("test").unwrap();
        let err = worker
            .run(
                Box::new(|| -> LpResult { panic!("simplex blew up") }),
                &unlimited(&cancel),
            )
            .err()
            .unwrap();
        assert!(matches!(err, QuadError::SolverFailure { .. }));
    }
}
