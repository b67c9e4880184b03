//! HiGHS backend, compiled with the `highs` feature.
//!
//! HiGHS runs its own branch and cut, so the cancellation token is only
//! checked before the solve starts; the time limit bounds the rest. A run
//! stopped at its time limit may hold no incumbent, in which case no values
//! are reported.

use super::{MipSolver, SolverConfig, SolverOutput, SolverStatus};
use crate::error::{QuadError, QuadResult};
use crate::model::{IntegerProgram, round_selection};
use crate::progress::CancellationToken;
use highs::{HighsModelStatus, RowProblem, Sense};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const BACKEND_NAME: &str = "highs";

/// Solver backed by the HiGHS library.
#[derive(Debug, Clone, Default)]
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl MipSolver for HighsSolver {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn solve(
        &self,
        program: &IntegerProgram,
        config: &SolverConfig,
        cancel: &CancellationToken,
    ) -> QuadResult<SolverOutput> {
        program.validate()?;
        config.validate()?;

        let start = Instant::now();
        if cancel.is_cancelled() {
            return Ok(SolverOutput {
                status: SolverStatus::Cancelled,
                values: None,
                objective: 0.0,
                best_bound: f64::INFINITY,
                nodes: 0,
                elapsed: Duration::ZERO,
            });
        }

        let mut problem = RowProblem::default();
        let columns: Vec<_> = program
            .variables()
            .iter()
            .map(|v| problem.add_integer_column(v.objective, 0.0..=1.0))
            .collect();
        for row in program.constraints() {
            problem.add_row(..=row.rhs, row.terms.iter().map(|&t| (columns[t], 1.0)));
        }

        let mut model = problem.optimise(Sense::Maximise);
        model.set_option("output_flag", config.verbose);
        model.set_option("time_limit", config.time_limit);
        model.set_option("mip_rel_gap", config.relative_gap);
        model.set_option("random_seed", (config.seed % i32::MAX as u64) as i32);

        let solved = model.try_solve().map_err(|status| {
            QuadError::solver_failure(BACKEND_NAME, format!("HiGHS returned {:?}", status))
        })?;

        let model_status = solved.status();
        let status = match model_status {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => SolverStatus::Optimal,
            HighsModelStatus::ReachedTimeLimit => SolverStatus::TimeLimit,
            HighsModelStatus::Infeasible => SolverStatus::Infeasible,
            HighsModelStatus::LoadError
            | HighsModelStatus::ModelError
            | HighsModelStatus::PresolveError
            | HighsModelStatus::SolveError
            | HighsModelStatus::PostsolveError
            | HighsModelStatus::Unbounded
            | HighsModelStatus::ObjectiveBound
            | HighsModelStatus::Unknown => {
                return Err(QuadError::solver_failure(
                    BACKEND_NAME,
                    format!("model status {:?}", model_status),
                ));
            }
            other => {
                warn!(target: "quadify::solver", status = ?other, "Unexpected HiGHS model status");
                return Err(QuadError::solver_failure(
                    BACKEND_NAME,
                    format!("unexpected model status {:?}", other),
                ));
            }
        };

        let values = match status {
            SolverStatus::Optimal | SolverStatus::TimeLimit => {
                incumbent(program, solved.get_solution().columns())
            }
            _ => None,
        };

        let objective = values.as_deref().map_or(0.0, |v| program.evaluate(v));
        let elapsed = start.elapsed();
        debug!(
            target: "quadify::solver",
            status = %status,
            objective,
            elapsed_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            "HiGHS finished"
        );

        Ok(SolverOutput {
            status,
            objective,
            best_bound: if status == SolverStatus::Optimal {
                objective
            } else {
                f64::INFINITY
            },
            values,
            nodes: 0,
            elapsed,
        })
    }
}

/// The MIP incumbent behind a set of HiGHS column values.
///
/// HiGHS leaves columns behind even when the search stopped before finding an
/// incumbent. They count only when they are an integral feasible point, and
/// with every weight positive an incumbent of a non-empty program selects at
/// least one variable.
fn incumbent(program: &IntegerProgram, columns: &[f64]) -> Option<Vec<f64>> {
    if !program.is_feasible(columns) {
        return None;
    }
    let selection = round_selection(columns);
    if program.num_variables() > 0 && !selection.contains(&true) {
        return None;
    }
    Some(selection.into_iter().map(f64::from).collect())
}
