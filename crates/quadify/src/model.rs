//! The integer program behind triangle pairing.
//!
//! One binary variable per candidate edge, a maximized linear objective and
//! one set-packing row per triangle shared by several candidates:
//!
//! ```text
//! maximize   Σ x_e · (1 + 0.1 · length(e) / max_length)
//! subject to Σ_{e ∈ S(t)} x_e ≤ 1      for every triangle t with |S(t)| > 1
//!            x_e ∈ {0, 1}
//! ```
//!
//! The first term counts merges, the second prefers longer diagonals.
//! Weights lie in `[1.0, 1.1]`.

use crate::candidates::{CandidateSet, variable_name};
use crate::error::{QuadError, QuadResult};
use hashbrown::HashSet;
use smallvec::SmallVec;

/// Values above this count as "1" when reading a relaxation or solver output.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Tolerance when checking integrality and row activity.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Objective coefficient for a candidate edge.
#[inline]
pub fn objective_weight(length: f64, max_length: f64) -> f64 {
    1.0 + 0.1 * length / max_length
}

/// A binary decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Objective coefficient (maximized).
    pub objective: f64,
}

/// A packing row: the sum of the listed variables is at most `rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    /// Variable indices, each with coefficient 1.
    pub terms: SmallVec<[usize; 3]>,
    pub rhs: f64,
}

/// A 0/1 maximization program with unit-coefficient `≤` rows.
#[derive(Debug, Clone, Default)]
pub struct IntegerProgram {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl IntegerProgram {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pairing program for a candidate set.
    ///
    /// Variables follow candidate order and are named `v000`, `v001`, ...;
    /// rows are named `t<face id>` and appear in ascending triangle id.
    pub fn from_candidates(candidates: &CandidateSet) -> Self {
        let max_length = candidates.max_length();
        let mut program = Self::new();

        for (i, c) in candidates.iter().enumerate() {
            program.add_variable(variable_name(i), objective_weight(c.length, max_length));
        }

        for (face, incident) in candidates.triangle_incidence() {
            if incident.len() > 1 {
                program.add_constraint(format!("t{}", face), incident, 1.0);
            }
        }

        program
    }

    /// Append a variable, returning its index.
    pub fn add_variable(&mut self, name: impl Into<String>, objective: f64) -> usize {
        self.variables.push(Variable {
            name: name.into(),
            objective,
        });
        self.variables.len() - 1
    }

    /// Append a `Σ terms ≤ rhs` row, returning its index.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: impl IntoIterator<Item = usize>,
        rhs: f64,
    ) -> usize {
        self.constraints.push(Constraint {
            name: name.into(),
            terms: terms.into_iter().collect(),
            rhs,
        });
        self.constraints.len() - 1
    }

    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Objective coefficients in variable order.
    pub fn objective(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.objective).collect()
    }

    /// Total number of nonzeros in the constraint matrix.
    pub fn num_nonzeros(&self) -> usize {
        self.constraints.iter().map(|c| c.terms.len()).sum()
    }

    /// For each variable, the rows it appears in.
    pub fn variable_rows(&self) -> Vec<SmallVec<[usize; 2]>> {
        let mut rows = vec![SmallVec::new(); self.variables.len()];
        for (r, c) in self.constraints.iter().enumerate() {
            for &v in &c.terms {
                if let Some(list) = rows.get_mut(v) {
                    list.push(r);
                }
            }
        }
        rows
    }

    /// Check that the program is well formed before handing it to a solver.
    ///
    /// Rejects non-finite coefficients, out-of-range or repeated terms and
    /// negative right-hand sides.
    pub fn validate(&self) -> QuadResult<()> {
        for v in &self.variables {
            if !v.objective.is_finite() {
                return Err(malformed(format!(
                    "variable {} has objective {}",
                    v.name, v.objective
                )));
            }
        }
        for c in &self.constraints {
            if !c.rhs.is_finite() || c.rhs < 0.0 {
                return Err(malformed(format!("row {} has rhs {}", c.name, c.rhs)));
            }
            for (i, &t) in c.terms.iter().enumerate() {
                if t >= self.variables.len() {
                    return Err(malformed(format!(
                        "row {} references variable {} of {}",
                        c.name,
                        t,
                        self.variables.len()
                    )));
                }
                if c.terms[..i].contains(&t) {
                    return Err(malformed(format!("row {} repeats variable {}", c.name, t)));
                }
            }
        }
        Ok(())
    }

    /// Objective value at a point.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// Objective value of a 0/1 selection.
    pub fn evaluate_selection(&self, selected: &[bool]) -> f64 {
        self.variables
            .iter()
            .zip(selected)
            .filter(|(_, s)| **s)
            .map(|(v, _)| v.objective)
            .sum()
    }

    /// Whether a 0/1 selection satisfies every row.
    pub fn is_feasible_selection(&self, selected: &[bool]) -> bool {
        if selected.len() != self.variables.len() {
            return false;
        }
        self.constraints.iter().all(|c| {
            let activity = c
                .terms
                .iter()
                .filter(|&&t| selected.get(t).copied().unwrap_or(false))
                .count() as f64;
            activity <= c.rhs + FEASIBILITY_TOLERANCE
        })
    }

    /// Whether a point is integral (within tolerance) and satisfies every row.
    pub fn is_feasible(&self, values: &[f64]) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let integral = values.iter().all(|&x| {
            x.is_finite()
                && (x.abs() <= FEASIBILITY_TOLERANCE || (x - 1.0).abs() <= FEASIBILITY_TOLERANCE)
        });
        integral && self.is_feasible_selection(&round_selection(values))
    }

    /// Split into independent blocks of variables linked through shared rows.
    ///
    /// Blocks are ordered by their lowest variable and keep the parent's
    /// variable and row order. Rows without terms belong to no block.
    pub fn split_components(&self) -> Vec<ProgramBlock> {
        let rows = self.variable_rows();
        let mut block_of = vec![usize::MAX; self.variables.len()];
        let mut blocks = Vec::new();

        for seed in 0..self.variables.len() {
            if block_of[seed] != usize::MAX {
                continue;
            }
            let id = blocks.len();
            block_of[seed] = id;
            let mut members = vec![seed];
            let mut block_rows = Vec::new();
            let mut row_seen = HashSet::new();
            let mut stack = vec![seed];

            while let Some(v) = stack.pop() {
                for &r in &rows[v] {
                    if !row_seen.insert(r) {
                        continue;
                    }
                    block_rows.push(r);
                    for &w in &self.constraints[r].terms {
                        if block_of[w] == usize::MAX {
                            block_of[w] = id;
                            members.push(w);
                            stack.push(w);
                        }
                    }
                }
            }

            members.sort_unstable();
            block_rows.sort_unstable();
            blocks.push((members, block_rows));
        }

        let mut local = vec![0; self.variables.len()];
        blocks
            .into_iter()
            .map(|(members, block_rows)| {
                let mut program = IntegerProgram::new();
                for (i, &v) in members.iter().enumerate() {
                    local[v] = i;
                    program.variables.push(self.variables[v].clone());
                }
                for r in block_rows {
                    let c = &self.constraints[r];
                    let terms = c.terms.iter().map(|&t| local[t]);
                    program.add_constraint(c.name.clone(), terms, c.rhs);
                }
                ProgramBlock {
                    variables: members,
                    program,
                }
            })
            .collect()
    }
}

/// A connected piece of a larger program.
#[derive(Debug, Clone)]
pub struct ProgramBlock {
    /// Parent indices of the block's variables, ascending.
    pub variables: Vec<usize>,
    /// The block as a program of its own, variables in the same order.
    pub program: IntegerProgram,
}

/// Threshold a value vector into a 0/1 selection.
pub fn round_selection(values: &[f64]) -> Vec<bool> {
    values.iter().map(|&x| x > SELECTION_THRESHOLD).collect()
}

fn malformed(details: String) -> QuadError {
    QuadError::solver_failure("model", format!("malformed model: {}", details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateEdge;
    use approx::assert_relative_eq;

    fn fan_candidates() -> CandidateSet {
        // Triangle 1 sits between two candidates.
        CandidateSet::from_candidates(vec![
            CandidateEdge {
                edge: 2,
                faces: [0, 1],
                length: 2.0,
            },
            CandidateEdge {
                edge: 4,
                faces: [1, 2],
                length: 1.0,
            },
        ])
    }

    #[test]
    fn test_single_candidate_weight() {
        let set = CandidateSet::from_candidates(vec![CandidateEdge {
            edge: 0,
            faces: [0, 1],
            length: 2.0_f64.sqrt(),
        }]);
        let program = IntegerProgram::from_candidates(&set);

        assert_eq!(program.num_variables(), 1);
        assert_eq!(program.num_constraints(), 0);
        assert_eq!(program.variables()[0].name, "v000");
        assert_relative_eq!(program.variables()[0].objective, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_shared_triangle_gets_constraint() {
        let program = IntegerProgram::from_candidates(&fan_candidates());
        assert_eq!(program.num_constraints(), 1);

        let row = &program.constraints()[0];
        assert_eq!(row.name, "t1");
        assert_eq!(row.terms.as_slice(), &[0, 1]);
        assert_eq!(row.rhs, 1.0);

        assert_relative_eq!(program.variables()[0].objective, 1.1, epsilon = 1e-12);
        assert_relative_eq!(program.variables()[1].objective, 1.05, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_set() {
        let program = IntegerProgram::from_candidates(&CandidateSet::default());
        assert!(program.is_empty());
        assert_eq!(program.num_constraints(), 0);
        assert!(program.validate().is_ok());
        assert!(program.is_feasible(&[]));
    }

    #[test]
    fn test_weights_bounded() {
        for length in [0.0, 0.3, 1.0, 5.0] {
            let w = objective_weight(length, 5.0);
            assert!((1.0..=1.1).contains(&w));
        }
    }

    #[test]
    fn test_feasibility() {
        let program = IntegerProgram::from_candidates(&fan_candidates());
        assert!(program.is_feasible(&[1.0, 0.0]));
        assert!(program.is_feasible(&[0.0, 1.0]));
        assert!(!program.is_feasible(&[1.0, 1.0]));
        assert!(!program.is_feasible(&[0.5, 0.5]));
        assert!(!program.is_feasible(&[1.0]));
        assert!(program.is_feasible_selection(&[false, false]));
    }

    #[test]
    fn test_evaluate() {
        let program = IntegerProgram::from_candidates(&fan_candidates());
        assert_relative_eq!(program.evaluate(&[1.0, 0.0]), 1.1, epsilon = 1e-12);
        let both = program.evaluate_selection(&[true, true]);
        assert_relative_eq!(both, 2.15, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_rows() {
        let mut program = IntegerProgram::new();
        program.add_variable("v000", 1.0);
        program.add_constraint("t0", [0, 3], 1.0);
        let err = program.validate().unwrap_err();
        assert!(matches!(err, QuadError::SolverFailure { .. }));

        let mut program = IntegerProgram::new();
        program.add_variable("v000", f64::NAN);
        assert!(program.validate().is_err());
    }

    #[test]
    fn test_variable_rows() {
        let program = IntegerProgram::from_candidates(&fan_candidates());
        let rows = program.variable_rows();
        assert_eq!(rows[0].as_slice(), &[0]);
        assert_eq!(rows[1].as_slice(), &[0]);
        assert_eq!(program.num_nonzeros(), 2);
    }

    #[test]
    fn test_split_components() {
        // Path 0-1-2, a lone variable 3 and pair 4-5 sharing a row.
        let mut program = IntegerProgram::new();
        for i in 0..6 {
            program.add_variable(format!("v{:03}", i), 1.0 + i as f64 * 0.01);
        }
        program.add_constraint("t7", [4, 5], 1.0);
        program.add_constraint("t1", [0, 1], 1.0);
        program.add_constraint("t2", [1, 2], 1.0);
        program.add_constraint("t9", Vec::<usize>::new(), 1.0);

        let blocks = program.split_components();
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0].variables, vec![0, 1, 2]);
        let path = &blocks[0].program;
        assert_eq!(path.num_constraints(), 2);
        assert_eq!(path.constraints()[0].name, "t1");
        assert_eq!(path.constraints()[1].terms.as_slice(), &[1, 2]);

        assert_eq!(blocks[1].variables, vec![3]);
        assert_eq!(blocks[1].program.num_constraints(), 0);
        assert_eq!(blocks[1].program.variables()[0].name, "v003");

        assert_eq!(blocks[2].variables, vec![4, 5]);
        let pair = &blocks[2].program;
        assert_eq!(pair.constraints()[0].terms.as_slice(), &[0, 1]);
        assert_relative_eq!(pair.variables()[1].objective, 1.05, epsilon = 1e-12);
    }

    #[test]
    fn test_split_empty_program() {
        assert!(IntegerProgram::new().split_components().is_empty());
    }
}
