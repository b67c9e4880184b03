//! Best-first branch and bound over LP relaxations.
//!
//! The program is first split into independent blocks (variables linked
//! through shared rows) and each block is searched on its own. Each node fixes
//! a subset of variables to 0 or 1 and solves the remaining relaxation with
//! `microlp`. Per block the search keeps:
//!
//! - an incumbent, seeded by a greedy packing and improved by rounding every
//!   LP solution,
//! - a max-heap of open nodes keyed by their parent's LP bound, ties broken by
//!   creation order so repeated runs visit nodes identically,
//! - a pool of odd-set cuts. When every row is a `≤ 1` packing row the
//!   program is a matching on the row graph, and for any odd set `S` of rows
//!   the variables inside `S` can take at most `(|S| - 1) / 2` ones. These
//!   cuts are separated from the fractional support of each relaxation.
//!
//! Children start from their parent's simplex state with one more variable
//! fixed, and cut rounds extend the current state instead of rebuilding it.
//!
//! Relaxations run on a helper thread, so the solve returns at the deadline or
//! on cancellation even in the middle of a simplex run. Blocks not reached in
//! time keep their greedy packing.

use super::lp::{Budget, Interrupt, LpJob, LpOutcome, LpWorker};
use super::{MipSolver, SolverConfig, SolverOutput, SolverStatus};
use crate::error::QuadResult;
use crate::model::{IntegerProgram, SELECTION_THRESHOLD};
use crate::progress::{
    CancellationToken, Progress, ProgressCallback, ProgressThrottle, relative_gap,
};
use hashbrown::HashSet;
use microlp::{
    ComparisonOp, LinearExpr, OptimizationDirection, Problem, Solution, Variable as Column,
};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Absolute slack under which a bound counts as matching the incumbent.
const OPTIMALITY_TOLERANCE: f64 = 1e-9;

/// Distance from an integer under which an LP value counts as integral.
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Separation rounds per node before branching.
const MAX_CUT_ROUNDS: usize = 8;

/// Minimum violation for a cut to be added.
const CUT_VIOLATION: f64 = 1e-6;

/// Open nodes above which children no longer keep their parent's LP state.
const WARM_START_NODES: usize = 128;

/// Cut batches larger than this rebuild the relaxation instead of extending it.
const WARM_CUT_BATCH: usize = 32;

const BACKEND_NAME: &str = "branch-and-bound";

/// Pure-Rust branch-and-bound solver.
#[derive(Clone)]
pub struct BranchAndBoundSolver {
    progress: Option<ProgressCallback>,
    progress_interval: Duration,
    node_limit: Option<u64>,
    cuts: bool,
    warm_start: bool,
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self {
            progress: None,
            progress_interval: ProgressThrottle::DEFAULT_INTERVAL,
            node_limit: None,
            cuts: true,
            warm_start: true,
        }
    }
}

impl BranchAndBoundSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum time between progress callbacks.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Enable or disable odd-set cut separation.
    pub fn with_cuts(mut self, enabled: bool) -> Self {
        self.cuts = enabled;
        self
    }

    /// Start child relaxations from the parent's simplex state. When disabled
    /// every node rebuilds its relaxation.
    pub fn with_warm_start(mut self, enabled: bool) -> Self {
        self.warm_start = enabled;
        self
    }

    /// Report search progress through a callback. Returning `false` from the
    /// callback ends the solve as [`SolverStatus::Cancelled`].
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Stop after this many nodes, reported as [`SolverStatus::TimeLimit`].
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }
}

impl std::fmt::Debug for BranchAndBoundSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchAndBoundSolver")
            .field("has_progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .field("node_limit", &self.node_limit)
            .field("cuts", &self.cuts)
            .field("warm_start", &self.warm_start)
            .finish()
    }
}

/// An open subproblem.
#[derive(Debug, Clone)]
struct Node {
    /// Upper bound inherited from the parent relaxation.
    bound: f64,
    /// Creation order, for deterministic tie-breaking.
    seq: u64,
    /// Variables fixed along the path from the root.
    fixed: Vec<(usize, bool)>,
    /// Parent's final relaxation, shared by both children.
    warm: Option<Arc<Solution>>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher bound first, then older node first.
        self.bound
            .total_cmp(&other.bound)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best 0/1 point found so far.
#[derive(Debug, Clone)]
struct Incumbent {
    selected: Vec<bool>,
    objective: f64,
}

/// `Σ terms ≤ rhs`, valid for every feasible 0/1 point.
#[derive(Debug, Clone)]
struct Cut {
    terms: Vec<usize>,
    rhs: f64,
}

impl Cut {
    fn violation(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&v| values[v]).sum::<f64>() - self.rhs
    }
}

enum Relaxation {
    Infeasible,
    Solved {
        objective: f64,
        values: Vec<f64>,
        solution: Solution,
    },
    Interrupted(Interrupt),
}

/// Objective and bound summed over a set of blocks.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    objective: f64,
    bound: f64,
}

/// State shared by the blocks of one solve.
struct Shared<'a> {
    budget: Budget<'a>,
    /// Started on the first relaxation.
    worker: Option<LpWorker>,
    throttle: ProgressThrottle,
    start: Instant,
    time_limit: Duration,
    relative_gap: f64,
    node_limit: Option<u64>,
    warm_start: bool,
    nodes: u64,
    /// Set once the progress callback asks to stop.
    stopped: bool,
}

impl Shared<'_> {
    fn run_lp(&mut self, job: LpJob) -> QuadResult<LpOutcome> {
        if let Some(stop) = self.budget.interruption() {
            return Ok(LpOutcome::Interrupted(stop));
        }
        let mut worker = match self.worker.take() {
            Some(worker) => worker,
            None => LpWorker::spawn(BACKEND_NAME)?,
        };
        let outcome = worker.run(job, &self.budget);
        self.worker = Some(worker);
        outcome
    }
}

/// Search state for one block.
struct Search<'a> {
    program: &'a IntegerProgram,
    objective: Vec<f64>,
    rows: Vec<SmallVec<[usize; 2]>>,
    incumbent: Incumbent,
    /// Best proven upper bound on the block optimum.
    bound: f64,
    cuts: Vec<Cut>,
    cut_keys: HashSet<Vec<usize>>,
    separate: bool,
    verbose: bool,
    /// LP columns in variable order, set by the first relaxation built.
    columns: Vec<Column>,
}

impl<'a> Search<'a> {
    fn new(program: &'a IntegerProgram, cuts: bool, verbose: bool) -> Self {
        let objective = program.objective();
        let rows = program.variable_rows();
        // Odd-set cuts are only valid for matching-like programs.
        let matching = program
            .constraints()
            .iter()
            .all(|c| (c.rhs - 1.0).abs() <= INTEGRALITY_TOLERANCE)
            && rows.iter().all(|r| r.len() <= 2);
        // Sum of positive objective terms bounds every feasible point.
        let trivial_bound = objective.iter().filter(|&&c| c > 0.0).sum();
        let mut search = Self {
            program,
            objective,
            rows,
            incumbent: Incumbent {
                selected: vec![false; program.num_variables()],
                objective: 0.0,
            },
            bound: trivial_bound,
            cuts: Vec::new(),
            cut_keys: HashSet::new(),
            separate: cuts && matching,
            verbose,
            columns: Vec::new(),
        };
        let greedy = search.greedy_fill(vec![false; program.num_variables()], &[], None);
        search.offer(greedy, "greedy");
        search
    }

    /// Search the block until it is solved or a shared stop criterion fires.
    ///
    /// `others` holds the incumbents and bounds of every other block, for
    /// progress snapshots of the whole program.
    fn run(&mut self, shared: &mut Shared<'_>, others: Totals) -> QuadResult<SolverStatus> {
        let mut heap = BinaryHeap::new();
        heap.push(Node {
            bound: self.bound,
            seq: 0,
            fixed: Vec::new(),
            warm: None,
        });
        let mut next_seq = 1u64;

        let status = loop {
            let best_bound = heap.peek().map_or(self.incumbent.objective, |n| n.bound);

            if best_bound <= self.incumbent.objective + OPTIMALITY_TOLERANCE {
                break SolverStatus::Optimal;
            }
            if relative_gap(best_bound, self.incumbent.objective) <= shared.relative_gap {
                break SolverStatus::GapLimit;
            }
            if shared.stopped {
                break SolverStatus::Cancelled;
            }
            match shared.budget.interruption() {
                Some(Interrupt::Cancelled) => break SolverStatus::Cancelled,
                Some(Interrupt::Deadline) => break SolverStatus::TimeLimit,
                None => {}
            }
            if shared.node_limit.is_some_and(|limit| shared.nodes >= limit) {
                break SolverStatus::TimeLimit;
            }

            let incumbent = self.incumbent.objective;
            let (nodes, open_nodes) = (shared.nodes, heap.len());
            let (start, time_limit) = (shared.start, shared.time_limit);
            let keep_going = shared.throttle.maybe_report(|| Progress {
                nodes_explored: nodes,
                open_nodes,
                incumbent: Some(others.objective + incumbent),
                best_bound: others.bound + best_bound.max(incumbent),
                elapsed: start.elapsed(),
                time_limit,
            });
            if !keep_going {
                debug!(target: "quadify::solver", nodes, "Progress callback requested stop");
                shared.stopped = true;
                break SolverStatus::Cancelled;
            }

            let Some(mut node) = heap.pop() else {
                break SolverStatus::Optimal;
            };
            shared.nodes += 1;

            let (lp_objective, values, solution) = match self.relax(&mut node, shared)? {
                Relaxation::Solved {
                    objective,
                    values,
                    solution,
                } => (objective, values, solution),
                Relaxation::Infeasible if node.seq == 0 => break SolverStatus::Infeasible,
                Relaxation::Infeasible => continue,
                Relaxation::Interrupted(stop) => {
                    // The node stays open so its bound still counts.
                    heap.push(node);
                    break match stop {
                        Interrupt::Cancelled => SolverStatus::Cancelled,
                        Interrupt::Deadline => SolverStatus::TimeLimit,
                    };
                }
            };

            if self.verbose {
                debug!(
                    target: "quadify::solver",
                    node = node.seq,
                    depth = node.fixed.len(),
                    lp_bound = lp_objective,
                    incumbent = self.incumbent.objective,
                    open = heap.len(),
                    "Node relaxed"
                );
            } else {
                trace!(
                    target: "quadify::solver",
                    node = node.seq,
                    depth = node.fixed.len(),
                    lp_bound = lp_objective,
                    incumbent = self.incumbent.objective,
                    open = heap.len(),
                    "Node relaxed"
                );
            }

            if lp_objective <= self.incumbent.objective + OPTIMALITY_TOLERANCE {
                continue;
            }

            if let Some(v) = branching_variable(&values, &node.fixed) {
                let keep_state = shared.warm_start && heap.len() < WARM_START_NODES;
                let warm = keep_state.then(|| Arc::new(solution));
                for value in [true, false] {
                    let mut fixed = node.fixed.clone();
                    fixed.push((v, value));
                    heap.push(Node {
                        bound: lp_objective,
                        seq: next_seq,
                        fixed,
                        warm: warm.clone(),
                    });
                    next_seq += 1;
                }
            }
        };

        self.bound = heap
            .peek()
            .map_or(self.incumbent.objective, |n| n.bound)
            .max(self.incumbent.objective);
        Ok(status)
    }

    /// Extend a feasible selection greedily.
    ///
    /// Variables are visited by descending `priority` (LP value when given,
    /// then objective), ties by index. Fixed-to-zero variables are skipped.
    fn greedy_fill(
        &self,
        mut selected: Vec<bool>,
        fixed: &[(usize, bool)],
        priority: Option<&[f64]>,
    ) -> Vec<bool> {
        let n = selected.len();
        let mut activity = vec![0.0; self.program.num_constraints()];
        for (v, &s) in selected.iter().enumerate() {
            if s {
                for &r in &self.rows[v] {
                    activity[r] += 1.0;
                }
            }
        }

        let mut blocked = vec![false; n];
        for &(v, value) in fixed {
            if !value {
                blocked[v] = true;
            }
        }

        let mut order: Vec<usize> = (0..n).filter(|&v| self.objective[v] > 0.0).collect();
        order.sort_by(|&a, &b| {
            let pa = priority.map_or(0.0, |p| p[a]);
            let pb = priority.map_or(0.0, |p| p[b]);
            pb.total_cmp(&pa)
                .then_with(|| self.objective[b].total_cmp(&self.objective[a]))
                .then_with(|| a.cmp(&b))
        });

        let constraints = self.program.constraints();
        let capacity = |r: usize| constraints[r].rhs + INTEGRALITY_TOLERANCE;
        for v in order {
            if selected[v] || blocked[v] {
                continue;
            }
            let fits = self.rows[v].iter().all(|&r| activity[r] + 1.0 <= capacity(r));
            if fits {
                selected[v] = true;
                for &r in &self.rows[v] {
                    activity[r] += 1.0;
                }
            }
        }
        selected
    }

    /// Replace the incumbent if the selection is feasible and strictly better.
    fn offer(&mut self, selected: Vec<bool>, source: &'static str) -> bool {
        if !self.program.is_feasible_selection(&selected) {
            return false;
        }
        let objective = self.program.evaluate_selection(&selected);
        if objective > self.incumbent.objective + OPTIMALITY_TOLERANCE {
            if self.verbose {
                debug!(target: "quadify::solver", source, objective, "New incumbent");
            } else {
                trace!(target: "quadify::solver", source, objective, "New incumbent");
            }
            self.incumbent = Incumbent {
                selected,
                objective,
            };
            return true;
        }
        false
    }

    /// Build the relaxation from scratch: node fixings as bounds, every
    /// program row and every pooled cut.
    fn build_problem(&mut self, fixed: &[(usize, bool)]) -> Problem {
        let mut bounds = vec![(0.0, 1.0); self.program.num_variables()];
        for &(v, value) in fixed {
            let x = if value { 1.0 } else { 0.0 };
            bounds[v] = (x, x);
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        self.columns = self
            .objective
            .iter()
            .zip(&bounds)
            .map(|(&c, &range)| problem.add_var(c, range))
            .collect();

        let rows = self
            .program
            .constraints()
            .iter()
            .map(|c| (c.terms.as_slice(), c.rhs))
            .chain(self.cuts.iter().map(|c| (c.terms.as_slice(), c.rhs)));
        for (terms, rhs) in rows {
            problem.add_constraint(self.expr(terms), ComparisonOp::Le, rhs);
        }
        problem
    }

    fn expr(&self, terms: &[usize]) -> LinearExpr {
        let mut expr = LinearExpr::empty();
        for &t in terms {
            expr.add(self.columns[t], 1.0);
        }
        expr
    }

    fn column_values(&self, solution: &Solution) -> Vec<f64> {
        self.columns.iter().map(|&x| solution[x]).collect()
    }

    /// Solve the node relaxation, tightening it with odd-set cuts while any
    /// are violated. Every LP point along the way is rounded into a candidate
    /// incumbent.
    fn relax(&mut self, node: &mut Node, shared: &mut Shared<'_>) -> QuadResult<Relaxation> {
        let job: LpJob = match (node.warm.take(), node.fixed.last()) {
            (Some(parent), Some(&(v, value))) => {
                let column = self.columns[v];
                let x = if value { 1.0 } else { 0.0 };
                Box::new(move || {
                    let state = Arc::try_unwrap(parent)
                        .unwrap_or_else(|arc| Solution::clone(&arc));
                    state.fix_var(column, x)
                })
            }
            _ => {
                let problem = self.build_problem(&node.fixed);
                Box::new(move || problem.solve())
            }
        };

        let mut solution = match shared.run_lp(job)? {
            LpOutcome::Solved(solution) => solution,
            LpOutcome::Infeasible => return Ok(Relaxation::Infeasible),
            LpOutcome::Interrupted(stop) => return Ok(Relaxation::Interrupted(stop)),
        };
        let mut values = self.column_values(&solution);
        self.improve_incumbent(&values, &node.fixed);

        if self.separate {
            for _ in 0..MAX_CUT_ROUNDS {
                let batch = self.violated_cuts(&values);
                if batch.is_empty() {
                    break;
                }
                trace!(
                    target: "quadify::solver",
                    added = batch.len(),
                    pool = self.cuts.len(),
                    "Adding odd-set cuts"
                );

                let job: LpJob = if batch.len() > WARM_CUT_BATCH {
                    // Every batch member is pooled, so a rebuild includes it.
                    let problem = self.build_problem(&node.fixed);
                    Box::new(move || problem.solve())
                } else {
                    let rows: Vec<(LinearExpr, f64)> = batch
                        .iter()
                        .map(|cut| (self.expr(&cut.terms), cut.rhs))
                        .collect();
                    Box::new(move || {
                        rows.into_iter().try_fold(solution, |state, (expr, rhs)| {
                            state.add_constraint(expr, ComparisonOp::Le, rhs)
                        })
                    })
                };

                solution = match shared.run_lp(job)? {
                    LpOutcome::Solved(solution) => solution,
                    LpOutcome::Infeasible => return Ok(Relaxation::Infeasible),
                    LpOutcome::Interrupted(stop) => return Ok(Relaxation::Interrupted(stop)),
                };
                values = self.column_values(&solution);
                self.improve_incumbent(&values, &node.fixed);
            }
        }

        Ok(Relaxation::Solved {
            objective: solution.objective(),
            values,
            solution,
        })
    }

    fn improve_incumbent(&mut self, values: &[f64], fixed: &[(usize, bool)]) {
        let rounded = self.round(values, fixed);
        self.offer(rounded, "rounding");
    }

    /// Cuts violated by `values`: pooled cuts first, then newly separated
    /// ones, which join the pool.
    fn violated_cuts(&mut self, values: &[f64]) -> Vec<Cut> {
        let mut batch = Vec::new();
        let mut keys: HashSet<Vec<usize>> = HashSet::new();

        for cut in &self.cuts {
            if cut.violation(values) > CUT_VIOLATION && keys.insert(cut.terms.clone()) {
                batch.push(cut.clone());
            }
        }
        for cut in self.separate_odd_sets(values) {
            if !keys.insert(cut.terms.clone()) {
                continue;
            }
            if self.cut_keys.insert(cut.terms.clone()) {
                self.cuts.push(cut.clone());
            }
            batch.push(cut);
        }
        batch
    }

    /// Find violated odd-set cuts in the fractional support of `values`.
    ///
    /// Rows are nodes and fractional two-row variables are edges. Every
    /// connected component with an odd node count is tried as a set, and so is
    /// the first odd cycle found while 2-colouring each component.
    fn separate_odd_sets(&self, values: &[f64]) -> Vec<Cut> {
        let num_rows = self.program.num_constraints();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); num_rows];
        for (v, rows) in self.rows.iter().enumerate() {
            let x = values[v];
            if rows.len() == 2 && x > INTEGRALITY_TOLERANCE && x < 1.0 - INTEGRALITY_TOLERANCE {
                adjacency[rows[0]].push(rows[1]);
                adjacency[rows[1]].push(rows[0]);
            }
        }

        let mut cuts = Vec::new();
        let mut color: Vec<Option<bool>> = vec![None; num_rows];
        let mut parent: Vec<usize> = (0..num_rows).collect();

        for root in 0..num_rows {
            if color[root].is_some() || adjacency[root].is_empty() {
                continue;
            }
            color[root] = Some(false);
            let mut component = vec![root];
            let mut odd_cycle: Option<Vec<usize>> = None;
            let mut queue = VecDeque::from([root]);

            while let Some(u) = queue.pop_front() {
                let cu = color[u].unwrap_or(false);
                for &w in &adjacency[u] {
                    match color[w] {
                        None => {
                            color[w] = Some(!cu);
                            parent[w] = u;
                            component.push(w);
                            queue.push_back(w);
                        }
                        Some(cw) if cw == cu && odd_cycle.is_none() => {
                            odd_cycle = Some(tree_cycle(&parent, root, u, w));
                        }
                        _ => {}
                    }
                }
            }

            if component.len() % 2 == 1 && component.len() >= 3 {
                cuts.extend(self.odd_set_cut(&component, values));
            }
            if let Some(cycle) = odd_cycle
                && cycle.len() != component.len()
            {
                cuts.extend(self.odd_set_cut(&cycle, values));
            }
        }
        cuts
    }

    /// The odd-set inequality for a set of rows, if `values` violates it.
    fn odd_set_cut(&self, set: &[usize], values: &[f64]) -> Option<Cut> {
        let members: HashSet<usize> = set.iter().copied().collect();
        let constraints = self.program.constraints();
        let mut terms: Vec<usize> = set
            .iter()
            .flat_map(|&r| constraints[r].terms.iter().copied())
            .filter(|&v| {
                self.rows[v].len() == 2 && self.rows[v].iter().all(|r| members.contains(r))
            })
            .collect();
        terms.sort_unstable();
        terms.dedup();

        let cut = Cut {
            terms,
            rhs: ((set.len() - 1) / 2) as f64,
        };
        (cut.violation(values) > CUT_VIOLATION).then_some(cut)
    }

    /// Round an LP point and complete it greedily.
    fn round(&self, values: &[f64], fixed: &[(usize, bool)]) -> Vec<bool> {
        let mut selected: Vec<bool> = values.iter().map(|&x| x > SELECTION_THRESHOLD).collect();
        for &(v, value) in fixed {
            selected[v] = value;
        }
        if !self.program.is_feasible_selection(&selected) {
            selected = fixed
                .iter()
                .fold(vec![false; values.len()], |mut s, &(v, value)| {
                    s[v] = value;
                    s
                });
        }
        self.greedy_fill(selected, fixed, Some(values))
    }
}

/// Nodes of the odd cycle closed by the non-tree edge `u`-`w` whose ends share
/// a colour in a BFS tree rooted at `root`.
fn tree_cycle(parent: &[usize], root: usize, u: usize, w: usize) -> Vec<usize> {
    let path_to_root = |mut x: usize| {
        let mut path = vec![x];
        while x != root {
            x = parent[x];
            path.push(x);
        }
        path
    };
    let pu = path_to_root(u);
    let pw = path_to_root(w);
    let on_u: HashSet<usize> = pu.iter().copied().collect();
    let lca = pw
        .iter()
        .copied()
        .find(|x| on_u.contains(x))
        .unwrap_or(root);

    let mut cycle: Vec<usize> = pu.iter().copied().take_while(|&x| x != lca).collect();
    cycle.push(lca);
    cycle.extend(pw.iter().copied().take_while(|&x| x != lca));
    cycle
}

/// Most fractional free variable, lowest index on ties.
fn branching_variable(values: &[f64], fixed: &[(usize, bool)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (v, &x) in values.iter().enumerate() {
        let frac = x.min(1.0 - x);
        if frac <= INTEGRALITY_TOLERANCE || fixed.iter().any(|&(f, _)| f == v) {
            continue;
        }
        if best.is_none_or(|(_, b)| frac > b) {
            best = Some((v, frac));
        }
    }
    best.map(|(v, _)| v)
}

/// Status of a whole solve from its block statuses: the weakest claim wins.
fn combine_status(a: SolverStatus, b: SolverStatus) -> SolverStatus {
    let rank = |s: SolverStatus| match s {
        SolverStatus::Optimal => 0,
        SolverStatus::GapLimit => 1,
        SolverStatus::TimeLimit => 2,
        SolverStatus::Cancelled => 3,
        SolverStatus::Infeasible => 4,
    };
    if rank(b) > rank(a) { b } else { a }
}

impl MipSolver for BranchAndBoundSolver {
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
        let time_limit = config.time_limit_duration();
        let mut shared = Shared {
            budget: Budget {
                deadline: start.checked_add(time_limit),
                cancel,
            },
            worker: None,
            throttle: ProgressThrottle::with_interval(
                self.progress.clone(),
                self.progress_interval,
            ),
            start,
            time_limit,
            relative_gap: config.relative_gap,
            node_limit: self.node_limit,
            warm_start: self.warm_start,
            nodes: 0,
            stopped: false,
        };

        let blocks = program.split_components();
        let mut searches: Vec<Search<'_>> = blocks
            .iter()
            .map(|b| Search::new(&b.program, self.cuts, config.verbose))
            .collect();

        let mut totals = Totals::default();
        for search in &searches {
            totals.objective += search.incumbent.objective;
            totals.bound += search.bound;
        }

        let mut status = SolverStatus::Optimal;
        for search in &mut searches {
            let others = Totals {
                objective: totals.objective - search.incumbent.objective,
                bound: totals.bound - search.bound,
            };
            let block_status = search.run(&mut shared, others)?;
            totals = Totals {
                objective: others.objective + search.incumbent.objective,
                bound: others.bound + search.bound,
            };
            status = combine_status(status, block_status);
            if block_status == SolverStatus::Infeasible {
                break;
            }
        }

        let objective: f64 = searches.iter().map(|s| s.incumbent.objective).sum();
        let best_bound = searches
            .iter()
            .map(|s| s.bound)
            .sum::<f64>()
            .max(objective);
        let elapsed = start.elapsed();
        debug!(
            target: "quadify::solver",
            status = %status,
            blocks = searches.len(),
            nodes = shared.nodes,
            objective,
            best_bound,
            elapsed_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            cuts = searches.iter().map(|s| s.cuts.len()).sum::<usize>(),
            "Branch and bound finished"
        );

        if status == SolverStatus::Infeasible {
            return Ok(SolverOutput {
                status,
                values: None,
                objective: 0.0,
                best_bound: 0.0,
                nodes: shared.nodes,
                elapsed,
            });
        }

        let mut values = vec![0.0; program.num_variables()];
        for (block, search) in blocks.iter().zip(&searches) {
            for (&v, &selected) in block.variables.iter().zip(&search.incumbent.selected) {
                if selected {
                    values[v] = 1.0;
                }
            }
        }

        Ok(SolverOutput {
            status,
            values: Some(values),
            objective,
            best_bound,
            nodes: shared.nodes,
            elapsed,
        })
    }
}
