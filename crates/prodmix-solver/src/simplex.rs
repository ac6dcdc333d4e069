use log::{debug, trace, warn};

use crate::error::SolveError;
use crate::problem::{ConstraintOp, LpProblem, VariableBounds};
use crate::solution::{Analysis, ReducedCost, ShadowPrice, Solution};

/// Simplex solver for small linear programs, with branch-and-bound for
/// integer variables
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots per simplex run before giving up
    max_iterations: usize,
    /// Tolerance for pivot selection
    tolerance: f64,
    /// Tolerance for feasibility and binding checks
    feasibility_tolerance: f64,
    /// Maximum branch-and-bound nodes before giving up
    max_nodes: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            max_nodes: 100_000,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub(crate) fn feasibility_tolerance(&self) -> f64 {
        self.feasibility_tolerance
    }

    /// Solve the problem. Continuous problems go straight to the two-phase
    /// simplex method; problems with integer variables are solved by
    /// branch-and-bound over their LP relaxations.
    pub fn solve(&self, problem: &LpProblem) -> Result<Solution, SolveError> {
        validate(problem)?;

        let solution = if problem.has_integer_variables() {
            self.branch_and_bound(problem)
        } else {
            self.solve_relaxation(problem, &problem.bounds)
        };

        debug!(
            "Solved {} variables x {} constraints: {} (objective {})",
            problem.num_variables(),
            problem.num_constraints(),
            solution.status,
            solution.objective_value
        );
        Ok(solution)
    }

    /// Solve the continuous relaxation of `problem` under `bounds`
    pub(crate) fn solve_relaxation(&self, problem: &LpProblem, bounds: &[VariableBounds]) -> Solution {
        for b in bounds {
            if let Some(upper) = b.upper {
                if upper < b.lower - self.feasibility_tolerance {
                    return Solution::infeasible();
                }
            }
        }

        let rows = standard_rows(problem, bounds);
        let objective: Vec<f64> = problem
            .objective
            .coefficients
            .iter()
            .map(|&c| if problem.objective.minimize { -c } else { c })
            .collect();
        let mut tableau = Tableau::build(&rows, &objective);

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                SimplexResult::Optimal => {}
                SimplexResult::Infeasible => return Solution::infeasible(),
                SimplexResult::Unbounded | SimplexResult::IterationLimit => return Solution::not_solved(),
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => return Solution::unbounded(),
            SimplexResult::Infeasible => return Solution::infeasible(),
            SimplexResult::IterationLimit => return Solution::not_solved(),
        }

        self.extract_solution(&tableau, problem)
    }

    fn phase1(&self, tableau: &mut Tableau) -> SimplexResult {
        // Auxiliary objective: maximize -sum(artificials)
        let n_constraints = tableau.n_rows();
        let n_cols = tableau.n_cols();
        let art_start = tableau.art_start();

        let orig_obj = tableau.data[n_constraints].clone();

        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Make objective row consistent with basic artificial variables
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, n_cols - 1) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => {
                // the auxiliary objective is bounded by zero
                warn!("Phase 1 reported an unbounded auxiliary problem");
                return SimplexResult::Unbounded;
            }
            other => return other,
        }

        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col] > self.feasibility_tolerance {
                debug!("Phase 1 ended with artificial residue {:.3e}", tableau.data[i][rhs_col]);
                return SimplexResult::Infeasible;
            }
        }

        // Drive artificials that stayed basic at zero out of the basis.
        // Rows where no structural column qualifies are redundant.
        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            if let Some(j) = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance) {
                tableau.pivot(i, j);
            }
        }

        // Restore original objective and adjust for basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > 0.0 {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    fn phase2(&self, tableau: &mut Tableau) -> SimplexResult {
        // Artificial columns never re-enter the basis
        let limit = tableau.art_start();
        self.iterate(tableau, limit)
    }

    /// Pivot until no column below `limit` improves the objective row.
    /// Falls back to Bland's rule after a degenerate pivot so the method
    /// cannot cycle.
    fn iterate(&self, tableau: &mut Tableau, limit: usize) -> SimplexResult {
        let mut degenerate = false;

        for iteration in 0..self.max_iterations {
            let pivot_col = if degenerate {
                self.find_pivot_column_bland(tableau, limit)
            } else {
                self.find_pivot_column(tableau, limit)
            };
            let Some(pivot_col) = pivot_col else {
                trace!("Simplex converged after {} pivots", iteration);
                return SimplexResult::Optimal;
            };
            let Some((pivot_row, ratio)) = self.find_pivot_row(tableau, pivot_col) else {
                return SimplexResult::Unbounded;
            };
            trace!("Pivot {}: row {} col {} (ratio {})", iteration, pivot_row, pivot_col, ratio);
            degenerate = ratio <= self.tolerance;
            tableau.pivot(pivot_row, pivot_col);
        }

        warn!("Simplex stopped after {} pivots without converging", self.max_iterations);
        SimplexResult::IterationLimit
    }

    fn find_pivot_column(&self, tableau: &Tableau, limit: usize) -> Option<usize> {
        let obj_row = tableau.n_rows();

        // Look for the most positive reduced cost (can improve objective)
        let mut max_val = self.tolerance;
        let mut max_col = None;

        for j in 0..limit {
            if tableau.data[obj_row][j] > max_val {
                max_val = tableau.data[obj_row][j];
                max_col = Some(j);
            }
        }

        max_col
    }

    fn find_pivot_column_bland(&self, tableau: &Tableau, limit: usize) -> Option<usize> {
        let obj_row = tableau.n_rows();
        (0..limit).find(|&j| tableau.data[obj_row][j] > self.tolerance)
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<(usize, f64)> {
        let rhs_col = tableau.n_cols() - 1;

        let mut best: Option<(usize, f64)> = None;

        for i in 0..tableau.n_rows() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match best {
                None => true,
                Some((row, min_ratio)) => {
                    ratio < min_ratio - self.tolerance
                        || (ratio <= min_ratio + self.tolerance && tableau.basic_vars[i] < tableau.basic_vars[row])
                }
            };
            if better {
                best = Some((i, ratio));
            }
        }

        best
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.n_cols() - 1;

        // Extract variable values
        let mut values = vec![0.0; n_vars];
        for i in 0..tableau.n_rows() {
            let basic = tableau.basic_vars[i];
            if basic < n_vars {
                values[basic] = self.clean(tableau.data[i][rhs_col]).max(0.0);
            }
        }

        let objective_value = self.clean(problem.objective_value(&values));
        let analysis = self.analyze(tableau, problem, &values);

        Solution::optimal(values, objective_value, analysis)
    }

    fn analyze(&self, tableau: &Tableau, problem: &LpProblem, values: &[f64]) -> Analysis {
        let obj_row = tableau.n_rows();
        let sense = if problem.objective.minimize { -1.0 } else { 1.0 };

        // Only the problem's own rows are reported; bound rows follow them
        let shadow_prices = problem
            .constraints
            .iter()
            .zip(&tableau.duals)
            .map(|(constraint, dual)| ShadowPrice {
                constraint: constraint.name.clone(),
                value: self.clean(sense * dual.sign * tableau.data[obj_row][dual.col]),
            })
            .collect();

        let reduced_costs = problem
            .variables
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let is_basic = tableau.basic_vars.contains(&j);
                let rc = if is_basic { 0.0 } else { self.clean(sense * tableau.data[obj_row][j]) };
                ReducedCost {
                    variable: name.clone(),
                    value: values[j],
                    reduced_cost: rc,
                    is_basic,
                }
            })
            .collect();

        Analysis {
            shadow_prices,
            reduced_costs,
            binding_constraints: self.binding_constraints(problem, values),
        }
    }

    /// Names of the constraints that hold with equality at `values`
    pub(crate) fn binding_constraints(&self, problem: &LpProblem, values: &[f64]) -> Vec<String> {
        problem
            .constraints
            .iter()
            .filter(|c| {
                let slack = (c.activity(values) - c.rhs).abs();
                slack <= self.feasibility_tolerance * (1.0 + c.rhs.abs())
            })
            .map(|c| c.name.clone())
            .collect()
    }

    /// Snap round-off noise to zero
    fn clean(&self, value: f64) -> f64 {
        if value.abs() <= self.feasibility_tolerance {
            0.0
        } else {
            value
        }
    }
}

fn validate(problem: &LpProblem) -> Result<(), SolveError> {
    let n = problem.num_variables();

    if problem.objective.coefficients.len() != n {
        return Err(SolveError::ObjectiveLength {
            expected: n,
            found: problem.objective.coefficients.len(),
        });
    }
    if problem.objective.coefficients.iter().any(|c| !c.is_finite()) {
        return Err(SolveError::NonFinite("objective".to_string()));
    }

    for c in &problem.constraints {
        if c.coefficients.len() != n {
            return Err(SolveError::ConstraintLength {
                constraint: c.name.clone(),
                expected: n,
                found: c.coefficients.len(),
            });
        }
        if !c.rhs.is_finite() || c.coefficients.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite(format!("constraint '{}'", c.name)));
        }
    }

    if problem.bounds.len() != n {
        return Err(SolveError::BoundsLength {
            expected: n,
            found: problem.bounds.len(),
        });
    }
    for (name, b) in problem.variables.iter().zip(&problem.bounds) {
        if !b.lower.is_finite() || b.lower < 0.0 {
            return Err(SolveError::InvalidLowerBound(name.clone()));
        }
        if b.upper.is_some_and(|u| !u.is_finite()) {
            return Err(SolveError::NonFinite(format!("upper bound of '{}'", name)));
        }
    }

    Ok(())
}

/// A constraint row normalized to a non-negative right-hand side
struct Row {
    coefficients: Vec<f64>,
    op: ConstraintOp,
    rhs: f64,
    flipped: bool,
}

impl Row {
    fn new(coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) -> Self {
        if rhs >= 0.0 {
            return Self { coefficients, op, rhs, flipped: false };
        }
        let op = match op {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        };
        Self {
            coefficients: coefficients.iter().map(|c| -c).collect(),
            op,
            rhs: -rhs,
            flipped: true,
        }
    }
}

/// Problem constraints followed by one row per finite variable bound
fn standard_rows(problem: &LpProblem, bounds: &[VariableBounds]) -> Vec<Row> {
    let n = problem.num_variables();
    let mut rows: Vec<Row> = problem
        .constraints
        .iter()
        .map(|c| Row::new(c.coefficients.clone(), c.op, c.rhs))
        .collect();

    for (j, b) in bounds.iter().enumerate() {
        if b.lower > 0.0 {
            let mut unit = vec![0.0; n];
            unit[j] = 1.0;
            rows.push(Row::new(unit, ConstraintOp::Ge, b.lower));
        }
        if let Some(upper) = b.upper {
            let mut unit = vec![0.0; n];
            unit[j] = 1.0;
            rows.push(Row::new(unit, ConstraintOp::Le, upper));
        }
    }

    rows
}

/// Where to read a row's dual value from the final objective row:
/// `dual = sign * objective_row[col]`
#[derive(Debug, Clone, Copy)]
struct DualColumn {
    col: usize,
    sign: f64,
}

struct Tableau {
    /// Constraint rows followed by the objective row; last column is the RHS
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    duals: Vec<DualColumn>,
}

impl Tableau {
    /// Lay out `[structural | slack/surplus | artificial | rhs]` for a
    /// maximization of `objective`
    fn build(rows: &[Row], objective: &[f64]) -> Self {
        let n_vars = objective.len();
        let n_constraints = rows.len();

        let mut n_slack = 0;
        let mut n_artificial = 0;
        for row in rows {
            match row.op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; n_constraints + 1],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
            duals: Vec::with_capacity(n_constraints),
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, row) in rows.iter().enumerate() {
            tableau.data[i][..n_vars].copy_from_slice(&row.coefficients);
            tableau.data[i][total_cols - 1] = row.rhs;

            // dual of the normalized row, before undoing the flip
            let dual = match row.op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                    DualColumn { col: slack_idx - 1, sign: -1.0 }
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    slack_idx += 1;
                    artificial_idx += 1;
                    DualColumn { col: slack_idx - 1, sign: 1.0 }
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                    DualColumn { col: artificial_idx - 1, sign: -1.0 }
                }
            };
            let sign = if row.flipped { -dual.sign } else { dual.sign };
            tableau.duals.push(DualColumn { col: dual.col, sign });
        }

        tableau.data[n_constraints][..n_vars].copy_from_slice(objective);

        tableau
    }

    fn n_rows(&self) -> usize {
        self.basic_vars.len()
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let n_cols = self.n_cols();

        self.basic_vars[row] = col;

        let pivot_val = self.data[row][col];
        for j in 0..n_cols {
            self.data[row][j] /= pivot_val;
        }

        for i in 0..self.data.len() {
            if i != row {
                let factor = self.data[i][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n_cols {
                    self.data[i][j] -= factor * self.data[row][j];
                }
            }
        }
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}
