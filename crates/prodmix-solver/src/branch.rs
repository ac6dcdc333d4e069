use log::{debug, info, warn};

use crate::problem::{LpProblem, VariableBounds};
use crate::simplex::Solver;
use crate::solution::{Analysis, Solution, SolutionStatus};

/// Distance from the nearest integer below which a value counts as integral
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

struct Incumbent {
    values: Vec<f64>,
    /// Objective in maximization sense
    score: f64,
}

impl Solver {
    /// Depth-first branch-and-bound over the LP relaxation, branching on the
    /// most fractional integer variable.
    ///
    /// Shadow prices and reduced costs are not reported for the result: the
    /// duals of the final relaxation describe the branched subproblem, not
    /// the integer program.
    pub(crate) fn branch_and_bound(&self, problem: &LpProblem) -> Solution {
        let sense = if problem.objective.minimize { -1.0 } else { 1.0 };

        let mut stack: Vec<Vec<VariableBounds>> = vec![problem.bounds.clone()];
        let mut incumbent: Option<Incumbent> = None;
        let mut nodes = 0usize;
        let mut exhausted = true;

        while let Some(bounds) = stack.pop() {
            if nodes >= self.max_nodes() {
                warn!("Branch-and-bound stopped at the node limit ({})", self.max_nodes());
                exhausted = false;
                break;
            }
            nodes += 1;

            let relaxed = self.solve_relaxation(problem, &bounds);
            match relaxed.status {
                SolutionStatus::Optimal => {}
                SolutionStatus::Infeasible => continue,
                SolutionStatus::Unbounded => {
                    info!("LP relaxation is unbounded after {} nodes", nodes);
                    return Solution::unbounded();
                }
                SolutionStatus::NotSolved => {
                    exhausted = false;
                    continue;
                }
            }

            let bound = sense * relaxed.objective_value;
            if let Some(best) = &incumbent {
                if bound <= best.score + self.feasibility_tolerance() {
                    continue;
                }
            }

            match most_fractional(&relaxed.values, &bounds) {
                None => {
                    let values = round_integers(&relaxed.values, &bounds);
                    let score = sense * problem.objective_value(&values);
                    debug!("New incumbent at node {}: objective {}", nodes, sense * score);
                    incumbent = Some(Incumbent { values, score });
                }
                Some((j, value)) => {
                    let mut down = bounds.clone();
                    down[j].upper = Some(value.floor());
                    let mut up = bounds;
                    up[j].lower = value.ceil();

                    // Explore the side nearer to the relaxed value first
                    if value - value.floor() >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        debug!("Branch-and-bound explored {} nodes", nodes);

        if !exhausted {
            return Solution::not_solved();
        }

        match incumbent {
            Some(Incumbent { values, .. }) => {
                let objective_value = problem.objective_value(&values);
                let analysis = Analysis {
                    binding_constraints: self.binding_constraints(problem, &values),
                    ..Analysis::default()
                };
                Solution::optimal(values, objective_value, analysis)
            }
            None => Solution::infeasible(),
        }
    }
}

/// The integer variable whose value is farthest from integral, if any
fn most_fractional(values: &[f64], bounds: &[VariableBounds]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;

    for (j, (&value, b)) in values.iter().zip(bounds).enumerate() {
        if !b.integer {
            continue;
        }
        let frac = value - value.floor();
        let distance = frac.min(1.0 - frac);
        if distance <= INTEGRALITY_TOLERANCE {
            continue;
        }
        if best.is_none_or(|(_, _, d)| distance > d) {
            best = Some((j, value, distance));
        }
    }

    best.map(|(j, value, _)| (j, value))
}

fn round_integers(values: &[f64], bounds: &[VariableBounds]) -> Vec<f64> {
    values
        .iter()
        .zip(bounds)
        .map(|(&v, b)| if b.integer { v.round() } else { v })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintOp;

    fn knapsack() -> LpProblem {
        // Maximize 5x + 4y
        // Subject to:
        //   6x + 4y <= 24
        //   x + 2y <= 6
        // LP optimum (3, 1.5) = 21; integer optimum (4, 0) = 20
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![5.0, 4.0], false);
        problem.add_constraint("material", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        problem.add_constraint("labor", vec![1.0, 2.0], ConstraintOp::Le, 6.0);
        problem
    }

    #[test]
    fn test_relaxation_is_fractional() {
        let solution = Solver::new().solve(&knapsack()).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 21.0).abs() < 1e-6, "obj = {}", solution.objective_value);
        assert!((solution.values[1] - 1.5).abs() < 1e-6, "y = {}", solution.values[1]);
    }

    #[test]
    fn test_integer_optimum() {
        let mut problem = knapsack();
        problem.set_integer(true);

        let solution = Solver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![4.0, 0.0]);
        assert!((solution.objective_value - 20.0).abs() < 1e-9, "obj = {}", solution.objective_value);
        assert!(solution.analysis.shadow_prices.is_empty());
        assert_eq!(solution.analysis.binding_constraints, vec!["material".to_string()]);
    }

    #[test]
    fn test_integer_minimization() {
        // Minimize x + y subject to 2x + 2y >= 3: LP gives 1.5, integers need 2
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![1.0, 1.0], true);
        problem.add_constraint("demand", vec![2.0, 2.0], ConstraintOp::Ge, 3.0);
        problem.set_integer(true);

        let solution = Solver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 2.0).abs() < 1e-9, "obj = {}", solution.objective_value);
    }

    #[test]
    fn test_no_integer_point() {
        // 0.2 <= x <= 0.8 contains no integer
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], false);
        problem.add_constraint("low", vec![1.0], ConstraintOp::Ge, 0.2);
        problem.add_constraint("high", vec![1.0], ConstraintOp::Le, 0.8);
        problem.set_integer(true);

        let solution = Solver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_integer_unbounded() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("y_cap", vec![0.0, 1.0], ConstraintOp::Le, 2.5);
        problem.set_integer(true);

        let solution = Solver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_node_limit() {
        let mut problem = knapsack();
        problem.set_integer(true);

        let solution = Solver::new().with_max_nodes(1).solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::NotSolved);
    }

    #[test]
    fn test_mixed_integer() {
        // Only x integral: maximize 5x + 4y, LP point (3, 1.5) already has x integral
        let mut problem = knapsack();
        problem.bounds[0].integer = true;

        let solution = Solver::new().solve(&problem).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 21.0).abs() < 1e-6, "obj = {}", solution.objective_value);
    }

    #[test]
    fn test_most_fractional_picks_farthest() {
        let bounds = vec![
            VariableBounds { integer: true, ..VariableBounds::default() },
            VariableBounds { integer: true, ..VariableBounds::default() },
            VariableBounds::default(),
        ];
        assert_eq!(most_fractional(&[1.1, 2.45, 0.5], &bounds), Some((1, 2.45)));
        assert_eq!(most_fractional(&[1.0, 2.0000000001, 0.5], &bounds), None);
    }
}
