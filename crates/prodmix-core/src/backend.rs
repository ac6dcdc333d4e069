use prodmix_solver::{LpProblem, Solution, Solver};

use crate::error::SolverFault;

/// The solver capability the evaluator delegates to
pub trait LpBackend {
    fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverFault>;
}

impl LpBackend for Solver {
    fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverFault> {
        Ok(Solver::solve(self, problem)?)
    }
}

impl<B: LpBackend + ?Sized> LpBackend for &B {
    fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverFault> {
        (**self).solve(problem)
    }
}
