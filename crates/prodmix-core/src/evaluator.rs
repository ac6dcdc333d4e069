use log::{info, warn};
use prodmix_solver::{Solution, SolutionStatus, Solver};

use crate::backend::LpBackend;
use crate::error::{EvaluatorError, SolverFault};
use crate::model::Model;
use crate::result::{NamedValues, SolveResult};

/// Builds solver input from a [`Model`] and turns the solver's answer into a
/// named [`SolveResult`]
#[derive(Debug, Clone, Default)]
pub struct Evaluator<B = Solver> {
    backend: B,
}

impl Evaluator<Solver> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: LpBackend> Evaluator<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Solve the model as it stands. Infeasible, unbounded and unsolved
    /// models are reported through `status`; only backend failures are errors.
    pub fn solve(&self, model: &Model) -> Result<SolveResult, SolverFault> {
        let problem = model.to_lp_problem();
        let solution = self.backend.solve(&problem).inspect_err(|e| warn!("Solver fault: {}", e))?;
        let result = interpret(model, solution)?;

        info!(
            "Solved {} variables x {} constraints: {}{}",
            model.variables().len(),
            model.constraints().len(),
            result.status,
            result
                .objective_value
                .map(|v| format!(" (objective {})", v))
                .unwrap_or_default()
        );
        Ok(result)
    }

    /// Replace the model's objective with `profits` and solve again.
    /// The model is left unchanged if the new profits do not validate.
    pub fn resolve_with_new_objective<N: AsRef<str>>(
        &self,
        model: &mut Model,
        profits: impl IntoIterator<Item = (N, f64)>,
    ) -> Result<SolveResult, EvaluatorError> {
        model.replace_objective(profits)?;
        Ok(self.solve(model)?)
    }
}

fn interpret(model: &Model, solution: Solution) -> Result<SolveResult, SolverFault> {
    if solution.status != SolutionStatus::Optimal {
        return Ok(SolveResult::without_solution(solution.status));
    }

    let variables = model.variables();
    if solution.values.len() != variables.len() {
        return Err(SolverFault::MalformedOutput(format!(
            "{} values for {} variables",
            solution.values.len(),
            variables.len()
        )));
    }
    if !solution.objective_value.is_finite() || solution.values.iter().any(|v| !v.is_finite()) {
        return Err(SolverFault::MalformedOutput("non-finite optimal solution".to_string()));
    }

    let values: NamedValues = variables
        .iter()
        .zip(&solution.values)
        .map(|(v, &value)| (v.name.clone(), value))
        .collect();
    let constraint_usage = model.usage_of(&values);

    // Duals are only meaningful for the continuous problem
    let (shadow_prices, reduced_costs) = if model.has_integer_variables() {
        (None, None)
    } else {
        (Some(shadow_prices(model, &solution)?), Some(reduced_costs(model, &solution)?))
    };

    Ok(SolveResult {
        status: SolutionStatus::Optimal,
        values: Some(values),
        objective_value: Some(solution.objective_value),
        constraint_usage: Some(constraint_usage),
        shadow_prices,
        reduced_costs,
        binding_constraints: solution.analysis.binding_constraints,
    })
}

fn shadow_prices(model: &Model, solution: &Solution) -> Result<NamedValues, SolverFault> {
    model
        .constraints()
        .iter()
        .map(|c| match solution.shadow_price(&c.name) {
            Some(value) if value.is_finite() => Ok((c.name.clone(), value)),
            _ => Err(SolverFault::MalformedOutput(format!("no shadow price for '{}'", c.name))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(NamedValues::from_iter)
}

fn reduced_costs(model: &Model, solution: &Solution) -> Result<NamedValues, SolverFault> {
    model
        .variables()
        .iter()
        .map(|v| {
            solution
                .analysis
                .reduced_costs
                .iter()
                .find(|rc| rc.variable == v.name)
                .map(|rc| (v.name.clone(), rc.reduced_cost))
                .ok_or_else(|| SolverFault::MalformedOutput(format!("no reduced cost for '{}'", v.name)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(NamedValues::from_iter)
}
