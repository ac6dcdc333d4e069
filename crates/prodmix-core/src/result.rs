use prodmix_solver::SolutionStatus;

/// Name -> value pairs in model order
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedValues(Vec<(String, f64)>);

impl NamedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.0.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for NamedValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of solving a [`Model`](crate::Model).
///
/// Check `status` first: the optional fields are only populated for
/// `Optimal` results, and `shadow_prices`/`reduced_costs` additionally
/// require a model without integer variables.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolutionStatus,
    pub values: Option<NamedValues>,
    pub objective_value: Option<f64>,
    /// Left-hand side of each constraint at `values`
    pub constraint_usage: Option<NamedValues>,
    /// Dual value of each constraint, as reported by the solver
    pub shadow_prices: Option<NamedValues>,
    pub reduced_costs: Option<NamedValues>,
    /// Constraints whose usage equals their right-hand side
    pub binding_constraints: Vec<String>,
}

impl SolveResult {
    pub(crate) fn without_solution(status: SolutionStatus) -> Self {
        Self {
            status,
            values: None,
            objective_value: None,
            constraint_usage: None,
            shadow_prices: None,
            reduced_costs: None,
            binding_constraints: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn value(&self, variable: &str) -> Option<f64> {
        self.values.as_ref()?.get(variable)
    }

    pub fn usage(&self, constraint: &str) -> Option<f64> {
        self.constraint_usage.as_ref()?.get(constraint)
    }

    pub fn shadow_price(&self, constraint: &str) -> Option<f64> {
        self.shadow_prices.as_ref()?.get(constraint)
    }
}
