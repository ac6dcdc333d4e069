use std::collections::HashSet;
use std::fmt;

use prodmix_solver::{ConstraintOp, LpProblem, VariableBounds};

use crate::error::ValidationError;
use crate::result::NamedValues;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableKind {
    #[default]
    Continuous,
    Integer,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl From<Relation> for ConstraintOp {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::Le => ConstraintOp::Le,
            Relation::Ge => ConstraintOp::Ge,
            Relation::Eq => ConstraintOp::Eq,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ConstraintOp::from(*self).symbol())
    }
}

/// A named, non-negative decision variable
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Objective coefficient
    pub profit: f64,
    pub kind: VariableKind,
    pub lower: f64,
    /// `None` means unbounded above
    pub upper: Option<f64>,
}

/// A named linear constraint: `sum(coefficient * variable) <relation> rhs`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(String, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        terms: impl IntoIterator<Item = (N, f64)>,
        relation: Relation,
        rhs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            terms: terms.into_iter().map(|(v, c)| (v.into(), c)).collect(),
            relation,
            rhs,
        }
    }

    pub fn at_most<N: Into<String>>(name: impl Into<String>, terms: impl IntoIterator<Item = (N, f64)>, rhs: f64) -> Self {
        Self::new(name, terms, Relation::Le, rhs)
    }

    pub fn at_least<N: Into<String>>(name: impl Into<String>, terms: impl IntoIterator<Item = (N, f64)>, rhs: f64) -> Self {
        Self::new(name, terms, Relation::Ge, rhs)
    }

    pub fn exactly<N: Into<String>>(name: impl Into<String>, terms: impl IntoIterator<Item = (N, f64)>, rhs: f64) -> Self {
        Self::new(name, terms, Relation::Eq, rhs)
    }

    /// Left-hand side for `value_of(variable)`; repeated terms add up
    fn activity(&self, value_of: impl Fn(&str) -> f64) -> f64 {
        self.terms.iter().map(|(v, c)| c * value_of(v.as_str())).sum()
    }
}

/// A maximization model with named variables and constraints.
///
/// Models are plain values: every scenario builds (or clones) its own, so no
/// two solves share variable state.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
}

impl Model {
    /// Declare one variable per profit entry and attach the constraints.
    ///
    /// Fails if a constraint mentions a variable missing from `profits`, if
    /// a variable or constraint name repeats, or on non-finite numbers.
    pub fn build<N: Into<String>>(
        profits: impl IntoIterator<Item = (N, f64)>,
        constraints: impl IntoIterator<Item = Constraint>,
        kind: VariableKind,
    ) -> Result<Self, ValidationError> {
        let mut model = Model {
            variables: Vec::new(),
            constraints: Vec::new(),
        };

        for (name, profit) in profits {
            let name = name.into();
            model.check_new_variable(&name, profit)?;
            model.variables.push(Variable {
                name,
                profit,
                kind,
                lower: 0.0,
                upper: None,
            });
        }

        for constraint in constraints {
            model.add_constraint(constraint)?;
        }

        Ok(model)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ValidationError> {
        if constraint.name.is_empty() {
            return Err(ValidationError::EmptyName("constraint"));
        }
        if self.constraint(&constraint.name).is_some() {
            return Err(ValidationError::DuplicateConstraint(constraint.name));
        }
        if !constraint.rhs.is_finite() {
            return Err(ValidationError::NonFinite(format!("right-hand side of '{}'", constraint.name)));
        }
        for (variable, coef) in &constraint.terms {
            if self.variable(variable).is_none() {
                return Err(ValidationError::UndeclaredVariable {
                    constraint: constraint.name.clone(),
                    variable: variable.clone(),
                });
            }
            if !coef.is_finite() {
                return Err(ValidationError::NonFinite(format!(
                    "coefficient of '{}' in '{}'",
                    variable, constraint.name
                )));
            }
        }

        self.constraints.push(constraint);
        Ok(())
    }

    /// Add a new variable with its coefficients in existing constraints.
    /// Nothing changes if any part of the column is invalid.
    pub fn add_variable<C: AsRef<str>>(
        &mut self,
        name: impl Into<String>,
        profit: f64,
        kind: VariableKind,
        column: impl IntoIterator<Item = (C, f64)>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        self.check_new_variable(&name, profit)?;

        let mut entries = Vec::new();
        for (constraint, coef) in column {
            let constraint = constraint.as_ref();
            let index = self
                .constraint_index(constraint)
                .ok_or_else(|| ValidationError::UnknownConstraint(constraint.to_string()))?;
            if !coef.is_finite() {
                return Err(ValidationError::NonFinite(format!(
                    "coefficient of '{}' in '{}'",
                    name, constraint
                )));
            }
            entries.push((index, coef));
        }

        for (index, coef) in entries {
            self.constraints[index].terms.push((name.clone(), coef));
        }
        self.variables.push(Variable {
            name,
            profit,
            kind,
            lower: 0.0,
            upper: None,
        });
        Ok(())
    }

    /// Set `lower <= variable <= upper`. Lower bounds must be non-negative.
    pub fn set_bounds(&mut self, name: &str, lower: f64, upper: Option<f64>) -> Result<(), ValidationError> {
        let invalid = !lower.is_finite()
            || lower < 0.0
            || upper.is_some_and(|u| !u.is_finite() || u < lower);
        if invalid {
            return Err(ValidationError::InvalidBounds {
                variable: name.to_string(),
                lower,
                upper,
            });
        }

        let variable = self
            .variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| ValidationError::UnknownVariable(name.to_string()))?;
        variable.lower = lower;
        variable.upper = upper;
        Ok(())
    }

    /// Replace every objective coefficient. Variables missing from `profits`
    /// get a zero coefficient. Nothing changes on error.
    pub fn replace_objective<N: AsRef<str>>(
        &mut self,
        profits: impl IntoIterator<Item = (N, f64)>,
    ) -> Result<(), ValidationError> {
        let mut coefficients = vec![0.0; self.variables.len()];
        let mut seen = HashSet::new();

        for (name, profit) in profits {
            let name = name.as_ref();
            let index = self
                .variable_index(name)
                .ok_or_else(|| ValidationError::UnknownVariable(name.to_string()))?;
            if !seen.insert(index) {
                return Err(ValidationError::DuplicateVariable(name.to_string()));
            }
            if !profit.is_finite() {
                return Err(ValidationError::NonFinite(format!("profit of '{}'", name)));
            }
            coefficients[index] = profit;
        }

        for (variable, profit) in self.variables.iter_mut().zip(coefficients) {
            variable.profit = profit;
        }
        Ok(())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn has_integer_variables(&self) -> bool {
        self.variables.iter().any(|v| v.kind == VariableKind::Integer)
    }

    /// Profit of `mix` under the current objective; absent variables count as zero
    pub fn objective_of(&self, mix: &NamedValues) -> f64 {
        self.variables
            .iter()
            .map(|v| v.profit * mix.get(&v.name).unwrap_or(0.0))
            .sum()
    }

    /// Left-hand side of every constraint for `mix`, in constraint order
    pub fn usage_of(&self, mix: &NamedValues) -> NamedValues {
        self.constraints
            .iter()
            .map(|c| (c.name.clone(), c.activity(|v| mix.get(v).unwrap_or(0.0))))
            .collect()
    }

    /// Dense form for the solver, variables in declaration order
    pub fn to_lp_problem(&self) -> LpProblem {
        let mut problem = LpProblem::new(self.variables.iter().map(|v| v.name.clone()).collect());
        problem.set_objective(self.variables.iter().map(|v| v.profit).collect(), false);

        for c in &self.constraints {
            let mut coefficients = vec![0.0; self.variables.len()];
            for (variable, coef) in &c.terms {
                if let Some(j) = self.variable_index(variable) {
                    coefficients[j] += coef;
                }
            }
            problem.add_constraint(c.name.clone(), coefficients, c.relation.into(), c.rhs);
        }

        for (j, v) in self.variables.iter().enumerate() {
            problem.set_bounds(
                j,
                VariableBounds {
                    lower: v.lower,
                    upper: v.upper,
                    integer: v.kind == VariableKind::Integer,
                },
            );
        }

        problem
    }

    fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    fn constraint_index(&self, name: &str) -> Option<usize> {
        self.constraints.iter().position(|c| c.name == name)
    }

    fn check_new_variable(&self, name: &str, profit: f64) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName("variable"));
        }
        if self.variable(name).is_some() {
            return Err(ValidationError::DuplicateVariable(name.to_string()));
        }
        if !profit.is_finite() {
            return Err(ValidationError::NonFinite(format!("profit of '{}'", name)));
        }
        Ok(())
    }
}

/// Writes the model in textbook form:
///
/// ```text
/// Maximize P = 25 x1 + 34 x2
///   cap: 1.5 x1 + 2.2 x2 <= 27
///   x1, x2 >= 0
/// ```
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Maximize P =")?;
        write_terms(f, self.variables.iter().map(|v| (v.name.as_str(), v.profit)))?;
        writeln!(f)?;

        for c in &self.constraints {
            write!(f, "  {}:", c.name)?;
            write_terms(f, c.terms.iter().map(|(v, coef)| (v.as_str(), *coef)))?;
            writeln!(f, " {} {}", c.relation, c.rhs)?;
        }

        for v in &self.variables {
            let kind = match v.kind {
                VariableKind::Continuous => "",
                VariableKind::Integer => ", integer",
            };
            match v.upper {
                Some(upper) => writeln!(f, "  {} <= {} <= {}{}", v.lower, v.name, upper, kind)?,
                None => writeln!(f, "  {} >= {}{}", v.name, v.lower, kind)?,
            }
        }
        Ok(())
    }
}

fn write_terms<'a>(f: &mut fmt::Formatter<'_>, terms: impl Iterator<Item = (&'a str, f64)>) -> fmt::Result {
    let mut first = true;
    for (name, coef) in terms {
        match (first, coef < 0.0) {
            (true, false) => write!(f, " {} {}", coef, name)?,
            (true, true) => write!(f, " -{} {}", -coef, name)?,
            (false, false) => write!(f, " + {} {}", coef, name)?,
            (false, true) => write!(f, " - {} {}", -coef, name)?,
        }
        first = false;
    }
    if first {
        write!(f, " 0")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_product_model() -> Model {
        Model::build(
            [("x", 3.0), ("y", 2.0)],
            [
                Constraint::at_most("sum", [("x", 1.0), ("y", 1.0)], 4.0),
                Constraint::at_most("x_max", [("x", 1.0)], 3.0),
            ],
            VariableKind::Continuous,
        )
        .unwrap()
    }

    #[test]
    fn test_build_keeps_declaration_order() {
        let model = two_product_model();

        let names: Vec<_> = model.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        let constraints: Vec<_> = model.constraints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(constraints, ["sum", "x_max"]);
        assert_eq!(model.variable("y").unwrap().upper, None);
        assert_eq!(model.variable("y").unwrap().lower, 0.0);
    }

    #[test]
    fn test_build_rejects_undeclared_variable() {
        let err = Model::build(
            [("x", 1.0)],
            [Constraint::at_most("cap", [("x", 1.0), ("z", 2.0)], 4.0)],
            VariableKind::Integer,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::UndeclaredVariable {
                constraint: "cap".to_string(),
                variable: "z".to_string(),
            }
        );
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = Model::build([("x", 1.0), ("x", 2.0)], [], VariableKind::Continuous).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateVariable("x".to_string()));

        let err = Model::build(
            [("x", 1.0)],
            [
                Constraint::at_most("cap", [("x", 1.0)], 4.0),
                Constraint::at_least("cap", [("x", 1.0)], 1.0),
            ],
            VariableKind::Continuous,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateConstraint("cap".to_string()));
    }

    #[test]
    fn test_build_rejects_non_finite_and_empty_names() {
        let err = Model::build([("x", f64::INFINITY)], [], VariableKind::Continuous).unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite(_)));

        let err = Model::build(
            [("x", 1.0)],
            [Constraint::at_most("cap", [("x", f64::NAN)], 4.0)],
            VariableKind::Continuous,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite(_)));

        let err = Model::build([("", 1.0)], [], VariableKind::Continuous).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName("variable"));
    }

    #[test]
    fn test_set_bounds() {
        let mut model = two_product_model();

        model.set_bounds("y", 1.0, Some(2.5)).unwrap();
        assert_eq!(model.variable("y").unwrap().upper, Some(2.5));

        assert!(matches!(
            model.set_bounds("y", 3.0, Some(2.0)),
            Err(ValidationError::InvalidBounds { .. })
        ));
        assert!(matches!(
            model.set_bounds("y", -1.0, None),
            Err(ValidationError::InvalidBounds { .. })
        ));
        assert_eq!(
            model.set_bounds("z", 0.0, None),
            Err(ValidationError::UnknownVariable("z".to_string()))
        );
    }

    #[test]
    fn test_replace_objective_is_atomic() {
        let mut model = two_product_model();

        let err = model.replace_objective([("x", 5.0), ("w", 1.0)]).unwrap_err();
        assert_eq!(err, ValidationError::UnknownVariable("w".to_string()));
        assert_eq!(model.variable("x").unwrap().profit, 3.0);

        let err = model.replace_objective([("x", 5.0), ("x", 1.0)]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateVariable("x".to_string()));

        model.replace_objective([("x", 5.0)]).unwrap();
        assert_eq!(model.variable("x").unwrap().profit, 5.0);
        assert_eq!(model.variable("y").unwrap().profit, 0.0);
    }

    #[test]
    fn test_add_variable_extends_constraints() {
        let mut model = two_product_model();

        let err = model
            .add_variable("z", 1.0, VariableKind::Continuous, [("sum", 1.0), ("missing", 1.0)])
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownConstraint("missing".to_string()));
        assert!(model.variable("z").is_none());
        assert_eq!(model.constraint("sum").unwrap().terms.len(), 2);

        model
            .add_variable("z", 4.0, VariableKind::Continuous, [("sum", 2.0)])
            .unwrap();
        assert_eq!(model.constraint("sum").unwrap().terms.last(), Some(&("z".to_string(), 2.0)));

        let problem = model.to_lp_problem();
        assert_eq!(problem.variables, ["x", "y", "z"]);
        assert_eq!(problem.constraints[0].coefficients, vec![1.0, 1.0, 2.0]);
        assert_eq!(problem.constraints[1].coefficients, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_add_variable_rejects_non_finite_coefficient() {
        let mut model = two_product_model();

        let err = model
            .add_variable("z", 1.0, VariableKind::Continuous, [("sum", 1.0), ("x_max", f64::NAN)])
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite(_)));
        assert!(model.variable("z").is_none());
        assert_eq!(model.constraint("sum").unwrap().terms.len(), 2);
    }

    #[test]
    fn test_add_constraint_validation() {
        let mut model = two_product_model();

        let err = model
            .add_constraint(Constraint::at_most("", [("x", 1.0)], 1.0))
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName("constraint"));

        let err = model
            .add_constraint(Constraint::at_most("cap", [("x", 1.0)], f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite(_)));

        assert_eq!(model.constraints().len(), 2);
        assert!(model.constraint("cap").is_none());
    }

    #[test]
    fn test_to_lp_problem_sums_repeated_terms() {
        let model = Model::build(
            [("x", 1.0)],
            [Constraint::at_most("cap", [("x", 1.0), ("x", 0.5)], 3.0)],
            VariableKind::Integer,
        )
        .unwrap();

        let problem = model.to_lp_problem();
        assert_eq!(problem.constraints[0].coefficients, vec![1.5]);
        assert!(!problem.objective.minimize);
        assert!(problem.bounds[0].integer);
    }

    #[test]
    fn test_objective_and_usage_of_mix() {
        let model = two_product_model();
        let mix: NamedValues = [("x".to_string(), 3.0), ("y".to_string(), 1.0)].into_iter().collect();

        assert_eq!(model.objective_of(&mix), 11.0);
        let usage = model.usage_of(&mix);
        assert_eq!(usage.get("sum"), Some(4.0));
        assert_eq!(usage.get("x_max"), Some(3.0));
    }

    #[test]
    fn test_display() {
        let model = two_product_model();
        let text = model.to_string();

        assert!(text.starts_with("Maximize P = 3 x + 2 y\n"), "{}", text);
        assert!(text.contains("  sum: 1 x + 1 y <= 4\n"), "{}", text);
        assert!(text.contains("  x >= 0\n"), "{}", text);
    }
}
