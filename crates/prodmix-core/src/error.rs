use prodmix_solver::SolveError;
use thiserror::Error;

/// Malformed model input, raised before any solve attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty {0} name")]
    EmptyName(&'static str),
    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),
    #[error("Duplicate constraint: {0}")]
    DuplicateConstraint(String),
    #[error("Constraint '{constraint}' references undeclared variable '{variable}'")]
    UndeclaredVariable { constraint: String, variable: String },
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),
    #[error("Non-finite value in {0}")]
    NonFinite(String),
    #[error("Invalid bounds for '{variable}': lower {lower}, upper {upper:?}")]
    InvalidBounds {
        variable: String,
        lower: f64,
        upper: Option<f64>,
    },
    #[error("Product '{product}' lists {found} sector hours, expected {expected}")]
    ShapeMismatch {
        product: String,
        expected: usize,
        found: usize,
    },
}

/// The solver capability failed; fatal for the current solve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverFault {
    #[error("Solver rejected the problem: {0}")]
    Rejected(#[from] SolveError),
    #[error("Solver unavailable: {0}")]
    Unavailable(String),
    #[error("Solver returned malformed output: {0}")]
    MalformedOutput(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Solver(#[from] SolverFault),
}
