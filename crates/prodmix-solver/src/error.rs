use thiserror::Error;

/// Reasons the solver refuses a problem before pivoting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Objective has {found} coefficients, expected {expected}")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint '{constraint}' has {found} coefficients, expected {expected}")]
    ConstraintLength {
        constraint: String,
        expected: usize,
        found: usize,
    },
    #[error("Problem has {found} variable bounds, expected {expected}")]
    BoundsLength { expected: usize, found: usize },
    #[error("Non-finite value in {0}")]
    NonFinite(String),
    #[error("Variable '{0}' has a negative or non-finite lower bound")]
    InvalidLowerBound(String),
}
