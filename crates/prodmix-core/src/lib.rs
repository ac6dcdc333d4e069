pub mod backend;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod result;
pub mod table;

pub use backend::LpBackend;
pub use error::{EvaluatorError, SolverFault, ValidationError};
pub use evaluator::Evaluator;
pub use model::{Constraint, Model, Relation, Variable, VariableKind};
pub use prodmix_solver::{SolutionStatus, Solver};
pub use result::{NamedValues, SolveResult};
pub use table::{Product, ProductionTable, Scenario, ScenarioOutcome, Sector, product_variable, sector_constraint};
