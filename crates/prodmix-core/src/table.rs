use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::backend::LpBackend;
use crate::error::{EvaluatorError, ValidationError};
use crate::evaluator::Evaluator;
use crate::model::{Constraint, Model, VariableKind};
use crate::result::SolveResult;

/// A production sector with limited weekly hours
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub name: String,
    pub hours_available: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    /// Profit per unit
    pub profit: f64,
    /// Hours per unit in each sector, in sector order
    pub hours: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_units: Option<f64>,
}

/// Production times per unit, sector capacities and unit profits
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionTable {
    pub sectors: Vec<Sector>,
    pub products: Vec<Product>,
}

/// Variable name used for a product
pub fn product_variable(product: &str) -> String {
    format!("Product_{}", product)
}

/// Constraint name used for a sector
pub fn sector_constraint(sector: &str) -> String {
    format!("Sector_{}", sector)
}

impl ProductionTable {
    /// The weekly product-mix exercise: four products sharing sectors A, B, C
    pub fn term_project() -> Self {
        let sectors = [("A", 27.0), ("B", 33.0), ("C", 22.0)]
            .into_iter()
            .map(|(name, hours_available)| Sector {
                name: name.to_string(),
                hours_available,
            })
            .collect();

        let products = [
            ("1", 25.0, [1.5, 1.3, 1.9]),
            ("2", 34.0, [2.2, 2.5, 1.6]),
            ("3", 24.0, [1.3, 1.3, 1.2]),
            ("4", 33.0, [2.2, 2.6, 1.1]),
        ]
        .into_iter()
        .map(|(name, profit, hours)| Product {
            name: name.to_string(),
            profit,
            hours: hours.to_vec(),
            max_units: None,
        })
        .collect();

        Self { sectors, products }
    }

    /// One `<=` constraint per sector, one variable per product
    pub fn to_model(&self, kind: VariableKind) -> Result<Model, ValidationError> {
        for p in &self.products {
            if p.hours.len() != self.sectors.len() {
                return Err(ValidationError::ShapeMismatch {
                    product: p.name.clone(),
                    expected: self.sectors.len(),
                    found: p.hours.len(),
                });
            }
        }

        let constraints = self.sectors.iter().enumerate().map(|(i, s)| {
            Constraint::at_most(
                sector_constraint(&s.name),
                self.products.iter().map(|p| (product_variable(&p.name), p.hours[i])),
                s.hours_available,
            )
        });
        let mut model = Model::build(self.profits(), constraints, kind)?;

        for p in &self.products {
            if let Some(max) = p.max_units {
                model.set_bounds(&product_variable(&p.name), 0.0, Some(max))?;
            }
        }

        Ok(model)
    }

    /// Objective coefficients keyed by variable name
    pub fn profits(&self) -> Vec<(String, f64)> {
        self.products
            .iter()
            .map(|p| (product_variable(&p.name), p.profit))
            .collect()
    }
}

/// The what-if questions asked of the term project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// The original mix
    Base,
    /// Product 2 earns $1 more, product 3 $1 less
    ProductTwoUp,
    /// Product 1 earns $1 more, products 2-4 $1 less each
    ProductOneUp,
    /// A fifth product earning $40 and using 1 h in every sector
    NewProduct,
}

/// A scenario's final model together with its solve result
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub model: Model,
    pub result: SolveResult,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Base,
        Scenario::ProductTwoUp,
        Scenario::ProductOneUp,
        Scenario::NewProduct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Base => "base",
            Scenario::ProductTwoUp => "product-two-up",
            Scenario::ProductOneUp => "product-one-up",
            Scenario::NewProduct => "new-product",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::Base => "Optimal product mix for the original profits",
            Scenario::ProductTwoUp => "Product 2 profit +$1, product 3 profit -$1",
            Scenario::ProductOneUp => "Product 1 profit +$1, products 2, 3 and 4 profit -$1",
            Scenario::NewProduct => "New product 5: $40 profit, 1 h/unit in every sector",
        }
    }

    /// Replacement profits for the sensitivity scenarios
    fn adjusted_profits(self) -> Option<[f64; 4]> {
        match self {
            Scenario::ProductTwoUp => Some([25.0, 35.0, 23.0, 33.0]),
            Scenario::ProductOneUp => Some([26.0, 33.0, 23.0, 32.0]),
            Scenario::Base | Scenario::NewProduct => None,
        }
    }

    /// Build the term-project model and answer this scenario's question
    pub fn run<B: LpBackend>(self, evaluator: &Evaluator<B>, kind: VariableKind) -> Result<ScenarioOutcome, EvaluatorError> {
        let table = ProductionTable::term_project();
        let mut model = table.to_model(kind)?;
        debug!("Running scenario {}", self.name());

        let result = match self {
            Scenario::Base => evaluator.solve(&model)?,
            Scenario::ProductTwoUp | Scenario::ProductOneUp => {
                let profits = table
                    .products
                    .iter()
                    .zip(self.adjusted_profits().unwrap_or_default())
                    .map(|(p, profit)| (product_variable(&p.name), profit));
                evaluator.resolve_with_new_objective(&mut model, profits)?
            }
            Scenario::NewProduct => {
                let column: Vec<(String, f64)> = table
                    .sectors
                    .iter()
                    .map(|s| (sector_constraint(&s.name), 1.0))
                    .collect();
                model.add_variable(product_variable("5"), 40.0, kind, column)?;
                evaluator.solve(&model)?
            }
        };

        Ok(ScenarioOutcome {
            scenario: self,
            model,
            result,
        })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::NamedValues;
    use prodmix_solver::SolutionStatus;

    fn objective(outcome: &ScenarioOutcome) -> f64 {
        outcome.result.objective_value.unwrap()
    }

    #[test]
    fn test_term_project_model_shape() {
        let model = ProductionTable::term_project().to_model(VariableKind::Integer).unwrap();

        assert_eq!(model.variables().len(), 4);
        assert_eq!(model.constraints().len(), 3);
        let sector_b = model.constraint("Sector_B").unwrap();
        assert_eq!(sector_b.rhs, 33.0);
        assert_eq!(sector_b.terms[3], ("Product_4".to_string(), 2.6));
        assert_eq!(model.variable("Product_2").unwrap().profit, 34.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut table = ProductionTable::term_project();
        table.products[2].hours.pop();

        let err = table.to_model(VariableKind::Continuous).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ShapeMismatch {
                product: "3".to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_max_units_become_bounds() {
        let mut table = ProductionTable::term_project();
        table.products[0].max_units = Some(2.0);

        let model = table.to_model(VariableKind::Integer).unwrap();
        assert_eq!(model.variable("Product_1").unwrap().upper, Some(2.0));

        let result = Evaluator::new().solve(&model).unwrap();
        assert!(result.value("Product_1").unwrap() <= 2.0);
    }

    #[test]
    fn test_base_scenario_respects_capacity() {
        let outcome = Scenario::Base.run(&Evaluator::new(), VariableKind::Integer).unwrap();
        let result = &outcome.result;

        assert_eq!(result.status, SolutionStatus::Optimal);
        let profit = objective(&outcome);
        assert!(profit.is_finite() && profit >= 0.0, "profit = {}", profit);

        for c in outcome.model.constraints() {
            let used = result.usage(&c.name).unwrap();
            assert!(used <= c.rhs + 1e-6, "{} uses {} of {}", c.name, used, c.rhs);
        }
        for (name, value) in result.values.as_ref().unwrap().iter() {
            assert!(value >= 0.0 && value.fract() == 0.0, "{} = {}", name, value);
        }
        assert!(result.shadow_prices.is_none());
    }

    #[test]
    fn test_relaxed_base_reports_shadow_prices() {
        let outcome = Scenario::Base.run(&Evaluator::new(), VariableKind::Continuous).unwrap();
        let result = &outcome.result;
        let prices = result.shadow_prices.as_ref().unwrap();

        assert_eq!(prices.len(), 3);
        for (name, price) in prices.iter() {
            assert!(price >= 0.0, "{} shadow price {}", name, price);
        }

        // Strong duality for a pure capacity problem
        let dual: f64 = outcome
            .model
            .constraints()
            .iter()
            .map(|c| result.shadow_price(&c.name).unwrap() * c.rhs)
            .sum();
        assert!((dual - objective(&outcome)).abs() < 1e-6, "dual {} vs primal {}", dual, objective(&outcome));

        let integer = Scenario::Base.run(&Evaluator::new(), VariableKind::Integer).unwrap();
        assert!(objective(&integer) <= objective(&outcome) + 1e-6);
    }

    #[test]
    fn test_profit_shift_does_not_lose_to_old_mix() {
        let evaluator = Evaluator::new();
        let base = Scenario::Base.run(&evaluator, VariableKind::Integer).unwrap();
        let shifted = Scenario::ProductTwoUp.run(&evaluator, VariableKind::Integer).unwrap();

        assert_eq!(shifted.model.variable("Product_2").unwrap().profit, 35.0);
        assert_eq!(shifted.model.variable("Product_3").unwrap().profit, 23.0);

        let old_mix: &NamedValues = base.result.values.as_ref().unwrap();
        let old_mix_new_prices = shifted.model.objective_of(old_mix);
        assert!(
            objective(&shifted) >= old_mix_new_prices - 1e-6,
            "new optimum {} below old mix {}",
            objective(&shifted),
            old_mix_new_prices
        );
    }

    #[test]
    fn test_product_one_up_profits() {
        let outcome = Scenario::ProductOneUp.run(&Evaluator::new(), VariableKind::Integer).unwrap();
        let profits: Vec<f64> = outcome.model.variables().iter().map(|v| v.profit).collect();

        assert_eq!(profits, [26.0, 33.0, 23.0, 32.0]);
        assert_eq!(outcome.result.status, SolutionStatus::Optimal);
    }

    #[test]
    fn test_new_product_never_lowers_profit() {
        let evaluator = Evaluator::new();
        let base = Scenario::Base.run(&evaluator, VariableKind::Integer).unwrap();
        let extended = Scenario::NewProduct.run(&evaluator, VariableKind::Integer).unwrap();

        assert_eq!(extended.model.variables().len(), 5);
        assert_eq!(extended.model.constraint("Sector_C").unwrap().terms.len(), 5);
        assert!(objective(&extended) >= objective(&base) - 1e-6);
        assert!(extended.result.value("Product_5").is_some());
    }

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
        assert!("missing".parse::<Scenario>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_demo_table_matches_term_project() {
        let source = include_str!("../../../demos/term_project.json");
        let table: ProductionTable = serde_json::from_str(source).unwrap();

        assert_eq!(table, ProductionTable::term_project());
    }
}
