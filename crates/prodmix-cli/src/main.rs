use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use prodmix_core::{Evaluator, Model, ProductionTable, Scenario, SolutionStatus, SolveResult, Solver, VariableKind};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "prodmix")]
#[command(about = "Optimal product mix via linear programming", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a production table stored as JSON
    Solve {
        /// The JSON file with sectors and products
        file: PathBuf,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Run one of the built-in term-project scenarios
    Scenario {
        /// The scenario to run
        #[arg(value_parser = scenario_parser())]
        name: Scenario,
        #[command(flatten)]
        options: SolveOptions,
    },
    /// Check a production table for errors and print the model
    Check {
        /// The file to check
        file: PathBuf,
    },
}

#[derive(Args)]
struct SolveOptions {
    /// Allow fractional quantities (LP relaxation, reports shadow prices)
    #[arg(long)]
    relax: bool,
    /// Show shadow prices, reduced costs and binding constraints
    #[arg(short, long)]
    analysis: bool,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Simplex pivot limit per relaxation
    #[arg(long, default_value_t = 10000)]
    max_iterations: usize,
    /// Branch-and-bound node limit
    #[arg(long, default_value_t = 100_000)]
    max_nodes: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn scenario_parser() -> impl TypedValueParser<Value = Scenario> {
    PossibleValuesParser::new(Scenario::ALL.map(Scenario::name)).try_map(|name| name.parse::<Scenario>())
}

impl SolveOptions {
    fn kind(&self) -> VariableKind {
        if self.relax {
            VariableKind::Continuous
        } else {
            VariableKind::Integer
        }
    }

    fn evaluator(&self) -> Evaluator {
        Evaluator::with_backend(
            Solver::new()
                .with_max_iterations(self.max_iterations)
                .with_max_nodes(self.max_nodes),
        )
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Solve { file, options } => {
            let table = read_table(&file);

            let model = match table.to_model(options.kind()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Invalid table: {}", e);
                    std::process::exit(1);
                }
            };

            let result = match options.evaluator().solve(&model) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Solver error: {}", e);
                    std::process::exit(1);
                }
            };

            report(&file.display().to_string(), &model, &result, None, &options);
        }
        Commands::Scenario { name: scenario, options } => {
            let evaluator = options.evaluator();

            let outcome = match scenario.run(&evaluator, options.kind()) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("Scenario {} failed: {}", scenario, e);
                    std::process::exit(1);
                }
            };

            // What the original mix earns under this scenario's profits
            let baseline = if scenario == Scenario::Base {
                None
            } else {
                match Scenario::Base.run(&evaluator, options.kind()) {
                    Ok(base) => base.result.values.map(|mix| Baseline {
                        profit: base.result.objective_value.unwrap_or_default(),
                        under_new_profits: outcome.model.objective_of(&mix),
                    }),
                    Err(e) => {
                        eprintln!("Base scenario failed: {}", e);
                        std::process::exit(1);
                    }
                }
            };

            let title = format!("{} ({})", scenario, scenario.description());
            report(&title, &outcome.model, &outcome.result, baseline, &options);
        }
        Commands::Check { file } => {
            let table = read_table(&file);

            match table.to_model(VariableKind::Integer) {
                Ok(model) => {
                    println!("✓ {} is valid", file.display());
                    println!("  {} sectors", table.sectors.len());
                    println!("  {} products", table.products.len());
                    println!();
                    print!("{}", model);
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Profit of the original optimal mix, before and after a profit change
struct Baseline {
    profit: f64,
    under_new_profits: f64,
}

fn read_table(file: &Path) -> ProductionTable {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str(&source) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    }
}

fn report(title: &str, model: &Model, result: &SolveResult, baseline: Option<Baseline>, options: &SolveOptions) {
    if let Format::Json = options.format {
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                std::process::exit(1);
            }
        }
        if !result.is_optimal() {
            std::process::exit(1);
        }
        return;
    }

    println!("Problem: {}", title);
    println!();

    match result.status {
        SolutionStatus::Optimal => {
            println!("Status: OPTIMAL");
            println!("Total profit: {:.2}", result.objective_value.unwrap_or_default());
            println!();

            if let Some(values) = &result.values {
                println!("Production plan:");
                for (name, amount) in values.iter() {
                    println!("  {:20} {:10.2}", name, amount);
                }
                println!();
            }

            if let Some(usage) = &result.constraint_usage {
                println!("Used production time:");
                for c in model.constraints() {
                    let used = usage.get(&c.name).unwrap_or_default();
                    println!("  {:20} {:10.2} of {:.2}", c.name, used, c.rhs);
                }
            }

            if let Some(baseline) = baseline {
                println!();
                println!("Original mix profit:           {:10.2}", baseline.profit);
                println!("Original mix at new profits:   {:10.2}", baseline.under_new_profits);
                println!(
                    "Change from original optimum:  {:+10.2}",
                    result.objective_value.unwrap_or_default() - baseline.profit
                );
            }

            if options.analysis {
                println!();
                println!("Analysis:");
                println!();

                if !result.binding_constraints.is_empty() {
                    println!("Binding constraints (bottlenecks):");
                    for name in &result.binding_constraints {
                        println!("  - {}", name);
                    }
                    println!();
                }

                match &result.shadow_prices {
                    Some(prices) => {
                        println!("Shadow prices:");
                        for (name, value) in prices.iter() {
                            println!("  {:20} {:10.4}", name, value);
                        }
                        println!();
                    }
                    None => {
                        println!("Shadow prices are not defined for integer solutions;");
                        println!("rerun with --relax for the LP relaxation duals.");
                    }
                }

                if let Some(costs) = &result.reduced_costs {
                    println!("Reduced costs (products not in the plan):");
                    for (name, rc) in costs.iter() {
                        if rc.abs() > 0.001 {
                            println!("  {:20} profit must rise by {:.2} to enter the plan", name, -rc);
                        }
                    }
                }
            }
        }
        SolutionStatus::Infeasible => {
            println!("Status: INFEASIBLE");
            println!("No production plan satisfies all constraints.");
            std::process::exit(1);
        }
        SolutionStatus::Unbounded => {
            println!("Status: UNBOUNDED");
            println!("Profit can grow without limit; add capacity rows or upper bounds.");
            std::process::exit(1);
        }
        SolutionStatus::NotSolved => {
            println!("Status: NOT SOLVED");
            println!("The solver stopped at its iteration or node limit.");
            std::process::exit(1);
        }
    }
}
