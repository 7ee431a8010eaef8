mod render;

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use crate::api::{PortfolioPayload, parse_json, portfolio_report};
use crate::core::{
    Assumptions, Compounding, FireError, FireResult, GoalSolveConfig, GoalType, coast_fire,
    project_timeline, rank_scenarios, solve_goal, summarize, sweep_scenarios, timeline,
};

pub use render::{
    render_coast, render_portfolio, render_scenarios, render_solve, render_summary,
    render_timeline,
};

pub const MAX_HORIZON_YEARS: u32 = 200;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Fire(#[from] FireError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(std::io::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliCompounding {
    Monthly,
    Annual,
}

impl From<CliCompounding> for Compounding {
    fn from(value: CliCompounding) -> Self {
        match value {
            CliCompounding::Monthly => Compounding::Monthly,
            CliCompounding::Annual => Compounding::Annual,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGoalType {
    RequiredSavings,
    MaxExpenses,
}

impl From<CliGoalType> for GoalType {
    fn from(value: CliGoalType) -> Self {
        match value {
            CliGoalType::RequiredSavings => GoalType::RequiredSavings,
            CliGoalType::MaxExpenses => GoalType::MaxExpenses,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AssumptionArgs {
    #[arg(long, default_value_t = 0.0, help = "Current total net worth")]
    pub net_worth: f64,
    #[arg(long, help = "Amount saved and invested every month")]
    pub monthly_savings: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected annual return in percent, e.g. 8"
    )]
    pub annual_return: f64,
    #[arg(long, help = "Annual living expenses")]
    pub annual_expenses: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Safe withdrawal rate in percent"
    )]
    pub withdrawal_rate: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Expected annual inflation in percent, used with --real"
    )]
    pub inflation_rate: f64,
    #[arg(long, value_enum, default_value_t = CliCompounding::Monthly)]
    pub compounding: CliCompounding,
    #[arg(
        long,
        default_value_t = 100,
        help = "Years to project before declaring the goal unreachable"
    )]
    pub horizon_years: u32,
    #[arg(long, help = "Project with inflation-adjusted (real) returns")]
    pub real: bool,
}

impl Default for AssumptionArgs {
    fn default() -> Self {
        Self {
            net_worth: 3_581.0,
            monthly_savings: 200.0,
            annual_return: 8.0,
            annual_expenses: 9_600.0,
            withdrawal_rate: 4.0,
            inflation_rate: 3.0,
            compounding: CliCompounding::Monthly,
            horizon_years: 100,
            real: false,
        }
    }
}

pub fn build_assumptions(args: &AssumptionArgs) -> FireResult<Assumptions> {
    if !args.net_worth.is_finite() || args.net_worth < 0.0 {
        return Err(FireError::invalid("--net-worth", "must be >= 0"));
    }
    if !args.monthly_savings.is_finite() || args.monthly_savings < 0.0 {
        return Err(FireError::invalid("--monthly-savings", "must be >= 0"));
    }
    if !args.annual_return.is_finite() || args.annual_return < 0.0 {
        return Err(FireError::invalid("--annual-return", "must be >= 0"));
    }
    if !args.annual_expenses.is_finite() || args.annual_expenses <= 0.0 {
        return Err(FireError::invalid("--annual-expenses", "must be > 0"));
    }
    if !(args.withdrawal_rate > 0.0 && args.withdrawal_rate <= 100.0) {
        return Err(FireError::invalid(
            "--withdrawal-rate",
            "must be greater than 0 and at most 100",
        ));
    }
    if !args.inflation_rate.is_finite() || args.inflation_rate <= -100.0 {
        return Err(FireError::invalid("--inflation-rate", "must be > -100"));
    }
    if args.horizon_years == 0 || args.horizon_years > MAX_HORIZON_YEARS {
        return Err(FireError::invalid(
            "--horizon-years",
            format!("must be between 1 and {MAX_HORIZON_YEARS}"),
        ));
    }

    let assumptions = Assumptions {
        current_net_worth: args.net_worth,
        monthly_savings: args.monthly_savings,
        annual_return: args.annual_return / 100.0,
        annual_expenses: args.annual_expenses,
        safe_withdrawal_rate: args.withdrawal_rate / 100.0,
        inflation_rate: args.inflation_rate / 100.0,
        compounding: args.compounding.into(),
        horizon_years: args.horizon_years,
    };
    assumptions.validate()?;

    if args.real {
        assumptions.inflation_adjusted()
    } else {
        Ok(assumptions)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fire",
    about = "FIRE calculator: FIRE number, years to independence, timelines and scenario sweeps"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "warn",
        help = "Log level when RUST_LOG is unset"
    )]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// FIRE number, progress and years to FIRE
    Summary {
        #[command(flatten)]
        assumptions: AssumptionArgs,
        #[arg(long)]
        json: bool,
    },
    /// Net worth per period until the FIRE number is reached
    Timeline {
        #[command(flatten)]
        assumptions: AssumptionArgs,
        #[arg(long, help = "Project a fixed number of years instead of stopping at FIRE")]
        years: Option<u32>,
        #[arg(long, help = "Only show whole-year entries")]
        yearly: bool,
        #[arg(long)]
        json: bool,
    },
    /// Years to FIRE for every savings/return combination
    Scenarios {
        #[command(flatten)]
        assumptions: AssumptionArgs,
        #[arg(long, value_delimiter = ',', required = true, help = "Monthly savings amounts")]
        savings: Vec<f64>,
        #[arg(
            long,
            value_delimiter = ',',
            required = true,
            help = "Annual returns in percent"
        )]
        returns: Vec<f64>,
        #[arg(long, help = "Sort fastest first")]
        rank: bool,
        #[arg(long)]
        json: bool,
    },
    /// Amount needed now to coast to FIRE by a target age
    Coast {
        #[command(flatten)]
        assumptions: AssumptionArgs,
        #[arg(long)]
        current_age: u32,
        #[arg(long, num_args = 1.., value_delimiter = ',', required = true)]
        target_age: Vec<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Solve for the savings or expenses that reach FIRE within a target
    Solve {
        #[command(flatten)]
        assumptions: AssumptionArgs,
        #[arg(long, value_enum, default_value_t = CliGoalType::RequiredSavings)]
        goal: CliGoalType,
        #[arg(long)]
        target_years: f64,
        #[arg(long)]
        search_min: Option<f64>,
        #[arg(long)]
        search_max: Option<f64>,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Value and analyse a portfolio described in a JSON file
    Portfolio {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Serve the JSON API over HTTP
    Serve {
        #[arg(long, env = "FIRE_PORT", default_value_t = 8080)]
        port: u16,
    },
}

pub fn goal_config(
    goal: GoalType,
    target_years: f64,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
) -> GoalSolveConfig {
    let defaults = match goal {
        GoalType::RequiredSavings => GoalSolveConfig::required_savings(target_years),
        GoalType::MaxExpenses => GoalSolveConfig::max_expenses(target_years),
    };
    GoalSolveConfig {
        search_min: search_min.unwrap_or(defaults.search_min),
        search_max: search_max.unwrap_or(defaults.search_max),
        tolerance: tolerance.unwrap_or(defaults.tolerance),
        max_iterations: max_iterations.unwrap_or(defaults.max_iterations),
        ..defaults
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<String, CliError> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text())
    }
}

/// Runs every command except `serve`, returning the text to print.
pub fn execute(command: &Command) -> Result<String, CliError> {
    match command {
        Command::Summary { assumptions, json } => {
            let summary = summarize(&build_assumptions(assumptions)?)?;
            emit(*json, &summary, || render_summary(&summary))
        }
        Command::Timeline {
            assumptions,
            years,
            yearly,
            json,
        } => {
            let assumptions = build_assumptions(assumptions)?;
            let plan = match years {
                Some(years) => project_timeline(&assumptions, *years)?,
                None => timeline(&assumptions)?,
            };
            let entries: Vec<_> = if *yearly {
                plan.yearly().collect()
            } else {
                plan.to_vec()
            };
            emit(*json, &entries, || render_timeline(&entries, plan.fire_number()))
        }
        Command::Scenarios {
            assumptions,
            savings,
            returns,
            rank,
            json,
        } => {
            let assumptions = build_assumptions(assumptions)?;
            let returns: Vec<f64> = returns.iter().map(|r| r / 100.0).collect();
            let mut outcomes = sweep_scenarios(&assumptions, savings, &returns)?;
            if *rank {
                rank_scenarios(&mut outcomes);
            }
            let rows: Vec<_> = outcomes.iter().map(|o| o.to_row()).collect();
            emit(*json, &rows, || render_scenarios(&rows))
        }
        Command::Coast {
            assumptions,
            current_age,
            target_age,
            json,
        } => {
            let assumptions = build_assumptions(assumptions)?;
            let results = target_age
                .iter()
                .map(|age| coast_fire(&assumptions, *current_age, *age))
                .collect::<FireResult<Vec<_>>>()?;
            emit(*json, &results, || render_coast(&results))
        }
        Command::Solve {
            assumptions,
            goal,
            target_years,
            search_min,
            search_max,
            tolerance,
            max_iterations,
            json,
        } => {
            let assumptions = build_assumptions(assumptions)?;
            let config = goal_config(
                (*goal).into(),
                *target_years,
                *search_min,
                *search_max,
                *tolerance,
                *max_iterations,
            );
            let result = solve_goal(&assumptions, config)?;
            emit(*json, &result, || render_solve(&result))
        }
        Command::Portfolio { file, json } => {
            let raw = fs::read_to_string(file).map_err(|source| CliError::Read {
                path: file.clone(),
                source,
            })?;
            let payload: PortfolioPayload = parse_json("file", raw.as_bytes())?;
            let report = portfolio_report(payload)?;
            emit(*json, &report, || render_portfolio(&report))
        }
        Command::Serve { .. } => Err(FireError::invalid(
            "serve",
            "the serve command runs the HTTP server and has no text output",
        )
        .into()),
    }
}
