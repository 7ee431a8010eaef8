mod engine;
mod error;
mod scenarios;
mod solver;
mod types;

pub use engine::{
    Timeline, TimelineIter, coast_fire, fire_number, project_timeline, project_years_to_fire,
    summarize, timeline, years_to_fire,
};
pub use error::{FireError, FireResult};
pub use scenarios::{ScenarioOutcome, ScenarioRow, rank_scenarios, sweep_scenarios};
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, solve_goal};
pub use types::{
    Assumptions, CoastFireResult, Compounding, DEFAULT_HORIZON_YEARS, DEFAULT_INFLATION_RATE,
    DEFAULT_WITHDRAWAL_RATE, FireSummary, MAX_AGE, TimelineEntry,
};
