use serde::Serialize;
use tracing::debug;

use super::engine::project_years_to_fire;
use super::error::{FireError, FireResult};
use super::types::Assumptions;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    RequiredSavings,
    MaxExpenses,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub target_years: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl GoalSolveConfig {
    pub fn required_savings(target_years: f64) -> Self {
        Self {
            goal_type: GoalType::RequiredSavings,
            target_years,
            search_min: 0.0,
            search_max: 100_000.0,
            tolerance: 0.01,
            max_iterations: 64,
        }
    }

    pub fn max_expenses(target_years: f64) -> Self {
        Self {
            goal_type: GoalType::MaxExpenses,
            target_years,
            search_min: 1.0,
            search_max: 1_000_000.0,
            tolerance: 0.01,
            max_iterations: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub years_to_fire: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub target_years: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub achieved_years: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

impl GoalType {
    fn subject(self) -> &'static str {
        match self {
            GoalType::RequiredSavings => "monthly savings",
            GoalType::MaxExpenses => "annual expenses",
        }
    }
}

pub fn solve_goal(assumptions: &Assumptions, config: GoalSolveConfig) -> FireResult<GoalSolveResult> {
    validate_config(assumptions, config)?;

    // Raising savings or cutting expenses never delays FIRE, so one bound is
    // the easiest candidate and the other the hardest. The answer is the
    // feasible value closest to the hardest bound.
    let (easiest, hardest) = match config.goal_type {
        GoalType::RequiredSavings => (config.search_max, config.search_min),
        GoalType::MaxExpenses => (config.search_min, config.search_max),
    };
    let subject = config.goal_type.subject();

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let (solved_value, converged, feasible, message) =
        if evaluate_candidate(assumptions, config, hardest)?.meets_target {
            let message = match config.goal_type {
                GoalType::RequiredSavings => {
                    "Already reaches FIRE in time at the lower savings bound.".to_string()
                }
                GoalType::MaxExpenses => format!(
                    "Upper {subject} bound {hardest} is still feasible; increase search max for a higher target."
                ),
            };
            (Some(hardest), true, true, message)
        } else if !evaluate_candidate(assumptions, config, easiest)?.meets_target {
            let message = format!(
                "No {subject} between {} and {} reaches FIRE in time.",
                config.search_min, config.search_max
            );
            (None, false, false, message)
        } else {
            let (value, converged) = bisect(assumptions, config, easiest, hardest, &mut iterations)?;
            let message = if converged {
                format!("Bisection settled on {subject} within {}.", config.tolerance)
            } else {
                format!(
                    "Stopped after {} iterations before reaching the tolerance; best {subject} so far.",
                    config.max_iterations
                )
            };
            (Some(value), converged, true, message)
        };

    let achieved_years = match solved_value {
        Some(value) => evaluate_candidate(assumptions, config, value)?.years,
        None => None,
    };
    debug!(
        goal = ?config.goal_type,
        ?solved_value,
        iterations = iterations.len(),
        converged,
        feasible,
        "goal solve finished"
    );

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        target_years: config.target_years,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        achieved_years,
        iterations,
        converged,
        feasible,
        message,
    })
}

/// Narrows the gap between a feasible and an infeasible candidate, returning
/// the last feasible one and whether the gap closed within tolerance.
fn bisect(
    assumptions: &Assumptions,
    config: GoalSolveConfig,
    mut feasible: f64,
    mut infeasible: f64,
    iterations: &mut Vec<GoalSolveIteration>,
) -> FireResult<(f64, bool)> {
    for iteration in 1..=config.max_iterations {
        let candidate = (feasible + infeasible) * 0.5;
        let eval = evaluate_candidate(assumptions, config, candidate)?;
        iterations.push(GoalSolveIteration {
            iteration,
            lower_bound: feasible.min(infeasible),
            upper_bound: feasible.max(infeasible),
            candidate_value: candidate,
            years_to_fire: eval.years,
        });

        if eval.meets_target {
            feasible = candidate;
        } else {
            infeasible = candidate;
        }
        if (feasible - infeasible).abs() <= config.tolerance {
            return Ok((feasible, true));
        }
    }
    Ok((feasible, false))
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    years: Option<f64>,
    meets_target: bool,
}

fn evaluate_candidate(
    base: &Assumptions,
    config: GoalSolveConfig,
    candidate_value: f64,
) -> FireResult<CandidateEval> {
    let mut assumptions = *base;
    match config.goal_type {
        GoalType::RequiredSavings => assumptions.monthly_savings = candidate_value.max(0.0),
        GoalType::MaxExpenses => assumptions.annual_expenses = candidate_value,
    }

    let years = match project_years_to_fire(&assumptions) {
        Ok(years) => Some(years),
        Err(err) if err.is_unreachable() => None,
        Err(err) => return Err(err),
    };
    Ok(CandidateEval {
        years,
        meets_target: years.is_some_and(|y| y <= config.target_years + 1e-12),
    })
}

fn validate_config(assumptions: &Assumptions, config: GoalSolveConfig) -> FireResult<()> {
    assumptions.validate()?;
    if !config.target_years.is_finite() || config.target_years < 0.0 {
        return Err(FireError::invalid("target_years", "must be >= 0"));
    }
    if config.target_years > assumptions.horizon_years as f64 {
        return Err(FireError::invalid("target_years", "must be <= horizon_years"));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(FireError::invalid("search_bounds", "must be finite"));
    }
    if config.search_max <= config.search_min {
        return Err(FireError::invalid("search_max", "must be greater than search_min"));
    }
    match config.goal_type {
        GoalType::RequiredSavings if config.search_min < 0.0 => {
            return Err(FireError::invalid("search_min", "savings bound must be >= 0"));
        }
        GoalType::MaxExpenses if config.search_min <= 0.0 => {
            return Err(FireError::invalid("search_min", "expenses bound must be > 0"));
        }
        _ => {}
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(FireError::invalid("tolerance", "must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(FireError::invalid("max_iterations", "must be > 0"));
    }
    Ok(())
}
