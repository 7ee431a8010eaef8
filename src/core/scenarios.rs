use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use super::engine::{fire_number, project_years_to_fire};
use super::error::FireResult;
use super::types::Assumptions;

/// Years to FIRE for one (savings, return) combination of a sweep.
///
/// A combination that cannot be computed keeps its error instead of
/// aborting the sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub monthly_savings: f64,
    pub annual_return: f64,
    pub fire_number: f64,
    pub years: FireResult<f64>,
}

impl ScenarioOutcome {
    pub fn label(&self) -> String {
        format!(
            "${}/mo @ {:.0}%",
            self.monthly_savings,
            self.annual_return * 100.0
        )
    }

    pub fn to_row(&self) -> ScenarioRow {
        let (years, error) = match &self.years {
            Ok(years) => (Some(*years), None),
            Err(err) => (None, Some(err.to_string())),
        };
        ScenarioRow {
            label: self.label(),
            monthly_savings: self.monthly_savings,
            annual_return: self.annual_return,
            fire_number: self.fire_number,
            years,
            reachable: error.is_none(),
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRow {
    pub label: String,
    pub monthly_savings: f64,
    pub annual_return: f64,
    pub fire_number: f64,
    pub years: Option<f64>,
    pub reachable: bool,
    pub error: Option<String>,
}

/// Sweeps every savings amount against every return rate, savings-major.
///
/// Fails only when `base` itself is invalid.
pub fn sweep_scenarios(
    base: &Assumptions,
    savings_options: &[f64],
    return_options: &[f64],
) -> FireResult<Vec<ScenarioOutcome>> {
    base.validate()?;
    let target = fire_number(base.annual_expenses, base.safe_withdrawal_rate)?;

    let mut outcomes = Vec::with_capacity(savings_options.len() * return_options.len());
    for &monthly_savings in savings_options {
        for &annual_return in return_options {
            let assumptions = Assumptions {
                monthly_savings,
                annual_return,
                ..*base
            };
            let years = project_years_to_fire(&assumptions);
            if let Err(err) = &years {
                debug!(monthly_savings, annual_return, %err, "scenario not computable");
            }
            outcomes.push(ScenarioOutcome {
                monthly_savings,
                annual_return,
                fire_number: target,
                years,
            });
        }
    }
    Ok(outcomes)
}

/// Orders reached scenarios fastest first; failed scenarios keep their
/// relative order at the end.
pub fn rank_scenarios(outcomes: &mut [ScenarioOutcome]) {
    outcomes.sort_by(|a, b| match (&a.years, &b.years) {
        (Ok(x), Ok(y)) => x.total_cmp(y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FireError;

    fn base() -> Assumptions {
        Assumptions::new(3_581.0, 200.0, 0.08, 9_600.0)
    }

    fn years_for(outcomes: &[ScenarioOutcome], savings: f64, annual_return: f64) -> f64 {
        outcomes
            .iter()
            .find(|o| o.monthly_savings == savings && o.annual_return == annual_return)
            .and_then(|o| o.years.clone().ok())
            .expect("scenario present and reachable")
    }

    #[test]
    fn more_savings_never_takes_longer() {
        let outcomes = sweep_scenarios(&base(), &[200.0, 500.0], &[0.08]).expect("valid base");
        assert_eq!(outcomes.len(), 2);
        assert!(years_for(&outcomes, 500.0, 0.08) <= years_for(&outcomes, 200.0, 0.08));
    }

    #[test]
    fn sweep_is_savings_major_and_labels_match() {
        let outcomes =
            sweep_scenarios(&base(), &[200.0, 300.0], &[0.07, 0.10]).expect("valid base");
        let labels: Vec<String> = outcomes.iter().map(ScenarioOutcome::label).collect();
        assert_eq!(
            labels,
            vec![
                "$200/mo @ 7%",
                "$200/mo @ 10%",
                "$300/mo @ 7%",
                "$300/mo @ 10%"
            ]
        );
        assert!(outcomes.iter().all(|o| o.fire_number == 240_000.0));
    }

    #[test]
    fn unreachable_and_invalid_combinations_are_annotated() {
        let outcomes =
            sweep_scenarios(&base(), &[0.0, -10.0, 200.0], &[0.0]).expect("valid base");
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].years, Err(FireError::UnreachableGoal { .. })));
        assert!(matches!(outcomes[1].years, Err(FireError::InvalidInput { .. })));
        assert!(outcomes[2].years.is_ok());

        let row = outcomes[0].to_row();
        assert!(!row.reachable);
        assert!(row.years.is_none());
        assert!(row.error.expect("annotated").contains("unreachable"));
    }

    #[test]
    fn invalid_base_fails_whole_sweep() {
        let mut broken = base();
        broken.annual_expenses = 0.0;
        assert!(sweep_scenarios(&broken, &[200.0], &[0.08]).is_err());
    }

    #[test]
    fn ranking_puts_fastest_first_and_failures_last() {
        let mut outcomes =
            sweep_scenarios(&base(), &[0.0, 200.0, 1_000.0], &[0.0, 0.08]).expect("valid base");
        rank_scenarios(&mut outcomes);

        assert_eq!(outcomes[0].monthly_savings, 1_000.0);
        assert_eq!(outcomes[0].annual_return, 0.08);
        assert!(outcomes.last().expect("non-empty").years.is_err());

        let reached: Vec<f64> = outcomes.iter().filter_map(|o| o.years.clone().ok()).collect();
        assert!(reached.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn row_serializes_camel_case_fields() {
        let outcomes = sweep_scenarios(&base(), &[200.0], &[0.08]).expect("valid base");
        let json = serde_json::to_string(&outcomes[0].to_row()).expect("serializes");
        assert!(json.contains("\"monthlySavings\":200.0"));
        assert!(json.contains("\"fireNumber\""));
        assert!(json.contains("\"reachable\":true"));
    }
}
