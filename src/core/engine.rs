use std::iter::FusedIterator;

use tracing::debug;

use super::error::{FireError, FireResult, require_non_negative, require_positive};
use super::types::{Assumptions, CoastFireResult, FireSummary, MAX_AGE, TimelineEntry};

/// Net worth at which `safe_withdrawal_rate` of the portfolio covers `annual_expenses`.
pub fn fire_number(annual_expenses: f64, safe_withdrawal_rate: f64) -> FireResult<f64> {
    require_positive("annual_expenses", annual_expenses)?;
    require_positive("safe_withdrawal_rate", safe_withdrawal_rate)?;
    if safe_withdrawal_rate > 1.0 {
        return Err(FireError::invalid("safe_withdrawal_rate", "must be <= 1"));
    }
    Ok(annual_expenses / safe_withdrawal_rate)
}

/// Years until `worth * (1 + rate) + contribution`, applied once per period,
/// first reaches `fire_number`.
///
/// The result is interpolated linearly between the last period below the
/// target and the first period at or above it, so it is fractional in
/// general. Fails with `UnreachableGoal` when the worth can never grow or the
/// target is not reached within `max_periods`.
pub fn years_to_fire(
    current_net_worth: f64,
    periodic_contribution: f64,
    periodic_return_rate: f64,
    fire_number: f64,
    periods_per_year: u32,
    max_periods: u32,
) -> FireResult<f64> {
    require_non_negative("current_net_worth", current_net_worth)?;
    require_non_negative("periodic_contribution", periodic_contribution)?;
    require_non_negative("periodic_return_rate", periodic_return_rate)?;
    require_positive("fire_number", fire_number)?;
    if periods_per_year == 0 {
        return Err(FireError::invalid("periods_per_year", "must be > 0"));
    }

    if current_net_worth >= fire_number {
        return Ok(0.0);
    }
    if periodic_return_rate == 0.0 && periodic_contribution == 0.0 {
        return Err(FireError::unreachable(
            "net worth cannot grow with zero return and zero contributions",
        ));
    }

    let mut worth = current_net_worth;
    for period in 1..=max_periods {
        let next = worth * (1.0 + periodic_return_rate) + periodic_contribution;
        if next >= fire_number {
            let fraction = (fire_number - worth) / (next - worth);
            let periods = (period - 1) as f64 + fraction;
            debug!(period, net_worth = next, "fire number reached");
            return Ok(periods / periods_per_year as f64);
        }
        worth = next;
    }

    debug!(max_periods, net_worth = worth, "horizon reached before fire number");
    Err(FireError::unreachable(format!(
        "fire number {fire_number:.2} not reached within {max_periods} periods (net worth {worth:.2})"
    )))
}

pub fn project_years_to_fire(assumptions: &Assumptions) -> FireResult<f64> {
    assumptions.validate()?;
    let target = fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate)?;
    years_to_fire(
        assumptions.current_net_worth,
        assumptions.periodic_contribution(),
        assumptions.periodic_rate(),
        target,
        assumptions.periods_per_year(),
        assumptions.max_periods(),
    )
}

/// Restartable plan for a period-by-period net worth projection.
///
/// Every call to [`Timeline::iter`] starts again from period 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    start: f64,
    contribution: f64,
    rate: f64,
    fire_number: f64,
    periods_per_year: u32,
    max_periods: u32,
    stop_at_target: bool,
}

impl Timeline {
    pub fn iter(&self) -> TimelineIter {
        TimelineIter {
            plan: *self,
            period: 0,
            net_worth: self.start,
            done: false,
        }
    }

    pub fn fire_number(&self) -> f64 {
        self.fire_number
    }

    pub fn periods_per_year(&self) -> u32 {
        self.periods_per_year
    }

    pub fn max_periods(&self) -> u32 {
        self.max_periods
    }

    pub fn to_vec(&self) -> Vec<TimelineEntry> {
        self.iter().collect()
    }

    /// Entries falling on a whole year boundary (period 0, 12, 24, ... when monthly).
    pub fn yearly(&self) -> impl Iterator<Item = TimelineEntry> {
        self.iter().filter(|entry| entry.period_in_year == 0)
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = TimelineEntry;
    type IntoIter = TimelineIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct TimelineIter {
    plan: Timeline,
    period: u32,
    net_worth: f64,
    done: bool,
}

impl Iterator for TimelineIter {
    type Item = TimelineEntry;

    fn next(&mut self) -> Option<TimelineEntry> {
        if self.done {
            return None;
        }

        let plan = &self.plan;
        let entry = TimelineEntry {
            period: self.period,
            year: self.period / plan.periods_per_year,
            period_in_year: self.period % plan.periods_per_year,
            net_worth: self.net_worth,
            progress_percent: self.net_worth / plan.fire_number * 100.0,
        };

        let reached = plan.stop_at_target && self.net_worth >= plan.fire_number;
        if reached || self.period >= plan.max_periods {
            self.done = true;
        } else {
            self.net_worth = self.net_worth * (1.0 + plan.rate) + plan.contribution;
            self.period += 1;
        }
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = (self.plan.max_periods - self.period) as usize + 1;
        (1, Some(remaining))
    }
}

impl FusedIterator for TimelineIter {}

fn timeline_plan(assumptions: &Assumptions, max_periods: u32, stop_at_target: bool) -> FireResult<Timeline> {
    assumptions.validate()?;
    let target = fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate)?;
    Ok(Timeline {
        start: assumptions.current_net_worth,
        contribution: assumptions.periodic_contribution(),
        rate: assumptions.periodic_rate(),
        fire_number: target,
        periods_per_year: assumptions.periods_per_year(),
        max_periods,
        stop_at_target,
    })
}

/// Timeline from today until the FIRE number or the horizon cap, whichever comes first.
pub fn timeline(assumptions: &Assumptions) -> FireResult<Timeline> {
    timeline_plan(assumptions, assumptions.max_periods(), true)
}

/// Fixed-length projection over `years`, continuing past the FIRE number.
pub fn project_timeline(assumptions: &Assumptions, years: u32) -> FireResult<Timeline> {
    if years == 0 {
        return Err(FireError::invalid("years", "must be > 0"));
    }
    if years > assumptions.horizon_years {
        return Err(FireError::invalid(
            "years",
            format!("must be <= horizon_years ({})", assumptions.horizon_years),
        ));
    }
    let periods = years.saturating_mul(assumptions.periods_per_year());
    timeline_plan(assumptions, periods, false)
}

pub fn summarize(assumptions: &Assumptions) -> FireResult<FireSummary> {
    assumptions.validate()?;
    let target = fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate)?;
    let years = match project_years_to_fire(assumptions) {
        Ok(years) => Some(years),
        Err(err) if err.is_unreachable() => None,
        Err(err) => return Err(err),
    };

    Ok(FireSummary {
        fire_number: target,
        current_net_worth: assumptions.current_net_worth,
        progress_percent: assumptions.current_net_worth / target * 100.0,
        years_to_fire: years,
        monthly_savings: assumptions.monthly_savings,
        annual_expenses: assumptions.annual_expenses,
        annual_return: assumptions.annual_return,
    })
}

/// Amount needed today that grows to the FIRE number by `target_age` without
/// further contributions.
pub fn coast_fire(
    assumptions: &Assumptions,
    current_age: u32,
    target_age: u32,
) -> FireResult<CoastFireResult> {
    assumptions.validate()?;
    if target_age < current_age {
        return Err(FireError::invalid("target_age", "must be >= current_age"));
    }
    if target_age > MAX_AGE {
        return Err(FireError::invalid("target_age", format!("must be <= {MAX_AGE}")));
    }

    let target = fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate)?;
    let years = (target_age - current_age) as i32;
    let coast_number = target / (1.0 + assumptions.annual_return).powi(years);
    let shortfall = (coast_number - assumptions.current_net_worth).max(0.0);

    Ok(CoastFireResult {
        current_age,
        target_age,
        fire_number: target,
        coast_number,
        achieved: shortfall == 0.0,
        shortfall,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Compounding;
    use proptest::prelude::{prop_assert, prop_assume, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn reference_assumptions() -> Assumptions {
        Assumptions::new(3_581.0, 200.0, 0.08, 9_600.0)
    }

    #[test]
    fn fire_number_is_expenses_over_withdrawal_rate() {
        assert_approx(fire_number(40_000.0, 0.04).expect("valid"), 1_000_000.0);
        assert_approx(fire_number(9_600.0, 0.04).expect("valid"), 240_000.0);
        assert_approx(fire_number(30_000.0, 1.0).expect("valid"), 30_000.0);
    }

    #[test]
    fn fire_number_rejects_non_positive_inputs() {
        for (expenses, rate) in [(0.0, 0.04), (-1.0, 0.04), (40_000.0, 0.0), (40_000.0, 1.01)] {
            let err = fire_number(expenses, rate).expect_err("must reject");
            assert!(matches!(err, FireError::InvalidInput { .. }), "{err:?}");
        }
    }

    #[test]
    fn oracle_annual_compounding_matches_hand_calculation() {
        let assumptions = reference_assumptions().with_compounding(Compounding::Annual);
        let years = project_years_to_fire(&assumptions).expect("reachable");
        assert_approx_tol(years, 27.081_683, 1e-5);
    }

    #[test]
    fn oracle_monthly_compounding_matches_hand_calculation() {
        let years = project_years_to_fire(&reference_assumptions()).expect("reachable");
        assert_approx_tol(years, 26.723_596, 1e-5);
    }

    #[test]
    fn zero_return_interpolates_exactly_on_contribution_steps() {
        let years = years_to_fire(0.0, 1_000.0, 0.0, 10_000.0, 1, 100).expect("reachable");
        assert_approx(years, 10.0);
        let half = years_to_fire(0.0, 1_000.0, 0.0, 9_500.0, 1, 100).expect("reachable");
        assert_approx(half, 9.5);
    }

    #[test]
    fn already_at_target_takes_zero_years() {
        let years = years_to_fire(250_000.0, 0.0, 0.0, 240_000.0, 12, 1_200).expect("reachable");
        assert_approx(years, 0.0);
    }

    #[test]
    fn zero_return_and_zero_savings_is_unreachable() {
        let err = years_to_fire(3_581.0, 0.0, 0.0, 240_000.0, 1, 100).expect_err("unreachable");
        assert!(err.is_unreachable());

        let mut assumptions = reference_assumptions();
        assumptions.monthly_savings = 0.0;
        assumptions.annual_return = 0.0;
        assert!(project_years_to_fire(&assumptions)
            .expect_err("unreachable")
            .is_unreachable());
    }

    #[test]
    fn horizon_cap_turns_slow_growth_into_unreachable() {
        let assumptions = reference_assumptions().with_horizon_years(20);
        let err = project_years_to_fire(&assumptions).expect_err("beyond horizon");
        assert!(err.is_unreachable());
    }

    #[test]
    fn years_to_fire_rejects_negative_inputs() {
        assert!(years_to_fire(-1.0, 100.0, 0.01, 1_000.0, 1, 10).is_err());
        assert!(years_to_fire(0.0, -100.0, 0.01, 1_000.0, 1, 10).is_err());
        assert!(years_to_fire(0.0, 100.0, -0.01, 1_000.0, 1, 10).is_err());
        assert!(years_to_fire(0.0, 100.0, 0.01, 0.0, 1, 10).is_err());
        assert!(years_to_fire(0.0, 100.0, 0.01, 1_000.0, 0, 10).is_err());
    }

    #[test]
    fn timeline_starts_at_current_net_worth_and_ends_at_target() {
        let assumptions = reference_assumptions().with_compounding(Compounding::Annual);
        let entries = timeline(&assumptions).expect("valid").to_vec();

        assert_eq!(entries.first().map(|e| e.period), Some(0));
        assert_approx(entries[0].net_worth, 3_581.0);
        assert_approx(entries[1].net_worth, 6_267.48);
        assert_approx(entries[2].net_worth, 9_168.8784);

        let last = entries.last().expect("non-empty");
        assert_eq!(last.period, 28);
        assert!(last.net_worth >= 240_000.0);
        assert!(entries[entries.len() - 2].net_worth < 240_000.0);
    }

    #[test]
    fn timeline_is_restartable() {
        let plan = timeline(&reference_assumptions()).expect("valid");
        let first: Vec<_> = plan.iter().take(5).collect();
        let second: Vec<_> = (&plan).into_iter().take(5).collect();
        assert_eq!(first, second);
        assert_eq!(plan.iter().count(), plan.iter().count());
    }

    #[test]
    fn timeline_stops_at_horizon_when_unreachable() {
        let mut assumptions = reference_assumptions().with_horizon_years(3);
        assumptions.monthly_savings = 0.0;
        assumptions.annual_return = 0.0;
        let entries = timeline(&assumptions).expect("valid").to_vec();
        assert_eq!(entries.len(), 37);
        assert!(entries.iter().all(|e| e.net_worth == 3_581.0));
    }

    #[test]
    fn timeline_year_and_month_fields_follow_period() {
        let entries = timeline(&reference_assumptions()).expect("valid").to_vec();
        let e = entries[27];
        assert_eq!((e.year, e.period_in_year), (2, 3));
        let yearly: Vec<u32> = timeline(&reference_assumptions())
            .expect("valid")
            .yearly()
            .take(3)
            .map(|e| e.period)
            .collect();
        assert_eq!(yearly, vec![0, 12, 24]);
    }

    #[test]
    fn projected_timeline_continues_past_target() {
        let mut assumptions = reference_assumptions();
        assumptions.current_net_worth = 300_000.0;
        let plan = project_timeline(&assumptions, 2).expect("valid");
        let entries = plan.to_vec();
        assert_eq!(entries.len(), 25);
        assert!(entries.iter().all(|e| e.progress_percent > 100.0));
        assert!(project_timeline(&assumptions, 0).is_err());
    }

    #[test]
    fn projected_timeline_is_bounded_by_the_horizon() {
        let assumptions = reference_assumptions().with_horizon_years(1);
        assert_eq!(project_timeline(&assumptions, 1).expect("valid").to_vec().len(), 13);

        match project_timeline(&assumptions, 150) {
            Err(FireError::InvalidInput { field, .. }) => assert_eq!(field, "years"),
            other => panic!("expected InvalidInput on years, got {other:?}"),
        }
        assert!(project_timeline(&reference_assumptions(), u32::MAX).is_err());
    }

    #[test]
    fn summarize_reports_progress_and_hides_unreachable_years() {
        let summary = summarize(&reference_assumptions()).expect("valid");
        assert_approx(summary.fire_number, 240_000.0);
        assert_approx_tol(summary.progress_percent, 1.492_083, 1e-6);
        assert!(summary.years_to_fire.is_some());

        let mut stalled = reference_assumptions();
        stalled.monthly_savings = 0.0;
        stalled.annual_return = 0.0;
        let summary = summarize(&stalled).expect("valid inputs");
        assert!(summary.years_to_fire.is_none());

        let mut broken = reference_assumptions();
        broken.annual_expenses = 0.0;
        assert!(summarize(&broken).is_err());
    }

    #[test]
    fn coast_fire_discounts_fire_number_to_today() {
        let result = coast_fire(&reference_assumptions(), 27, 50).expect("valid");
        assert_approx_tol(result.coast_number, 40_875.668_23, 1e-4);
        assert!(!result.achieved);
        assert_approx_tol(result.shortfall, 40_875.668_23 - 3_581.0, 1e-4);

        let now = coast_fire(&reference_assumptions(), 40, 40).expect("valid");
        assert_approx(now.coast_number, 240_000.0);

        assert!(coast_fire(&reference_assumptions(), 40, 30).is_err());
    }

    #[test]
    fn coast_fire_rejects_target_age_beyond_lifespan() {
        let result = coast_fire(&reference_assumptions(), 0, MAX_AGE).expect("valid");
        assert!(result.coast_number.is_finite() && result.coast_number > 0.0);

        for target_age in [MAX_AGE + 1, 3_000_000_000] {
            match coast_fire(&reference_assumptions(), 0, target_age) {
                Err(FireError::InvalidInput { field, .. }) => assert_eq!(field, "target_age"),
                other => panic!("expected InvalidInput on target_age, got {other:?}"),
            }
        }
    }

    #[test]
    fn coast_fire_is_achieved_when_net_worth_covers_it() {
        let mut assumptions = reference_assumptions();
        assumptions.current_net_worth = 50_000.0;
        let result = coast_fire(&assumptions, 27, 50).expect("valid");
        assert!(result.achieved);
        assert_approx(result.shortfall, 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_fire_number_equals_expenses_over_rate(
            expenses in 1u32..500_000,
            rate_bp in 1u32..10_001
        ) {
            let expenses = expenses as f64;
            let rate = rate_bp as f64 / 10_000.0;
            let value = fire_number(expenses, rate).expect("valid");
            prop_assert!((value - expenses / rate).abs() <= 1e-9 * value.max(1.0));
        }

        #[test]
        fn prop_years_non_increasing_in_contribution(
            start in 0u32..200_000,
            contribution in 1u32..5_000,
            extra in 0u32..5_000,
            rate_bp in 0u32..100,
            target in 10_000u32..2_000_000
        ) {
            let rate = rate_bp as f64 / 10_000.0;
            let low = years_to_fire(start as f64, contribution as f64, rate, target as f64, 12, 1_200);
            let high = years_to_fire(start as f64, (contribution + extra) as f64, rate, target as f64, 12, 1_200);
            if let Ok(low_years) = low {
                let high_years = high.expect("more savings cannot make the goal unreachable");
                prop_assert!(high_years <= low_years + 1e-9);
            }
        }

        #[test]
        fn prop_years_non_increasing_in_return(
            start in 0u32..200_000,
            contribution in 0u32..5_000,
            rate_bp in 0u32..150,
            extra_bp in 0u32..150,
            target in 10_000u32..2_000_000
        ) {
            prop_assume!(contribution > 0 || rate_bp > 0);
            let low_rate = rate_bp as f64 / 10_000.0;
            let high_rate = (rate_bp + extra_bp) as f64 / 10_000.0;
            let low = years_to_fire(start as f64, contribution as f64, low_rate, target as f64, 12, 1_200);
            let high = years_to_fire(start as f64, contribution as f64, high_rate, target as f64, 12, 1_200);
            if let Ok(low_years) = low {
                let high_years = high.expect("higher return cannot make the goal unreachable");
                prop_assert!(high_years <= low_years + 1e-9);
            }
        }

        #[test]
        fn prop_timeline_is_non_decreasing_and_matches_years(
            start in 0u32..300_000,
            savings in 0u32..4_000,
            return_bp in 0u32..1_500,
            expenses in 1_000u32..80_000,
            annual in proptest::bool::ANY
        ) {
            let compounding = if annual { Compounding::Annual } else { Compounding::Monthly };
            let assumptions = Assumptions::new(start as f64, savings as f64, return_bp as f64 / 10_000.0, expenses as f64)
                .with_compounding(compounding);
            let entries = timeline(&assumptions).expect("valid").to_vec();

            for pair in entries.windows(2) {
                prop_assert!(pair[1].net_worth >= pair[0].net_worth);
            }

            if let Ok(years) = project_years_to_fire(&assumptions) {
                let last = entries.last().expect("non-empty");
                let target = fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate).expect("valid");
                prop_assert!(last.net_worth >= target);
                let expected_period = (years * assumptions.periods_per_year() as f64).ceil();
                prop_assert!((last.period as f64 - expected_period).abs() <= 1.0);
            }
        }
    }
}
