use serde::{Deserialize, Serialize};

use super::error::{FireError, FireResult, require_finite, require_non_negative, require_positive};

pub const DEFAULT_WITHDRAWAL_RATE: f64 = 0.04;
pub const DEFAULT_INFLATION_RATE: f64 = 0.03;
pub const DEFAULT_HORIZON_YEARS: u32 = 100;
pub const MAX_AGE: u32 = 150;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    #[default]
    Monthly,
    Annual,
}

impl Compounding {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Compounding::Monthly => 12,
            Compounding::Annual => 1,
        }
    }

    /// Rate applied once per period, equivalent to `annual_return` over a year.
    pub fn periodic_rate(self, annual_return: f64) -> f64 {
        match self {
            Compounding::Monthly => (1.0 + annual_return).powf(1.0 / 12.0) - 1.0,
            Compounding::Annual => annual_return,
        }
    }

    pub fn periodic_contribution(self, monthly_savings: f64) -> f64 {
        monthly_savings * 12.0 / self.periods_per_year() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assumptions {
    pub current_net_worth: f64,
    pub monthly_savings: f64,
    pub annual_return: f64,
    pub annual_expenses: f64,
    pub safe_withdrawal_rate: f64,
    pub inflation_rate: f64,
    pub compounding: Compounding,
    pub horizon_years: u32,
}

impl Assumptions {
    pub fn new(
        current_net_worth: f64,
        monthly_savings: f64,
        annual_return: f64,
        annual_expenses: f64,
    ) -> Self {
        Self {
            current_net_worth,
            monthly_savings,
            annual_return,
            annual_expenses,
            safe_withdrawal_rate: DEFAULT_WITHDRAWAL_RATE,
            inflation_rate: DEFAULT_INFLATION_RATE,
            compounding: Compounding::default(),
            horizon_years: DEFAULT_HORIZON_YEARS,
        }
    }

    pub fn with_withdrawal_rate(mut self, rate: f64) -> Self {
        self.safe_withdrawal_rate = rate;
        self
    }

    pub fn with_compounding(mut self, compounding: Compounding) -> Self {
        self.compounding = compounding;
        self
    }

    pub fn with_horizon_years(mut self, years: u32) -> Self {
        self.horizon_years = years;
        self
    }

    pub fn validate(&self) -> FireResult<()> {
        require_non_negative("current_net_worth", self.current_net_worth)?;
        require_non_negative("monthly_savings", self.monthly_savings)?;
        require_non_negative("annual_return", self.annual_return)?;
        require_positive("annual_expenses", self.annual_expenses)?;
        require_positive("safe_withdrawal_rate", self.safe_withdrawal_rate)?;
        if self.safe_withdrawal_rate > 1.0 {
            return Err(FireError::invalid("safe_withdrawal_rate", "must be <= 1"));
        }
        require_finite("inflation_rate", self.inflation_rate)?;
        if self.inflation_rate <= -1.0 {
            return Err(FireError::invalid("inflation_rate", "must be > -1"));
        }
        if self.horizon_years == 0 {
            return Err(FireError::invalid("horizon_years", "must be > 0"));
        }
        Ok(())
    }

    /// Same assumptions with `annual_return` replaced by the real return after inflation.
    pub fn inflation_adjusted(&self) -> FireResult<Self> {
        self.validate()?;
        let real_return = (1.0 + self.annual_return) / (1.0 + self.inflation_rate) - 1.0;
        if real_return < 0.0 {
            return Err(FireError::invalid(
                "inflation_rate",
                format!("real return {real_return:.4} is negative"),
            ));
        }
        Ok(Self {
            annual_return: real_return,
            ..*self
        })
    }

    pub fn periods_per_year(&self) -> u32 {
        self.compounding.periods_per_year()
    }

    pub fn periodic_rate(&self) -> f64 {
        self.compounding.periodic_rate(self.annual_return)
    }

    pub fn periodic_contribution(&self) -> f64 {
        self.compounding.periodic_contribution(self.monthly_savings)
    }

    pub fn max_periods(&self) -> u32 {
        self.horizon_years.saturating_mul(self.periods_per_year())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub period: u32,
    pub year: u32,
    pub period_in_year: u32,
    pub net_worth: f64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireSummary {
    pub fire_number: f64,
    pub current_net_worth: f64,
    pub progress_percent: f64,
    pub years_to_fire: Option<f64>,
    pub monthly_savings: f64,
    pub annual_expenses: f64,
    pub annual_return: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoastFireResult {
    pub current_age: u32,
    pub target_age: u32,
    pub fire_number: f64,
    pub coast_number: f64,
    pub achieved: bool,
    pub shortfall: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_rate_compounds_back_to_annual_rate() {
        let monthly = Compounding::Monthly.periodic_rate(0.08);
        let annual = (1.0 + monthly).powi(12) - 1.0;
        assert!((annual - 0.08).abs() < 1e-12);
        assert_eq!(Compounding::Annual.periodic_rate(0.08), 0.08);
    }

    #[test]
    fn annual_compounding_contributes_a_year_of_savings_per_period() {
        assert_eq!(Compounding::Annual.periodic_contribution(200.0), 2400.0);
        assert_eq!(Compounding::Monthly.periodic_contribution(200.0), 200.0);
    }

    #[test]
    fn validate_rejects_each_out_of_range_field() {
        let base = Assumptions::new(3_581.0, 200.0, 0.08, 9_600.0);
        assert!(base.validate().is_ok());

        let cases: [(&str, Assumptions); 7] = [
            ("current_net_worth", Assumptions { current_net_worth: -1.0, ..base }),
            ("monthly_savings", Assumptions { monthly_savings: -5.0, ..base }),
            ("annual_return", Assumptions { annual_return: f64::NAN, ..base }),
            ("annual_expenses", Assumptions { annual_expenses: 0.0, ..base }),
            ("safe_withdrawal_rate", base.with_withdrawal_rate(1.5)),
            ("inflation_rate", Assumptions { inflation_rate: -1.0, ..base }),
            ("horizon_years", base.with_horizon_years(0)),
        ];
        for (field, assumptions) in cases {
            match assumptions.validate() {
                Err(FireError::InvalidInput { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected InvalidInput for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn inflation_adjusted_uses_fisher_real_return() {
        let nominal = Assumptions::new(10_000.0, 500.0, 0.08, 30_000.0);
        let real = nominal.inflation_adjusted().expect("positive real return");
        assert!((real.annual_return - (1.08 / 1.03 - 1.0)).abs() < 1e-12);
        assert_eq!(real.monthly_savings, nominal.monthly_savings);

        let mut eroded = nominal;
        eroded.annual_return = 0.01;
        assert!(eroded.inflation_adjusted().is_err());
    }

    #[test]
    fn max_periods_scales_with_compounding() {
        let base = Assumptions::new(0.0, 100.0, 0.05, 10_000.0);
        assert_eq!(base.max_periods(), 1_200);
        assert_eq!(base.with_compounding(Compounding::Annual).max_periods(), 100);
    }
}
