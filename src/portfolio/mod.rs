use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{FireError, FireResult};

pub const DEFAULT_REBALANCE_TOLERANCE: f64 = 0.05;

/// Ticker to quantity held, valued against a separate price map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Holdings(pub BTreeMap<String, f64>);

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, quantity: f64) {
        self.0.insert(ticker.into(), quantity);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tickers without a price are left out of the valuation.
    pub fn total_value(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.priced(prices).map(|(_, value)| value).sum()
    }

    pub fn weights(&self, prices: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let total = self.total_value(prices);
        if total == 0.0 {
            return BTreeMap::new();
        }
        self.priced(prices)
            .map(|(ticker, value)| (ticker.clone(), value / total))
            .collect()
    }

    fn priced<'a>(
        &'a self,
        prices: &'a BTreeMap<String, f64>,
    ) -> impl Iterator<Item = (&'a String, f64)> + 'a {
        self.0.iter().filter_map(move |(ticker, quantity)| match prices.get(ticker) {
            Some(price) => Some((ticker, quantity * price)),
            None => {
                debug!(%ticker, "no price for holding; skipped");
                None
            }
        })
    }
}

impl FromIterator<(String, f64)> for Holdings {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetClass {
    Stocks,
    Bonds,
    Crypto,
    Cash,
    RealEstate,
    Commodities,
}

impl AssetClass {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Stocks => "stocks",
            AssetClass::Bonds => "bonds",
            AssetClass::Crypto => "crypto",
            AssetClass::Cash => "cash",
            AssetClass::RealEstate => "real_estate",
            AssetClass::Commodities => "commodities",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AssetClass {
    type Error = FireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetClass> for String {
    fn from(value: AssetClass) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for AssetClass {
    type Err = FireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stocks" => Ok(AssetClass::Stocks),
            "bonds" => Ok(AssetClass::Bonds),
            "crypto" => Ok(AssetClass::Crypto),
            "cash" => Ok(AssetClass::Cash),
            "real_estate" | "real-estate" => Ok(AssetClass::RealEstate),
            "commodities" => Ok(AssetClass::Commodities),
            other => Err(FireError::invalid(
                "category",
                format!("unknown asset class '{other}'"),
            )),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RiskLevel {
    Minimal = 1,
    Low = 2,
    #[default]
    Medium = 3,
    High = 4,
    VeryHigh = 5,
}

impl TryFrom<u8> for RiskLevel {
    type Error = FireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RiskLevel::Minimal),
            2 => Ok(RiskLevel::Low),
            3 => Ok(RiskLevel::Medium),
            4 => Ok(RiskLevel::High),
            5 => Ok(RiskLevel::VeryHigh),
            _ => Err(FireError::invalid("risk_level", "must be between 1 and 5")),
        }
    }
}

impl From<RiskLevel> for u8 {
    fn from(value: RiskLevel) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub class: AssetClass,
    pub value: f64,
    pub target_allocation: f64,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSuggestion {
    pub asset: String,
    pub action: RebalanceAction,
    pub amount: f64,
    pub current: f64,
    pub target: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalysis {
    pub name: String,
    pub total_value: f64,
    pub asset_count: usize,
    pub allocation: BTreeMap<String, f64>,
    pub class_allocation: BTreeMap<AssetClass, f64>,
    pub risk_score: f64,
    pub rebalancing: Vec<RebalanceSuggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub name: String,
    pub assets: Vec<Asset>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: Vec::new(),
        }
    }

    pub fn add_asset(
        &mut self,
        name: &str,
        category: &str,
        value: f64,
        target_allocation: f64,
        risk_level: u8,
        currency: &str,
    ) -> FireResult<()> {
        self.push(Asset {
            name: name.to_string(),
            class: category.parse()?,
            value,
            target_allocation,
            risk_level: RiskLevel::try_from(risk_level)?,
            currency: currency.to_string(),
        })
    }

    pub fn push(&mut self, asset: Asset) -> FireResult<()> {
        if asset.name.trim().is_empty() {
            return Err(FireError::invalid("name", "must not be empty"));
        }
        if self.assets.iter().any(|a| a.name == asset.name) {
            return Err(FireError::invalid(
                "name",
                format!("asset '{}' already in portfolio", asset.name),
            ));
        }
        if asset.currency.trim().is_empty() {
            return Err(FireError::invalid("currency", "must not be empty"));
        }
        if !asset.value.is_finite() || asset.value < 0.0 {
            return Err(FireError::invalid("value", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&asset.target_allocation) {
            return Err(FireError::invalid(
                "target_allocation",
                "must be between 0 and 1",
            ));
        }
        self.assets.push(asset);
        Ok(())
    }

    pub fn total_value(&self) -> f64 {
        self.assets.iter().map(|a| a.value).sum()
    }

    pub fn allocation(&self) -> BTreeMap<String, f64> {
        let total = self.total_value();
        if total == 0.0 {
            return BTreeMap::new();
        }
        self.assets
            .iter()
            .map(|a| (a.name.clone(), a.value / total))
            .collect()
    }

    pub fn class_allocation(&self) -> BTreeMap<AssetClass, f64> {
        let total = self.total_value();
        if total == 0.0 {
            return BTreeMap::new();
        }
        let mut by_class = BTreeMap::new();
        for asset in &self.assets {
            *by_class.entry(asset.class).or_insert(0.0) += asset.value;
        }
        for value in by_class.values_mut() {
            *value /= total;
        }
        by_class
    }

    /// Value-weighted risk level scaled onto 0-10.
    pub fn risk_score(&self) -> f64 {
        let total = self.total_value();
        if total == 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .assets
            .iter()
            .map(|a| a.value * u8::from(a.risk_level) as f64)
            .sum();
        weighted / total * 2.0
    }

    pub fn suggest_rebalancing(&self, tolerance: f64) -> FireResult<Vec<RebalanceSuggestion>> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(FireError::invalid("tolerance", "must be >= 0"));
        }
        let total = self.total_value();
        let allocation = self.allocation();

        Ok(self
            .assets
            .iter()
            .filter_map(|asset| {
                let current = allocation.get(&asset.name).copied().unwrap_or(0.0);
                let difference = current - asset.target_allocation;
                if difference.abs() <= tolerance {
                    return None;
                }
                Some(RebalanceSuggestion {
                    asset: asset.name.clone(),
                    action: if difference > 0.0 {
                        RebalanceAction::Sell
                    } else {
                        RebalanceAction::Buy
                    },
                    amount: difference.abs() * total,
                    current,
                    target: asset.target_allocation,
                    difference,
                })
            })
            .collect())
    }

    pub fn analyze(&self) -> FireResult<PortfolioAnalysis> {
        Ok(PortfolioAnalysis {
            name: self.name.clone(),
            total_value: self.total_value(),
            asset_count: self.assets.len(),
            allocation: self.allocation(),
            class_allocation: self.class_allocation(),
            risk_score: self.risk_score(),
            rebalancing: self.suggest_rebalancing(DEFAULT_REBALANCE_TOLERANCE)?,
        })
    }
}
