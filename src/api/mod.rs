use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Router,
    body::Bytes,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::{AssumptionArgs, CliCompounding, CliGoalType, build_assumptions, goal_config};
use crate::core::{
    Assumptions, CoastFireResult, FireError, FireResult, FireSummary, GoalSolveResult,
    ScenarioRow, TimelineEntry, coast_fire, fire_number, project_timeline, rank_scenarios,
    solve_goal, summarize, sweep_scenarios, timeline,
};
use crate::portfolio::{Asset, DEFAULT_REBALANCE_TOLERANCE, Holdings, Portfolio, PortfolioAnalysis};

const MAX_SCENARIOS: usize = 400;
const DEFAULT_SAVINGS_OPTIONS: [f64; 3] = [200.0, 300.0, 500.0];
const DEFAULT_RETURN_OPTIONS: [f64; 3] = [7.0, 8.0, 10.0];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiCompounding {
    #[serde(alias = "month")]
    Monthly,
    #[serde(alias = "yearly", alias = "year")]
    Annual,
}

impl From<ApiCompounding> for CliCompounding {
    fn from(value: ApiCompounding) -> Self {
        match value {
            ApiCompounding::Monthly => CliCompounding::Monthly,
            ApiCompounding::Annual => CliCompounding::Annual,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoalType {
    #[serde(alias = "requiredSavings", alias = "required_savings")]
    RequiredSavings,
    #[serde(alias = "maxExpenses", alias = "max_expenses")]
    MaxExpenses,
}

impl From<ApiGoalType> for CliGoalType {
    fn from(value: ApiGoalType) -> Self {
        match value {
            ApiGoalType::RequiredSavings => CliGoalType::RequiredSavings,
            ApiGoalType::MaxExpenses => CliGoalType::MaxExpenses,
        }
    }
}

/// A JSON array of numbers or, from a query string, a comma-separated list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberList {
    List(Vec<f64>),
    Csv(String),
}

impl NumberList {
    fn into_values(self, field: &str) -> FireResult<Vec<f64>> {
        match self {
            NumberList::List(values) => Ok(values),
            NumberList::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| FireError::invalid(field, format!("'{s}' is not a number")))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FirePayload {
    net_worth: Option<f64>,
    monthly_savings: Option<f64>,
    annual_return: Option<f64>,
    annual_expenses: Option<f64>,
    withdrawal_rate: Option<f64>,
    inflation_rate: Option<f64>,
    compounding: Option<ApiCompounding>,
    horizon_years: Option<u32>,
    real: Option<bool>,

    years: Option<u32>,
    yearly: Option<bool>,

    savings: Option<NumberList>,
    returns: Option<NumberList>,
    rank: Option<bool>,

    current_age: Option<u32>,
    target_age: Option<u32>,

    goal: Option<ApiGoalType>,
    target_years: Option<f64>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

impl FirePayload {
    fn assumption_args(&self) -> AssumptionArgs {
        let mut args = AssumptionArgs::default();
        if let Some(v) = self.net_worth {
            args.net_worth = v;
        }
        if let Some(v) = self.monthly_savings {
            args.monthly_savings = v;
        }
        if let Some(v) = self.annual_return {
            args.annual_return = v;
        }
        if let Some(v) = self.annual_expenses {
            args.annual_expenses = v;
        }
        if let Some(v) = self.withdrawal_rate {
            args.withdrawal_rate = v;
        }
        if let Some(v) = self.inflation_rate {
            args.inflation_rate = v;
        }
        if let Some(v) = self.compounding {
            args.compounding = v.into();
        }
        if let Some(v) = self.horizon_years {
            args.horizon_years = v;
        }
        if let Some(v) = self.real {
            args.real = v;
        }
        args
    }

    fn assumptions(&self) -> FireResult<Assumptions> {
        build_assumptions(&self.assumption_args())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioPayload {
    pub name: Option<String>,
    pub holdings: Option<Holdings>,
    pub prices: BTreeMap<String, f64>,
    pub assets: Vec<Asset>,
    pub tolerance: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub holdings_value: Option<f64>,
    pub weights: BTreeMap<String, f64>,
    pub analysis: Option<PortfolioAnalysis>,
}

/// Parses a JSON request body, reporting malformed or mistyped input as `InvalidInput`.
pub fn parse_json<T: DeserializeOwned>(field: &str, raw: &[u8]) -> FireResult<T> {
    serde_json::from_slice(raw).map_err(|err| FireError::invalid(field, err.to_string()))
}

pub fn portfolio_report(payload: PortfolioPayload) -> FireResult<PortfolioReport> {
    if payload.holdings.is_none() && payload.assets.is_empty() {
        return Err(FireError::invalid(
            "portfolio",
            "provide holdings with prices, assets, or both",
        ));
    }

    let (holdings_value, weights) = match &payload.holdings {
        Some(holdings) => (
            Some(holdings.total_value(&payload.prices)),
            holdings.weights(&payload.prices),
        ),
        None => (None, BTreeMap::new()),
    };

    let analysis = if payload.assets.is_empty() {
        None
    } else {
        let name = payload.name.unwrap_or_else(|| "My Portfolio".to_string());
        let mut portfolio = Portfolio::new(name);
        for asset in payload.assets {
            portfolio.push(asset)?;
        }
        let tolerance = payload.tolerance.unwrap_or(DEFAULT_REBALANCE_TOLERANCE);
        let mut analysis = portfolio.analyze()?;
        analysis.rebalancing = portfolio.suggest_rebalancing(tolerance)?;
        Some(analysis)
    };

    Ok(PortfolioReport {
        holdings_value,
        weights,
        analysis,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineResponse {
    fire_number: f64,
    periods_per_year: u32,
    reaches_target: bool,
    entries: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse {
    fire_number: f64,
    scenarios: Vec<ScenarioRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn summary_response(payload: &FirePayload) -> FireResult<FireSummary> {
    summarize(&payload.assumptions()?)
}

fn timeline_response(payload: &FirePayload) -> FireResult<TimelineResponse> {
    let assumptions = payload.assumptions()?;
    let plan = match payload.years {
        Some(years) => project_timeline(&assumptions, years)?,
        None => timeline(&assumptions)?,
    };
    let entries: Vec<TimelineEntry> = if payload.yearly.unwrap_or(false) {
        plan.yearly().collect()
    } else {
        plan.to_vec()
    };
    let reaches_target = entries
        .last()
        .is_some_and(|entry| entry.net_worth >= plan.fire_number());

    Ok(TimelineResponse {
        fire_number: plan.fire_number(),
        periods_per_year: plan.periods_per_year(),
        reaches_target,
        entries,
    })
}

fn scenarios_response(payload: FirePayload) -> FireResult<ScenariosResponse> {
    let assumptions = payload.assumptions()?;
    let savings = match payload.savings {
        Some(list) => list.into_values("savings")?,
        None => DEFAULT_SAVINGS_OPTIONS.to_vec(),
    };
    let returns: Vec<f64> = match payload.returns {
        Some(list) => list.into_values("returns")?,
        None => DEFAULT_RETURN_OPTIONS.to_vec(),
    }
    .into_iter()
    .map(|r| r / 100.0)
    .collect();

    if savings.len() * returns.len() > MAX_SCENARIOS {
        return Err(FireError::invalid(
            "scenarios",
            format!("at most {MAX_SCENARIOS} savings/return combinations"),
        ));
    }

    let mut outcomes = sweep_scenarios(&assumptions, &savings, &returns)?;
    if payload.rank.unwrap_or(false) {
        rank_scenarios(&mut outcomes);
    }
    Ok(ScenariosResponse {
        fire_number: fire_number(assumptions.annual_expenses, assumptions.safe_withdrawal_rate)?,
        scenarios: outcomes.iter().map(|o| o.to_row()).collect(),
    })
}

fn coast_response(payload: &FirePayload) -> FireResult<CoastFireResult> {
    let current_age = payload
        .current_age
        .ok_or_else(|| FireError::invalid("currentAge", "is required"))?;
    let target_age = payload
        .target_age
        .ok_or_else(|| FireError::invalid("targetAge", "is required"))?;
    coast_fire(&payload.assumptions()?, current_age, target_age)
}

fn solve_response(payload: &FirePayload) -> FireResult<GoalSolveResult> {
    let target_years = payload
        .target_years
        .ok_or_else(|| FireError::invalid("targetYears", "is required"))?;
    let goal: CliGoalType = payload.goal.unwrap_or(ApiGoalType::RequiredSavings).into();
    let config = goal_config(
        goal.into(),
        target_years,
        payload.search_min,
        payload.search_max,
        payload.tolerance,
        payload.max_iterations,
    );
    solve_goal(&payload.assumptions()?, config)
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/summary", get(summary_get_handler).post(summary_post_handler))
        .route("/api/timeline", get(timeline_get_handler).post(timeline_post_handler))
        .route("/api/scenarios", get(scenarios_get_handler).post(scenarios_post_handler))
        .route("/api/coast", get(coast_get_handler).post(coast_post_handler))
        .route("/api/solve", get(solve_get_handler).post(solve_post_handler))
        .route("/api/portfolio", post(portfolio_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "FIRE HTTP API listening");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn summary_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(summary_response(&payload))
}

async fn summary_post_handler(body: Bytes) -> Response {
    let payload = parse_json::<FirePayload>("body", &body);
    respond(payload.and_then(|payload| summary_response(&payload)))
}

async fn timeline_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(timeline_response(&payload))
}

async fn timeline_post_handler(body: Bytes) -> Response {
    let payload = parse_json::<FirePayload>("body", &body);
    respond(payload.and_then(|payload| timeline_response(&payload)))
}

async fn scenarios_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(scenarios_response(payload))
}

async fn scenarios_post_handler(body: Bytes) -> Response {
    let payload = parse_json::<FirePayload>("body", &body);
    respond(payload.and_then(scenarios_response))
}

async fn coast_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(coast_response(&payload))
}

async fn coast_post_handler(body: Bytes) -> Response {
    let payload = parse_json::<FirePayload>("body", &body);
    respond(payload.and_then(|payload| coast_response(&payload)))
}

async fn solve_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(solve_response(&payload))
}

async fn solve_post_handler(body: Bytes) -> Response {
    let payload = parse_json::<FirePayload>("body", &body);
    respond(payload.and_then(|payload| solve_response(&payload)))
}

async fn portfolio_handler(body: Bytes) -> Response {
    let payload = parse_json::<PortfolioPayload>("body", &body);
    respond(payload.and_then(portfolio_report))
}

fn respond<T: Serialize>(result: FireResult<T>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            let status = match err {
                FireError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                FireError::UnreachableGoal { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            };
            warn!(%status, %err, "request rejected");
            error_response(status, &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
