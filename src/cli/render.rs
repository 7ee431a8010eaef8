use crate::api::PortfolioReport;
use crate::core::{CoastFireResult, FireSummary, GoalSolveResult, GoalType, ScenarioRow, TimelineEntry};

/// Whole currency units with thousands separators, e.g. `$1,234,567`.
fn money(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_summary(summary: &FireSummary) -> String {
    let years = match summary.years_to_fire {
        Some(years) => format!("{years:.1} years"),
        None => "unreachable within the horizon".to_string(),
    };
    let remaining = (summary.fire_number - summary.current_net_worth).max(0.0);
    finish(vec![
        format!("{:<22}{}", "FIRE number:", money(summary.fire_number)),
        format!(
            "{:<22}{} ({:.1}%)",
            "Current net worth:",
            money(summary.current_net_worth),
            summary.progress_percent
        ),
        format!("{:<22}{}", "Monthly savings:", money(summary.monthly_savings)),
        format!("{:<22}{}", "Annual expenses:", money(summary.annual_expenses)),
        format!("{:<22}{:.2}%", "Annual return:", summary.annual_return * 100.0),
        format!("{:<22}{years}", "Years to FIRE:"),
        format!("{:<22}{}", "Still to save:", money(remaining)),
    ])
}

pub fn render_timeline(entries: &[TimelineEntry], fire_number: f64) -> String {
    let mut lines = vec![
        format!(
            "{:>7} {:>5} {:>6} {:>16} {:>9}",
            "Period", "Year", "Month", "Net worth", "Progress"
        ),
        "-".repeat(47),
    ];
    lines.extend(entries.iter().map(|entry| {
        format!(
            "{:>7} {:>5} {:>6} {:>16} {:>8.1}%",
            entry.period,
            entry.year,
            entry.period_in_year,
            money(entry.net_worth),
            entry.progress_percent
        )
    }));
    lines.push(String::new());
    lines.push(format!("Target: {} (100%)", money(fire_number)));
    finish(lines)
}

pub fn render_scenarios(rows: &[ScenarioRow]) -> String {
    let mut lines = vec![
        format!("{:<25} {:>15}", "Scenario", "Years to FIRE"),
        "-".repeat(41),
    ];
    lines.extend(rows.iter().map(|row| match row.years {
        Some(years) => format!("{:<25} {:>9.1} years", row.label, years),
        None => format!("{:<25} {:>15}", row.label, "unreachable"),
    }));
    finish(lines)
}

pub fn render_coast(results: &[CoastFireResult]) -> String {
    let mut lines = vec![
        format!("{:<12} {:>14}   Status", "Retire at", "Need now"),
        "-".repeat(50),
    ];
    lines.extend(results.iter().map(|result| {
        let status = if result.achieved {
            "achieved".to_string()
        } else {
            format!("need {} more", money(result.shortfall))
        };
        format!(
            "Age {:<8} {:>14}   {status}",
            result.target_age,
            money(result.coast_number)
        )
    }));
    finish(lines)
}

pub fn render_solve(result: &GoalSolveResult) -> String {
    let what = match result.goal_type {
        GoalType::RequiredSavings => "Required monthly savings",
        GoalType::MaxExpenses => "Maximum annual expenses",
    };
    let mut lines = vec![match result.solved_value {
        Some(value) => format!("{what}: {}", money(value)),
        None => format!("{what}: not found"),
    }];
    if let Some(years) = result.achieved_years {
        lines.push(format!(
            "Reaches FIRE in {years:.1} years (target {:.1})",
            result.target_years
        ));
    }
    lines.push(format!(
        "{} ({} iterations)",
        result.message,
        result.iterations.len()
    ));
    finish(lines)
}

pub fn render_portfolio(report: &PortfolioReport) -> String {
    let mut lines = Vec::new();
    if let Some(value) = report.holdings_value {
        lines.push(format!("Holdings value: {}", money(value)));
        for (ticker, weight) in &report.weights {
            lines.push(format!("  {ticker:<8} {:>6.2}%", weight * 100.0));
        }
    }
    if let Some(analysis) = &report.analysis {
        lines.push(format!("Portfolio: {}", analysis.name));
        lines.push(format!("Total value: {}", money(analysis.total_value)));
        lines.push("Allocation:".to_string());
        for (asset, share) in &analysis.allocation {
            lines.push(format!("  {asset:<8} {:>5.1}%", share * 100.0));
        }
        lines.push(format!("Risk score: {:.1}/10", analysis.risk_score));
        if analysis.rebalancing.is_empty() {
            lines.push("No rebalancing needed".to_string());
        } else {
            lines.push("Rebalancing:".to_string());
            for suggestion in &analysis.rebalancing {
                lines.push(format!(
                    "  {:?} {} of {}",
                    suggestion.action,
                    money(suggestion.amount),
                    suggestion.asset
                ));
            }
        }
    }
    finish(lines)
}
