//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

/// Width of the textual risk bar in characters
const RISK_BAR_WIDTH: usize = 20;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the raw items as JSON
pub fn print_rows<T: Serialize, R: Tabled>(
    items: &[T],
    rows: impl FnOnce(&[T]) -> Vec<R>,
    empty_message: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&items)?,
        OutputFormat::Table => {
            if items.is_empty() {
                print_warning(empty_message);
                return Ok(());
            }
            let table = Table::new(rows(items)).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a risk tier: low green, medium yellow, high red
pub fn color_tier(tier: &str) -> String {
    let label = tier.to_uppercase();
    match tier.to_lowercase().as_str() {
        "low" => label.green().bold().to_string(),
        "medium" => label.yellow().bold().to_string(),
        "high" => label.red().bold().to_string(),
        _ => label,
    }
}

/// Fixed-width bar filled in proportion to a score in [0, 1]
pub fn risk_bar(score: f64) -> String {
    let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    let filled = (score * RISK_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:.2}%",
        "█".repeat(filled),
        "░".repeat(RISK_BAR_WIDTH - filled),
        score * 100.0
    )
}

/// Driving advice shown under a prediction
pub fn advice(tier: &str) -> &'static str {
    match tier.to_lowercase().as_str() {
        "low" => "Low risk: conditions look favourable, but keep driving carefully and watch the road.",
        "medium" => "Medium risk: stay alert, slow down and keep a safe following distance.",
        "high" => "High risk: reduce speed markedly and consider another route if possible.",
        _ => "Unknown risk tier.",
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.4}", score)
}

pub fn format_metric(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Render an RFC 3339 timestamp in local time, or pass it through untouched
pub fn format_timestamp(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_bar_fill() {
        let empty = risk_bar(0.0);
        assert!(empty.starts_with(&format!("[{}]", "░".repeat(RISK_BAR_WIDTH))));
        assert!(empty.ends_with("0.00%"));

        let full = risk_bar(1.0);
        assert!(full.starts_with(&format!("[{}]", "█".repeat(RISK_BAR_WIDTH))));
        assert!(full.ends_with("100.00%"));

        let half = risk_bar(0.5);
        assert_eq!(half.matches('█').count(), RISK_BAR_WIDTH / 2);
    }

    #[test]
    fn test_risk_bar_out_of_range() {
        assert_eq!(risk_bar(1.7), risk_bar(1.0));
        assert_eq!(risk_bar(-0.5), risk_bar(0.0));
        assert_eq!(risk_bar(f64::NAN), risk_bar(0.0));
    }

    #[test]
    fn test_advice_per_tier() {
        assert!(advice("low").starts_with("Low risk"));
        assert!(advice("MEDIUM").starts_with("Medium risk"));
        assert!(advice("high").starts_with("High risk"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_score(0.123456), "0.1235");
        assert_eq!(format_metric(None), "-");
        assert_eq!(format_metric(Some(0.5)), "0.5000");
        assert_eq!(format_timestamp("not a time"), "not a time");
    }
}
