//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use monitor_lib::alerting::AlertDecision;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: Vec<T>) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a decision by severity
pub fn color_decision(decision: AlertDecision) -> String {
    let label = decision.to_string();
    match decision {
        AlertDecision::None => label.dimmed().to_string(),
        AlertDecision::SustainedLow | AlertDecision::SustainedHigh => {
            label.red().bold().to_string()
        }
        AlertDecision::SourceDegraded => label.yellow().to_string(),
        AlertDecision::SourceRecovered | AlertDecision::Heartbeat => label.green().to_string(),
    }
}

/// Format a glucose value in mmol/L, colored against the thresholds
pub fn color_reading(value: f64, low: f64, high: f64) -> String {
    let formatted = format!("{:.1}", value);
    if value < low {
        formatted.red().to_string()
    } else if value > high {
        formatted.magenta().to_string()
    } else {
        formatted.green().to_string()
    }
}
