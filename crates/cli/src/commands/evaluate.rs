//! Offline replay of readings through the trend detector

use anyhow::Result;
use monitor_lib::{
    alerting::{AlertDecision, TrendDetector},
    models::Reading,
    scheduler::EngineConfig,
    window::SlidingWindow,
};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{color_decision, color_reading, print_json, print_table, OutputFormat};

/// Detector state after one reading was pushed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationStep {
    pub step: usize,
    pub value: f64,
    pub window: Vec<f64>,
    pub decision: AlertDecision,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Reading")]
    value: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Decision")]
    decision: String,
}

/// Push each value into a fresh window and evaluate after every push
pub fn replay(
    values: &[f64],
    low: f64,
    high: f64,
    examine: usize,
    capacity: usize,
) -> Result<Vec<EvaluationStep>> {
    let config = EngineConfig {
        window_capacity: capacity,
        examine_count: examine,
        low_threshold: low,
        high_threshold: high,
        ..EngineConfig::default()
    };
    config.validate()?;

    let detector = TrendDetector::new(low, high, examine);
    let mut window = SlidingWindow::new(capacity);

    Ok(values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            window.push(Reading::now(*value));
            EvaluationStep {
                step: i + 1,
                value: *value,
                window: window.values(),
                decision: detector.evaluate(&window),
            }
        })
        .collect())
}

pub fn evaluate(
    values: &[f64],
    low: f64,
    high: f64,
    examine: usize,
    capacity: usize,
    format: OutputFormat,
) -> Result<()> {
    let steps = replay(values, low, high, examine, capacity)?;

    match format {
        OutputFormat::Json => print_json(&steps)?,
        OutputFormat::Table => {
            let rows = steps
                .iter()
                .map(|s| StepRow {
                    step: s.step,
                    value: color_reading(s.value, low, high),
                    window: s
                        .window
                        .iter()
                        .map(|v| format!("{:.1}", v))
                        .collect::<Vec<_>>()
                        .join(" "),
                    decision: color_decision(s.decision),
                })
                .collect();
            print_table(rows);
        }
    }

    Ok(())
}
