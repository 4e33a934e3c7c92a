//! Health of a running monitor

use anyhow::Result;
use colored::Colorize;
use monitor_lib::health::{ComponentStatus, HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_info, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct StatusReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

fn status_label(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| secs.to_string())
}

/// Query `/healthz` and `/readyz` and print the result
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.get_probe("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.get_probe("readyz").await?;

    if let OutputFormat::Json = format {
        return print_json(&StatusReport { health, readiness });
    }

    println!("{}", "Monitor Status".bold());
    println!("{}", "=".repeat(50));
    println!("Health:     {}", color_status(status_label(health.status)));
    let ready = if readiness.ready { "ready" } else { "not ready" };
    println!("Readiness:  {}", color_status(ready));
    if let Some(reason) = &readiness.reason {
        print_info(reason);
    }
    println!();

    let mut components: Vec<_> = health.components.into_iter().collect();
    components.sort_by(|a, b| a.0.cmp(&b.0));

    let rows = components
        .into_iter()
        .map(|(name, h)| ComponentRow {
            name,
            status: color_status(status_label(h.status)),
            message: h.message.unwrap_or_default(),
            last_check: format_timestamp(h.last_check_timestamp),
        })
        .collect();
    print_table(rows);

    Ok(())
}
