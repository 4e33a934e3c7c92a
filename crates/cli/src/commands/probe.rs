//! Probe the LibreLinkUp reading source

use anyhow::{Context, Result};
use colored::Colorize;
use monitor_lib::source::{LibreCredentials, LibreLinkUpSource, LibreOptions, ReadingSource};
use tabled::Tabled;

use crate::output::{color_reading, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Glucose (mmol/L)")]
    value: String,
    #[tabled(rename = "Received")]
    observed_at: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

/// Log in and print the current reading, or the raw graph document
pub async fn probe(
    username: String,
    password: String,
    region: Option<&str>,
    version: Option<&str>,
    raw: bool,
    format: OutputFormat,
) -> Result<()> {
    let options = LibreOptions::for_region(region, version);
    let endpoint = options.base_url.clone();
    let source = LibreLinkUpSource::new(LibreCredentials { username, password }, options)
        .context("Failed to create LibreLinkUp client")?;

    if raw {
        let document = source
            .read_raw()
            .await
            .context("Failed to read graph data")?;
        return print_json(&document);
    }

    let reading = source
        .fetch_current()
        .await
        .context("Failed to fetch current reading")?;

    match format {
        OutputFormat::Json => print_json(&reading)?,
        OutputFormat::Table => {
            println!("{}", "Current Reading".bold());
            print_table(vec![ReadingRow {
                value: color_reading(
                    reading.value,
                    monitor_lib::alerting::DEFAULT_LOW_THRESHOLD,
                    monitor_lib::alerting::DEFAULT_HIGH_THRESHOLD,
                ),
                observed_at: reading
                    .observed_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                endpoint,
            }]);
        }
    }

    Ok(())
}
