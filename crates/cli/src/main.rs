//! Glucose monitor CLI
//!
//! Operator tooling for the glucose monitor: probe the reading source,
//! send test notifications, replay readings through the trend detector,
//! and query a running monitor's health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{evaluate, notify, probe, status};

/// Glucose monitor CLI
#[derive(Parser, Debug)]
#[command(name = "cgm")]
#[command(author, version, about = "CLI for the CGM glucose monitor", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to LibreLinkUp and print the current reading
    Probe {
        /// Print the raw graph document instead of the reading
        #[arg(long)]
        raw: bool,

        /// LibreLinkUp account email
        #[arg(long, env = "LIBRE_USERNAME", hide_env_values = true)]
        username: String,

        /// LibreLinkUp account password
        #[arg(long, env = "LIBRE_PASSWORD", hide_env_values = true)]
        password: String,

        /// API region (e.g. eu, us)
        #[arg(long, env = "LIBRE_REGION")]
        region: Option<String>,

        /// Client version sent to the API
        #[arg(long = "libre-version", env = "LIBRE_VERSION")]
        libre_version: Option<String>,
    },

    /// Send a test notification through Pushover
    Notify {
        /// Message priority
        #[arg(long, value_enum, default_value = "silent")]
        priority: notify::PriorityArg,

        /// Notification title
        #[arg(long, default_value = "Test notification")]
        title: String,

        /// Notification body
        #[arg(long, default_value = "Glucose monitor test message")]
        message: String,

        /// Pushover user key
        #[arg(long, env = "PUSHOVER_USER", hide_env_values = true)]
        user: String,

        /// Pushover application token
        #[arg(long, env = "PUSHOVER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Replay readings (mmol/L) through the trend detector
    Evaluate {
        /// Readings in arrival order
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,

        /// Low threshold
        #[arg(long, env = "GLUCOSE_CRITICAL_LOW", default_value_t = monitor_lib::alerting::DEFAULT_LOW_THRESHOLD)]
        low: f64,

        /// High threshold
        #[arg(long, env = "GLUCOSE_CRITICAL_HIGH", default_value_t = monitor_lib::alerting::DEFAULT_HIGH_THRESHOLD)]
        high: f64,

        /// Number of most recent readings examined
        #[arg(long, env = "EXAMINE_COUNT", default_value_t = monitor_lib::alerting::DEFAULT_EXAMINE_COUNT)]
        examine: usize,

        /// Window capacity
        #[arg(long, env = "WINDOW_CAPACITY", default_value_t = monitor_lib::scheduler::DEFAULT_WINDOW_CAPACITY)]
        capacity: usize,
    },

    /// Show the health of a running monitor
    Status {
        /// Monitor API URL
        #[arg(long, env = "CGM_API_URL", default_value = "http://localhost:8080")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up credentials from a local .env, as the monitor does
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            raw,
            username,
            password,
            region,
            libre_version,
        } => {
            probe::probe(
                username,
                password,
                region.as_deref(),
                libre_version.as_deref(),
                raw,
                cli.format,
            )
            .await?;
        }
        Commands::Notify {
            priority,
            title,
            message,
            user,
            token,
        } => {
            notify::send_test(user, token, priority.into(), title, message, cli.format).await?;
        }
        Commands::Evaluate {
            values,
            low,
            high,
            examine,
            capacity,
        } => {
            evaluate::evaluate(&values, low, high, examine, capacity, cli.format)?;
        }
        Commands::Status { api_url } => {
            let client = client::ApiClient::new(&api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
