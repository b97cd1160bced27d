//! Stampede CLI - Command-line interface for Stampede load tests
//!
//! Spawn a fleet of simulated players against a game server and watch how
//! their connections fare.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use stampede_fleet::{Fleet, FleetConfig};
use stampede_transport::WebSocketTransport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stampede - concurrent WebSocket client fleet for game server load tests
#[derive(Parser)]
#[command(name = "stampede")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the fleet and run until Ctrl+C
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Seconds between status reports (0 disables them)
        #[arg(long, default_value = "5")]
        report_interval: u64,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Per-run overrides for values from the config file
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Game server WebSocket URL
    #[arg(short, long, env = "STAMPEDE_URL")]
    url: Option<String>,

    /// Number of clients
    #[arg(short = 'n', long)]
    clients: Option<u32>,

    /// Seconds between client spawns
    #[arg(long)]
    spawn_delay: Option<f64>,

    /// Seconds between move commands per client
    #[arg(long)]
    send_interval: Option<f64>,

    /// Handshake attempts per client
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-attempt connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Seconds between handshake attempts
    #[arg(long)]
    retry_delay: Option<f64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut FleetConfig) {
        if let Some(url) = self.url {
            config.server_url = url;
        }
        if let Some(clients) = self.clients {
            config.client_count = clients;
        }
        if let Some(delay) = self.spawn_delay {
            config.spawn_delay_seconds = delay;
        }
        if let Some(interval) = self.send_interval {
            config.send_interval_seconds = interval;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.per_attempt_timeout_seconds = timeout;
        }
        if let Some(delay) = self.retry_delay {
            config.inter_attempt_delay_seconds = delay;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            overrides,
            report_interval,
        } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            run_fleet(config, report_interval).await?;
        }

        Commands::Config { overrides } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            print!("{}", config.to_toml().context("Failed to render config")?);
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<FleetConfig> {
    let mut config = match path {
        Some(path) => FleetConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FleetConfig::default(),
    };

    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run_fleet(config: FleetConfig, report_interval: u64) -> Result<()> {
    println!(
        "{} Spawning {} clients against {}",
        "STAMPEDE".cyan().bold(),
        config.client_count,
        config.server_url.yellow()
    );

    let mut fleet = Fleet::new(Arc::new(WebSocketTransport::new()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Ctrl+C while spawning stops whatever was spawned so far
    tokio::select! {
        result = fleet.run_with_config(&config) => {
            result.context("Failed to start fleet")?;
        }
        result = &mut ctrl_c => {
            result.context("Failed to listen for ctrl+c")?;
            info!("Received shutdown signal during spawn");
            shutdown(&mut fleet).await;
            return Ok(());
        }
    }

    println!("{} {}", "OK".green().bold(), fleet.status());

    let period = Duration::from_secs(report_interval.max(1));
    let mut reports = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for ctrl+c")?;
                info!("Received shutdown signal");
                break;
            }
            _ = reports.tick(), if report_interval > 0 => {
                print_report(&fleet);
            }
        }
    }

    print_report(&fleet);
    shutdown(&mut fleet).await;
    Ok(())
}

async fn shutdown(fleet: &mut Fleet<WebSocketTransport>) {
    fleet.stop();
    // Let the close frames flush before the runtime goes away
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("{} {}", "Fleet stopped".yellow(), fleet.status());
}

fn print_report(fleet: &Fleet<WebSocketTransport>) {
    println!("{} {}", "REPORT".cyan(), fleet.report());
}
