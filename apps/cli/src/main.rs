//! `fleetsync` command-line entry point.

mod config;
mod context;

use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::Value;

use fleetsync_core::constants::DEFAULT_POOR_BATTERY_PERCENT;
use fleetsync_core::queries::QueryServiceTrait;
use fleetsync_core::runs::{RunCategory, RunStatus};
use fleetsync_core::sync::{RunServiceTrait, StartRunOutcome};

use crate::config::AppConfig;
use crate::context::initialize_context;

const DEFAULT_DAEMON_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Parser)]
#[command(name = "fleetsync")]
#[command(about = "Reconcile device, asset and people inventories into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the pipeline now and wait for it to finish
    Sync {
        /// full, devices_only, users_only or assets
        #[arg(default_value = "full")]
        category: RunCategory,
    },

    /// Run a full sync on a fixed interval until Ctrl-C
    Daemon {
        /// Seconds between runs (default six hours)
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Show the last finished run
    Status,

    /// List recent runs
    History {
        #[arg(default_value_t = 10)]
        limit: i64,
    },

    /// Look up one device by serial number or asset tag
    Device { identifier: String },

    /// Look up one person and their devices
    Person { email: String },

    /// Print an aggregate device report
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum ReportKind {
    /// Counts by status and org unit, plus ghost and poor-battery totals
    Summary,

    /// Active devices with battery health at or below a threshold
    Battery {
        #[arg(long, default_value_t = DEFAULT_POOR_BATTERY_PERCENT)]
        threshold: i32,
    },

    /// Models grouped by whether auto-update support has expired
    AueStatus,

    /// Devices whose auto-update support ends in the given year
    AueYear { year: i32 },

    /// Active devices that stopped checking in
    Ghost,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let context = initialize_context(&config)?;

    match cli.command {
        Commands::Sync { category } => {
            info!("[CLI] starting {} run", category.as_str());
            let run = context.run_service().run_blocking(category).await?;
            print_json(&run)?;
            if run.status != RunStatus::Completed {
                bail!("run {} finished as {:?}", run.id, run.status);
            }
        }
        Commands::Daemon { interval } => {
            let interval = interval.map_or(DEFAULT_DAEMON_INTERVAL, Duration::from_secs);
            run_daemon(&context, interval).await?;
        }
        Commands::Status => {
            print_json(&context.run_service().get_run_status()?)?;
        }
        Commands::History { limit } => {
            print_json(&context.query_service().run_history(limit)?)?;
        }
        Commands::Device { identifier } => {
            match context.query_service().find_device(&identifier).await? {
                Some(device) => print_json(&device)?,
                None => print_json(&Value::Null)?,
            }
        }
        Commands::Person { email } => match context.query_service().find_person(&email).await? {
            Some(detail) => print_json(&detail)?,
            None => print_json(&Value::Null)?,
        },
        Commands::Report { kind } => {
            let queries = context.query_service();
            match kind {
                ReportKind::Summary => print_json(&queries.device_summary().await?)?,
                ReportKind::Battery { threshold } => {
                    print_json(&queries.battery_health_report(threshold).await?)?
                }
                ReportKind::AueStatus => print_json(&queries.aue_status_report().await?)?,
                ReportKind::AueYear { year } => print_json(&queries.aue_year_report(year).await?)?,
                ReportKind::Ghost => print_json(&queries.ghost_device_report().await?)?,
            }
        }
    }
    Ok(())
}

/// Queues a full run every `interval` until Ctrl-C.
async fn run_daemon(context: &context::ServiceContext, interval: Duration) -> Result<()> {
    let service = context.run_service();
    service.spawn_worker().await;
    info!("[CLI] daemon started, full sync every {}s", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.start_run(RunCategory::Full).await {
                    Ok(StartRunOutcome::Accepted { run_id }) => info!("[CLI] queued run {}", run_id),
                    Ok(StartRunOutcome::AlreadyRunning { holder }) => warn!(
                        "[CLI] skipped tick, lock held by {}",
                        holder.as_deref().unwrap_or("an expired holder")
                    ),
                    Err(err) => error!("[CLI] could not start run: {}", err),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("[CLI] shutting down");
                service.stop_worker().await;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Commands, clap::Error> {
        Cli::try_parse_from(std::iter::once("fleetsync").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse(&["sync"]).unwrap(),
            Commands::Sync { category: RunCategory::Full }
        );
        assert_eq!(
            parse(&["sync", "devices-only"]).unwrap(),
            Commands::Sync { category: RunCategory::DevicesOnly }
        );
        assert_eq!(parse(&["daemon"]).unwrap(), Commands::Daemon { interval: None });
        assert_eq!(
            parse(&["daemon", "90"]).unwrap(),
            Commands::Daemon { interval: Some(90) }
        );
        assert_eq!(parse(&["history"]).unwrap(), Commands::History { limit: 10 });
        assert_eq!(
            parse(&["person", "ada@x.org"]).unwrap(),
            Commands::Person { email: "ada@x.org".to_string() }
        );
        assert_eq!(
            parse(&["device", "T-100"]).unwrap(),
            Commands::Device { identifier: "T-100".to_string() }
        );
    }

    #[test]
    fn parses_report_commands() {
        assert_eq!(
            parse(&["report", "summary"]).unwrap(),
            Commands::Report { kind: ReportKind::Summary }
        );
        assert_eq!(
            parse(&["report", "battery"]).unwrap(),
            Commands::Report {
                kind: ReportKind::Battery { threshold: 30 }
            }
        );
        assert_eq!(
            parse(&["report", "battery", "--threshold", "45"]).unwrap(),
            Commands::Report {
                kind: ReportKind::Battery { threshold: 45 }
            }
        );
        assert_eq!(
            parse(&["report", "aue-year", "2027"]).unwrap(),
            Commands::Report {
                kind: ReportKind::AueYear { year: 2027 }
            }
        );
        assert!(parse(&["report", "aue-year"]).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["sync", "meraki"]).is_err());
        assert!(parse(&["device"]).is_err());
        assert!(parse(&["history", "many"]).is_err());
        assert!(parse(&["daemon", "0"]).is_err());
        assert!(parse(&["reboot"]).is_err());
    }
}
