mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "recurring-events")]
#[command(about = "Create multiple WordPress Events Calendar events from recurring templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Event file (defaults to $RECURRING_EVENTS_CONFIG, then events.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Date range to work on
#[derive(Args)]
struct WindowArgs {
    /// First date to consider (YYYY-MM-DD, defaults to today)
    #[arg(short, long)]
    start_date: Option<NaiveDate>,

    /// Last date to consider (YYYY-MM-DD)
    #[arg(short, long, conflicts_with = "weeks", required_unless_present = "weeks")]
    end_date: Option<NaiveDate>,

    /// Number of weeks after the start date
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=52))]
    weeks: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or update) the events falling in a date range
    Sync {
        #[command(flatten)]
        window: WindowArgs,

        /// Only these weekdays (repeatable)
        #[arg(short, long = "day", value_parser = parse_day)]
        days: Vec<Weekday>,

        /// Only these event keys from the event file (repeatable)
        #[arg(long = "event")]
        events: Vec<String>,

        /// Update events that already exist instead of skipping them
        #[arg(short, long)]
        update: bool,

        /// Show what would be done without creating or updating anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Carry on with the next event when one fails
        #[arg(long)]
        keep_going: bool,

        /// Seconds to pause after each remote write
        #[arg(long, default_value = "1")]
        delay: u64,

        /// Plan without contacting the site: every event is reported as new
        #[arg(long, requires = "dry_run")]
        offline: bool,

        /// Print the dry-run plan as JSON
        #[arg(long, requires = "dry_run")]
        json: bool,
    },

    /// List the events already on the site in a date range
    List {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// List the configured event templates
    Templates,
}

fn parse_day(value: &str) -> Result<Weekday, String> {
    recurring_events_core::config::parse_weekday(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set the log level
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "recurring_events_cli={0},recurring_events_core={0}",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = recurring_events_core::config::resolve_config_path(cli.config);

    match cli.command {
        Commands::Sync {
            window,
            days,
            events,
            update,
            dry_run,
            keep_going,
            delay,
            offline,
            json,
        } => {
            commands::sync_command(commands::SyncParams {
                config,
                start_date: window.start_date,
                end_date: window.end_date,
                weeks: window.weeks,
                days,
                events,
                update,
                dry_run,
                keep_going,
                delay,
                offline,
                json,
            })
            .await
        }

        Commands::List { window } => {
            commands::list_command(config, window.start_date, window.end_date, window.weeks).await
        }

        Commands::Templates => commands::templates_command(&config),
    }
}
