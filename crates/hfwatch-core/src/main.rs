//! hfwatch CLI
//!
//! Command-line interface for the Aave health factor monitor.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use hfwatch::bot::{CommandHandler, TelegramPoller};
use hfwatch::config::{Config, LoggingConfig};
use hfwatch::models::RemoveOutcome;
use hfwatch::monitor::{
    AlertEvaluator, JsonFileStore, Scheduler, SchedulerConfig, SubscriptionRegistry,
};
use hfwatch::notify::{LogNotifier, Notifier, TelegramClient};
use hfwatch::source::{AavePoolSource, AddressValidator, EthAddressValidator, MetricSource};

/// hfwatch - Aave health factor alerts over Telegram
#[derive(Parser)]
#[command(name = "hfwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "HFWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and the periodic monitor
    Serve,

    /// Print the current health factor of an address
    Check {
        /// Address to query
        address: String,
    },

    /// Run a single sweep over all subscriptions now
    Sweep {
        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect stored subscriptions (stop `serve` before editing)
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionsCommands,
    },
}

#[derive(Subcommand)]
enum SubscriptionsCommands {
    /// List all subscriptions
    List,

    /// Remove a subscriber's subscription
    Remove {
        /// Subscriber (chat) id
        subscriber: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve => run_serve(config).await,
        Commands::Check { address } => run_check(&config, &address, cli.format).await,
        Commands::Sweep { dry_run } => run_sweep(&config, dry_run, cli.format).await,
        Commands::Subscriptions { command } => {
            run_subscriptions(&config, command, cli.format).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_registry(config: &Config) -> Arc<SubscriptionRegistry> {
    let store = Arc::new(JsonFileStore::new(&config.monitor.data_file));
    Arc::new(SubscriptionRegistry::open(store).await)
}

fn build_scheduler(
    config: &Config,
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn MetricSource>,
    notifier: Arc<dyn Notifier>,
) -> Scheduler {
    Scheduler::new(
        SchedulerConfig::from(&config.monitor),
        registry,
        source,
        notifier,
        AlertEvaluator::new(config.monitor.dashboard_url.clone()),
    )
}

async fn run_serve(config: Config) -> anyhow::Result<()> {
    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    let source: Arc<dyn MetricSource> = Arc::new(AavePoolSource::new(&config.ethereum)?);
    let registry = open_registry(&config).await;

    let scheduler = Arc::new(build_scheduler(
        &config,
        registry.clone(),
        source.clone(),
        telegram.clone(),
    ));
    let handler = Arc::new(CommandHandler::new(
        registry.clone(),
        source,
        Arc::new(EthAddressValidator),
        telegram.clone(),
        scheduler.clone(),
    ));
    let poller = TelegramPoller::new(
        telegram,
        handler,
        Duration::from_secs(config.telegram.poll_timeout_seconds),
    );

    let cancel = CancellationToken::new();

    let scheduler_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    let poller_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    info!(
        subscriptions = registry.len().await,
        data_file = %config.monitor.data_file.display(),
        "hfwatch started, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down...");

    cancel.cancel();
    let (scheduler_result, poller_result) = tokio::join!(scheduler_task, poller_task);
    scheduler_result?;
    poller_result?;

    Ok(())
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    address: &'a str,
    health_factor: f64,
}

async fn run_check(config: &Config, address: &str, format: OutputFormat) -> anyhow::Result<()> {
    if !EthAddressValidator.is_valid(address) {
        anyhow::bail!("Invalid Ethereum address: {address}");
    }

    let source = AavePoolSource::new(&config.ethereum)?;
    let health_factor = source.health_factor(address).await?;

    match format {
        OutputFormat::Text => println!("Current health factor for {address}: {health_factor}"),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&CheckOutput {
                address,
                health_factor,
            })?
        ),
    }
    Ok(())
}

async fn run_sweep(config: &Config, dry_run: bool, format: OutputFormat) -> anyhow::Result<()> {
    let source: Arc<dyn MetricSource> = Arc::new(AavePoolSource::new(&config.ethereum)?);
    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramClient::new(&config.telegram)?)
    };

    let registry = open_registry(config).await;
    let report = build_scheduler(config, registry, source, notifier)
        .sweep()
        .await;

    match format {
        OutputFormat::Text => {
            for outcome in &report.outcomes {
                println!(
                    "{:<16} {:<32} {:?}",
                    outcome.subscriber_id,
                    format!("{:?}", outcome.reading),
                    outcome.decision
                );
            }
            println!(
                "\n{} evaluated, {} alerts sent, {} unavailable, {} delivery failures",
                report.evaluated(),
                report.alerts_sent(),
                report.unavailable(),
                report.delivery_failures()
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct SubscriptionRow {
    subscriber: String,
    address: String,
    threshold: f64,
}

async fn run_subscriptions(
    config: &Config,
    command: SubscriptionsCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let registry = open_registry(config).await;

    match command {
        SubscriptionsCommands::List => {
            let mut rows: Vec<SubscriptionRow> = registry
                .list_all()
                .await
                .into_iter()
                .map(|(subscriber, sub)| SubscriptionRow {
                    subscriber,
                    address: sub.address,
                    threshold: sub.threshold,
                })
                .collect();
            rows.sort_by(|a, b| a.subscriber.cmp(&b.subscriber));

            match format {
                OutputFormat::Text => {
                    if rows.is_empty() {
                        println!("No subscriptions.");
                    }
                    for row in &rows {
                        println!("{:<16} {} < {}", row.subscriber, row.address, row.threshold);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        SubscriptionsCommands::Remove { subscriber } => {
            match registry.remove(&subscriber).await? {
                RemoveOutcome::Removed => println!("Removed subscription for {subscriber}"),
                RemoveOutcome::Absent => println!("No subscription for {subscriber}"),
            }
        }
    }
    Ok(())
}
