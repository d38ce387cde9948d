use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use svitlo::config::Config;
use svitlo::fetcher::SourceFetcher;
use svitlo::server::ApiServer;
use svitlo::service::OutageService;
use svitlo::storage::OutageStore;

#[derive(Parser)]
#[command(
    name = "svitlo",
    version,
    about = "Hourly power outage schedule monitor and API",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (environment variables used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the schedule API
    Serve {
        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,

        /// Run an ingestion cycle immediately on startup
        #[arg(long, default_value = "false")]
        update_on_start: bool,
    },

    /// Run one ingestion cycle and exit
    Update,

    /// Print ingestion health from the local store
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Serve {
            port,
            update_on_start,
        } => {
            serve(config, port, update_on_start).await?;
        }
        Commands::Update => {
            update(config).await?;
        }
        Commands::Status => {
            status(config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("svitlo=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("svitlo=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn build_service(config: &Config) -> Result<Arc<OutageService>> {
    let store = Arc::new(
        OutageStore::open(&config.storage.db_path).context("failed to open outage store")?,
    );
    let fetcher = SourceFetcher::new(&config.source).context("failed to build fetcher")?;

    Ok(Arc::new(OutageService::new(
        fetcher,
        store,
        config.source.timezone,
    )))
}

async fn serve(mut config: Config, port: Option<u16>, update_on_start: bool) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let service = build_service(&config)?;

    if update_on_start {
        match service.trigger_update().await {
            Ok(report) => tracing::info!(dates = report.dates.len(), "startup ingestion done"),
            Err(e) => tracing::warn!(error = %e, "startup ingestion failed, serving stored data"),
        }
    }

    if config.server.update_interval_secs > 0 {
        spawn_update_timer(service.clone(), config.server.update_interval_secs);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    ApiServer::new(service).run(addr).await?;
    Ok(())
}

/// Periodic ingestion alongside the server; failures are logged and the
/// timer keeps going
fn spawn_update_timer(service: Arc<OutageService>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it when serving starts.
        timer.tick().await;

        loop {
            timer.tick().await;
            match service.trigger_update().await {
                Ok(report) if report.unchanged => {
                    tracing::debug!("periodic ingestion: source unchanged");
                }
                Ok(report) => {
                    tracing::info!(dates = report.dates.len(), "periodic ingestion applied");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "periodic ingestion failed");
                }
            }
        }
    });
}

async fn update(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let report = service.trigger_update().await?;

    if report.unchanged {
        println!("Source unchanged; nothing to apply");
    } else {
        println!("Updated {} dates:", report.dates.len());
        for date in &report.dates {
            println!("  {date}");
        }
    }

    Ok(())
}

fn status(config: Config) -> Result<()> {
    let store = OutageStore::open(&config.storage.db_path)?;
    let health = store.health()?;

    match health.last_scrape {
        Some(at) => println!(
            "Last scrape: {}",
            at.with_timezone(&config.source.timezone).to_rfc3339()
        ),
        None => println!("Last scrape: never"),
    }
    println!("Total queues: {}", health.total_queues);
    println!("Available dates ({}):", health.available_dates.len());
    for date in &health.available_dates {
        println!("  {date}");
    }

    Ok(())
}
