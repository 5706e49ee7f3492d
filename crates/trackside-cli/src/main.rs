//! trackside - vehicle telemetry ingestion CLI
//!
//! Runs the ingestion pipeline against a live UDP feed or a recorded session
//! log and periodically reports the latest values from the store.

#![deny(clippy::unwrap_used)]

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trackside_core::prelude::*;

/// How often the store is polled for the status report
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Channel carrying the GPS ground speed
const GPS_SPEED_CHANNEL: &str = "GSPSpeed";

const REPORT_CATEGORIES: [ChannelCategory; 9] = [
    ChannelCategory::Temperature,
    ChannelCategory::Speed,
    ChannelCategory::Suspension,
    ChannelCategory::Pedal,
    ChannelCategory::Direction,
    ChannelCategory::GpsLatitude,
    ChannelCategory::GpsLongitude,
    ChannelCategory::Flag,
    ChannelCategory::Accelerometer,
];

#[derive(Parser)]
#[command(name = "trackside")]
#[command(about = "Ingest, log and replay vehicle telemetry")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration; command line flags take precedence
    #[arg(short, long, global = true, env = "TRACKSIDE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for UDP telemetry and log the session
    Live {
        /// Address to bind
        #[arg(long)]
        bind: Option<IpAddr>,

        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for session logs
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Sync every log row to disk
        #[arg(long)]
        sync: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Replay a recorded session log
    Replay {
        /// Session log to replay
        file: PathBuf,

        /// Delay between records in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// List recorded session logs
    Sessions {
        /// Directory holding session logs
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Channel set to decode
    #[arg(long, value_enum)]
    catalog: Option<CatalogArg>,

    /// Keep only the last N samples per channel
    #[arg(long)]
    window: Option<usize>,
}

impl StoreArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(catalog) = self.catalog {
            config.catalog = catalog.into();
        }
        if let Some(window) = self.window {
            config.retention = Retention::Bounded(window);
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CatalogArg {
    Full,
    Reduced,
}

impl From<CatalogArg> for CatalogVariant {
    fn from(arg: CatalogArg) -> Self {
        match arg {
            CatalogArg::Full => CatalogVariant::Full,
            CatalogArg::Reduced => CatalogVariant::Reduced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env();

    match cli.command {
        Commands::Live {
            bind,
            port,
            data_dir,
            sync,
            store,
        } => {
            if !matches!(config.source, SourceConfig::Live { .. }) {
                config.source = SourceConfig::live();
            }
            if let SourceConfig::Live {
                bind_addr,
                port: config_port,
                ..
            } = &mut config.source
            {
                if let Some(bind) = bind {
                    *bind_addr = bind;
                }
                if let Some(port) = port {
                    *config_port = port;
                }
            }
            if let Some(dir) = data_dir {
                config.log_dir = dir;
            }
            config.sync_each_row |= sync;
            store.apply(&mut config);
            run(config).await
        }
        Commands::Replay {
            file,
            pacing_ms,
            store,
        } => {
            config.source = SourceConfig::Replay {
                path: file,
                pacing_ms,
            };
            store.apply(&mut config);
            run(config).await
        }
        Commands::Sessions { data_dir } => {
            let dir = data_dir.unwrap_or(config.log_dir);
            let sessions = list_sessions(&dir)
                .with_context(|| format!("failed to list sessions in {}", dir.display()))?;
            if sessions.is_empty() {
                info!(dir = %dir.display(), "no recorded sessions");
            }
            for session in sessions {
                println!("{}", session.display());
            }
            Ok(())
        }
    }
}

async fn run(config: PipelineConfig) -> Result<()> {
    let catalog = Catalog::new(config.catalog);

    let pipeline = Pipeline::from_config(&config)
        .await
        .context("failed to start pipeline")?;
    if let Some(path) = pipeline.log_path() {
        info!(path = %path.display(), "logging session");
    }
    let store = pipeline.store();

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                ctrl_c.cancel();
            }
            Err(e) => warn!(error = %e, "unable to listen for interrupt"),
        }
    });

    let reporter = tokio::spawn(report_loop(
        Arc::clone(&store),
        catalog.clone(),
        shutdown.clone(),
    ));

    let result = pipeline
        .spawn(shutdown.clone())
        .await
        .context("pipeline task failed")?;
    // Replay ends on its own; stop the reporter either way
    shutdown.cancel();
    reporter.await.context("report task failed")?;

    let summary = result?;
    report(&store.snapshot(), &catalog);
    info!(
        records = summary.records,
        logged = summary.logged,
        rejected = summary.rejected_payloads,
        dropped_fields = summary.dropped_fields,
        interrupted = summary.cancelled,
        "session finished"
    );
    Ok(())
}

async fn report_loop(store: Arc<TelemetryStore>, catalog: Catalog, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick fires immediately, before anything arrived
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => report(&store.snapshot(), &catalog),
        }
    }
}

/// Log the latest value of every channel, grouped by category
fn report(snapshot: &Snapshot, catalog: &Catalog) {
    if snapshot.is_empty() {
        info!(records = snapshot.records, "waiting for telemetry");
        return;
    }

    for category in REPORT_CATEGORIES {
        let values: Vec<String> = catalog
            .by_category(category)
            .filter_map(|c| snapshot.latest(c.name).map(|v| format!("{}={:.2}", c.name, v)))
            .collect();
        if !values.is_empty() {
            info!(category = category.label(), values = %values.join(" "));
        }
    }

    if let Some(flag) = snapshot.flag_events.last() {
        info!(index = flag.index, value = flag.value, "last flag change");
    }
    if let Some(max) = snapshot.max_value(GPS_SPEED_CHANNEL) {
        info!(max_gps_speed = max, "highest GPS speed");
    }
}
