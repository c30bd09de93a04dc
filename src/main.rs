//! Podium server binary.

use clap::Parser;
use podium::api::{self, AppState};
use podium::config::{EngineConfig, HttpConfig};
use podium::manager::LeaderboardManager;
use podium::metrics::Metrics;
use podium::telemetry::{init_tracing, TracingConfig};
use podium::wal::Durability;
use std::sync::Arc;
use std::time::Duration;

/// Single-node real-time leaderboard engine.
#[derive(Debug, Parser)]
#[command(name = "podium")]
#[command(about = "Real-time leaderboard engine with WAL + snapshot persistence")]
struct CliArgs {
    /// HTTP bind address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Data directory holding the WAL and snapshots.
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Seconds between background snapshots.
    #[arg(long, default_value = "3600")]
    snapshot_interval_secs: u64,

    /// Fsync every WAL append instead of only flushing to the OS.
    #[arg(long, default_value = "false")]
    sync_wal: bool,

    /// Window keys every game is configured with (repeatable).
    #[arg(long = "window", default_value = "24h")]
    windows: Vec<String>,

    /// Log level filter.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> podium::Result<()> {
    let args = CliArgs::parse();
    init_tracing(&TracingConfig {
        log_level: args.log_level.clone(),
        json_output: args.json_logs,
    });

    let engine = EngineConfig {
        snapshot_interval: Duration::from_secs(args.snapshot_interval_secs),
        durability: if args.sync_wal {
            Durability::Sync
        } else {
            Durability::Flush
        },
        windows: args.windows.clone(),
        ..EngineConfig::with_data_dir(&args.data_dir)
    };
    let http = HttpConfig {
        bind_addr: args.bind.clone(),
    };

    let metrics = Arc::new(Metrics::new());
    let manager = Arc::new(LeaderboardManager::new(engine, metrics)?);
    manager.recover()?;
    manager.start()?;

    api::serve(&http, AppState::new(Arc::clone(&manager))).await
}
