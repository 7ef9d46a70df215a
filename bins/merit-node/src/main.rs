//! Merit scoring service binary.
//!
//! Runs the reputation engine over RocksDB storage with the background job
//! scheduler: periodic inactivity decay, leaderboard snapshot rebuilds, and
//! configuration reloads.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use merit_core::store::MemoryProfiles;
use merit_core::types::BoardKind;
use merit_service::{demo, ConfigHandle, JobScheduler, MeritService};
use tracing::{error, info, warn};

/// Merit reputation scoring service.
#[derive(Parser, Debug)]
#[command(
    name = "merit-node",
    version,
    about = "Merit scoring service with RocksDB storage and background jobs"
)]
struct Args {
    /// Data directory for score storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file, layered under MERIT__ environment variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("merit")
        })
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    if let Err(e) = run(args).await {
        error!("fatal: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("Merit scoring service v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = args.data_dir();
    info!("data_dir: {:?}", data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let config = Arc::new(
        ConfigHandle::load(args.config.clone()).context("failed to load configuration")?,
    );
    let settings = config.snapshot();
    info!(
        alpha = settings.alpha,
        decay_factor = settings.decay_factor,
        suspension_threshold = settings.suspension_threshold,
        boards = settings.scheduler.boards.len(),
        "configuration loaded"
    );

    // Usernames come from the (external) user system; until one is wired
    // in, an in-memory directory backs the demo population.
    let profiles = Arc::new(MemoryProfiles::new());
    let service = Arc::new(
        MeritService::open(
            data_dir.join("scoredata"),
            profiles.clone(),
            Arc::clone(&config),
        )
        .context("failed to open score storage")?,
    );
    info!("score storage ready");

    if settings.demo.enabled {
        warn!(
            seed = settings.demo.seed,
            users = settings.demo.users,
            "demo mode enabled, seeding a synthetic population"
        );
        let now_ms = Utc::now().timestamp_millis();
        let summary = demo::seed(&service, &profiles, &settings.demo, now_ms)
            .context("failed to seed demo population")?;
        let pass = service.snapshot_pass(now_ms);
        info!(
            users = summary.users,
            activities = summary.activities,
            reports = summary.reports,
            boards = pass.built.len(),
            "demo population ready"
        );

        for entry in service.top(BoardKind::AllTime, 10, now_ms)? {
            info!(
                "  #{} {} score={} tier={}",
                entry.rank_position, entry.username, entry.score, entry.rank_tier
            );
        }
        let flagged = service.scan_recent(now_ms)?;
        info!(flagged = flagged.len(), "anomaly scan over the demo window");
    }

    let scheduler = JobScheduler::new(Arc::clone(&service));
    info!("Merit service running (Ctrl+C to stop)");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down...");
    };

    tokio::select! {
        _ = scheduler.run() => {
            info!("scheduler loop exited");
        }
        _ = shutdown_signal => {
            info!("shutdown signal received");
        }
    }

    info!("Merit service shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
