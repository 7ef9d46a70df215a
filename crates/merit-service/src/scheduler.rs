//! Background jobs: periodic decay sweeps, leaderboard snapshot rebuilds,
//! and configuration reloads.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerSettings;
use crate::service::MeritService;

/// Drives the background passes on their configured cadences.
///
/// Each job type is single-flight: a tick that lands while the previous run
/// is still going is skipped, not queued. The passes are synchronous, so
/// they run on the blocking pool. This is the only place besides the binary
/// that reads the wall clock.
pub struct JobScheduler {
    service: Arc<MeritService>,
    decay_gate: Arc<Mutex<()>>,
    snapshot_gate: Arc<Mutex<()>>,
}

impl JobScheduler {
    pub fn new(service: Arc<MeritService>) -> Self {
        Self {
            service,
            decay_gate: Arc::new(Mutex::new(())),
            snapshot_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run the tick loop until the enclosing task is cancelled.
    ///
    /// The first tick of each interval fires one full period after startup.
    /// When a reload changes the settings, the intervals are rebuilt so new
    /// cadences take effect without a restart.
    pub async fn run(&self) {
        let settings = self.service.config().snapshot();
        info!(
            decay_interval_secs = settings.scheduler.decay_interval_secs,
            snapshot_interval_secs = settings.scheduler.snapshot_interval_secs,
            reload_interval_secs = settings.scheduler.reload_interval_secs,
            "job scheduler started"
        );
        let (mut decay_ticks, mut snapshot_ticks) = job_intervals(&settings.scheduler);
        let mut reload_ticks = tick_every(settings.scheduler.reload_interval_secs);

        loop {
            tokio::select! {
                _ = decay_ticks.tick() => {
                    self.spawn_decay();
                }
                _ = snapshot_ticks.tick() => {
                    self.spawn_snapshot();
                }
                _ = reload_ticks.tick() => {
                    if self.reload_config() {
                        let settings = self.service.config().snapshot();
                        (decay_ticks, snapshot_ticks) = job_intervals(&settings.scheduler);
                        reload_ticks = tick_every(settings.scheduler.reload_interval_secs);
                    }
                }
            }
        }
    }

    /// Start a decay sweep unless one is still running. Returns the task
    /// handle, or `None` when the tick was skipped.
    pub fn spawn_decay(&self) -> Option<JoinHandle<()>> {
        let Ok(guard) = Arc::clone(&self.decay_gate).try_lock_owned() else {
            warn!("decay sweep still running, tick skipped");
            return None;
        };
        let service = Arc::clone(&self.service);
        Some(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let now_ms = Utc::now().timestamp_millis();
            if let Err(e) = service.decay_sweep(now_ms) {
                error!(error = %e, "decay sweep aborted");
            }
        }))
    }

    /// Start a snapshot pass unless one is still running.
    pub fn spawn_snapshot(&self) -> Option<JoinHandle<()>> {
        let Ok(guard) = Arc::clone(&self.snapshot_gate).try_lock_owned() else {
            warn!("snapshot pass still running, tick skipped");
            return None;
        };
        let service = Arc::clone(&self.service);
        Some(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let now_ms = Utc::now().timestamp_millis();
            let pass = service.snapshot_pass(now_ms);
            debug!(
                built = pass.built.len(),
                failed = pass.failed,
                "snapshot pass finished"
            );
        }))
    }

    /// Reload configuration, reporting whether the settings changed.
    /// Failures keep the previous settings and the previous cadences.
    pub fn reload_config(&self) -> bool {
        match self.service.config().reload() {
            Ok(true) => {
                info!("configuration change applied");
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "configuration reload failed, keeping previous settings");
                false
            }
        }
    }
}

fn job_intervals(scheduler: &SchedulerSettings) -> (Interval, Interval) {
    (
        tick_every(scheduler.decay_interval_secs),
        tick_every(scheduler.snapshot_interval_secs),
    )
}

fn tick_every(secs: u64) -> Interval {
    let period = Duration::from_secs(secs.max(1));
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticks
}
