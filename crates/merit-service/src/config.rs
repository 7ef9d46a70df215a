//! Runtime configuration: layered loading, validation, and live reload.
//!
//! Settings start from the compiled defaults in [`merit_core::constants`],
//! then an optional TOML file, then `MERIT__`-prefixed environment
//! variables (`MERIT__ALPHA`, `MERIT__SCHEDULER__TOP_N`, ...).
//! [`ConfigHandle`] keeps the current validated snapshot behind an `Arc`
//! swap; the scheduler re-reads sources between passes, so edits land
//! without a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;

use merit_core::constants::{
    DEFAULT_ALPHA, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_ANOMALY_WINDOW_HOURS, DEFAULT_BATCH_SIZE,
    DEFAULT_COMMENT_WEIGHT, DEFAULT_CONTENT_CREATE_WEIGHT, DEFAULT_DECAY_FACTOR,
    DEFAULT_INACTIVITY_WINDOW_HOURS, DEFAULT_LIKE_WEIGHT, DEFAULT_REPORT_PENALTY,
    DEFAULT_SUSPENSION_THRESHOLD,
};
use merit_core::error::ParamError;
use merit_core::tier::TierTable;
use merit_core::types::{ActivityType, BoardKind, TimestampMs};

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("{0} must be >= 1")]
    ZeroField(&'static str),
    #[error("scheduler.boards must name at least one leaderboard")]
    NoBoards,
}

/// Score weight per user activity kind.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ActivityWeights {
    pub like: i64,
    pub comment: i64,
    pub content_create: i64,
}

impl Default for ActivityWeights {
    fn default() -> Self {
        Self {
            like: DEFAULT_LIKE_WEIGHT,
            comment: DEFAULT_COMMENT_WEIGHT,
            content_create: DEFAULT_CONTENT_CREATE_WEIGHT,
        }
    }
}

impl ActivityWeights {
    /// The configured weight for an activity. Kinds outside the user
    /// activity path are rejected before any weight is consulted.
    pub fn weight_for(&self, activity: ActivityType) -> i64 {
        match activity {
            ActivityType::Like => self.like,
            ActivityType::Comment => self.comment,
            ActivityType::ContentCreate => self.content_create,
            _ => 0,
        }
    }
}

/// Background job cadences and snapshot shape.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between decay sweeps.
    pub decay_interval_secs: u64,
    /// Seconds between leaderboard snapshot passes.
    pub snapshot_interval_secs: u64,
    /// Seconds between configuration re-reads.
    pub reload_interval_secs: u64,
    /// Entries kept per leaderboard snapshot.
    pub top_n: usize,
    /// Boards rebuilt on each snapshot pass.
    pub boards: Vec<BoardKind>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            decay_interval_secs: 3_600,
            snapshot_interval_secs: 900,
            reload_interval_secs: 60,
            top_n: 100,
            boards: vec![
                BoardKind::Daily,
                BoardKind::Weekly,
                BoardKind::Monthly,
                BoardKind::AllTime,
            ],
        }
    }
}

/// Synthetic demo population. Off unless a deployment opts in.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DemoSettings {
    pub enabled: bool,
    pub seed: u64,
    pub users: u32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: 42,
            users: 25,
        }
    }
}

/// All runtime tunables for one deployment.
///
/// Every field has a compiled default, so an empty TOML file and an empty
/// environment yield a working configuration.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// EWMA smoothing factor in `[0, 1]`.
    pub alpha: f64,
    /// Per-pass decay factor in `[0, 1]`.
    pub decay_factor: f64,
    /// Reports at which an account suspends.
    pub suspension_threshold: u32,
    /// One-time score penalty on suspension.
    pub report_penalty: u64,
    /// Summed-score-change threshold for the anomaly scan.
    pub anomaly_threshold: i64,
    /// Width of the anomaly scan window, in hours.
    pub anomaly_window_hours: u64,
    /// Hours of silence before a user is eligible for decay. Zero makes
    /// every user eligible on every sweep.
    pub inactivity_window_hours: u64,
    /// Page size for background passes.
    pub batch_size: usize,
    pub weights: ActivityWeights,
    /// Rank tier cutoffs; validated during deserialization.
    pub tiers: TierTable,
    pub scheduler: SchedulerSettings,
    pub demo: DemoSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            decay_factor: DEFAULT_DECAY_FACTOR,
            suspension_threshold: DEFAULT_SUSPENSION_THRESHOLD,
            report_penalty: DEFAULT_REPORT_PENALTY,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            anomaly_window_hours: DEFAULT_ANOMALY_WINDOW_HOURS,
            inactivity_window_hours: DEFAULT_INACTIVITY_WINDOW_HOURS,
            batch_size: DEFAULT_BATCH_SIZE,
            weights: ActivityWeights::default(),
            tiers: TierTable::default(),
            scheduler: SchedulerSettings::default(),
            demo: DemoSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Check every tunable the deserializer cannot.
    ///
    /// # Errors
    ///
    /// [`SettingsError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ParamError::Alpha(self.alpha).into());
        }
        if !(0.0..=1.0).contains(&self.decay_factor) {
            return Err(ParamError::DecayFactor(self.decay_factor).into());
        }
        if self.suspension_threshold == 0 {
            return Err(ParamError::SuspensionThreshold(0).into());
        }
        if self.anomaly_threshold < 1 {
            return Err(ParamError::AnomalyThreshold(self.anomaly_threshold).into());
        }
        if self.batch_size == 0 {
            return Err(ParamError::BatchSize.into());
        }
        if self.anomaly_window_hours == 0 {
            return Err(SettingsError::ZeroField("anomaly_window_hours"));
        }
        if self.scheduler.decay_interval_secs == 0 {
            return Err(SettingsError::ZeroField("scheduler.decay_interval_secs"));
        }
        if self.scheduler.snapshot_interval_secs == 0 {
            return Err(SettingsError::ZeroField("scheduler.snapshot_interval_secs"));
        }
        if self.scheduler.reload_interval_secs == 0 {
            return Err(SettingsError::ZeroField("scheduler.reload_interval_secs"));
        }
        if self.scheduler.top_n == 0 {
            return Err(SettingsError::ZeroField("scheduler.top_n"));
        }
        if self.scheduler.boards.is_empty() {
            return Err(SettingsError::NoBoards);
        }
        Ok(())
    }

    /// The anomaly scan window ending at `now_ms`.
    pub fn anomaly_window(&self, now_ms: TimestampMs) -> (TimestampMs, TimestampMs) {
        (
            now_ms.saturating_sub(hours_to_ms(self.anomaly_window_hours)),
            now_ms,
        )
    }

    /// Users whose last activity predates this instant are decay-eligible.
    pub fn inactivity_cutoff(&self, now_ms: TimestampMs) -> TimestampMs {
        now_ms.saturating_sub(hours_to_ms(self.inactivity_window_hours))
    }
}

fn hours_to_ms(hours: u64) -> i64 {
    (hours.min(i64::MAX as u64) as i64).saturating_mul(3_600_000)
}

/// Load and validate settings from the layered sources: compiled defaults,
/// then `file` (when given; a named file must exist), then environment.
pub fn load_settings(file: Option<&Path>) -> Result<EngineSettings, SettingsError> {
    let mut builder = Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml));
    }
    let settings: EngineSettings = builder
        .add_source(
            Environment::with_prefix("MERIT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

/// Where a handle's settings come from on reload.
enum SettingsSource {
    /// Defaults, then the optional file, then environment overrides.
    Layered { file: Option<PathBuf> },
    /// Settings fixed at construction; reload is a no-op.
    Fixed,
}

/// Shared handle to the current settings snapshot.
///
/// Readers call [`snapshot`](ConfigHandle::snapshot) and keep the `Arc` for
/// the duration of one operation, so a concurrent reload never changes
/// tunables mid-pass.
pub struct ConfigHandle {
    source: SettingsSource,
    current: RwLock<Arc<EngineSettings>>,
}

impl ConfigHandle {
    /// Load from the layered sources and keep them for later reloads.
    pub fn load(file: Option<PathBuf>) -> Result<Self, SettingsError> {
        let settings = load_settings(file.as_deref())?;
        Ok(Self {
            source: SettingsSource::Layered { file },
            current: RwLock::new(Arc::new(settings)),
        })
    }

    /// Wrap fixed settings that never reload. Tests and embedders use this
    /// to pin tunables regardless of the process environment.
    pub fn fixed(settings: EngineSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            source: SettingsSource::Fixed,
            current: RwLock::new(Arc::new(settings)),
        })
    }

    /// The current settings. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<EngineSettings> {
        Arc::clone(&self.current.read())
    }

    /// Re-read the layered sources and swap the snapshot if anything
    /// changed. Returns whether it did.
    ///
    /// # Errors
    ///
    /// [`SettingsError`] when the sources fail to load or validate; the
    /// previous snapshot stays in place.
    pub fn reload(&self) -> Result<bool, SettingsError> {
        let file = match &self.source {
            SettingsSource::Layered { file } => file.as_deref(),
            SettingsSource::Fixed => return Ok(false),
        };
        let fresh = load_settings(file)?;
        let mut current = self.current.write();
        if **current == fresh {
            return Ok(false);
        }
        *current = Arc::new(fresh);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("merit.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    // ------------------------------------------------------------------
    // Defaults and validation
    // ------------------------------------------------------------------

    #[test]
    fn defaults_match_compiled_constants() {
        let settings = EngineSettings::default();
        assert_eq!(settings.alpha, DEFAULT_ALPHA);
        assert_eq!(settings.decay_factor, DEFAULT_DECAY_FACTOR);
        assert_eq!(settings.suspension_threshold, DEFAULT_SUSPENSION_THRESHOLD);
        assert_eq!(settings.report_penalty, DEFAULT_REPORT_PENALTY);
        assert_eq!(settings.anomaly_threshold, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(settings.weights.like, DEFAULT_LIKE_WEIGHT);
        assert!(!settings.demo.enabled);
        assert_eq!(settings.scheduler.boards.len(), 4);
        settings.validate().unwrap();
    }

    #[test]
    fn weight_for_covers_user_activities() {
        let weights = ActivityWeights::default();
        assert_eq!(weights.weight_for(ActivityType::Like), 50);
        assert_eq!(weights.weight_for(ActivityType::Comment), 80);
        assert_eq!(weights.weight_for(ActivityType::ContentCreate), 120);
        assert_eq!(weights.weight_for(ActivityType::Report), 0);
    }

    #[test]
    fn alpha_outside_unit_interval_rejected() {
        let settings = EngineSettings {
            alpha: 1.5,
            ..EngineSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, SettingsError::Param(ParamError::Alpha(_))));
    }

    #[test]
    fn zero_interval_rejected_by_name() {
        let mut settings = EngineSettings::default();
        settings.scheduler.decay_interval_secs = 0;
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "scheduler.decay_interval_secs must be >= 1"
        );
    }

    #[test]
    fn empty_board_list_rejected() {
        let mut settings = EngineSettings::default();
        settings.scheduler.boards.clear();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, SettingsError::NoBoards));
    }

    #[test]
    fn anomaly_window_ends_at_now() {
        let settings = EngineSettings::default();
        let (start_ms, end_ms) = settings.anomaly_window(100_000_000);
        assert_eq!(end_ms, 100_000_000);
        assert_eq!(start_ms, 100_000_000 - 24 * 3_600_000);
    }

    #[test]
    fn inactivity_cutoff_trails_now_by_the_window() {
        let settings = EngineSettings {
            inactivity_window_hours: 72,
            ..EngineSettings::default()
        };
        assert_eq!(
            settings.inactivity_cutoff(400_000_000),
            400_000_000 - 72 * 3_600_000
        );
    }

    // ------------------------------------------------------------------
    // Layered loading
    // ------------------------------------------------------------------

    #[test]
    fn empty_sources_yield_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
                alpha = 0.5
                suspension_threshold = 3

                [weights]
                comment = 99

                [scheduler]
                top_n = 10
                boards = ["daily", "alltime"]
            "#,
        );

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.alpha, 0.5);
        assert_eq!(settings.suspension_threshold, 3);
        assert_eq!(settings.weights.comment, 99);
        // Untouched fields keep their defaults.
        assert_eq!(settings.weights.like, DEFAULT_LIKE_WEIGHT);
        assert_eq!(settings.decay_factor, DEFAULT_DECAY_FACTOR);
        assert_eq!(settings.scheduler.top_n, 10);
        assert_eq!(
            settings.scheduler.boards,
            vec![BoardKind::Daily, BoardKind::AllTime]
        );
        assert_eq!(settings.scheduler.decay_interval_secs, 3_600);
    }

    #[test]
    fn invalid_file_values_rejected_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "decay_factor = 2.5\n");
        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Param(ParamError::DecayFactor(_))
        ));
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, SettingsError::Load(_)), "got: {err:?}");
    }

    // ------------------------------------------------------------------
    // Reload
    // ------------------------------------------------------------------

    #[test]
    fn reload_swaps_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "alpha = 0.4\n");
        let handle = ConfigHandle::load(Some(path.clone())).unwrap();
        assert_eq!(handle.snapshot().alpha, 0.4);

        std::fs::write(&path, "alpha = 0.6\n").unwrap();
        assert!(handle.reload().unwrap());
        assert_eq!(handle.snapshot().alpha, 0.6);
    }

    #[test]
    fn unchanged_reload_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "alpha = 0.4\n");
        let handle = ConfigHandle::load(Some(path)).unwrap();
        assert!(!handle.reload().unwrap());
    }

    #[test]
    fn failed_reload_keeps_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "alpha = 0.4\n");
        let handle = ConfigHandle::load(Some(path.clone())).unwrap();

        std::fs::write(&path, "alpha = 9.5\n").unwrap();
        assert!(handle.reload().is_err());
        assert_eq!(handle.snapshot().alpha, 0.4);
    }

    #[test]
    fn fixed_handle_never_reloads() {
        let settings = EngineSettings {
            alpha: 0.3,
            ..EngineSettings::default()
        };
        let handle = ConfigHandle::fixed(settings).unwrap();
        assert!(!handle.reload().unwrap());
        assert_eq!(handle.snapshot().alpha, 0.3);
    }

    #[test]
    fn fixed_handle_still_validates() {
        let settings = EngineSettings {
            alpha: -0.1,
            ..EngineSettings::default()
        };
        assert!(ConfigHandle::fixed(settings).is_err());
    }
}
