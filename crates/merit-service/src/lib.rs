//! # merit-service — Persistence, configuration, and the service facade.
//!
//! Everything a deployment needs around the engine:
//! - [`storage::RocksStore`] — durable score records, the activity event
//!   log, and leaderboard snapshots over RocksDB column families.
//! - [`config::ConfigHandle`] — layered settings (defaults, TOML file,
//!   environment) with validation and hot reload.
//! - [`service::MeritService`] — the composition root exposing the
//!   operator surface with configured tunables filled in.
//! - [`scheduler::JobScheduler`] — periodic decay sweeps, snapshot
//!   rebuilds, and config reloads, single-flight per job.
//! - [`demo`] — the opt-in deterministic demo population.

pub mod config;
pub mod demo;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use config::{ConfigHandle, EngineSettings, SettingsError};
pub use scheduler::JobScheduler;
pub use service::MeritService;
pub use storage::RocksStore;
