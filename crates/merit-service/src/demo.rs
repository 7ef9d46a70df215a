//! Deterministic demo population.
//!
//! Seeds synthetic users and pushes their history through the real scoring
//! path; nothing here writes around the engine. Off unless a deployment
//! sets `[demo] enabled = true`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use merit_core::error::MeritError;
use merit_core::store::MemoryProfiles;
use merit_core::types::{ActivitySubmission, ActivityType, TargetType, TimestampMs};

use crate::config::DemoSettings;
use crate::service::MeritService;

const DAY_MS: i64 = 24 * 3_600_000;

const FIRST_WORDS: &[&str] = &[
    "amber", "brisk", "cedar", "dusk", "ember", "frost", "glade", "harbor",
];
const SECOND_WORDS: &[&str] = &[
    "fox", "heron", "lynx", "otter", "pike", "raven", "sable", "wren",
];

/// What one seeding run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub users: u32,
    pub activities: usize,
    pub reports: usize,
}

/// Seed `settings.users` synthetic users with activity from the 24 hours
/// before `now_ms`, all through [`MeritService::record_activity`] and
/// [`MeritService::report_user`], and register a username for each.
///
/// The same seed always produces the same population, down to timestamps.
pub fn seed(
    service: &MeritService,
    profiles: &MemoryProfiles,
    settings: &DemoSettings,
    now_ms: TimestampMs,
) -> Result<DemoSummary, MeritError> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut summary = DemoSummary {
        users: settings.users,
        activities: 0,
        reports: 0,
    };

    for user_id in 1..=u64::from(settings.users) {
        let first = FIRST_WORDS[rng.gen_range(0..FIRST_WORDS.len())];
        let second = SECOND_WORDS[rng.gen_range(0..SECOND_WORDS.len())];
        profiles.insert(user_id, format!("{first}-{second}-{user_id}"));

        for _ in 0..rng.gen_range(2..=8) {
            let (activity_type, target_type) = match rng.gen_range(0..3) {
                0 => (ActivityType::Like, TargetType::Content),
                1 => (ActivityType::Comment, TargetType::Content),
                _ => (ActivityType::ContentCreate, TargetType::Content),
            };
            let sub = ActivitySubmission {
                user_id,
                target_id: rng.gen_range(1..=1_000),
                target_type,
                activity_type,
                at_ms: now_ms - rng.gen_range(0..DAY_MS),
            };
            service.record_activity(&sub)?;
            summary.activities += 1;
        }

        // A slice of the population picks up a report burst, some of them
        // deep enough to trip the suspension threshold.
        if rng.gen_ratio(1, 8) {
            for _ in 0..rng.gen_range(1..=6) {
                service.report_user(user_id, now_ms - rng.gen_range(0..DAY_MS))?;
                summary.reports += 1;
            }
        }
    }

    info!(
        users = summary.users,
        activities = summary.activities,
        reports = summary.reports,
        "demo population seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ConfigHandle, EngineSettings};
    use crate::service::MeritService;
    use merit_core::store::{MemoryScoreStore, ProfileDirectory};

    fn demo_harness() -> (MeritService, Arc<MemoryScoreStore>, Arc<MemoryProfiles>) {
        let store = Arc::new(MemoryScoreStore::new());
        let profiles = Arc::new(MemoryProfiles::new());
        let config = Arc::new(ConfigHandle::fixed(EngineSettings::default()).unwrap());
        let service = MeritService::with_store(Arc::clone(&store), profiles.clone(), config);
        (service, store, profiles)
    }

    #[test]
    fn same_seed_same_population() {
        let settings = DemoSettings {
            enabled: true,
            seed: 7,
            users: 12,
        };

        let (service_a, _store_a, profiles_a) = demo_harness();
        let (service_b, _store_b, profiles_b) = demo_harness();
        let a = seed(&service_a, &profiles_a, &settings, 1_000_000_000).unwrap();
        let b = seed(&service_b, &profiles_b, &settings, 1_000_000_000).unwrap();

        assert_eq!(a, b);
        for user_id in 1..=12 {
            assert_eq!(
                service_a.user_score(user_id).unwrap(),
                service_b.user_score(user_id).unwrap()
            );
            assert_eq!(
                profiles_a.username(user_id).unwrap(),
                profiles_b.username(user_id).unwrap()
            );
        }
    }

    #[test]
    fn population_flows_through_the_real_scoring_path() {
        let settings = DemoSettings {
            enabled: true,
            seed: 42,
            users: 10,
        };
        let (service, store, profiles) = demo_harness();
        let summary = seed(&service, &profiles, &settings, 1_000_000_000).unwrap();

        assert!(summary.activities >= 20);
        // Every activity and report went through the engine, so the audit
        // log holds exactly one event per change.
        assert_eq!(store.event_count(), summary.activities + summary.reports);
        assert_eq!(store.record_count(), 10);
    }

    #[test]
    fn usernames_registered_for_every_user() {
        let settings = DemoSettings {
            enabled: true,
            seed: 3,
            users: 8,
        };
        let (service, _store, profiles) = demo_harness();
        seed(&service, &profiles, &settings, 1_000_000_000).unwrap();

        for user_id in 1..=8 {
            let name = profiles.username(user_id).unwrap().unwrap();
            assert!(name.ends_with(&format!("-{user_id}")), "name: {name}");
        }
    }
}
