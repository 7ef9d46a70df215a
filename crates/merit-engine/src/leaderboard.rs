//! Period-scoped leaderboard snapshots.
//!
//! A snapshot is a wholesale, idempotent rebuild: scan every live score
//! record in bounded batches, rank deterministically, and replace whatever
//! the `(kind, period)` key held before. Entries denormalize the username
//! and score at build time, so later mutations of the user record never
//! reach back into an already-built board.

use std::sync::Arc;

use tracing::info;

use merit_core::error::{LeaderboardError, ParamError};
use merit_core::store::{LeaderboardStore, ProfileDirectory, ScoreStore};
use merit_core::types::{LeaderboardEntry, SnapshotKey, UserId};

/// Builds and serves ranked snapshots.
pub struct LeaderboardAggregator {
    scores: Arc<dyn ScoreStore>,
    boards: Arc<dyn LeaderboardStore>,
    profiles: Arc<dyn ProfileDirectory>,
}

impl LeaderboardAggregator {
    pub fn new(
        scores: Arc<dyn ScoreStore>,
        boards: Arc<dyn LeaderboardStore>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        Self {
            scores,
            boards,
            profiles,
        }
    }

    /// Rebuild the snapshot under `key`, replacing any previous build for
    /// the same key. Returns the number of entries written.
    ///
    /// Records are scanned in pages of `batch_size` to bound memory and
    /// store lock time. Soft-deleted users are skipped; suspended users
    /// still rank. Ordering is score descending with `user_id` ascending as
    /// the tie-break, and positions are dense: `1..=N`, no gaps, no
    /// duplicates. Users the profile directory does not know get a
    /// placeholder `user-{id}` name.
    ///
    /// # Errors
    ///
    /// - [`ParamError::BatchSize`] when `batch_size` is 0
    /// - [`ParamError::Window`] when the key's period is empty or inverted
    /// - [`LeaderboardError::Unavailable`] when a store read or write fails
    pub fn build_snapshot(
        &self,
        key: &SnapshotKey,
        batch_size: usize,
    ) -> Result<usize, LeaderboardError> {
        if batch_size == 0 {
            return Err(ParamError::BatchSize.into());
        }
        if key.period_start_ms >= key.period_end_ms {
            return Err(ParamError::Window {
                start_ms: key.period_start_ms,
                end_ms: key.period_end_ms,
            }
            .into());
        }

        let mut ranked: Vec<LeaderboardEntry> = Vec::new();
        let mut start_after: Option<UserId> = None;
        loop {
            let page = self.scores.scan_records(start_after, batch_size)?;
            let page_len = page.len();
            for record in page {
                start_after = Some(record.user_id);
                if record.deleted {
                    continue;
                }
                let username = self
                    .profiles
                    .username(record.user_id)?
                    .unwrap_or_else(|| format!("user-{}", record.user_id));
                ranked.push(LeaderboardEntry {
                    user_id: record.user_id,
                    username,
                    score: record.current_score,
                    rank_tier: record.rank_tier,
                    rank_position: 0,
                });
            }
            if page_len < batch_size {
                break;
            }
        }

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.user_id.cmp(&b.user_id)));
        for (index, entry) in ranked.iter_mut().enumerate() {
            entry.rank_position = index as u32 + 1;
        }

        let count = ranked.len();
        self.boards.replace_snapshot(key, ranked)?;
        info!(board = %key, entries = count, "leaderboard snapshot built");
        Ok(count)
    }

    /// The top `n` entries under `key`, best first. Fewer than `n` come
    /// back when the board is smaller; a board never built reads as empty.
    pub fn top(&self, key: &SnapshotKey, n: usize) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        Ok(self.boards.top_entries(key, n)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    use merit_core::error::StoreError;
    use merit_core::store::{MemoryProfiles, MemoryScoreStore, NullProfiles};
    use merit_core::tier::{RankTier, TierTable};
    use merit_core::types::{BoardKind, EventDraft, UserScoreRecord};

    // --- helpers ---

    fn seed_user(store: &MemoryScoreStore, user_id: UserId, score: u64) {
        let tiers = TierTable::default();
        let mut rec = UserScoreRecord::new(user_id, &tiers, 0);
        rec.current_score = score;
        rec.rank_tier = tiers.resolve(score);
        store.commit_record(&rec, None, None).unwrap();
    }

    fn aggregator(store: Arc<MemoryScoreStore>) -> LeaderboardAggregator {
        LeaderboardAggregator::new(store.clone(), store, Arc::new(NullProfiles))
    }

    fn daily_key() -> SnapshotKey {
        SnapshotKey {
            kind: BoardKind::Daily,
            period_start_ms: 0,
            period_end_ms: 86_400_000,
        }
    }

    struct DownScores;

    impl ScoreStore for DownScores {
        fn user_record(&self, _: UserId) -> Result<Option<UserScoreRecord>, StoreError> {
            Err(StoreError::Unavailable("scores down".into()))
        }

        fn commit_record(
            &self,
            _: &UserScoreRecord,
            _: Option<u64>,
            _: Option<&EventDraft>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("scores down".into()))
        }

        fn scan_records(
            &self,
            _: Option<UserId>,
            _: usize,
        ) -> Result<Vec<UserScoreRecord>, StoreError> {
            Err(StoreError::Unavailable("scores down".into()))
        }
    }

    // --- build_snapshot ---

    #[test]
    fn ranks_score_desc_then_user_id_asc_dense() {
        let store = Arc::new(MemoryScoreStore::new());
        seed_user(&store, 3, 900);
        seed_user(&store, 1, 900);
        seed_user(&store, 2, 1_550);
        seed_user(&store, 4, 2_200);
        let agg = aggregator(store);

        let count = agg.build_snapshot(&daily_key(), 100).unwrap();
        assert_eq!(count, 4);

        let top = agg.top(&daily_key(), 10).unwrap();
        let ranking: Vec<(u32, UserId, u64)> = top
            .iter()
            .map(|e| (e.rank_position, e.user_id, e.score))
            .collect();
        assert_eq!(
            ranking,
            vec![(1, 4, 2_200), (2, 2, 1_550), (3, 1, 900), (4, 3, 900)]
        );
        assert_eq!(top[0].rank_tier, RankTier::Diamond);
        assert_eq!(top[1].rank_tier, RankTier::Gold);
    }

    #[test]
    fn deleted_users_never_rank() {
        let store = Arc::new(MemoryScoreStore::new());
        seed_user(&store, 1, 900);
        let tiers = TierTable::default();
        let mut ghost = UserScoreRecord::new(2, &tiers, 0);
        ghost.current_score = 5_000;
        ghost.deleted = true;
        store.commit_record(&ghost, None, None).unwrap();
        let agg = aggregator(store);

        agg.build_snapshot(&daily_key(), 100).unwrap();
        let top = agg.top(&daily_key(), 10).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].user_id, 1);
    }

    #[test]
    fn suspended_users_still_rank() {
        let store = Arc::new(MemoryScoreStore::new());
        let tiers = TierTable::default();
        let mut rec = UserScoreRecord::new(1, &tiers, 0);
        rec.account_suspended = true;
        store.commit_record(&rec, None, None).unwrap();
        let agg = aggregator(store);

        agg.build_snapshot(&daily_key(), 100).unwrap();
        assert_eq!(agg.top(&daily_key(), 10).unwrap().len(), 1);
    }

    #[test]
    fn usernames_denormalized_with_placeholder_fallback() {
        let store = Arc::new(MemoryScoreStore::new());
        seed_user(&store, 1, 900);
        seed_user(&store, 2, 800);
        let profiles = Arc::new(MemoryProfiles::new());
        profiles.insert(1, "ada");
        let agg = LeaderboardAggregator::new(store.clone(), store, profiles);

        agg.build_snapshot(&daily_key(), 100).unwrap();
        let top = agg.top(&daily_key(), 10).unwrap();
        assert_eq!(top[0].username, "ada");
        assert_eq!(top[1].username, "user-2");
    }

    #[test]
    fn rebuild_replaces_instead_of_appending() {
        let store = Arc::new(MemoryScoreStore::new());
        seed_user(&store, 1, 900);
        seed_user(&store, 2, 800);
        let agg = aggregator(store.clone());

        agg.build_snapshot(&daily_key(), 100).unwrap();
        agg.build_snapshot(&daily_key(), 100).unwrap();

        let top = agg.top(&daily_key(), 50).unwrap();
        assert_eq!(top.len(), 2, "rebuild must not duplicate entries");

        // Scores move, rebuild reflects them, still exactly one row per user.
        let mut rec = store.user_record(2).unwrap().unwrap();
        rec.current_score = 1_000;
        rec.version = 2;
        store.commit_record(&rec, Some(1), None).unwrap();
        agg.build_snapshot(&daily_key(), 100).unwrap();

        let top = agg.top(&daily_key(), 50).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 2);
    }

    #[test]
    fn snapshot_survives_later_record_mutations() {
        let store = Arc::new(MemoryScoreStore::new());
        seed_user(&store, 1, 900);
        let agg = aggregator(store.clone());
        agg.build_snapshot(&daily_key(), 100).unwrap();

        let mut rec = store.user_record(1).unwrap().unwrap();
        rec.current_score = 5;
        rec.version = 2;
        store.commit_record(&rec, Some(1), None).unwrap();

        let top = agg.top(&daily_key(), 10).unwrap();
        assert_eq!(top[0].score, 900, "entries are denormalized copies");
    }

    #[test]
    fn paging_covers_every_record() {
        let store = Arc::new(MemoryScoreStore::new());
        for user_id in 1..=7 {
            seed_user(&store, user_id, 100 * user_id);
        }
        let agg = aggregator(store);

        // Batch smaller than the population exercises the paging loop.
        let count = agg.build_snapshot(&daily_key(), 3).unwrap();
        assert_eq!(count, 7);

        let top = agg.top(&daily_key(), 10).unwrap();
        let positions: Vec<u32> = top.iter().map(|e| e.rank_position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(top[0].user_id, 7);
    }

    #[test]
    fn empty_population_builds_an_empty_board() {
        let store = Arc::new(MemoryScoreStore::new());
        let agg = aggregator(store);
        assert_eq!(agg.build_snapshot(&daily_key(), 100).unwrap(), 0);
        assert!(agg.top(&daily_key(), 10).unwrap().is_empty());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let store = Arc::new(MemoryScoreStore::new());
        let agg = aggregator(store);
        let err = agg.build_snapshot(&daily_key(), 0).unwrap_err();
        assert!(matches!(err, LeaderboardError::Param(ParamError::BatchSize)));
    }

    #[test]
    fn inverted_period_rejected() {
        let store = Arc::new(MemoryScoreStore::new());
        let agg = aggregator(store);
        let key = SnapshotKey {
            kind: BoardKind::Daily,
            period_start_ms: 100,
            period_end_ms: 100,
        };
        let err = agg.build_snapshot(&key, 10).unwrap_err();
        assert!(matches!(
            err,
            LeaderboardError::Param(ParamError::Window { .. })
        ));
    }

    #[test]
    fn score_store_outage_is_unavailable() {
        let store = Arc::new(MemoryScoreStore::new());
        let agg = LeaderboardAggregator::new(
            Arc::new(DownScores),
            store,
            Arc::new(NullProfiles),
        );
        let err = agg.build_snapshot(&daily_key(), 10).unwrap_err();
        assert!(matches!(err, LeaderboardError::Unavailable(_)));
    }

    // --- top ---

    #[test]
    fn top_truncates_and_tolerates_missing_boards() {
        let store = Arc::new(MemoryScoreStore::new());
        for user_id in 1..=5 {
            seed_user(&store, user_id, 100 * user_id);
        }
        let agg = aggregator(store);
        agg.build_snapshot(&daily_key(), 100).unwrap();

        assert_eq!(agg.top(&daily_key(), 3).unwrap().len(), 3);
        assert_eq!(agg.top(&daily_key(), 50).unwrap().len(), 5);

        let unbuilt = SnapshotKey {
            kind: BoardKind::Monthly,
            period_start_ms: 0,
            period_end_ms: 1,
        };
        assert!(agg.top(&unbuilt, 10).unwrap().is_empty());
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn positions_are_a_dense_permutation(
            scores in proptest::collection::btree_map(1u64..200, 0u64..3_000, 0..40),
            batch in 1usize..10,
        ) {
            let store = Arc::new(MemoryScoreStore::new());
            for (user_id, score) in &scores {
                seed_user(&store, *user_id, *score);
            }
            let agg = aggregator(store);
            let count = agg.build_snapshot(&daily_key(), batch).unwrap();
            prop_assert_eq!(count, scores.len());

            let top = agg.top(&daily_key(), usize::MAX).unwrap();
            let positions: HashSet<u32> = top.iter().map(|e| e.rank_position).collect();
            prop_assert_eq!(positions.len(), top.len());
            if let Some(max) = top.iter().map(|e| e.rank_position).max() {
                prop_assert_eq!(max as usize, top.len());
            }
            for pair in top.windows(2) {
                prop_assert!(
                    pair[0].score > pair[1].score
                        || (pair[0].score == pair[1].score && pair[0].user_id < pair[1].user_id)
                );
            }
        }
    }
}
