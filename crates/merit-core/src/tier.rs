//! Rank tiers and the data-driven threshold table.
//!
//! Tier resolution is a pure, total function over an ordered list of
//! `(min_score, tier)` cutoffs supplied by configuration. The table is
//! validated at construction so that resolution is monotonic by shape, not
//! by convention.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    BRONZE_MIN_SCORE, DIAMOND_MIN_SCORE, GOLD_MIN_SCORE, PLATINUM_MIN_SCORE, SILVER_MIN_SCORE,
};
use crate::error::TierTableError;

/// Discrete rank label. Ordering follows declaration order:
/// `Bronze < Silver < Gold < Platinum < Diamond`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum RankTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl RankTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankTier::Bronze => "BRONZE",
            RankTier::Silver => "SILVER",
            RankTier::Gold => "GOLD",
            RankTier::Platinum => "PLATINUM",
            RankTier::Diamond => "DIAMOND",
        }
    }
}

impl fmt::Display for RankTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured cutoff: scores at or above `min_score` resolve to `tier`
/// unless a higher cutoff also matches.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierCutoff {
    pub min_score: u64,
    pub tier: RankTier,
}

impl TierCutoff {
    pub fn new(min_score: u64, tier: RankTier) -> Self {
        Self { min_score, tier }
    }
}

/// Validated, ordered tier cutoffs.
///
/// # Invariants
///
/// * Non-empty, and the first cutoff is at score 0 (the table is total).
/// * `min_score` values strictly ascending.
/// * Tiers strictly ascending, which makes [`TierTable::resolve`]
///   monotonic: `s1 <= s2` implies `resolve(s1) <= resolve(s2)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "Vec<TierCutoff>", into = "Vec<TierCutoff>")]
pub struct TierTable {
    cutoffs: Vec<TierCutoff>,
}

impl TierTable {
    /// Build a table from configured cutoffs, validating the invariants.
    ///
    /// # Errors
    ///
    /// [`TierTableError`] when the list is empty, does not start at 0, or is
    /// not strictly ascending in both score and tier.
    pub fn new(cutoffs: Vec<TierCutoff>) -> Result<Self, TierTableError> {
        let first = cutoffs.first().ok_or(TierTableError::EmptyTable)?;
        if first.min_score != 0 {
            return Err(TierTableError::MissingFloor(first.min_score));
        }
        for (index, pair) in cutoffs.windows(2).enumerate() {
            if pair[1].min_score <= pair[0].min_score {
                return Err(TierTableError::UnorderedCutoffs { index: index + 1 });
            }
            if pair[1].tier <= pair[0].tier {
                return Err(TierTableError::UnorderedTiers { index: index + 1 });
            }
        }
        Ok(Self { cutoffs })
    }

    /// Resolve a score to its tier: the highest cutoff whose `min_score` is
    /// at or below `score`.
    ///
    /// # Examples
    ///
    /// ```
    /// use merit_core::tier::{RankTier, TierTable};
    ///
    /// let tiers = TierTable::default();
    /// assert_eq!(tiers.resolve(810), RankTier::Bronze);
    /// assert_eq!(tiers.resolve(1201), RankTier::Silver);
    /// assert_eq!(tiers.resolve(2101), RankTier::Diamond);
    /// ```
    pub fn resolve(&self, score: u64) -> RankTier {
        let mut tier = RankTier::Bronze;
        for cutoff in &self.cutoffs {
            if score >= cutoff.min_score {
                tier = cutoff.tier;
            } else {
                break;
            }
        }
        tier
    }

    /// The validated cutoffs, ascending.
    pub fn cutoffs(&self) -> &[TierCutoff] {
        &self.cutoffs
    }
}

impl Default for TierTable {
    /// The stock five-tier table from [`crate::constants`].
    fn default() -> Self {
        Self {
            cutoffs: vec![
                TierCutoff::new(BRONZE_MIN_SCORE, RankTier::Bronze),
                TierCutoff::new(SILVER_MIN_SCORE, RankTier::Silver),
                TierCutoff::new(GOLD_MIN_SCORE, RankTier::Gold),
                TierCutoff::new(PLATINUM_MIN_SCORE, RankTier::Platinum),
                TierCutoff::new(DIAMOND_MIN_SCORE, RankTier::Diamond),
            ],
        }
    }
}

impl TryFrom<Vec<TierCutoff>> for TierTable {
    type Error = TierTableError;

    fn try_from(cutoffs: Vec<TierCutoff>) -> Result<Self, Self::Error> {
        Self::new(cutoffs)
    }
}

impl From<TierTable> for Vec<TierCutoff> {
    fn from(table: TierTable) -> Self {
        table.cutoffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // --- resolve ---

    #[test]
    fn resolve_default_boundaries() {
        let t = TierTable::default();
        let cases: &[(u64, RankTier)] = &[
            (0, RankTier::Bronze),
            (810, RankTier::Bronze),
            (1200, RankTier::Bronze),
            (1201, RankTier::Silver),
            (1500, RankTier::Silver),
            (1501, RankTier::Gold),
            (1800, RankTier::Gold),
            (1801, RankTier::Platinum),
            (2100, RankTier::Platinum),
            (2101, RankTier::Diamond),
            (u64::MAX, RankTier::Diamond),
        ];
        for &(score, expected) in cases {
            assert_eq!(t.resolve(score), expected, "score={score}");
        }
    }

    #[test]
    fn resolve_respects_custom_table() {
        let t = TierTable::new(vec![
            TierCutoff::new(0, RankTier::Bronze),
            TierCutoff::new(10, RankTier::Gold),
        ])
        .unwrap();
        assert_eq!(t.resolve(9), RankTier::Bronze);
        assert_eq!(t.resolve(10), RankTier::Gold);
    }

    // --- validation ---

    #[test]
    fn empty_table_rejected() {
        assert_eq!(TierTable::new(vec![]), Err(TierTableError::EmptyTable));
    }

    #[test]
    fn missing_floor_rejected() {
        let err = TierTable::new(vec![TierCutoff::new(100, RankTier::Bronze)]);
        assert_eq!(err, Err(TierTableError::MissingFloor(100)));
    }

    #[test]
    fn unordered_scores_rejected() {
        let err = TierTable::new(vec![
            TierCutoff::new(0, RankTier::Bronze),
            TierCutoff::new(500, RankTier::Silver),
            TierCutoff::new(500, RankTier::Gold),
        ]);
        assert_eq!(err, Err(TierTableError::UnorderedCutoffs { index: 2 }));
    }

    #[test]
    fn unordered_tiers_rejected() {
        let err = TierTable::new(vec![
            TierCutoff::new(0, RankTier::Silver),
            TierCutoff::new(500, RankTier::Bronze),
        ]);
        assert_eq!(err, Err(TierTableError::UnorderedTiers { index: 1 }));
    }

    #[test]
    fn duplicate_tier_rejected() {
        let err = TierTable::new(vec![
            TierCutoff::new(0, RankTier::Bronze),
            TierCutoff::new(500, RankTier::Bronze),
        ]);
        assert_eq!(err, Err(TierTableError::UnorderedTiers { index: 1 }));
    }

    // --- ordering ---

    #[test]
    fn tier_ordering_follows_ladder() {
        assert!(RankTier::Bronze < RankTier::Silver);
        assert!(RankTier::Silver < RankTier::Gold);
        assert!(RankTier::Gold < RankTier::Platinum);
        assert!(RankTier::Platinum < RankTier::Diamond);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn resolve_is_monotonic(a in 0u64..=5_000, b in 0u64..=5_000) {
            let t = TierTable::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                t.resolve(lo) <= t.resolve(hi),
                "tier({lo}) > tier({hi})"
            );
        }
    }
}
