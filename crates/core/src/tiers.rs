//! Genuine-activity scoring and engagement volume tiers.

use serde::{Deserialize, Serialize};

use crate::config::default_tiers;
use crate::model::ContentStats;

/// Inclusive range of actor counts contributing to one engagement batch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tier {
    /// Fewest actors.
    pub min: u32,
    /// Most actors.
    pub max: u32,
}

/// Ordered, cumulative tier table.
///
/// Tier 0 is always selected; tier `i` (i ≥ 1) is unlocked once the activity
/// score reaches `unlock_scores[i - 1]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VolumeTable {
    /// Tiers in unlock order.
    pub tiers: Vec<Tier>,
    /// Score thresholds unlocking tiers 1 and up.
    pub unlock_scores: Vec<u64>,
}

impl Default for VolumeTable {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            unlock_scores: vec![10, 50],
        }
    }
}

/// `views*0.1 + saves*2 + shares*3 + secondaryLikes*1.5`, floored.
pub fn real_activity_score(stats: &ContentStats) -> u64 {
    let raw = stats.views as f64 * 0.1
        + stats.saves as f64 * 2.0
        + stats.shares as f64 * 3.0
        + stats.secondary_likes as f64 * 1.5;
    raw.floor() as u64
}

/// Tiers selected for an activity score.
pub fn tiers_for(score: u64, table: &VolumeTable) -> Vec<Tier> {
    if table.tiers.is_empty() {
        return Vec::new();
    }
    let unlocked = table
        .unlock_scores
        .iter()
        .take_while(|threshold| score >= **threshold)
        .count();
    let n = (1 + unlocked).min(table.tiers.len());
    table.tiers[..n].to_vec()
}

/// Rescales every tier bound by `multiplier`, clamped to `[floor, ceiling]`.
///
/// A non-finite or negative multiplier is treated as neutral.
pub fn apply_multiplier(tiers: &[Tier], multiplier: f64, floor: u32, ceiling: u32) -> Vec<Tier> {
    let m = if multiplier.is_finite() && multiplier >= 0.0 {
        multiplier
    } else {
        1.0
    };
    let (floor, ceiling) = (floor.min(ceiling), floor.max(ceiling));
    let scale = |bound: u32| -> u32 {
        let scaled = (bound as f64 * m).round();
        (scaled.clamp(floor as f64, ceiling as f64)) as u32
    };
    tiers
        .iter()
        .map(|t| {
            let min = scale(t.min.min(t.max));
            let max = scale(t.max.max(t.min));
            Tier { min, max }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(views: u64, saves: u64, shares: u64, likes: u64) -> ContentStats {
        ContentStats {
            views,
            saves,
            shares,
            secondary_likes: likes,
        }
    }

    #[test]
    fn activity_score_is_weighted_and_floored() {
        assert_eq!(real_activity_score(&stats(0, 0, 0, 0)), 0);
        assert_eq!(real_activity_score(&stats(19, 0, 0, 0)), 1);
        assert_eq!(real_activity_score(&stats(10, 1, 1, 1)), 7);
        assert_eq!(real_activity_score(&stats(0, 0, 0, 3)), 4);
    }

    #[test]
    fn low_score_selects_first_tier_only() {
        let t = tiers_for(5, &VolumeTable::default());
        assert_eq!(t, vec![Tier { min: 34, max: 56 }]);
    }

    #[test]
    fn mid_score_selects_two_tiers() {
        let t = tiers_for(10, &VolumeTable::default());
        assert_eq!(t.len(), 2);
        let t = tiers_for(49, &VolumeTable::default());
        assert_eq!(t.len(), 2);
        assert_eq!(t[1], Tier { min: 57, max: 102 });
    }

    #[test]
    fn high_score_selects_all_tiers() {
        let t = tiers_for(60, &VolumeTable::default());
        assert_eq!(
            t,
            vec![
                Tier { min: 34, max: 56 },
                Tier { min: 57, max: 102 },
                Tier { min: 103, max: 231 },
            ]
        );
    }

    #[test]
    fn multiplier_respects_floor_and_ceiling() {
        let tiers = VolumeTable::default().tiers;
        for m in [0.0, 0.5, 0.75, 1.0, 1.25, 1.5, 10.0, f64::NAN, -3.0] {
            for t in apply_multiplier(&tiers, m, 34, 349) {
                assert!(34 <= t.min, "m={m} t={t:?}");
                assert!(t.min <= t.max, "m={m} t={t:?}");
                assert!(t.max <= 349, "m={m} t={t:?}");
            }
        }
    }

    #[test]
    fn multiplier_rounds_bounds() {
        let out = apply_multiplier(&[Tier { min: 57, max: 102 }], 1.25, 34, 349);
        assert_eq!(out, vec![Tier { min: 71, max: 128 }]);
        let out = apply_multiplier(&[Tier { min: 34, max: 56 }], 0.5, 34, 349);
        assert_eq!(out, vec![Tier { min: 34, max: 34 }]);
        let out = apply_multiplier(&[Tier { min: 103, max: 231 }], 1.5, 34, 349);
        assert_eq!(out, vec![Tier { min: 155, max: 347 }]);
    }
}
