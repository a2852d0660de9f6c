//! Engine tuning. Every field has a default so a partial TOML file is enough.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::popularity::InteractionKind;
use crate::tiers::{Tier, VolumeTable};
use crate::time::{EpochMs, HOUR_MS, MINUTE_MS, SECOND_MS};

/// Root configuration of the engagement and popularity engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Actor generation.
    pub registry: RegistryConfig,
    /// Task delays and tick size.
    pub tasks: TaskQueueConfig,
    /// Boost selection.
    pub selection: SelectionConfig,
    /// Quality aggregation.
    pub quality: QualityConfig,
    /// Health sweeps.
    pub health: HealthConfig,
    /// Reference distribution.
    pub distributor: DistributorConfig,
    /// Popularity lifecycle.
    pub popularity: PopularityConfig,
    /// Post-publish stages.
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    /// Loads a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: EngineConfig =
            toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => Ok(Self::default()),
        }
    }
}

/// Actor generation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ceiling on vote-eligible actors (top-K).
    pub vote_eligible_limit: usize,
    /// Handle regeneration attempts before the timestamp fallback.
    pub handle_attempts: u32,
    /// Largest `count` accepted by one generate call.
    pub max_generate: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            vote_eligible_limit: 80,
            handle_attempts: 10,
            max_generate: 1_000,
        }
    }
}

/// Task scheduling and per-tick throughput.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskQueueConfig {
    /// Shortest random delay before a task is due.
    pub min_delay_minutes: u32,
    /// Longest random delay.
    pub max_delay_minutes: u32,
    /// Due tasks executed per tick.
    pub batch_size: usize,
}

impl TaskQueueConfig {
    /// Inclusive delay range in milliseconds.
    pub fn delay_range_ms(&self) -> (EpochMs, EpochMs) {
        let lo = self.min_delay_minutes.min(self.max_delay_minutes) as EpochMs * MINUTE_MS;
        let hi = self.min_delay_minutes.max(self.max_delay_minutes) as EpochMs * MINUTE_MS;
        (lo, hi)
    }
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            min_delay_minutes: 2,
            max_delay_minutes: 4,
            batch_size: 10,
        }
    }
}

/// Eligibility cooldown and volume tiers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum gap between two boosts from the same actor.
    pub cooldown_ms: EpochMs,
    /// Volume tiers by activity score.
    pub volume: VolumeTable,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2 * HOUR_MS,
            volume: VolumeTable::default(),
        }
    }
}

/// Multiplier bounds and curator review fan-out.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Absolute floor of any rescaled tier bound.
    pub tier_floor: u32,
    /// Absolute ceiling of any rescaled tier bound.
    pub tier_ceiling: u32,
    /// Curators asked per review request.
    pub reviewers_per_content: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            tier_floor: 34,
            tier_ceiling: 349,
            reviewers_per_content: 3,
        }
    }
}

/// Health sweep thresholds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Inactivity window after which an actor is unhealthy.
    pub inactivity_ms: EpochMs,
    /// Failed evaluations tolerated before demotion.
    pub max_reactivations: u32,
    /// How far back nudge targets are looked up.
    pub nudge_lookback_ms: EpochMs,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            inactivity_ms: 24 * HOUR_MS,
            max_reactivations: 5,
            nudge_lookback_ms: 7 * 24 * HOUR_MS,
        }
    }
}

/// Reference distribution and secondary-engagement bursts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistributorConfig {
    /// Vote-eligible actors considered per run.
    pub actors_per_run: usize,
    /// Window of "recently published" content.
    pub recent_window_ms: EpochMs,
    /// Cap on candidate artifacts loaded per run.
    pub artifact_candidates: usize,
    /// Fewest likes in one burst.
    pub burst_min_likes: u32,
    /// Most likes in one burst.
    pub burst_max_likes: u32,
    /// Smallest offset between burst likes.
    pub burst_min_offset_ms: EpochMs,
    /// Largest offset between burst likes.
    pub burst_max_offset_ms: EpochMs,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            actors_per_run: 80,
            recent_window_ms: 3 * 24 * HOUR_MS,
            artifact_candidates: 200,
            burst_min_likes: 5,
            burst_max_likes: 15,
            burst_min_offset_ms: 30 * SECOND_MS,
            burst_max_offset_ms: 5 * MINUTE_MS,
        }
    }
}

/// Life score bounds, decay and interaction bumps.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopularityConfig {
    /// Life score ceiling.
    pub max_life_score: u32,
    /// Score given on promotion.
    pub start_life_score: u32,
    /// Default points removed per decay pass.
    pub decay_step: u32,
    /// Items promoted per daily batch.
    pub daily_batch_size: usize,
    /// Bump for page views.
    pub view: InteractionRule,
    /// Bump for saves.
    pub save: InteractionRule,
    /// Bump for shares.
    pub share: InteractionRule,
    /// Bump for likes on secondary artifacts.
    pub secondary_like: InteractionRule,
}

impl PopularityConfig {
    /// Bonus and dedup window for an interaction kind.
    pub fn rule(&self, kind: InteractionKind) -> &InteractionRule {
        match kind {
            InteractionKind::View => &self.view,
            InteractionKind::Save => &self.save,
            InteractionKind::Share => &self.share,
            InteractionKind::SecondaryLike => &self.secondary_like,
        }
    }
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            max_life_score: 200,
            start_life_score: 100,
            decay_step: 5,
            daily_batch_size: 10,
            view: InteractionRule {
                bonus: 1,
                dedup_window_ms: 6 * HOUR_MS,
            },
            save: InteractionRule {
                bonus: 5,
                dedup_window_ms: 24 * HOUR_MS,
            },
            share: InteractionRule {
                bonus: 8,
                dedup_window_ms: 24 * HOUR_MS,
            },
            secondary_like: InteractionRule {
                bonus: 3,
                dedup_window_ms: 24 * HOUR_MS,
            },
        }
    }
}

/// Bonus and dedup window of one interaction kind.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InteractionRule {
    /// Life score points added.
    pub bonus: u32,
    /// Repeat interactions from one source inside this window count once.
    pub dedup_window_ms: EpochMs,
}

/// Post-publish pipeline delays.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Initial boost delay, lower bound.
    pub initial_delay_min_ms: EpochMs,
    /// Initial boost delay, upper bound.
    pub initial_delay_max_ms: EpochMs,
    /// Review stage delay after publish.
    pub review_delay_ms: EpochMs,
    /// Multiplier adjustment delay after publish.
    pub adjust_delay_ms: EpochMs,
    /// Multiplier at or above which content is auto-queued for popularity.
    pub auto_queue_threshold: f64,
    /// Due stages processed per run.
    pub stage_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_delay_min_ms: 5 * MINUTE_MS,
            initial_delay_max_ms: 20 * MINUTE_MS,
            review_delay_ms: 2 * HOUR_MS,
            adjust_delay_ms: 6 * HOUR_MS,
            auto_queue_threshold: 1.25,
            stage_batch_size: 20,
        }
    }
}

/// Default tier ranges, kept here so the table is visible in one place.
pub fn default_tiers() -> Vec<Tier> {
    vec![
        Tier { min: 34, max: 56 },
        Tier { min: 57, max: 102 },
        Tier { min: 103, max: 231 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [tasks]
            batch_size = 25

            [popularity]
            decay_step = 7
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tasks.batch_size, 25);
        assert_eq!(cfg.tasks.min_delay_minutes, 2);
        assert_eq!(cfg.popularity.decay_step, 7);
        assert_eq!(cfg.popularity.start_life_score, 100);
        assert_eq!(cfg.registry.vote_eligible_limit, 80);
        assert_eq!(cfg.registry.max_generate, 1_000);
    }

    #[test]
    fn delay_range_tolerates_swapped_bounds() {
        let cfg = TaskQueueConfig {
            min_delay_minutes: 4,
            max_delay_minutes: 2,
            batch_size: 10,
        };
        assert_eq!(cfg.delay_range_ms(), (2 * MINUTE_MS, 4 * MINUTE_MS));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = EngineConfig::load_from(Path::new("/definitely/not/here.toml"));
        assert!(err.is_err());
        assert_eq!(EngineConfig::load_or_default(None).unwrap(), EngineConfig::default());
    }
}
