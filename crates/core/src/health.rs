//! Actor health state machine.

use serde::{Deserialize, Serialize};

use crate::config::HealthConfig;
use crate::model::{Actor, ActorStatus};
use crate::time::EpochMs;

/// Outcome of evaluating one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum HealthVerdict {
    /// Active and recently seen.
    Healthy,
    /// Unhealthy; nudge and record attempt number `attempt`.
    Reactivate {
        /// Counter value after this evaluation.
        attempt: u32,
    },
    /// Unhealthy and out of attempts; demote to inactive.
    Exhausted {
        /// Counter value after this evaluation.
        attempt: u32,
    },
    /// Not active; sweeps leave it alone.
    Skip,
}

/// Evaluates `actor` at `now`.
///
/// Actors never seen active are measured from their creation time.
pub fn evaluate(actor: &Actor, now: EpochMs, cfg: &HealthConfig) -> HealthVerdict {
    if actor.status != ActorStatus::Active {
        return HealthVerdict::Skip;
    }
    let seen = actor.last_activity_ms.unwrap_or(actor.created_ms);
    if now.saturating_sub(seen) <= cfg.inactivity_ms {
        return HealthVerdict::Healthy;
    }
    let attempt = actor.reactivation_attempts.saturating_add(1);
    if attempt >= cfg.max_reactivations {
        HealthVerdict::Exhausted { attempt }
    } else {
        HealthVerdict::Reactivate { attempt }
    }
}

/// Coarse label of the active share of the pool.
pub fn health_label(active_ratio: f64) -> &'static str {
    if active_ratio >= 0.8 {
        "healthy"
    } else if active_ratio >= 0.6 {
        "warning"
    } else if active_ratio >= 0.4 {
        "critical"
    } else {
        "offline"
    }
}

/// Share of `active` in `total`; an empty pool counts as fully offline.
pub fn active_ratio(active: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        active as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::HOUR_MS;

    fn stale(attempts: u32) -> Actor {
        let mut a = Actor::new("quiet_fox12", false, 0);
        a.last_activity_ms = Some(0);
        a.reactivation_attempts = attempts;
        a
    }

    #[test]
    fn recent_actor_is_healthy() {
        let cfg = HealthConfig::default();
        let mut a = stale(0);
        a.last_activity_ms = Some(10 * HOUR_MS);
        assert_eq!(evaluate(&a, 20 * HOUR_MS, &cfg), HealthVerdict::Healthy);
    }

    #[test]
    fn never_active_actor_uses_creation_time() {
        let cfg = HealthConfig::default();
        let a = Actor::new("new_owl", false, 100 * HOUR_MS);
        assert_eq!(evaluate(&a, 110 * HOUR_MS, &cfg), HealthVerdict::Healthy);
        assert_eq!(
            evaluate(&a, 125 * HOUR_MS, &cfg),
            HealthVerdict::Reactivate { attempt: 1 }
        );
    }

    #[test]
    fn fifth_failure_exhausts() {
        let cfg = HealthConfig::default();
        let now = 48 * HOUR_MS;
        for n in 0..4 {
            assert_eq!(
                evaluate(&stale(n), now, &cfg),
                HealthVerdict::Reactivate { attempt: n + 1 }
            );
        }
        assert_eq!(
            evaluate(&stale(4), now, &cfg),
            HealthVerdict::Exhausted { attempt: 5 }
        );
    }

    #[test]
    fn inactive_actor_is_skipped() {
        let mut a = stale(5);
        a.status = ActorStatus::Inactive;
        assert_eq!(
            evaluate(&a, 100 * HOUR_MS, &HealthConfig::default()),
            HealthVerdict::Skip
        );
    }

    #[test]
    fn labels() {
        assert_eq!(health_label(0.8), "healthy");
        assert_eq!(health_label(0.79), "warning");
        assert_eq!(health_label(0.4), "critical");
        assert_eq!(health_label(0.1), "offline");
        assert_eq!(health_label(active_ratio(0, 0)), "offline");
        assert_eq!(active_ratio(3, 4), 0.75);
    }
}
