//! Eligibility selection and tiered engagement boosts.

use std::collections::HashSet;
use std::sync::Arc;

use pulse_core::api::BoostSummary;
use pulse_core::config::{QualityConfig, SelectionConfig};
use pulse_core::model::{ActionKind, Actor, Content, TargetKind};
use pulse_core::tiers::{apply_multiplier, real_activity_score, tiers_for};
use pulse_core::{ActorId, EpochMs, PulseError, Result, TargetId};
use pulse_store::Storage;
use tracing::{info, warn};

use crate::collaborators::StatsSource;
use crate::rng::SharedRng;
use crate::task_queue::TaskQueue;

pub struct EligibilitySelector {
    store: Arc<dyn Storage>,
    stats: Arc<dyn StatsSource>,
    tasks: Arc<TaskQueue>,
    rng: Arc<SharedRng>,
    cfg: SelectionConfig,
    bounds: QualityConfig,
}

impl EligibilitySelector {
    pub fn new(
        store: Arc<dyn Storage>,
        stats: Arc<dyn StatsSource>,
        tasks: Arc<TaskQueue>,
        rng: Arc<SharedRng>,
        cfg: SelectionConfig,
        bounds: QualityConfig,
    ) -> Self {
        Self {
            store,
            stats,
            tasks,
            rng,
            cfg,
            bounds,
        }
    }

    /// Up to `count` active actors idle for longer than the cooldown, in random
    /// order. Actors in `exclude` are never returned.
    pub fn eligible_actors(
        &self,
        count: usize,
        now: EpochMs,
        exclude: &HashSet<ActorId>,
    ) -> Result<Vec<Actor>> {
        let cutoff = now - self.cfg.cooldown_ms;
        let mut pool: Vec<Actor> = self
            .store
            .eligible_actors(cutoff)?
            .into_iter()
            .filter(|a| !exclude.contains(&a.id))
            .collect();
        self.rng.shuffle(&mut pool);
        pool.truncate(count);
        Ok(pool)
    }

    fn activity_score(&self, content: &Content) -> u64 {
        let stats = match self.stats.stats(&content.id) {
            Ok(s) => s,
            Err(e) => {
                warn!(content = %content.id, "stats unavailable, using stored counters: {e}");
                content.stats
            }
        };
        real_activity_score(&stats)
    }

    /// Schedules one engagement batch against `content`.
    ///
    /// Each selected tier draws its own actor count; an actor appears in at
    /// most one tier of the same boost.
    pub fn boost(&self, content: &Content, multiplier: f64, now: EpochMs) -> Result<BoostSummary> {
        if content.retracted {
            return Err(PulseError::Validation(format!(
                "content {} is retracted",
                content.id
            )));
        }
        let activity_score = self.activity_score(content);
        let base = tiers_for(activity_score, &self.cfg.volume);
        let tiers = apply_multiplier(
            &base,
            multiplier,
            self.bounds.tier_floor,
            self.bounds.tier_ceiling,
        );

        let mut picked: HashSet<ActorId> = HashSet::new();
        let mut summary = BoostSummary {
            activity_score,
            multiplier,
            tiers: tiers.clone(),
            ..Default::default()
        };

        let actions = TargetKind::Content.action_set();
        for tier in &tiers {
            let want = self.rng.between_u32(tier.min, tier.max) as usize;
            let actors = self.eligible_actors(want, now, &picked)?;
            summary.shortfall += want.saturating_sub(actors.len());

            for actor in actors {
                picked.insert(actor.id.clone());
                let Some(&action) = self.rng.choose(actions) else {
                    continue;
                };
                let (target_kind, target): (TargetKind, TargetId) = match action {
                    ActionKind::Follow => (TargetKind::User, (&content.owner_id).into()),
                    _ => (TargetKind::Content, (&content.id).into()),
                };
                match self.tasks.enqueue(
                    &actor.id,
                    action,
                    target_kind,
                    target,
                    action.priority(),
                    now,
                ) {
                    Ok(_) => summary.scheduled += 1,
                    Err(e) => warn!(actor = %actor.id, content = %content.id, "enqueue failed: {e}"),
                }
            }
        }

        info!(
            content = %content.id,
            activity_score,
            multiplier,
            scheduled = summary.scheduled,
            shortfall = summary.shortfall,
            "boost scheduled"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StoreCollaborators;
    use pulse_core::config::TaskQueueConfig;
    use pulse_core::model::TaskStatus;
    use pulse_core::{UserId, HOUR_MS};
    use pulse_store::InMemoryStorage;

    fn selector(store: Arc<dyn Storage>) -> EligibilitySelector {
        let collab = Arc::new(StoreCollaborators::new(store.clone()));
        let rng = Arc::new(SharedRng::seeded(5));
        let tasks = Arc::new(TaskQueue::new(
            store.clone(),
            collab.clone(),
            rng.clone(),
            TaskQueueConfig::default(),
        ));
        EligibilitySelector::new(
            store,
            collab,
            tasks,
            rng,
            SelectionConfig::default(),
            QualityConfig::default(),
        )
    }

    fn seed_actors(
        store: &Arc<dyn Storage>,
        prefix: &str,
        n: usize,
        last_activity: Option<EpochMs>,
    ) {
        for i in 0..n {
            let mut a = Actor::new(format!("{prefix}_{i}"), false, 0);
            a.last_activity_ms = last_activity;
            store.try_insert_actor(&a).unwrap();
        }
    }

    #[test]
    fn cooldown_and_status_gate_eligibility() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        seed_actors(&store, "fresh", 3, Some(9 * HOUR_MS));
        seed_actors(&store, "stale", 2, Some(0));
        let mut retired = Actor::new("retired_0", false, 0);
        retired.status = pulse_core::model::ActorStatus::Inactive;
        store.try_insert_actor(&retired).unwrap();
        let sel = selector(store);
        let got = sel
            .eligible_actors(10, 10 * HOUR_MS, &HashSet::new())
            .unwrap();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|a| a.handle.starts_with("stale")));
    }

    #[test]
    fn low_activity_boost_uses_first_tier() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        seed_actors(&store, "actor", 300, None);
        let content = Content::new(UserId::parse("owner").unwrap(), "Portfolio", 0);
        store.upsert_content(&content).unwrap();

        let sel = selector(store.clone());
        let s = sel.boost(&content, 1.0, HOUR_MS).unwrap();
        assert_eq!(s.tiers.len(), 1);
        assert!((34..=56).contains(&s.scheduled));
        assert_eq!(s.shortfall, 0);

        let tasks = store.list_tasks(Some(TaskStatus::Pending)).unwrap();
        assert_eq!(tasks.len(), s.scheduled);
        let mut actors: Vec<_> = tasks.iter().map(|t| t.actor_id.clone()).collect();
        actors.sort();
        actors.dedup();
        assert_eq!(actors.len(), tasks.len());
        for t in &tasks {
            match t.action {
                ActionKind::Vote => assert_eq!(t.target_kind, TargetKind::Content),
                ActionKind::Follow => assert_eq!(t.target_kind, TargetKind::User),
                other => panic!("unexpected action {other:?}"),
            }
            assert_eq!(t.priority, t.action.priority());
        }
    }

    #[test]
    fn small_pool_reports_shortfall() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        seed_actors(&store, "actor", 20, None);
        let mut content = Content::new(UserId::parse("owner").unwrap(), "Busy", 0);
        content.stats.saves = 40;
        store.upsert_content(&content).unwrap();

        let s = selector(store).boost(&content, 1.5, HOUR_MS).unwrap();
        assert_eq!(s.activity_score, 80);
        assert_eq!(s.tiers.len(), 3);
        assert!(s.tiers.iter().all(|t| t.min >= 34 && t.max <= 349));
        assert_eq!(s.scheduled, 20);
        assert!(s.shortfall > 0);
    }

    #[test]
    fn retracted_content_is_rejected() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let mut content = Content::new(UserId::parse("owner").unwrap(), "Gone", 0);
        content.retracted = true;
        assert!(matches!(
            selector(store).boost(&content, 1.0, 0),
            Err(PulseError::Validation(_))
        ));
    }
}
