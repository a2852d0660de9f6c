//! Reference distribution: vote-eligible actors take a recent artifact as
//! reference, followed by a paced burst of likes on it.

use std::sync::Arc;

use pulse_core::api::ReferenceSummary;
use pulse_core::config::DistributorConfig;
use pulse_core::model::{
    ActionKind, Actor, ActorStatus, Artifact, Priority, ReferenceAssignment, TargetKind,
};
use pulse_core::{EpochMs, Result};
use pulse_store::{ActorFilter, Storage};
use tracing::{info, warn};

use crate::rng::SharedRng;
use crate::task_queue::TaskQueue;

pub struct ReferenceDistributor {
    store: Arc<dyn Storage>,
    tasks: Arc<TaskQueue>,
    rng: Arc<SharedRng>,
    cfg: DistributorConfig,
}

impl ReferenceDistributor {
    pub fn new(
        store: Arc<dyn Storage>,
        tasks: Arc<TaskQueue>,
        rng: Arc<SharedRng>,
        cfg: DistributorConfig,
    ) -> Self {
        Self {
            store,
            tasks,
            rng,
            cfg,
        }
    }

    fn active_actors(&self, can_vote: Option<bool>) -> Result<Vec<Actor>> {
        Ok(self.store.list_actors(&ActorFilter {
            status: Some(ActorStatus::Active),
            can_vote,
            limit: None,
        })?)
    }

    /// Schedules the like burst for one assignment. Returns likes scheduled.
    fn burst(&self, taker: &Actor, artifact: &Artifact, pool: &[Actor], now: EpochMs) -> usize {
        let mut likers: Vec<&Actor> = pool.iter().filter(|a| a.id != taker.id).collect();
        self.rng.shuffle(&mut likers);
        let want = self
            .rng
            .between_u32(self.cfg.burst_min_likes, self.cfg.burst_max_likes) as usize;
        likers.truncate(want);

        let mut scheduled = 0;
        for liker in likers {
            let offset = self
                .rng
                .between_i64(self.cfg.burst_min_offset_ms, self.cfg.burst_max_offset_ms);
            match self.tasks.enqueue_with_delay(
                &liker.id,
                ActionKind::Like,
                TargetKind::SecondaryArtifact,
                (&artifact.id).into(),
                Priority::Medium,
                now,
                offset,
            ) {
                Ok(_) => scheduled += 1,
                Err(e) => warn!(actor = %liker.id, artifact = %artifact.id, "like enqueue failed: {e}"),
            }
        }
        scheduled
    }

    pub fn run(&self, now: EpochMs) -> Result<ReferenceSummary> {
        let mut takers = self.active_actors(Some(true))?;
        self.rng.shuffle(&mut takers);
        takers.truncate(self.cfg.actors_per_run);

        let artifacts = self
            .store
            .recent_artifacts(now - self.cfg.recent_window_ms, self.cfg.artifact_candidates)?;
        let pool = self.active_actors(None)?;

        let mut summary = ReferenceSummary {
            actors: takers.len(),
            ..Default::default()
        };
        if artifacts.is_empty() {
            summary.skipped = takers.len();
            info!(actors = takers.len(), "no recent artifacts, distribution skipped");
            return Ok(summary);
        }

        for taker in &takers {
            let Some(artifact) = self.rng.choose(&artifacts) else {
                summary.skipped += 1;
                continue;
            };
            let assignment = ReferenceAssignment {
                actor_id: taker.id.clone(),
                content_id: artifact.content_id.clone(),
                artifact_id: artifact.id.clone(),
                assigned_ms: now,
            };
            if let Err(e) = self.store.insert_reference(&assignment) {
                warn!(actor = %taker.id, artifact = %artifact.id, "reference assignment failed: {e:?}");
                summary.skipped += 1;
                continue;
            }
            summary.assignments += 1;
            summary.likes_scheduled += self.burst(taker, artifact, &pool, now);
        }

        info!(
            actors = summary.actors,
            assignments = summary.assignments,
            likes = summary.likes_scheduled,
            "references distributed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StoreCollaborators;
    use pulse_core::config::TaskQueueConfig;
    use pulse_core::model::{Content, TaskStatus};
    use pulse_core::{ArtifactId, UserId, HOUR_MS, MINUTE_MS, SECOND_MS};
    use pulse_store::InMemoryStorage;

    fn distributor(store: Arc<dyn Storage>, actors_per_run: usize) -> ReferenceDistributor {
        let rng = Arc::new(SharedRng::seeded(13));
        let tasks = Arc::new(TaskQueue::new(
            store.clone(),
            Arc::new(StoreCollaborators::new(store.clone())),
            rng.clone(),
            TaskQueueConfig::default(),
        ));
        ReferenceDistributor::new(
            store,
            tasks,
            rng,
            DistributorConfig {
                actors_per_run,
                ..Default::default()
            },
        )
    }

    fn seed(store: &Arc<dyn Storage>, voters: usize, others: usize, published: EpochMs) {
        for i in 0..voters {
            store
                .try_insert_actor(&Actor::new(format!("voter_{i}"), true, 0))
                .unwrap();
        }
        for i in 0..others {
            store
                .try_insert_actor(&Actor::new(format!("crowd_{i}"), false, 0))
                .unwrap();
        }
        let owner = UserId::parse("owner").unwrap();
        let content = Content::new(owner.clone(), "Icons", published);
        store.upsert_content(&content).unwrap();
        store
            .upsert_artifact(&Artifact {
                id: ArtifactId::new(),
                content_id: content.id,
                owner_id: owner,
                like_count: 0,
                created_ms: published,
            })
            .unwrap();
    }

    #[test]
    fn assignments_get_paced_like_bursts() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        seed(&store, 3, 30, 10 * HOUR_MS);
        let now = 12 * HOUR_MS;
        let s = distributor(store.clone(), 2).run(now).unwrap();
        assert_eq!(s.actors, 2);
        assert_eq!(s.assignments, 2);
        assert_eq!(store.list_references().unwrap().len(), 2);

        let likes = store.list_tasks(Some(TaskStatus::Pending)).unwrap();
        assert_eq!(likes.len(), s.likes_scheduled);
        assert!((10..=30).contains(&likes.len()));
        for t in &likes {
            assert_eq!(t.action, ActionKind::Like);
            let offset = t.scheduled_for_ms - now;
            assert!((30 * SECOND_MS..=5 * MINUTE_MS).contains(&offset));
        }
    }

    #[test]
    fn stale_content_is_not_distributed() {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        seed(&store, 2, 5, 0);
        let s = distributor(store.clone(), 80).run(10 * 24 * HOUR_MS).unwrap();
        assert_eq!(s.assignments, 0);
        assert_eq!(s.skipped, 2);
        assert!(store.list_tasks(None).unwrap().is_empty());
    }
}
