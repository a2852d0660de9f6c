//! Periodic actor health sweeps and manual revival.

use std::sync::Arc;

use pulse_core::api::{ForceActivityResponse, HealthStatus, SweepSummary};
use pulse_core::config::HealthConfig;
use pulse_core::health::{active_ratio, evaluate, health_label, HealthVerdict};
use pulse_core::model::{ActionKind, Actor, Priority, TargetKind};
use pulse_core::{ActorId, EpochMs, PulseError, Result};
use pulse_store::{ActorFilter, Storage};
use tracing::{debug, info, warn};

use crate::rng::SharedRng;
use crate::task_queue::TaskQueue;

const NUDGE_CANDIDATES: usize = 50;

pub struct HealthMonitor {
    store: Arc<dyn Storage>,
    tasks: Arc<TaskQueue>,
    rng: Arc<SharedRng>,
    cfg: HealthConfig,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<dyn Storage>,
        tasks: Arc<TaskQueue>,
        rng: Arc<SharedRng>,
        cfg: HealthConfig,
    ) -> Self {
        Self {
            store,
            tasks,
            rng,
            cfg,
        }
    }

    /// Enqueues one low-priority like on a recent artifact. `false` when
    /// there is nothing recent to like.
    fn nudge(&self, actor: &Actor, now: EpochMs) -> Result<bool> {
        let recent = self
            .store
            .recent_artifacts(now - self.cfg.nudge_lookback_ms, NUDGE_CANDIDATES)?;
        let Some(artifact) = self.rng.choose(&recent) else {
            return Ok(false);
        };
        self.tasks.enqueue(
            &actor.id,
            ActionKind::Like,
            TargetKind::SecondaryArtifact,
            (&artifact.id).into(),
            Priority::Low,
            now,
        )?;
        Ok(true)
    }

    fn sweep_one(&self, actor: &Actor, now: EpochMs, summary: &mut SweepSummary) -> Result<()> {
        match evaluate(actor, now, &self.cfg) {
            HealthVerdict::Healthy => summary.healthy += 1,
            HealthVerdict::Skip => summary.skipped += 1,
            HealthVerdict::Reactivate { attempt } => {
                if !self.store.record_reactivation(&actor.id, now)? {
                    summary.skipped += 1;
                    return Ok(());
                }
                if !self.nudge(actor, now)? {
                    debug!(actor = %actor.id, "no recent artifact to nudge with");
                }
                debug!(actor = %actor.id, attempt, "actor reactivated");
                summary.reactivated += 1;
            }
            HealthVerdict::Exhausted { attempt } => {
                if self.store.demote_actor(&actor.id, attempt)? {
                    let err = PulseError::ReactivationExhausted(actor.id.clone());
                    info!(actor = %actor.id, attempt, "{err}");
                    summary.demoted += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Evaluates every actor once. One actor's failure never stops the sweep.
    pub fn sweep(&self, now: EpochMs) -> Result<SweepSummary> {
        let actors = self.store.list_actors(&ActorFilter::default())?;
        let mut summary = SweepSummary::default();
        for actor in &actors {
            summary.evaluated += 1;
            if let Err(e) = self.sweep_one(actor, now, &mut summary) {
                warn!(actor = %actor.id, "health evaluation failed: {e}");
                summary.errors += 1;
            }
        }
        let pool = self.status()?;
        summary.active = pool.active;
        summary.inactive = pool.inactive;
        summary.label = pool.label;
        info!(
            evaluated = summary.evaluated,
            healthy = summary.healthy,
            reactivated = summary.reactivated,
            demoted = summary.demoted,
            errors = summary.errors,
            active = summary.active,
            inactive = summary.inactive,
            label = %summary.label,
            "health sweep"
        );
        Ok(summary)
    }

    pub fn status(&self) -> Result<HealthStatus> {
        let c = self.store.actor_counts()?;
        let ratio = active_ratio(c.active, c.total);
        Ok(HealthStatus {
            total: c.total,
            active: c.active,
            inactive: c.inactive,
            dead: c.dead,
            active_ratio: ratio,
            label: health_label(ratio).to_string(),
        })
    }

    /// Revives an actor regardless of its reactivation history.
    pub fn force_activity(&self, id: &ActorId, now: EpochMs) -> Result<ForceActivityResponse> {
        let actor = self
            .store
            .force_activity(id, now)?
            .ok_or_else(|| PulseError::not_found("actor", id))?;
        info!(actor = %id, "activity forced");
        Ok(ForceActivityResponse {
            actor_id: actor.id,
            activity_count: actor.activity_count,
        })
    }
}
