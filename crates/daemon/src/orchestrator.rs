//! Post-publish pipeline: initial boost, curator review, multiplier adjust.
//!
//! Each step is a persisted stage row with a due time. A poller claims due
//! rows, so the multi-hour chain survives restarts.

use std::sync::Arc;

use pulse_core::config::PipelineConfig;
use pulse_core::model::{Content, PipelineStage, StageKind, StageStatus};
use pulse_core::{ContentId, EpochMs, PulseError, Result, StageId};
use pulse_store::Storage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::popularity::PopularityManager;
use crate::quality::QualityAggregator;
use crate::rng::SharedRng;
use crate::selector::EligibilitySelector;

/// Outcome of one stage-runner pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StageRun {
    pub claimed: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Retraction {
    pub stages_cancelled: usize,
}

enum StageOutcome {
    Done,
    Cancelled,
}

pub struct Orchestrator {
    store: Arc<dyn Storage>,
    selector: Arc<EligibilitySelector>,
    quality: Arc<QualityAggregator>,
    popularity: Arc<PopularityManager>,
    rng: Arc<SharedRng>,
    cfg: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Storage>,
        selector: Arc<EligibilitySelector>,
        quality: Arc<QualityAggregator>,
        popularity: Arc<PopularityManager>,
        rng: Arc<SharedRng>,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            store,
            selector,
            quality,
            popularity,
            rng,
            cfg,
        }
    }

    fn stage(content: &ContentId, kind: StageKind, due_ms: EpochMs, now: EpochMs) -> PipelineStage {
        PipelineStage {
            id: StageId::new(),
            content_id: content.clone(),
            kind,
            due_ms,
            status: StageStatus::Pending,
            error: None,
            created_ms: now,
            finished_ms: None,
        }
    }

    /// Schedules the three pipeline stages. `false` when the content already
    /// has a pipeline.
    pub fn on_content_published(&self, content: &ContentId, now: EpochMs) -> Result<bool> {
        let c = self
            .store
            .get_content(content)?
            .ok_or_else(|| PulseError::not_found("content", content))?;
        if c.retracted {
            return Err(PulseError::Validation(format!(
                "content {content} is retracted"
            )));
        }
        let boost_at = now
            + self
                .rng
                .between_i64(self.cfg.initial_delay_min_ms, self.cfg.initial_delay_max_ms);
        let review_at = boost_at + self.cfg.review_delay_ms;
        let adjust_at = review_at + self.cfg.adjust_delay_ms;
        let stages = [
            Self::stage(content, StageKind::InitialBoost, boost_at, now),
            Self::stage(content, StageKind::CuratorReview, review_at, now),
            Self::stage(content, StageKind::MultiplierAdjust, adjust_at, now),
        ];
        let created = self.store.insert_stages_if_absent(content, &stages)?;
        if created {
            info!(content = %content, boost_at, review_at, adjust_at, "pipeline scheduled");
        } else {
            debug!(content = %content, "pipeline already scheduled");
        }
        Ok(created)
    }

    fn live_content(&self, id: &ContentId) -> Result<Option<Content>> {
        let c = self
            .store
            .get_content(id)?
            .ok_or_else(|| PulseError::not_found("content", id))?;
        Ok((!c.retracted).then_some(c))
    }

    fn run_stage(&self, stage: &PipelineStage, now: EpochMs) -> Result<StageOutcome> {
        let Some(content) = self.live_content(&stage.content_id)? else {
            return Ok(StageOutcome::Cancelled);
        };
        match stage.kind {
            StageKind::InitialBoost => {
                self.selector.boost(&content, content.multiplier(), now)?;
            }
            StageKind::CuratorReview => {
                self.quality.request_reviews(&content.id, now)?;
            }
            StageKind::MultiplierAdjust => {
                let snap = self.quality.recompute(&content.id, now)?;
                if snap.rater_count > 0 && snap.multiplier != 1.0 {
                    self.selector.boost(&content, snap.multiplier, now)?;
                }
                if snap.multiplier >= self.cfg.auto_queue_threshold {
                    match self.popularity.enqueue(&content.id, false, now) {
                        Ok(_) | Err(PulseError::AlreadyQueued(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(StageOutcome::Done)
    }

    /// Claims and runs due stages. A failing stage is recorded and the rest
    /// of the batch continues.
    pub fn run_due_stages(&self, now: EpochMs, limit: usize) -> Result<StageRun> {
        let due = self.store.claim_due_stages(now, limit)?;
        let mut run = StageRun {
            claimed: due.len(),
            ..Default::default()
        };
        for stage in &due {
            let (status, error) = match self.run_stage(stage, now) {
                Ok(StageOutcome::Done) => {
                    run.done += 1;
                    (StageStatus::Done, None)
                }
                Ok(StageOutcome::Cancelled) => {
                    run.cancelled += 1;
                    (StageStatus::Cancelled, None)
                }
                Err(e) => {
                    warn!(stage = %stage.id, kind = stage.kind.as_str(), content = %stage.content_id, "stage failed: {e}");
                    run.failed += 1;
                    (StageStatus::Failed, Some(e.to_string()))
                }
            };
            if let Err(e) = self
                .store
                .finish_stage(&stage.id, status, error.as_deref(), now)
            {
                warn!(stage = %stage.id, "stage bookkeeping failed: {e:?}");
            }
        }
        if run.claimed > 0 {
            info!(
                claimed = run.claimed,
                done = run.done,
                failed = run.failed,
                cancelled = run.cancelled,
                "pipeline stages run"
            );
        }
        Ok(run)
    }

    /// Cleanup after a takedown. Pending tasks stay; they fail at execution.
    pub fn on_content_retracted(&self, content: &ContentId, now: EpochMs) -> Result<Retraction> {
        if self.store.get_content(content)?.is_none() {
            return Err(PulseError::not_found("content", content));
        }
        self.store.set_retracted(content)?;
        let stages_cancelled = self.store.cancel_pending_stages(content, now)?;
        self.popularity.deactivate(content)?;
        info!(content = %content, stages_cancelled, "content retracted");
        Ok(Retraction { stages_cancelled })
    }

    pub fn on_rating_submitted(&self, content: &ContentId, now: EpochMs) -> Result<()> {
        self.quality.recompute(content, now)?;
        Ok(())
    }

    pub fn stages(&self, content: &ContentId) -> Result<Vec<PipelineStage>> {
        Ok(self.store.stages_for(content)?)
    }
}
