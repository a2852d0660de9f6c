//! Curated queue, daily promotion, decay and dedup-gated interaction bumps.

use std::sync::Arc;

use pulse_core::api::{DecaySummary, InteractionOutcome, LeaderboardEntry, PublishSummary};
use pulse_core::config::PopularityConfig;
use pulse_core::model::{CuratedQueueItem, QueueStatus};
use pulse_core::popularity::{dedup_key, InteractionKind};
use pulse_core::{utc_midnight, ContentId, EpochMs, PulseError, QueueItemId, Result};
use pulse_store::{PublishStamp, Storage};
use tracing::{debug, info};

pub struct PopularityManager {
    store: Arc<dyn Storage>,
    cfg: PopularityConfig,
}

impl PopularityManager {
    pub fn new(store: Arc<dyn Storage>, cfg: PopularityConfig) -> Self {
        Self { store, cfg }
    }

    pub fn config(&self) -> &PopularityConfig {
        &self.cfg
    }

    /// Adds content to the curated queue.
    pub fn enqueue(
        &self,
        content: &ContentId,
        force_today: bool,
        now: EpochMs,
    ) -> Result<CuratedQueueItem> {
        let c = self
            .store
            .get_content(content)?
            .ok_or_else(|| PulseError::not_found("content", content))?;
        if c.retracted {
            return Err(PulseError::Validation(format!(
                "content {content} is retracted"
            )));
        }
        let item = CuratedQueueItem {
            id: QueueItemId::new(),
            content_id: content.clone(),
            status: QueueStatus::Queued,
            force_today,
            enqueued_ms: now,
            published_ms: None,
        };
        if !self.store.insert_queue_item(&item)? {
            return Err(PulseError::AlreadyQueued(content.clone()));
        }
        info!(content = %content, force_today, "content queued");
        Ok(item)
    }

    /// Only queued items can be forced; `NotFound` otherwise.
    pub fn set_force_today(&self, content: &ContentId, flag: bool) -> Result<()> {
        if !self.store.set_force_today(content, flag)? {
            return Err(PulseError::not_found("queued item", content));
        }
        Ok(())
    }

    /// Next items to publish, in publication order.
    pub fn preview_batch(&self, limit: usize) -> Result<Vec<CuratedQueueItem>> {
        Ok(self.store.queued_items(limit)?)
    }

    /// Promotes up to `limit` queued items. An item another run already
    /// published is skipped.
    pub fn publish_batch(&self, limit: usize, now: EpochMs) -> Result<PublishSummary> {
        let batch_date_ms = utc_midnight(now);
        let stamp = PublishStamp {
            now,
            batch_date_ms,
            start_life_score: self.cfg.start_life_score.min(self.cfg.max_life_score),
        };
        let mut published = Vec::new();
        for item in self.store.queued_items(limit)? {
            if self.store.publish_queue_item(&item.id, stamp)? {
                published.push(item.content_id);
            } else {
                debug!(item = %item.id, "queue item already published");
            }
        }
        info!(published = published.len(), batch_date_ms, "popular batch published");
        Ok(PublishSummary {
            published,
            batch_date_ms,
        })
    }

    pub fn decay(&self, step: u32) -> Result<DecaySummary> {
        let out = self.store.decay_popularity(step)?;
        info!(
            step,
            decayed = out.decayed,
            deactivated = out.deactivated,
            "life scores decayed"
        );
        Ok(DecaySummary {
            decayed: out.decayed,
            deactivated: out.deactivated,
        })
    }

    /// Counts a genuine interaction once per `(kind, content, source)` window.
    pub fn on_interaction(
        &self,
        kind: InteractionKind,
        content: &ContentId,
        source: &str,
        now: EpochMs,
    ) -> Result<InteractionOutcome> {
        let source = source.trim();
        if source.is_empty() {
            return Err(PulseError::Validation("interaction source is empty".into()));
        }
        if self.store.get_content(content)?.is_none() {
            return Err(PulseError::not_found("content", content));
        }
        let rule = self.cfg.rule(kind);
        let key = dedup_key(kind, content, source);
        if !self.store.try_mark(&key, now, rule.dedup_window_ms)? {
            debug!(key, "interaction deduplicated");
            return Ok(InteractionOutcome::Deduplicated);
        }
        self.store.increment_stat(content, kind)?;
        let life_score = self
            .store
            .bump_life(content, rule.bonus, self.cfg.max_life_score)?;
        debug!(content = %content, kind = kind.as_str(), ?life_score, "interaction counted");
        Ok(InteractionOutcome::Counted { life_score })
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        Ok(self
            .store
            .leaderboard(limit)?
            .into_iter()
            .map(|c| LeaderboardEntry {
                content_id: c.id,
                title: c.title,
                life_score: c.popularity.life_score,
                published_ms: c.popularity.published_ms,
            })
            .collect())
    }

    /// Drops content from the popular set and the queue.
    pub fn deactivate(&self, content: &ContentId) -> Result<()> {
        let removed = self.store.remove_queued_item(content)?;
        let deactivated = self.store.deactivate_popularity(content)?;
        debug!(content = %content, removed, deactivated, "popularity cleared");
        Ok(())
    }

    pub fn purge_marks(&self, now: EpochMs) -> Result<usize> {
        Ok(self.store.purge_expired_marks(now)?)
    }
}
