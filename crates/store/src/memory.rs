use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use pulse_core::model::{
    ActionKind, Actor, ActorStatus, Artifact, Content, CuratedQueueItem, Curator, CuratorRating,
    IdentityAsset, Notification, PipelineStage, QualitySnapshot, QueueStatus,
    ReferenceAssignment, ReviewRequest, StageStatus, TargetKind, Task, TaskCounts, TaskStatus,
};
use pulse_core::popularity::{queue_order, InteractionKind};
use pulse_core::{
    ActorId, ArtifactId, ContentId, CuratorId, EpochMs, IdentityId, QueueItemId, StageId, TargetId,
    TaskId, UserId,
};

use crate::traits::{ActorCounts, ActorFilter, DecayOutcome, PublishStamp, Storage};

/// In-memory storage for tests and ephemeral runs. Not durable.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    actors: HashMap<ActorId, Actor>,
    handles: HashSet<String>,
    identities: HashMap<IdentityId, IdentityAsset>,
    tasks: HashMap<TaskId, Task>,
    content: HashMap<ContentId, Content>,
    artifacts: HashMap<ArtifactId, Artifact>,
    curators: HashMap<CuratorId, Curator>,
    ratings: HashMap<(CuratorId, ContentId), CuratorRating>,
    reviews: Vec<ReviewRequest>,
    references: Vec<ReferenceAssignment>,
    queue: HashMap<ContentId, CuratedQueueItem>,
    marks: HashMap<String, EpochMs>,
    stages: HashMap<StageId, PipelineStage>,
    ledger: HashSet<(ActorId, TargetId, ActionKind)>,
    notifications: Vec<Notification>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted_by<T, K: Ord>(mut v: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    v.sort_by_key(|x| key(x));
    v
}

impl Storage for InMemoryStorage {
    fn try_insert_actor(&self, actor: &Actor) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        if !inner.handles.insert(actor.handle.clone()) {
            return Ok(false);
        }
        inner.actors.insert(actor.id.clone(), actor.clone());
        Ok(true)
    }

    fn get_actor(&self, id: &ActorId) -> anyhow::Result<Option<Actor>> {
        Ok(self.lock().actors.get(id).cloned())
    }

    fn list_actors(&self, filter: &ActorFilter) -> anyhow::Result<Vec<Actor>> {
        let inner = self.lock();
        let all: Vec<Actor> = inner
            .actors
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        let mut out = sorted_by(all, |a| (a.created_ms, a.id.clone()));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn eligible_actors(&self, cutoff: EpochMs) -> anyhow::Result<Vec<Actor>> {
        let inner = self.lock();
        let v: Vec<Actor> = inner
            .actors
            .values()
            .filter(|a| a.status == ActorStatus::Active)
            .filter(|a| a.last_activity_ms.map_or(true, |t| t < cutoff))
            .cloned()
            .collect();
        Ok(sorted_by(v, |a| (a.created_ms, a.id.clone())))
    }

    fn actor_counts(&self) -> anyhow::Result<ActorCounts> {
        let inner = self.lock();
        let mut c = ActorCounts::default();
        for a in inner.actors.values() {
            c.total += 1;
            match a.status {
                ActorStatus::Active => c.active += 1,
                ActorStatus::Inactive => c.inactive += 1,
                ActorStatus::Dead => c.dead += 1,
            }
            if a.can_vote {
                c.vote_eligible += 1;
            }
        }
        Ok(c)
    }

    fn record_activity(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.actors.get_mut(id) {
            Some(a) => {
                a.last_activity_ms = Some(now);
                a.activity_count += 1;
                true
            }
            None => false,
        })
    }

    fn record_reactivation(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.actors.get_mut(id) {
            Some(a) if a.status == ActorStatus::Active => {
                a.reactivation_attempts += 1;
                a.last_activity_ms = Some(now);
                true
            }
            _ => false,
        })
    }

    fn demote_actor(&self, id: &ActorId, attempts: u32) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.actors.get_mut(id) {
            Some(a) if a.status == ActorStatus::Active => {
                a.status = ActorStatus::Inactive;
                a.reactivation_attempts = attempts;
                true
            }
            _ => false,
        })
    }

    fn force_activity(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<Option<Actor>> {
        let mut inner = self.lock();
        Ok(inner.actors.get_mut(id).map(|a| {
            a.status = ActorStatus::Active;
            a.reactivation_attempts = 0;
            a.last_activity_ms = Some(now);
            a.activity_count += 1;
            a.clone()
        }))
    }

    fn insert_identity(&self, asset: &IdentityAsset) -> anyhow::Result<()> {
        self.lock().identities.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    fn unassigned_identities(&self) -> anyhow::Result<Vec<IdentityAsset>> {
        let inner = self.lock();
        let v: Vec<IdentityAsset> = inner
            .identities
            .values()
            .filter(|i| i.assigned_to.is_none())
            .cloned()
            .collect();
        Ok(sorted_by(v, |i| i.id.clone()))
    }

    fn assign_identity(&self, actor: &ActorId, identity: &IdentityId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let actor_free = matches!(inner.actors.get(actor), Some(a) if a.identity_id.is_none());
        let identity_free =
            matches!(inner.identities.get(identity), Some(i) if i.assigned_to.is_none());
        if !(actor_free && identity_free) {
            return Ok(false);
        }
        if let Some(a) = inner.actors.get_mut(actor) {
            a.identity_id = Some(identity.clone());
        }
        if let Some(i) = inner.identities.get_mut(identity) {
            i.assigned_to = Some(actor.clone());
        }
        Ok(true)
    }

    fn unassign_identity(&self, identity: &IdentityId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let Some(actor) = inner
            .identities
            .get_mut(identity)
            .and_then(|i| i.assigned_to.take())
        else {
            return Ok(false);
        };
        if let Some(a) = inner.actors.get_mut(&actor) {
            a.identity_id = None;
        }
        Ok(true)
    }

    fn reset_identities(&self) -> anyhow::Result<usize> {
        let mut inner = self.lock();
        let mut cleared = 0;
        for i in inner.identities.values_mut() {
            if i.assigned_to.take().is_some() {
                cleared += 1;
            }
        }
        for a in inner.actors.values_mut() {
            a.identity_id = None;
        }
        Ok(cleared)
    }

    fn insert_task(&self, task: &Task) -> anyhow::Result<()> {
        self.lock().tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> anyhow::Result<Option<Task>> {
        Ok(self.lock().tasks.get(id).cloned())
    }

    fn list_tasks(&self, status: Option<TaskStatus>) -> anyhow::Result<Vec<Task>> {
        let inner = self.lock();
        let v: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        Ok(sorted_by(v, |t| (t.scheduled_for_ms, t.id.clone())))
    }

    fn due_tasks(&self, now: EpochMs, limit: usize) -> anyhow::Result<Vec<Task>> {
        let inner = self.lock();
        let mut due: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.scheduled_for_ms <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_for_ms.cmp(&b.scheduled_for_ms))
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due)
    }

    fn has_completed(
        &self,
        actor: &ActorId,
        target: &TargetId,
        action: ActionKind,
    ) -> anyhow::Result<bool> {
        Ok(self.lock().tasks.values().any(|t| {
            t.status == TaskStatus::Completed
                && &t.actor_id == actor
                && &t.target_id == target
                && t.action == action
        }))
    }

    fn complete_task(&self, id: &TaskId, now: EpochMs) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.tasks.get_mut(id) {
            Some(t) if t.status == TaskStatus::Pending => {
                t.status = TaskStatus::Completed;
                t.attempts += 1;
                t.last_attempt_ms = Some(now);
                t.completed_ms = Some(now);
                t.error = None;
                true
            }
            _ => false,
        })
    }

    fn fail_task(&self, id: &TaskId, now: EpochMs, error: &str) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.tasks.get_mut(id) {
            Some(t) if t.status == TaskStatus::Pending => {
                t.status = TaskStatus::Failed;
                t.attempts += 1;
                t.last_attempt_ms = Some(now);
                t.error = Some(error.to_string());
                true
            }
            _ => false,
        })
    }

    fn requeue_task(&self, id: &TaskId, scheduled_for: EpochMs) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.tasks.get_mut(id) {
            Some(t) if t.status == TaskStatus::Failed => {
                t.status = TaskStatus::Pending;
                t.scheduled_for_ms = scheduled_for;
                t.error = None;
                true
            }
            _ => false,
        })
    }

    fn task_counts(&self) -> anyhow::Result<TaskCounts> {
        let inner = self.lock();
        let mut c = TaskCounts::default();
        for t in inner.tasks.values() {
            match t.status {
                TaskStatus::Pending => c.pending += 1,
                TaskStatus::Completed => c.completed += 1,
                TaskStatus::Failed => c.failed += 1,
            }
        }
        Ok(c)
    }

    fn upsert_content(&self, content: &Content) -> anyhow::Result<()> {
        let mut inner = self.lock();
        match inner.content.get_mut(&content.id) {
            // Metadata only; engine-owned state survives a re-sync.
            Some(existing) => {
                existing.owner_id = content.owner_id.clone();
                existing.title = content.title.clone();
                existing.tags = content.tags.clone();
                existing.category = content.category.clone();
                existing.published_ms = content.published_ms;
            }
            None => {
                inner.content.insert(content.id.clone(), content.clone());
            }
        }
        Ok(())
    }

    fn get_content(&self, id: &ContentId) -> anyhow::Result<Option<Content>> {
        Ok(self.lock().content.get(id).cloned())
    }

    fn set_retracted(&self, id: &ContentId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.content.get_mut(id) {
            Some(c) if !c.retracted => {
                c.retracted = true;
                true
            }
            _ => false,
        })
    }

    fn set_quality(&self, id: &ContentId, snapshot: &QualitySnapshot) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.content.get_mut(id) {
            Some(c) => {
                c.quality = Some(snapshot.clone());
                true
            }
            None => false,
        })
    }

    fn increment_stat(&self, id: &ContentId, kind: InteractionKind) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let Some(c) = inner.content.get_mut(id) else {
            return Ok(false);
        };
        match kind {
            InteractionKind::View => c.stats.views += 1,
            InteractionKind::Save => c.stats.saves += 1,
            InteractionKind::Share => c.stats.shares += 1,
            InteractionKind::SecondaryLike => c.stats.secondary_likes += 1,
        }
        Ok(true)
    }

    fn upsert_artifact(&self, artifact: &Artifact) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner
            .artifacts
            .entry(artifact.id.clone())
            .and_modify(|a| {
                a.content_id = artifact.content_id.clone();
                a.owner_id = artifact.owner_id.clone();
            })
            .or_insert_with(|| artifact.clone());
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> anyhow::Result<Option<Artifact>> {
        Ok(self.lock().artifacts.get(id).cloned())
    }

    fn recent_artifacts(&self, since: EpochMs, limit: usize) -> anyhow::Result<Vec<Artifact>> {
        let inner = self.lock();
        let mut v: Vec<(EpochMs, Artifact)> = inner
            .artifacts
            .values()
            .filter_map(|a| {
                let c = inner.content.get(&a.content_id)?;
                (!c.retracted && c.published_ms >= since).then(|| (c.published_ms, a.clone()))
            })
            .collect();
        v.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(v.into_iter().take(limit).map(|(_, a)| a).collect())
    }

    fn increment_artifact_likes(&self, id: &ArtifactId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.artifacts.get_mut(id) {
            Some(a) => {
                a.like_count += 1;
                true
            }
            None => false,
        })
    }

    fn upsert_curator(&self, curator: &Curator) -> anyhow::Result<()> {
        self.lock().curators.insert(curator.id.clone(), curator.clone());
        Ok(())
    }

    fn get_curator(&self, id: &CuratorId) -> anyhow::Result<Option<Curator>> {
        Ok(self.lock().curators.get(id).cloned())
    }

    fn list_curators(&self) -> anyhow::Result<Vec<Curator>> {
        let v: Vec<Curator> = self.lock().curators.values().cloned().collect();
        Ok(sorted_by(v, |c: &Curator| c.id.clone()))
    }

    fn upsert_rating(&self, rating: &CuratorRating) -> anyhow::Result<()> {
        self.lock().ratings.insert(
            (rating.curator_id.clone(), rating.content_id.clone()),
            rating.clone(),
        );
        Ok(())
    }

    fn ratings_for(&self, content: &ContentId) -> anyhow::Result<Vec<CuratorRating>> {
        let inner = self.lock();
        let v: Vec<CuratorRating> = inner
            .ratings
            .values()
            .filter(|r| &r.content_id == content)
            .cloned()
            .collect();
        Ok(sorted_by(v, |r: &CuratorRating| {
            (r.submitted_ms, r.curator_id.clone())
        }))
    }

    fn insert_review_request(&self, req: &ReviewRequest) -> anyhow::Result<()> {
        self.lock().reviews.push(req.clone());
        Ok(())
    }

    fn review_requests_for(&self, content: &ContentId) -> anyhow::Result<Vec<ReviewRequest>> {
        Ok(self
            .lock()
            .reviews
            .iter()
            .filter(|r| &r.content_id == content)
            .cloned()
            .collect())
    }

    fn insert_reference(&self, r: &ReferenceAssignment) -> anyhow::Result<()> {
        self.lock().references.push(r.clone());
        Ok(())
    }

    fn list_references(&self) -> anyhow::Result<Vec<ReferenceAssignment>> {
        Ok(self.lock().references.clone())
    }

    fn insert_queue_item(&self, item: &CuratedQueueItem) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        if inner.queue.contains_key(&item.content_id) {
            return Ok(false);
        }
        inner.queue.insert(item.content_id.clone(), item.clone());
        if let Some(c) = inner.content.get_mut(&item.content_id) {
            c.popularity.queued_ms = Some(item.enqueued_ms);
        }
        Ok(true)
    }

    fn get_queue_item(&self, content: &ContentId) -> anyhow::Result<Option<CuratedQueueItem>> {
        Ok(self.lock().queue.get(content).cloned())
    }

    fn queued_items(&self, limit: usize) -> anyhow::Result<Vec<CuratedQueueItem>> {
        let inner = self.lock();
        let mut v: Vec<CuratedQueueItem> = inner
            .queue
            .values()
            .filter(|i| i.status == QueueStatus::Queued)
            .cloned()
            .collect();
        v.sort_by(queue_order);
        v.truncate(limit);
        Ok(v)
    }

    fn set_force_today(&self, content: &ContentId, flag: bool) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.queue.get_mut(content) {
            Some(i) if i.status == QueueStatus::Queued => {
                i.force_today = flag;
                true
            }
            _ => false,
        })
    }

    fn remove_queued_item(&self, content: &ContentId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        if !matches!(inner.queue.get(content), Some(i) if i.status == QueueStatus::Queued) {
            return Ok(false);
        }
        inner.queue.remove(content);
        if let Some(c) = inner.content.get_mut(content) {
            c.popularity.queued_ms = None;
        }
        Ok(true)
    }

    fn publish_queue_item(&self, id: &QueueItemId, stamp: PublishStamp) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let Some(item) = inner
            .queue
            .values_mut()
            .find(|i| &i.id == id && i.status == QueueStatus::Queued)
        else {
            return Ok(false);
        };
        item.status = QueueStatus::Published;
        item.published_ms = Some(stamp.now);
        item.force_today = false;
        let content_id = item.content_id.clone();
        if let Some(c) = inner.content.get_mut(&content_id) {
            c.popularity.active = true;
            c.popularity.life_score = stamp.start_life_score;
            c.popularity.batch_date_ms = Some(stamp.batch_date_ms);
            c.popularity.published_ms = Some(stamp.now);
        }
        Ok(true)
    }

    fn decay_popularity(&self, step: u32) -> anyhow::Result<DecayOutcome> {
        let mut inner = self.lock();
        let mut out = DecayOutcome::default();
        for c in inner.content.values_mut() {
            let p = &mut c.popularity;
            if !p.active {
                continue;
            }
            if p.life_score > 0 {
                p.life_score = p.life_score.saturating_sub(step);
                out.decayed += 1;
            }
            if p.life_score == 0 {
                p.active = false;
                out.deactivated += 1;
            }
        }
        Ok(out)
    }

    fn bump_life(&self, id: &ContentId, bonus: u32, max: u32) -> anyhow::Result<Option<u32>> {
        let mut inner = self.lock();
        Ok(match inner.content.get_mut(id) {
            Some(c) if c.popularity.active => {
                c.popularity.life_score =
                    pulse_core::popularity::bump_life(c.popularity.life_score, bonus, max);
                Some(c.popularity.life_score)
            }
            _ => None,
        })
    }

    fn deactivate_popularity(&self, id: &ContentId) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.content.get_mut(id) {
            Some(c) if c.popularity.active => {
                c.popularity.active = false;
                true
            }
            _ => false,
        })
    }

    fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<Content>> {
        let inner = self.lock();
        let mut v: Vec<Content> = inner
            .content
            .values()
            .filter(|c| c.popularity.active)
            .cloned()
            .collect();
        v.sort_by(|a, b| {
            b.popularity
                .life_score
                .cmp(&a.popularity.life_score)
                .then(b.popularity.published_ms.cmp(&a.popularity.published_ms))
                .then_with(|| a.id.cmp(&b.id))
        });
        v.truncate(limit);
        Ok(v)
    }

    fn try_mark(&self, key: &str, now: EpochMs, ttl_ms: EpochMs) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        match inner.marks.get(key) {
            Some(expires) if *expires > now => Ok(false),
            _ => {
                inner.marks.insert(key.to_string(), now + ttl_ms);
                Ok(true)
            }
        }
    }

    fn purge_expired_marks(&self, now: EpochMs) -> anyhow::Result<usize> {
        let mut inner = self.lock();
        let before = inner.marks.len();
        inner.marks.retain(|_, expires| *expires > now);
        Ok(before - inner.marks.len())
    }

    fn insert_stages_if_absent(
        &self,
        content: &ContentId,
        stages: &[PipelineStage],
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        if inner.stages.values().any(|s| &s.content_id == content) {
            return Ok(false);
        }
        for s in stages {
            inner.stages.insert(s.id.clone(), s.clone());
        }
        Ok(true)
    }

    fn claim_due_stages(&self, now: EpochMs, limit: usize) -> anyhow::Result<Vec<PipelineStage>> {
        let mut inner = self.lock();
        let mut due: Vec<StageId> = inner
            .stages
            .values()
            .filter(|s| s.status == StageStatus::Pending && s.due_ms <= now)
            .map(|s| (s.due_ms, s.id.clone()))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .take(limit)
            .map(|(_, id)| id)
            .collect();
        let mut out = Vec::with_capacity(due.len());
        for id in due.drain(..) {
            if let Some(s) = inner.stages.get_mut(&id) {
                s.status = StageStatus::Running;
                out.push(s.clone());
            }
        }
        Ok(out)
    }

    fn finish_stage(
        &self,
        id: &StageId,
        status: StageStatus,
        error: Option<&str>,
        now: EpochMs,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        Ok(match inner.stages.get_mut(id) {
            Some(s) if s.status == StageStatus::Running => {
                s.status = status;
                s.error = error.map(str::to_string);
                s.finished_ms = Some(now);
                true
            }
            _ => false,
        })
    }

    fn cancel_pending_stages(&self, content: &ContentId, now: EpochMs) -> anyhow::Result<usize> {
        let mut inner = self.lock();
        let mut n = 0;
        for s in inner.stages.values_mut() {
            if &s.content_id == content && s.status == StageStatus::Pending {
                s.status = StageStatus::Cancelled;
                s.finished_ms = Some(now);
                n += 1;
            }
        }
        Ok(n)
    }

    fn stages_for(&self, content: &ContentId) -> anyhow::Result<Vec<PipelineStage>> {
        let inner = self.lock();
        let v: Vec<PipelineStage> = inner
            .stages
            .values()
            .filter(|s| &s.content_id == content)
            .cloned()
            .collect();
        Ok(sorted_by(v, |s: &PipelineStage| (s.due_ms, s.id.clone())))
    }

    fn record_action(
        &self,
        actor: &ActorId,
        _target_kind: TargetKind,
        target: &TargetId,
        kind: ActionKind,
        _now: EpochMs,
    ) -> anyhow::Result<bool> {
        Ok(self
            .lock()
            .ledger
            .insert((actor.clone(), target.clone(), kind)))
    }

    fn has_action(&self, actor: &ActorId, target: &TargetId, kind: ActionKind) -> anyhow::Result<bool> {
        Ok(self
            .lock()
            .ledger
            .contains(&(actor.clone(), target.clone(), kind)))
    }

    fn insert_notification(&self, n: &Notification) -> anyhow::Result<()> {
        self.lock().notifications.push(n.clone());
        Ok(())
    }

    fn notifications_for(&self, recipient: &UserId) -> anyhow::Result<Vec<Notification>> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| &n.recipient == recipient)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::model::{ActionKind, Priority};

    fn task(actor: &ActorId, priority: Priority, at: EpochMs) -> Task {
        Task {
            id: TaskId::new(),
            actor_id: actor.clone(),
            action: ActionKind::Vote,
            target_kind: TargetKind::Content,
            target_id: TargetId::parse("c1").unwrap(),
            scheduled_for_ms: at,
            status: TaskStatus::Pending,
            attempts: 0,
            last_attempt_ms: None,
            error: None,
            priority,
            payload: None,
            created_ms: 0,
            completed_ms: None,
        }
    }

    #[test]
    fn test_new_creates_empty_storage() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.actor_counts().unwrap(), ActorCounts::default());
        assert_eq!(storage.task_counts().unwrap(), TaskCounts::default());
        assert!(storage.queued_items(10).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_handle_is_rejected() {
        let storage = InMemoryStorage::new();
        assert!(storage.try_insert_actor(&Actor::new("brisk_owl42", true, 0)).unwrap());
        assert!(!storage.try_insert_actor(&Actor::new("brisk_owl42", false, 0)).unwrap());
        assert_eq!(storage.actor_counts().unwrap().total, 1);
    }

    #[test]
    fn test_due_tasks_order_by_priority_then_time() {
        let storage = InMemoryStorage::new();
        let a = ActorId::new();
        let low_early = task(&a, Priority::Low, 1);
        let high_late = task(&a, Priority::High, 5);
        let high_early = task(&a, Priority::High, 2);
        let future = task(&a, Priority::High, 100);
        for t in [&low_early, &high_late, &high_early, &future] {
            storage.insert_task(t).unwrap();
        }
        let due = storage.due_tasks(10, 10).unwrap();
        let ids: Vec<_> = due.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![high_early.id, high_late.id, low_early.id]);
        assert_eq!(storage.due_tasks(10, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_task_transitions_are_conditional() {
        let storage = InMemoryStorage::new();
        let t = task(&ActorId::new(), Priority::High, 0);
        storage.insert_task(&t).unwrap();
        assert!(storage.complete_task(&t.id, 5).unwrap());
        assert!(!storage.complete_task(&t.id, 6).unwrap());
        assert!(!storage.fail_task(&t.id, 6, "late").unwrap());
        assert!(!storage.requeue_task(&t.id, 9).unwrap());
        assert!(storage
            .has_completed(&t.actor_id, &t.target_id, ActionKind::Vote)
            .unwrap());
    }

    #[test]
    fn test_mark_respects_ttl() {
        let storage = InMemoryStorage::new();
        assert!(storage.try_mark("view:c:u", 0, 10).unwrap());
        assert!(!storage.try_mark("view:c:u", 9, 10).unwrap());
        assert!(storage.try_mark("view:c:u", 10, 10).unwrap());
        assert_eq!(storage.purge_expired_marks(100).unwrap(), 1);
    }

    #[test]
    fn test_identity_pairing_is_exclusive() {
        let storage = InMemoryStorage::new();
        let a = Actor::new("calm_elk10", true, 0);
        let b = Actor::new("calm_elk11", true, 0);
        storage.try_insert_actor(&a).unwrap();
        storage.try_insert_actor(&b).unwrap();
        let i = IdentityAsset {
            id: IdentityId::new(),
            url: "https://cdn/x.png".into(),
            assigned_to: None,
        };
        storage.insert_identity(&i).unwrap();
        assert!(storage.assign_identity(&a.id, &i.id).unwrap());
        assert!(!storage.assign_identity(&b.id, &i.id).unwrap());
        assert_eq!(storage.reset_identities().unwrap(), 1);
        assert!(storage.assign_identity(&b.id, &i.id).unwrap());
    }
}
