use pulse_core::model::{
    Actor, ActorStatus, Artifact, Content, CuratedQueueItem, Curator, CuratorRating,
    IdentityAsset, Notification, PipelineStage, QualitySnapshot, ReferenceAssignment,
    ReviewRequest, StageStatus, Task, TaskCounts, TaskStatus,
};
use pulse_core::model::{ActionKind, TargetKind};
use pulse_core::popularity::InteractionKind;
use pulse_core::{
    ActorId, ArtifactId, ContentId, CuratorId, EpochMs, IdentityId, QueueItemId, StageId, TargetId,
    TaskId, UserId,
};

/// Filter for actor listings. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ActorFilter {
    pub status: Option<ActorStatus>,
    pub can_vote: Option<bool>,
    pub limit: Option<usize>,
}

impl ActorFilter {
    pub fn matches(&self, a: &Actor) -> bool {
        self.status.map_or(true, |s| a.status == s) && self.can_vote.map_or(true, |v| a.can_vote == v)
    }
}

/// Actor totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorCounts {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub dead: u64,
    pub vote_eligible: u64,
}

/// Outcome of one decay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayOutcome {
    pub decayed: usize,
    pub deactivated: usize,
}

/// Fields written on a queue item and its content when it is published.
#[derive(Debug, Clone, Copy)]
pub struct PublishStamp {
    pub now: EpochMs,
    pub batch_date_ms: EpochMs,
    pub start_life_score: u32,
}

/// Durable state of the engine.
///
/// Every status transition is conditional on the current status and reports
/// whether it applied, so overlapping job runs degrade to no-ops.
pub trait Storage: Send + Sync {
    // actors
    /// Inserts unless the handle is taken; `false` on collision.
    fn try_insert_actor(&self, actor: &Actor) -> anyhow::Result<bool>;
    fn get_actor(&self, id: &ActorId) -> anyhow::Result<Option<Actor>>;
    fn list_actors(&self, filter: &ActorFilter) -> anyhow::Result<Vec<Actor>>;
    /// Active actors whose last activity is unset or strictly before `cutoff`.
    fn eligible_actors(&self, cutoff: EpochMs) -> anyhow::Result<Vec<Actor>>;
    fn actor_counts(&self) -> anyhow::Result<ActorCounts>;
    /// `last_activity = now`, `activity_count += 1`.
    fn record_activity(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<bool>;
    /// Active actors only: `reactivation_attempts += 1`, `last_activity = now`.
    fn record_reactivation(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<bool>;
    /// Active → inactive, storing the final attempt count.
    fn demote_actor(&self, id: &ActorId, attempts: u32) -> anyhow::Result<bool>;
    /// Unconditional revive: active, counter reset, activity recorded.
    fn force_activity(&self, id: &ActorId, now: EpochMs) -> anyhow::Result<Option<Actor>>;

    // identities
    fn insert_identity(&self, asset: &IdentityAsset) -> anyhow::Result<()>;
    fn unassigned_identities(&self) -> anyhow::Result<Vec<IdentityAsset>>;
    /// Pairs both sides iff both are unassigned.
    fn assign_identity(&self, actor: &ActorId, identity: &IdentityId) -> anyhow::Result<bool>;
    fn unassign_identity(&self, identity: &IdentityId) -> anyhow::Result<bool>;
    /// Clears every pairing; returns the number of identities released.
    fn reset_identities(&self) -> anyhow::Result<usize>;

    // tasks
    fn insert_task(&self, task: &Task) -> anyhow::Result<()>;
    fn get_task(&self, id: &TaskId) -> anyhow::Result<Option<Task>>;
    fn list_tasks(&self, status: Option<TaskStatus>) -> anyhow::Result<Vec<Task>>;
    /// Pending with `scheduled_for <= now`, priority desc then schedule asc.
    fn due_tasks(&self, now: EpochMs, limit: usize) -> anyhow::Result<Vec<Task>>;
    fn has_completed(
        &self,
        actor: &ActorId,
        target: &TargetId,
        action: ActionKind,
    ) -> anyhow::Result<bool>;
    /// Pending → completed.
    fn complete_task(&self, id: &TaskId, now: EpochMs) -> anyhow::Result<bool>;
    /// Pending → failed, `attempts += 1`, error stored.
    fn fail_task(&self, id: &TaskId, now: EpochMs, error: &str) -> anyhow::Result<bool>;
    /// Failed → pending at `scheduled_for`.
    fn requeue_task(&self, id: &TaskId, scheduled_for: EpochMs) -> anyhow::Result<bool>;
    fn task_counts(&self) -> anyhow::Result<TaskCounts>;

    // content
    fn upsert_content(&self, content: &Content) -> anyhow::Result<()>;
    fn get_content(&self, id: &ContentId) -> anyhow::Result<Option<Content>>;
    fn set_retracted(&self, id: &ContentId) -> anyhow::Result<bool>;
    fn set_quality(&self, id: &ContentId, snapshot: &QualitySnapshot) -> anyhow::Result<bool>;
    fn increment_stat(&self, id: &ContentId, kind: InteractionKind) -> anyhow::Result<bool>;

    // artifacts
    fn upsert_artifact(&self, artifact: &Artifact) -> anyhow::Result<()>;
    fn get_artifact(&self, id: &ArtifactId) -> anyhow::Result<Option<Artifact>>;
    /// Artifacts of non-retracted content published at or after `since`, newest first.
    fn recent_artifacts(&self, since: EpochMs, limit: usize) -> anyhow::Result<Vec<Artifact>>;
    fn increment_artifact_likes(&self, id: &ArtifactId) -> anyhow::Result<bool>;

    // curators
    fn upsert_curator(&self, curator: &Curator) -> anyhow::Result<()>;
    fn get_curator(&self, id: &CuratorId) -> anyhow::Result<Option<Curator>>;
    fn list_curators(&self) -> anyhow::Result<Vec<Curator>>;
    /// One rating per (curator, content); a resubmission replaces it.
    fn upsert_rating(&self, rating: &CuratorRating) -> anyhow::Result<()>;
    fn ratings_for(&self, content: &ContentId) -> anyhow::Result<Vec<CuratorRating>>;
    fn insert_review_request(&self, req: &ReviewRequest) -> anyhow::Result<()>;
    fn review_requests_for(&self, content: &ContentId) -> anyhow::Result<Vec<ReviewRequest>>;

    // references
    fn insert_reference(&self, r: &ReferenceAssignment) -> anyhow::Result<()>;
    fn list_references(&self) -> anyhow::Result<Vec<ReferenceAssignment>>;

    // curated queue and popularity
    /// `false` when the content already has a queue item.
    fn insert_queue_item(&self, item: &CuratedQueueItem) -> anyhow::Result<bool>;
    fn get_queue_item(&self, content: &ContentId) -> anyhow::Result<Option<CuratedQueueItem>>;
    /// Queued items, force-today first, then oldest enqueue.
    fn queued_items(&self, limit: usize) -> anyhow::Result<Vec<CuratedQueueItem>>;
    fn set_force_today(&self, content: &ContentId, flag: bool) -> anyhow::Result<bool>;
    /// Deletes the item only while still queued.
    fn remove_queued_item(&self, content: &ContentId) -> anyhow::Result<bool>;
    /// Queued → published, activating popularity on the content row.
    fn publish_queue_item(&self, id: &QueueItemId, stamp: PublishStamp) -> anyhow::Result<bool>;
    /// Lowers active scores by `step`; active items left at zero are deactivated.
    fn decay_popularity(&self, step: u32) -> anyhow::Result<DecayOutcome>;
    /// Bumps an active item's life score; `None` when not active.
    fn bump_life(&self, id: &ContentId, bonus: u32, max: u32) -> anyhow::Result<Option<u32>>;
    fn deactivate_popularity(&self, id: &ContentId) -> anyhow::Result<bool>;
    /// Active items by life score desc, then publish time desc.
    fn leaderboard(&self, limit: usize) -> anyhow::Result<Vec<Content>>;

    // dedup markers
    /// Sets `key` unless an unexpired marker exists; `true` when set.
    fn try_mark(&self, key: &str, now: EpochMs, ttl_ms: EpochMs) -> anyhow::Result<bool>;
    fn purge_expired_marks(&self, now: EpochMs) -> anyhow::Result<usize>;

    // pipeline stages
    /// Inserts all stages unless the content already has any.
    fn insert_stages_if_absent(
        &self,
        content: &ContentId,
        stages: &[PipelineStage],
    ) -> anyhow::Result<bool>;
    /// Pending stages due at `now`, moved to running.
    fn claim_due_stages(&self, now: EpochMs, limit: usize) -> anyhow::Result<Vec<PipelineStage>>;
    /// Running → `status`.
    fn finish_stage(
        &self,
        id: &StageId,
        status: StageStatus,
        error: Option<&str>,
        now: EpochMs,
    ) -> anyhow::Result<bool>;
    fn cancel_pending_stages(&self, content: &ContentId, now: EpochMs) -> anyhow::Result<usize>;
    fn stages_for(&self, content: &ContentId) -> anyhow::Result<Vec<PipelineStage>>;

    // action ledger
    /// `false` when the (actor, target, kind) action already exists.
    fn record_action(
        &self,
        actor: &ActorId,
        target_kind: TargetKind,
        target: &TargetId,
        kind: ActionKind,
        now: EpochMs,
    ) -> anyhow::Result<bool>;
    fn has_action(&self, actor: &ActorId, target: &TargetId, kind: ActionKind) -> anyhow::Result<bool>;

    // notifications
    fn insert_notification(&self, n: &Notification) -> anyhow::Result<()>;
    fn notifications_for(&self, recipient: &UserId) -> anyhow::Result<Vec<Notification>>;
}
