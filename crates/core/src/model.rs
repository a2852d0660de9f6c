//! Domain records persisted by the stores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::*;
use crate::time::EpochMs;

/// Lifecycle status of a synthetic actor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    /// Active.
    Active,
    /// Stopped nudging after repeated failed evaluations.
    Inactive,
    /// Retired for good.
    Dead,
}

/// A synthetic identity able to perform social actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    /// Identifier.
    pub id: ActorId,
    /// Unique public handle.
    pub handle: String,
    /// Only a bounded top-K subset may vote.
    pub can_vote: bool,
    /// Exclusive 1:1 visual identity.
    pub identity_id: Option<IdentityId>,
    /// Last executed task, if any.
    pub last_activity_ms: Option<EpochMs>,
    /// Tasks executed so far.
    pub activity_count: u64,
    /// Lifecycle status.
    pub status: ActorStatus,
    /// Failed health evaluations since the last forced activity.
    pub reactivation_attempts: u32,
    /// Creation time.
    pub created_ms: EpochMs,
}

impl Actor {
    /// Fresh active actor with no history.
    pub fn new(handle: impl Into<String>, can_vote: bool, now: EpochMs) -> Self {
        Self {
            id: ActorId::new(),
            handle: handle.into(),
            can_vote,
            identity_id: None,
            last_activity_ms: None,
            activity_count: 0,
            status: ActorStatus::Active,
            reactivation_attempts: 0,
            created_ms: now,
        }
    }
}

/// Social action a task performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Weighted vote with optional sub-scores.
    Vote,
    /// Follow the target user.
    Follow,
    /// Like.
    Like,
    /// Comment.
    Comment,
    /// Take a secondary artifact as reference.
    TakeReference,
}

impl ActionKind {
    /// Stable string form used by storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::Follow => "follow",
            Self::Like => "like",
            Self::Comment => "comment",
            Self::TakeReference => "take_reference",
        }
    }

    /// Inverse of [`ActionKind::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "vote" => Self::Vote,
            "follow" => Self::Follow,
            "like" => Self::Like,
            "comment" => Self::Comment,
            "take_reference" => Self::TakeReference,
            _ => return None,
        })
    }

    /// Fixed priority table: vote→high, follow/like→medium, the rest low.
    pub fn priority(self) -> Priority {
        match self {
            Self::Vote => Priority::High,
            Self::Follow | Self::Like => Priority::Medium,
            Self::Comment | Self::TakeReference => Priority::Low,
        }
    }
}

/// What a task's target id refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A content item.
    Content,
    /// A secondary artifact of a content item.
    SecondaryArtifact,
    /// A platform user.
    User,
}

impl TargetKind {
    /// Stable string form used by storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::SecondaryArtifact => "secondary_artifact",
            Self::User => "user",
        }
    }

    /// Inverse of [`TargetKind::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "content" => Self::Content,
            "secondary_artifact" => Self::SecondaryArtifact,
            "user" => Self::User,
            _ => return None,
        })
    }

    /// Actions an actor may draw for this kind of target.
    pub fn action_set(self) -> &'static [ActionKind] {
        match self {
            Self::Content => &[ActionKind::Vote, ActionKind::Follow],
            Self::SecondaryArtifact => &[
                ActionKind::Like,
                ActionKind::Comment,
                ActionKind::TakeReference,
            ],
            Self::User => &[ActionKind::Follow],
        }
    }
}

/// Task scheduling priority. Ordering is `Low < Medium < High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
}

impl Priority {
    /// Numeric rank, higher runs first.
    pub fn rank(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Inverse of [`Priority::rank`]; out-of-range values clamp.
    pub fn from_rank(rank: i64) -> Self {
        match rank {
            r if r >= 2 => Self::High,
            1 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Task status. `Failed` is terminal until re-submitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its due time.
    Pending,
    /// Side effect applied.
    Completed,
    /// Execution error recorded.
    Failed,
}

impl TaskStatus {
    /// Stable string form used by storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Inverse of [`TaskStatus::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }
}

/// Optional per-action payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Numeric sub-scores of a vote, keyed by aspect.
    VoteScores { scores: BTreeMap<String, u8> },
    /// Comment body.
    Comment { body: String },
}

/// One scheduled social action for one actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Identifier.
    pub id: TaskId,
    /// Who performs the action.
    pub actor_id: ActorId,
    /// Action to perform.
    pub action: ActionKind,
    /// What `target_id` refers to.
    pub target_kind: TargetKind,
    /// Target entity id.
    pub target_id: TargetId,
    /// Due time.
    pub scheduled_for_ms: EpochMs,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Execution attempts.
    pub attempts: u32,
    /// Time of the last attempt.
    pub last_attempt_ms: Option<EpochMs>,
    /// Last execution error.
    pub error: Option<String>,
    /// Claim priority.
    pub priority: Priority,
    /// Action-specific data.
    pub payload: Option<ActionPayload>,
    /// Creation time.
    pub created_ms: EpochMs,
    /// Completion time, if completed.
    pub completed_ms: Option<EpochMs>,
}

/// Aggregate task counts by status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCounts {
    /// Tasks waiting to run.
    pub pending: u64,
    /// Tasks done.
    pub completed: u64,
    /// Tasks that errored.
    pub failed: u64,
}

/// Human curator profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Curator {
    /// Identifier.
    pub id: CuratorId,
    /// Display name.
    pub name: String,
    /// Influence weight, kept within [`CURATOR_WEIGHT_MIN`, `CURATOR_WEIGHT_MAX`].
    pub weight: f64,
    /// Topics this curator reviews.
    pub specializations: Vec<String>,
    /// Only active curators get review requests.
    pub active: bool,
}

/// Lower bound of a curator's weight.
pub const CURATOR_WEIGHT_MIN: f64 = 0.1;
/// Upper bound of a curator's weight.
pub const CURATOR_WEIGHT_MAX: f64 = 3.0;
/// Lower bound of a rating's confidence.
pub const CONFIDENCE_MIN: f64 = 0.1;
/// Upper bound of a rating's confidence.
pub const CONFIDENCE_MAX: f64 = 1.0;

/// Categorical curator opinion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RatingCategory {
    /// Excellent.
    Excellent,
    /// Good.
    Good,
    /// Neutral.
    Neutral,
    /// Bad.
    Bad,
    /// Very bad.
    VeryBad,
}

impl RatingCategory {
    /// Fixed categorical→numeric table.
    pub fn score(self) -> f64 {
        match self {
            Self::Excellent => 1.5,
            Self::Good => 1.2,
            Self::Neutral => 1.0,
            Self::Bad => 0.7,
            Self::VeryBad => 0.5,
        }
    }
}

/// A submitted curator rating. Read-only input to aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CuratorRating {
    /// Rating curator.
    pub curator_id: CuratorId,
    /// Content this refers to.
    pub content_id: ContentId,
    /// Overall opinion.
    pub overall: RatingCategory,
    /// Optional per-aspect opinions.
    #[serde(default)]
    pub aspects: BTreeMap<String, RatingCategory>,
    /// How sure the curator is.
    pub confidence: f64,
    /// Submission time.
    pub submitted_ms: EpochMs,
}

/// Auditable result of the last multiplier computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualitySnapshot {
    /// Confidence and weight adjusted average score.
    pub weighted_score: f64,
    /// Bounded multiplier derived from the score.
    pub multiplier: f64,
    /// Ratings that contributed.
    pub rater_count: u32,
    /// Quality label.
    pub label: String,
    /// Per-aspect averages.
    #[serde(default)]
    pub aspects: BTreeMap<String, f64>,
    /// Computation time.
    pub computed_ms: EpochMs,
}

/// Raw genuine-interaction counters of a content item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentStats {
    /// Page views.
    pub views: u64,
    /// Saves.
    pub saves: u64,
    /// Shares.
    pub shares: u64,
    /// Likes on secondary artifacts.
    pub secondary_likes: u64,
}

/// Popularity lifecycle state embedded in content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopularityState {
    /// Current score, zero when never promoted.
    pub life_score: u32,
    /// In the popular feed.
    pub active: bool,
    /// Day of the batch that promoted it.
    pub batch_date_ms: Option<EpochMs>,
    /// Promotion time.
    pub published_ms: Option<EpochMs>,
    /// When it entered the curated queue.
    pub queued_ms: Option<EpochMs>,
}

/// Mirror of a published content entity owned by the content service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// Identifier.
    pub id: ContentId,
    /// Owning platform user.
    pub owner_id: UserId,
    /// Display title.
    pub title: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional category.
    #[serde(default)]
    pub category: Option<String>,
    /// Publish time.
    pub published_ms: EpochMs,
    /// Pulled by its owner; every pending stage is cancelled.
    #[serde(default)]
    pub retracted: bool,
    /// Genuine interaction counters.
    #[serde(default)]
    pub stats: ContentStats,
    /// Last multiplier computation.
    #[serde(default)]
    pub quality: Option<QualitySnapshot>,
    /// Popularity.
    #[serde(default)]
    pub popularity: PopularityState,
}

impl Content {
    /// New content with zeroed counters and no lifecycle state.
    pub fn new(owner_id: UserId, title: impl Into<String>, now: EpochMs) -> Self {
        Self {
            id: ContentId::new(),
            owner_id,
            title: title.into(),
            tags: Vec::new(),
            category: None,
            published_ms: now,
            retracted: false,
            stats: ContentStats::default(),
            quality: None,
            popularity: PopularityState::default(),
        }
    }

    /// Current multiplier, neutral when never computed.
    pub fn multiplier(&self) -> f64 {
        self.quality.as_ref().map(|q| q.multiplier).unwrap_or(1.0)
    }
}

/// Secondary artifact (e.g. an individual image) of a content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// Identifier.
    pub id: ArtifactId,
    /// Parent content.
    pub content_id: ContentId,
    /// Owning user.
    pub owner_id: UserId,
    /// Likes applied by executed tasks.
    pub like_count: u64,
    /// Creation time.
    pub created_ms: EpochMs,
}

/// Status of a curated queue entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for a batch.
    Queued,
    /// Promoted.
    Published,
}

/// Curated backlog entry awaiting promotion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CuratedQueueItem {
    /// Identifier.
    pub id: QueueItemId,
    /// Content this refers to.
    pub content_id: ContentId,
    /// Lifecycle status.
    pub status: QueueStatus,
    /// Jump the queue in the next batch.
    pub force_today: bool,
    /// Queue insertion time.
    pub enqueued_ms: EpochMs,
    /// Promotion time, if published.
    pub published_ms: Option<EpochMs>,
}

/// Visual identity asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityAsset {
    /// Identifier.
    pub id: IdentityId,
    /// Public location of the asset.
    pub url: String,
    /// Holder, at most one.
    pub assigned_to: Option<ActorId>,
}

/// Append-only record of an actor taking a secondary artifact as reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceAssignment {
    /// Actor this refers to.
    pub actor_id: ActorId,
    /// Content this refers to.
    pub content_id: ContentId,
    /// Artifact taken.
    pub artifact_id: ArtifactId,
    /// Assignment time.
    pub assigned_ms: EpochMs,
}

/// Fire-and-forget request for a curator to review content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Identifier.
    pub id: ReviewRequestId,
    /// Content this refers to.
    pub content_id: ContentId,
    /// Asked curator.
    pub curator_id: CuratorId,
    /// Matched topics.
    pub specializations: Vec<String>,
    /// Request time.
    pub requested_ms: EpochMs,
}

/// Step of the post-publish pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Tiered engagement boost.
    InitialBoost,
    /// Curator review requests.
    CuratorReview,
    /// Multiplier recompute and auto-queue.
    MultiplierAdjust,
}

impl StageKind {
    /// Stable string form used by storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialBoost => "initial_boost",
            Self::CuratorReview => "curator_review",
            Self::MultiplierAdjust => "multiplier_adjust",
        }
    }

    /// Inverse of [`StageKind::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "initial_boost" => Self::InitialBoost,
            "curator_review" => Self::CuratorReview,
            "multiplier_adjust" => Self::MultiplierAdjust,
            _ => return None,
        })
    }
}

/// Status of a persisted pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Pending.
    Pending,
    /// Claimed by a runner.
    Running,
    /// Done.
    Done,
    /// Failed.
    Failed,
    /// Content retracted before it ran.
    Cancelled,
}

impl StageStatus {
    /// Stable string form used by storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Inverse of [`StageStatus::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "done" => Self::Done,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }
}

/// Persisted delayed step; replaces in-process timers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineStage {
    /// Identifier.
    pub id: StageId,
    /// Content this refers to.
    pub content_id: ContentId,
    /// Pipeline step.
    pub kind: StageKind,
    /// Earliest run time.
    pub due_ms: EpochMs,
    /// Lifecycle status.
    pub status: StageStatus,
    /// Failure reason.
    pub error: Option<String>,
    /// Creation time.
    pub created_ms: EpochMs,
    /// Completion time, if finished.
    pub finished_ms: Option<EpochMs>,
}

/// Best-effort notification emitted to a platform user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Content owner.
    pub recipient: UserId,
    /// Actor behind the action.
    pub actor: ActorId,
    /// Notification type, e.g. `like`.
    pub kind: String,
    /// Type-specific details.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_ms: EpochMs,
}
