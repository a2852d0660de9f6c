//! Wire types of the admin and ingest surface.
//!
//! Request bodies carry raw strings; handlers run them through the id parsers
//! before touching any service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};
use crate::events::DomainEvent;
use crate::ids::{ActorId, ContentId, CuratorId, TaskId};
use crate::model::{ActorStatus, RatingCategory};
use crate::popularity::InteractionKind;
use crate::tiers::Tier;

/// Envelope returned by every admin route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Payload, absent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> AdminResponse<T> {
    /// Successful envelope carrying `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failed envelope without data.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Bulk actor generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateActorsRequest {
    /// Number of actors to create.
    pub count: usize,
}

/// Result of a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Actors inserted.
    pub created: usize,
    /// How many of them may vote.
    pub vote_eligible: usize,
    /// Handles that fell back to the timestamp form.
    pub fallback_handles: usize,
}

/// Identity pairing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionSummary {
    /// Actors without an identity.
    pub candidates: usize,
    /// Free identity assets.
    pub available: usize,
    /// Pairs made.
    pub assigned: usize,
    /// Pairs lost to a concurrent assignment.
    pub failed: usize,
}

/// Identity reset followed by a fresh pairing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetSummary {
    /// Identities released.
    pub cleared: usize,
    /// Redistribution run right after the reset.
    pub distribution: DistributionSummary,
}

/// One health sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepSummary {
    /// Actors looked at.
    pub evaluated: usize,
    /// Recently active.
    pub healthy: usize,
    /// Nudged this sweep.
    pub reactivated: usize,
    /// Moved to inactive.
    pub demoted: usize,
    /// Not active, left alone.
    pub skipped: usize,
    /// Evaluations that hit a storage error.
    pub errors: usize,
    /// Active actors once the sweep finished.
    pub active: u64,
    /// Inactive actors once the sweep finished.
    pub inactive: u64,
    /// Pool label once the sweep finished, see [`crate::health::health_label`].
    pub label: String,
}

/// Read-only view of the actor pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    /// All stored actors.
    pub total: u64,
    /// Active actors.
    pub active: u64,
    /// Inactive actors.
    pub inactive: u64,
    /// Dead actors.
    pub dead: u64,
    /// `active / total`, 0 when empty.
    pub active_ratio: f64,
    /// See [`crate::health::health_label`].
    pub label: String,
}

/// One task-queue tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickSummary {
    /// Due tasks claimed.
    pub claimed: usize,
    /// Side effect applied.
    pub executed: usize,
    /// Already applied earlier, completed without repeating it.
    pub duplicates: usize,
    /// Execution errors.
    pub failed: usize,
}

/// Result of a manual resubmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResubmitResponse {
    /// Resubmitted task.
    pub task_id: TaskId,
    /// New due time.
    pub scheduled_for_ms: i64,
}

/// One engagement boost against a content item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoostSummary {
    /// Real activity score at boost time.
    pub activity_score: u64,
    /// Quality multiplier applied.
    pub multiplier: f64,
    /// Tiers after rescaling.
    pub tiers: Vec<Tier>,
    /// Tasks enqueued.
    pub scheduled: usize,
    /// Requested minus scheduled, when the eligible pool ran dry.
    pub shortfall: usize,
}

/// One reference distribution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceSummary {
    /// Vote-eligible actors considered.
    pub actors: usize,
    /// References recorded.
    pub assignments: usize,
    /// Like tasks in the bursts.
    pub likes_scheduled: usize,
    /// Actors with no artifact left to take.
    pub skipped: usize,
}

/// Curated queue insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    /// Content this refers to.
    pub content_id: String,
    /// Promote in the next batch regardless of order.
    #[serde(default)]
    pub force_today: bool,
}

/// `?limit=` for previews and leaderboards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitQuery {
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

/// Daily publish trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Override of the daily batch size.
    pub limit: Option<usize>,
}

/// Items promoted by one publish run, in publication order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishSummary {
    /// Promoted content, in order.
    pub published: Vec<ContentId>,
    /// UTC midnight of the batch day.
    pub batch_date_ms: i64,
}

/// Manual decay trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayRequest {
    /// Override of the configured decay step.
    pub step: Option<u32>,
}

/// One decay pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecaySummary {
    /// Items whose score went down.
    pub decayed: usize,
    /// Items that reached zero.
    pub deactivated: usize,
}

/// Outcome of a dedup-gated interaction bump.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InteractionOutcome {
    /// Counter incremented; life score after the bump (when active).
    Counted { life_score: Option<u32> },
    /// Same source already counted inside the window.
    Deduplicated,
}

/// Row of the popularity leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Content this refers to.
    pub content_id: ContentId,
    /// Display title.
    pub title: String,
    /// Current life score.
    pub life_score: u32,
    /// When the item entered the popular feed.
    pub published_ms: Option<i64>,
}

/// Acknowledgement of an accepted event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAck {
    /// Event type tag.
    pub kind: String,
    /// Content this refers to.
    pub content_id: ContentId,
}

/// Returned by force-activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForceActivityResponse {
    /// Actor this refers to.
    pub actor_id: ActorId,
    /// Counter after the forced activity.
    pub activity_count: u64,
}

/// `GET /v1/admin/actors` filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorsQuery {
    /// Only actors in this status when set.
    pub status: Option<ActorStatus>,
    /// Only vote-eligible actors when set.
    pub can_vote: Option<bool>,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

/// Content mirror pushed by the content service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentIngest {
    /// Content id.
    pub id: String,
    /// Owning user id.
    pub owner_id: String,
    /// Display title.
    pub title: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional category.
    #[serde(default)]
    pub category: Option<String>,
    /// Publish time, defaults to now.
    #[serde(default)]
    pub published_ms: Option<i64>,
    /// Secondary artifact ids of this content.
    #[serde(default)]
    pub artifact_ids: Vec<String>,
    /// Also start the engagement pipeline.
    #[serde(default)]
    pub publish: bool,
}

/// Curator profile upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorIngest {
    /// Curator id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Influence weight.
    pub weight: f64,
    /// Topics this curator reviews.
    #[serde(default)]
    pub specializations: Vec<String>,
    /// Inactive curators are never asked for reviews.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Curator rating submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingIngest {
    /// Rating curator.
    pub curator_id: String,
    /// Content this refers to.
    pub content_id: String,
    /// Overall opinion.
    pub overall: RatingCategory,
    /// Optional per-aspect opinions.
    #[serde(default)]
    pub aspects: BTreeMap<String, RatingCategory>,
    /// Within the allowed confidence range.
    pub confidence: f64,
}

/// New identity asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityIngest {
    /// Public location of the asset.
    pub url: String,
}

/// Raw event body; ids are validated by [`EventRequest::parse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventRequest {
    /// See [`DomainEvent::ContentPublished`].
    ContentPublished {
        /// Raw content id.
        content_id: String,
    },
    /// See [`DomainEvent::ContentRetracted`].
    ContentRetracted {
        /// Raw content id.
        content_id: String,
    },
    /// See [`DomainEvent::RatingSubmitted`].
    RatingSubmitted {
        /// Raw content id.
        content_id: String,
        /// Raw curator id.
        curator_id: String,
    },
    /// See [`DomainEvent::Interaction`].
    Interaction {
        /// Interaction type.
        kind: InteractionKind,
        /// Raw content id.
        content_id: String,
        /// Fingerprint of the interacting client.
        source: String,
    },
}

impl EventRequest {
    /// Validates every id and builds the domain event.
    pub fn parse(self) -> Result<DomainEvent> {
        Ok(match self {
            Self::ContentPublished { content_id } => DomainEvent::ContentPublished {
                content_id: ContentId::parse(&content_id)?,
            },
            Self::ContentRetracted { content_id } => DomainEvent::ContentRetracted {
                content_id: ContentId::parse(&content_id)?,
            },
            Self::RatingSubmitted {
                content_id,
                curator_id,
            } => DomainEvent::RatingSubmitted {
                content_id: ContentId::parse(&content_id)?,
                curator_id: CuratorId::parse(&curator_id)?,
            },
            Self::Interaction {
                kind,
                content_id,
                source,
            } => {
                let source = source.trim().to_string();
                if source.is_empty() {
                    return Err(PulseError::Validation("interaction source is empty".into()));
                }
                DomainEvent::Interaction {
                    kind,
                    content_id: ContentId::parse(&content_id)?,
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_omits_data() {
        let r: AdminResponse<TickSummary> = AdminResponse::fail("boom");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["success"], false);
        assert!(v.get("data").is_none());
    }

    #[test]
    fn interaction_outcome_is_tagged() {
        let v = serde_json::to_value(InteractionOutcome::Deduplicated).unwrap();
        assert_eq!(v["outcome"], "deduplicated");
    }

    #[test]
    fn event_request_validates_ids() {
        let ok: EventRequest = serde_json::from_str(
            r#"{"type":"content_published","content_id":"content:01HX"}"#,
        )
        .unwrap();
        match ok.parse().unwrap() {
            DomainEvent::ContentPublished { content_id } => assert_eq!(content_id.as_str(), "01HX"),
            other => panic!("unexpected {other:?}"),
        }

        let bad: EventRequest =
            serde_json::from_str(r#"{"type":"content_retracted","content_id":"a b"}"#).unwrap();
        assert!(matches!(bad.parse(), Err(PulseError::Validation(_))));

        let blank = EventRequest::Interaction {
            kind: InteractionKind::View,
            content_id: "c1".into(),
            source: "   ".into(),
        };
        assert!(blank.parse().is_err());
    }

    #[test]
    fn curator_ingest_defaults_active() {
        let c: CuratorIngest =
            serde_json::from_str(r#"{"id":"cur1","name":"Ana","weight":1.5}"#).unwrap();
        assert!(c.active);
        assert!(c.specializations.is_empty());
    }
}
