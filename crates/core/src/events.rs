//! Domain events flowing one way from ingestion to the services.

use serde::{Deserialize, Serialize};

use crate::ids::{ContentId, CuratorId};
use crate::popularity::InteractionKind;

/// Something that happened outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Content became visible; starts the engagement pipeline.
    ContentPublished {
        /// Published content.
        content_id: ContentId,
    },
    /// Content was taken down.
    ContentRetracted {
        /// Retracted content.
        content_id: ContentId,
    },
    /// A curator rated content; the snapshot should be recomputed.
    RatingSubmitted {
        /// Rated content.
        content_id: ContentId,
        /// Rating author.
        curator_id: CuratorId,
    },
    /// Genuine user interaction.
    Interaction {
        /// Interaction kind.
        kind: InteractionKind,
        /// Target content.
        content_id: ContentId,
        /// Actor id or anonymous fingerprint.
        source: String,
    },
}

impl DomainEvent {
    /// Content the event is about.
    pub fn content_id(&self) -> &ContentId {
        match self {
            Self::ContentPublished { content_id }
            | Self::ContentRetracted { content_id }
            | Self::RatingSubmitted { content_id, .. }
            | Self::Interaction { content_id, .. } => content_id,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentPublished { .. } => "content_published",
            Self::ContentRetracted { .. } => "content_retracted",
            Self::RatingSubmitted { .. } => "rating_submitted",
            Self::Interaction { .. } => "interaction",
        }
    }
}
