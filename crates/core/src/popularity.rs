//! Life-score arithmetic, interaction dedup keys and curated queue order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ids::ContentId;
use crate::model::CuratedQueueItem;

/// Genuine interaction that bumps an active item's life score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// View.
    View,
    /// Save.
    Save,
    /// Share.
    Share,
    /// Like on a secondary artifact.
    SecondaryLike,
}

impl InteractionKind {
    /// Stable name used in dedup keys and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Save => "save",
            Self::Share => "share",
            Self::SecondaryLike => "secondary_like",
        }
    }

    /// Inverse of [`Self::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "save" => Some(Self::Save),
            "share" => Some(Self::Share),
            "secondary_like" => Some(Self::SecondaryLike),
            _ => None,
        }
    }
}

/// Adds `bonus`, saturating at `max`.
pub fn bump_life(score: u32, bonus: u32, max: u32) -> u32 {
    score.saturating_add(bonus).min(max)
}

/// Subtracts `step`, saturating at zero.
pub fn decay_life(score: u32, step: u32) -> u32 {
    score.saturating_sub(step)
}

/// Key under which one `(kind, content, source)` interaction is deduplicated.
pub fn dedup_key(kind: InteractionKind, content: &ContentId, source: &str) -> String {
    format!("{}:{}:{}", kind.as_str(), content, source)
}

/// Publication order: forced items first, then oldest enqueue.
pub fn queue_order(a: &CuratedQueueItem, b: &CuratedQueueItem) -> Ordering {
    b.force_today
        .cmp(&a.force_today)
        .then(a.enqueued_ms.cmp(&b.enqueued_ms))
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::QueueItemId;
    use crate::model::QueueStatus;

    fn item(content: &str, force: bool, enqueued: i64) -> CuratedQueueItem {
        CuratedQueueItem {
            id: QueueItemId::new(),
            content_id: ContentId::parse(content).unwrap(),
            status: QueueStatus::Queued,
            force_today: force,
            enqueued_ms: enqueued,
            published_ms: None,
        }
    }

    #[test]
    fn life_score_stays_within_bounds() {
        assert_eq!(bump_life(195, 8, 200), 200);
        assert_eq!(bump_life(u32::MAX, 1, 200), 200);
        assert_eq!(decay_life(3, 5), 0);
        assert_eq!(decay_life(100, 5), 95);
    }

    #[test]
    fn decay_sequence_reaches_zero() {
        let mut s = 12;
        let mut seen = vec![];
        for _ in 0..3 {
            s = decay_life(s, 5);
            seen.push(s);
        }
        assert_eq!(seen, vec![7, 2, 0]);
    }

    #[test]
    fn forced_items_jump_the_queue() {
        let a = item("a", false, 1);
        let b = item("b", true, 2);
        let c = item("c", false, 0);
        let mut q = vec![a, b, c];
        q.sort_by(queue_order);
        let order: Vec<_> = q.iter().map(|i| i.content_id.as_str().to_string()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn dedup_key_separates_kinds_and_sources() {
        let c = ContentId::parse("c1").unwrap();
        assert_ne!(
            dedup_key(InteractionKind::View, &c, "u1"),
            dedup_key(InteractionKind::Save, &c, "u1")
        );
        assert_ne!(
            dedup_key(InteractionKind::View, &c, "u1"),
            dedup_key(InteractionKind::View, &c, "u2")
        );
        assert_eq!(
            InteractionKind::from_str_opt(InteractionKind::SecondaryLike.as_str()),
            Some(InteractionKind::SecondaryLike)
        );
    }
}
