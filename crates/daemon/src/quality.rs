//! Curator-weighted quality multiplier and review requests.

use std::sync::Arc;

use pulse_core::config::QualityConfig;
use pulse_core::model::{Curator, QualitySnapshot, ReviewRequest};
use pulse_core::quality::{infer_specializations, snapshot, weighted_score, WeightedScore};
use pulse_core::{ContentId, EpochMs, PulseError, Result, ReviewRequestId};
use pulse_store::Storage;
use tracing::{info, warn};

use crate::collaborators::CuratorSource;
use crate::rng::SharedRng;

/// Aggregate plus whether it fell back to neutral on a source outage.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub score: WeightedScore,
    pub degraded: bool,
}

pub struct QualityAggregator {
    store: Arc<dyn Storage>,
    curators: Arc<dyn CuratorSource>,
    rng: Arc<SharedRng>,
    cfg: QualityConfig,
}

impl QualityAggregator {
    pub fn new(
        store: Arc<dyn Storage>,
        curators: Arc<dyn CuratorSource>,
        rng: Arc<SharedRng>,
        cfg: QualityConfig,
    ) -> Self {
        Self {
            store,
            curators,
            rng,
            cfg,
        }
    }

    pub fn weighted_score(&self, content: &ContentId) -> Aggregate {
        let fetched = self
            .curators
            .curators()
            .and_then(|c| Ok((c, self.curators.ratings_for(content)?)));
        match fetched {
            Ok((curators, ratings)) => Aggregate {
                score: weighted_score(&curators, &ratings),
                degraded: false,
            },
            Err(e) => {
                warn!(content = %content, "curator source unavailable, using neutral score: {e}");
                Aggregate {
                    score: WeightedScore::neutral(),
                    degraded: true,
                }
            }
        }
    }

    /// Recomputes and persists the snapshot. A degraded aggregate is returned
    /// but not stored, so an outage never overwrites a real snapshot.
    pub fn recompute(&self, content: &ContentId, now: EpochMs) -> Result<QualitySnapshot> {
        if self.store.get_content(content)?.is_none() {
            return Err(PulseError::not_found("content", content));
        }
        let agg = self.weighted_score(content);
        let snap = snapshot(&agg.score, now);
        if !agg.degraded {
            self.store.set_quality(content, &snap)?;
        }
        info!(
            content = %content,
            score = snap.weighted_score,
            multiplier = snap.multiplier,
            raters = snap.rater_count,
            degraded = agg.degraded,
            "quality snapshot"
        );
        Ok(snap)
    }

    /// Asks up to `reviewers_per_content` matching active curators to review.
    /// Returns the curators asked.
    pub fn request_reviews(&self, content: &ContentId, now: EpochMs) -> Result<Vec<Curator>> {
        let c = self
            .store
            .get_content(content)?
            .ok_or_else(|| PulseError::not_found("content", content))?;
        let wanted = infer_specializations(&c.tags, c.category.as_deref(), &c.title);

        let curators = match self.curators.curators() {
            Ok(v) => v,
            Err(e) => {
                warn!(content = %content, "curator source unavailable, no reviews requested: {e}");
                return Ok(Vec::new());
            }
        };
        let mut matching: Vec<Curator> = curators
            .into_iter()
            .filter(|cur| cur.active)
            .filter(|cur| cur.specializations.iter().any(|s| wanted.contains(s)))
            .collect();
        self.rng.shuffle(&mut matching);
        matching.truncate(self.cfg.reviewers_per_content);

        let mut asked = Vec::with_capacity(matching.len());
        for cur in matching {
            let req = ReviewRequest {
                id: ReviewRequestId::new(),
                content_id: content.clone(),
                curator_id: cur.id.clone(),
                specializations: wanted.clone(),
                requested_ms: now,
            };
            match self.store.insert_review_request(&req) {
                Ok(()) => asked.push(cur),
                Err(e) => warn!(curator = %cur.id, content = %content, "review request failed: {e:?}"),
            }
        }
        info!(content = %content, requested = asked.len(), specializations = ?wanted, "reviews requested");
        Ok(asked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollabResult, CollaboratorError, StoreCollaborators};
    use pulse_core::model::{Content, CuratorRating, RatingCategory};
    use pulse_core::{CuratorId, UserId};
    use pulse_store::InMemoryStorage;

    struct Down;

    impl CuratorSource for Down {
        fn curators(&self) -> CollabResult<Vec<Curator>> {
            Err(CollaboratorError::Unavailable("curator service down".into()))
        }
        fn ratings_for(&self, _: &ContentId) -> CollabResult<Vec<CuratorRating>> {
            Err(CollaboratorError::Unavailable("curator service down".into()))
        }
    }

    fn curator(name: &str, weight: f64, specs: &[&str], active: bool) -> Curator {
        Curator {
            id: CuratorId::new(),
            name: name.to_string(),
            weight,
            specializations: specs.iter().map(|s| s.to_string()).collect(),
            active,
        }
    }

    fn rating(c: &Curator, content: &ContentId, overall: RatingCategory) -> CuratorRating {
        CuratorRating {
            curator_id: c.id.clone(),
            content_id: content.clone(),
            overall,
            aspects: Default::default(),
            confidence: 1.0,
            submitted_ms: 0,
        }
    }

    fn setup() -> (Arc<dyn Storage>, QualityAggregator, Content) {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let mut content = Content::new(UserId::parse("owner").unwrap(), "Mobile banking UI", 0);
        content.tags = vec!["ui".into()];
        store.upsert_content(&content).unwrap();
        let agg = QualityAggregator::new(
            store.clone(),
            Arc::new(StoreCollaborators::new(store.clone())),
            Arc::new(SharedRng::seeded(9)),
            QualityConfig::default(),
        );
        (store, agg, content)
    }

    #[test]
    fn excellent_ratings_persist_top_multiplier() {
        let (store, agg, content) = setup();
        let a = curator("ana", 2.0, &["design"], true);
        let b = curator("bo", 1.0, &["design"], true);
        for c in [&a, &b] {
            store.upsert_curator(c).unwrap();
            store
                .upsert_rating(&rating(c, &content.id, RatingCategory::Excellent))
                .unwrap();
        }
        let snap = agg.recompute(&content.id, 42).unwrap();
        assert_eq!(snap.multiplier, 1.5);
        assert_eq!(snap.rater_count, 2);
        let stored = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(stored.quality, Some(snap));
    }

    #[test]
    fn inactive_curators_are_ignored() {
        let (store, agg, content) = setup();
        let gone = curator("gone", 3.0, &["design"], false);
        store.upsert_curator(&gone).unwrap();
        store
            .upsert_rating(&rating(&gone, &content.id, RatingCategory::VeryBad))
            .unwrap();
        let snap = agg.recompute(&content.id, 1).unwrap();
        assert_eq!(snap.multiplier, 1.0);
        assert_eq!(snap.rater_count, 0);
        assert_eq!(snap.label, "unrated");
    }

    #[test]
    fn outage_degrades_to_neutral_without_persisting() {
        let (store, _, content) = setup();
        let agg = QualityAggregator::new(
            store.clone(),
            Arc::new(Down),
            Arc::new(SharedRng::seeded(1)),
            QualityConfig::default(),
        );
        let snap = agg.recompute(&content.id, 1).unwrap();
        assert_eq!(snap.multiplier, 1.0);
        assert!(store.get_content(&content.id).unwrap().unwrap().quality.is_none());
        assert!(agg.request_reviews(&content.id, 1).unwrap().is_empty());
    }

    #[test]
    fn reviews_go_to_at_most_three_matching_curators() {
        let (store, agg, content) = setup();
        for i in 0..5 {
            store
                .upsert_curator(&curator(&format!("d{i}"), 1.0, &["design"], true))
                .unwrap();
        }
        store
            .upsert_curator(&curator("writer", 1.0, &["copywriting"], true))
            .unwrap();
        store
            .upsert_curator(&curator("idle", 1.0, &["design"], false))
            .unwrap();

        let asked = agg.request_reviews(&content.id, 5).unwrap();
        assert_eq!(asked.len(), 3);
        assert!(asked.iter().all(|c| c.active && c.specializations == ["design"]));
        let mut ids: Vec<_> = asked.iter().map(|c| c.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.review_requests_for(&content.id).unwrap().len(), 3);
    }

    #[test]
    fn unknown_content_is_not_found() {
        let (_, agg, _) = setup();
        assert!(matches!(
            agg.recompute(&ContentId::new(), 0),
            Err(PulseError::NotFound { .. })
        ));
    }
}
