//! Weighted curator aggregation and the bounded quality multiplier.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    Curator, CuratorRating, QualitySnapshot, CONFIDENCE_MAX, CONFIDENCE_MIN, CURATOR_WEIGHT_MAX,
    CURATOR_WEIGHT_MIN,
};
use crate::time::EpochMs;

/// Lower bound of [`multiplier_for`].
pub const MULTIPLIER_MIN: f64 = 0.5;
/// Upper bound of [`multiplier_for`].
pub const MULTIPLIER_MAX: f64 = 1.5;

/// Result of a weighted aggregation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeightedScore {
    /// Weighted average score, neutral when nobody rated.
    pub score: f64,
    /// Ratings that contributed.
    pub rater_count: u32,
    /// Per-aspect weighted averages, only for aspects someone rated.
    pub aspects: BTreeMap<String, f64>,
}

impl WeightedScore {
    /// Score used when nobody qualified.
    pub fn neutral() -> Self {
        Self {
            score: 1.0,
            rater_count: 0,
            aspects: BTreeMap::new(),
        }
    }
}

/// Weighted average of ratings from active curators.
///
/// Each rating contributes `curatorWeight * confidence`; ratings from unknown
/// or inactive curators are ignored. A curator rating the same content twice
/// only counts once (latest submission wins).
pub fn weighted_score(curators: &[Curator], ratings: &[CuratorRating]) -> WeightedScore {
    let by_id: BTreeMap<_, _> = curators.iter().map(|c| (&c.id, c)).collect();

    let mut latest: BTreeMap<_, &CuratorRating> = BTreeMap::new();
    for r in ratings {
        match latest.get(&r.curator_id) {
            Some(prev) if prev.submitted_ms > r.submitted_ms => {}
            _ => {
                latest.insert(&r.curator_id, r);
            }
        }
    }

    let mut num = 0.0;
    let mut den = 0.0;
    let mut raters = BTreeSet::new();
    let mut aspect_acc: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for (curator_id, rating) in latest {
        let Some(curator) = by_id.get(curator_id) else {
            continue;
        };
        if !curator.active {
            continue;
        }
        let weight = curator.weight.clamp(CURATOR_WEIGHT_MIN, CURATOR_WEIGHT_MAX);
        let confidence = rating.confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);
        let contribution = weight * confidence;

        num += rating.overall.score() * contribution;
        den += contribution;
        raters.insert(curator_id);

        for (aspect, category) in &rating.aspects {
            let e = aspect_acc.entry(aspect.clone()).or_insert((0.0, 0.0));
            e.0 += category.score() * contribution;
            e.1 += contribution;
        }
    }

    if den <= 0.0 {
        return WeightedScore::neutral();
    }

    WeightedScore {
        score: num / den,
        rater_count: raters.len() as u32,
        aspects: aspect_acc
            .into_iter()
            .map(|(k, (n, d))| (k, n / d))
            .collect(),
    }
}

/// Step function from weighted score to multiplier; monotonic, within [0.5, 1.5].
pub fn multiplier_for(score: f64) -> f64 {
    if score.is_nan() {
        return 1.0;
    }
    if score >= 1.3 {
        1.5
    } else if score >= 1.1 {
        1.25
    } else if score >= 0.9 {
        1.0
    } else if score >= 0.7 {
        0.75
    } else {
        MULTIPLIER_MIN
    }
}

/// Display label of a weighted score.
pub fn quality_label(score: f64, rater_count: u32) -> &'static str {
    if rater_count == 0 {
        return "unrated";
    }
    match multiplier_for(score) {
        m if m >= 1.5 => "exceptional",
        m if m >= 1.25 => "strong",
        m if m >= 1.0 => "standard",
        m if m >= 0.75 => "weak",
        _ => "poor",
    }
}

/// Builds the auditable snapshot for a computed score.
pub fn snapshot(score: &WeightedScore, now: EpochMs) -> QualitySnapshot {
    QualitySnapshot {
        weighted_score: score.score,
        multiplier: multiplier_for(score.score),
        rater_count: score.rater_count,
        label: quality_label(score.score, score.rater_count).to_string(),
        aspects: score.aspects.clone(),
        computed_ms: now,
    }
}

/// Specialization tags inferred from content metadata.
///
/// Keywords found in tags, category or title map onto curator specializations;
/// content with no recognizable keyword maps to `general`.
pub fn infer_specializations(tags: &[String], category: Option<&str>, title: &str) -> Vec<String> {
    const TABLE: &[(&str, &str)] = &[
        ("ui", "design"),
        ("ux", "design"),
        ("design", "design"),
        ("interface", "design"),
        ("web", "design"),
        ("app", "design"),
        ("illustration", "illustration"),
        ("drawing", "illustration"),
        ("art", "illustration"),
        ("painting", "illustration"),
        ("photo", "photography"),
        ("photography", "photography"),
        ("camera", "photography"),
        ("motion", "motion"),
        ("animation", "motion"),
        ("video", "motion"),
        ("3d", "3d"),
        ("render", "3d"),
        ("blender", "3d"),
        ("brand", "branding"),
        ("branding", "branding"),
        ("logo", "branding"),
        ("identity", "branding"),
        ("typography", "typography"),
        ("type", "typography"),
        ("font", "typography"),
        ("code", "development"),
        ("dev", "development"),
        ("frontend", "development"),
    ];

    let mut words: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    if let Some(c) = category {
        words.push(c.to_lowercase());
    }
    words.extend(
        title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase()),
    );

    let mut out = BTreeSet::new();
    for word in &words {
        for (needle, spec) in TABLE {
            if word == needle {
                out.insert(spec.to_string());
            }
        }
    }
    if out.is_empty() {
        out.insert("general".to_string());
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ContentId, CuratorId};
    use crate::model::RatingCategory;

    fn curator(weight: f64, active: bool) -> Curator {
        Curator {
            id: CuratorId::new(),
            name: "c".into(),
            weight,
            specializations: vec!["design".into()],
            active,
        }
    }

    fn rating(c: &Curator, overall: RatingCategory, confidence: f64) -> CuratorRating {
        CuratorRating {
            curator_id: c.id.clone(),
            content_id: ContentId::parse("c1").unwrap(),
            overall,
            aspects: BTreeMap::new(),
            confidence,
            submitted_ms: 0,
        }
    }

    #[test]
    fn multiplier_scenarios() {
        assert_eq!(multiplier_for(1.35), 1.5);
        assert_eq!(multiplier_for(0.65), 0.5);
        assert_eq!(multiplier_for(1.0), 1.0);
        assert_eq!(multiplier_for(1.1), 1.25);
        assert_eq!(multiplier_for(0.7), 0.75);
    }

    #[test]
    fn multiplier_is_monotonic_and_bounded() {
        let mut prev = multiplier_for(-10.0);
        let mut s = -10.0;
        while s < 10.0 {
            let m = multiplier_for(s);
            assert!(m >= prev, "non-monotonic at {s}");
            assert!((MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&m));
            prev = m;
            s += 0.01;
        }
        assert!((MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&multiplier_for(f64::NAN)));
    }

    #[test]
    fn no_ratings_is_neutral() {
        let w = weighted_score(&[], &[]);
        assert_eq!(w.score, 1.0);
        assert_eq!(w.rater_count, 0);
    }

    #[test]
    fn inactive_curators_are_ignored() {
        let a = curator(1.0, false);
        let w = weighted_score(&[a.clone()], &[rating(&a, RatingCategory::Excellent, 1.0)]);
        assert_eq!(w, WeightedScore::neutral());
    }

    #[test]
    fn weights_and_confidence_shape_the_average() {
        let heavy = curator(3.0, true);
        let light = curator(0.1, true);
        let ratings = vec![
            rating(&heavy, RatingCategory::Excellent, 1.0),
            rating(&light, RatingCategory::VeryBad, 1.0),
        ];
        let w = weighted_score(&[heavy, light], &ratings);
        let expected = (1.5 * 3.0 + 0.5 * 0.1) / 3.1;
        assert!((w.score - expected).abs() < 1e-9);
        assert_eq!(w.rater_count, 2);
        assert_eq!(multiplier_for(w.score), 1.5);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let a = curator(50.0, true);
        let b = curator(3.0, true);
        let ratings = vec![
            rating(&a, RatingCategory::Good, 7.0),
            rating(&b, RatingCategory::Bad, 1.0),
        ];
        let w = weighted_score(&[a, b], &ratings);
        // Both clamp to weight 3.0 and confidence 1.0.
        assert!((w.score - (1.2 + 0.7) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn aspects_are_averaged_separately() {
        let a = curator(1.0, true);
        let mut r = rating(&a, RatingCategory::Good, 1.0);
        r.aspects.insert("color".into(), RatingCategory::Excellent);
        let w = weighted_score(&[a], &[r]);
        assert_eq!(w.aspects.get("color"), Some(&1.5));
        let snap = snapshot(&w, 42);
        assert_eq!(snap.multiplier, 1.25);
        assert_eq!(snap.label, "strong");
        assert_eq!(snap.computed_ms, 42);
    }

    #[test]
    fn specializations_fall_back_to_general() {
        let s = infer_specializations(&["UI".into(), "Logo".into()], None, "");
        assert_eq!(s, vec!["branding".to_string(), "design".to_string()]);
        let s = infer_specializations(&[], None, "Untitled");
        assert_eq!(s, vec!["general".to_string()]);
        let s = infer_specializations(&[], Some("Photography"), "Mountain 3D render");
        assert_eq!(s, vec!["3d".to_string(), "photography".to_string()]);
    }
}
