//! Integration tests for the core crate.

use std::collections::BTreeMap;

use pulse_core::config::EngineConfig;
use pulse_core::model::{
    ActionKind, ActionPayload, Curator, CuratorRating, Priority, RatingCategory, StageKind,
    TargetKind, TaskStatus,
};
use pulse_core::quality::{multiplier_for, snapshot, weighted_score};
use pulse_core::tiers::{apply_multiplier, real_activity_score, tiers_for};
use pulse_core::{ContentId, CuratorId, PulseError, TargetId};

#[test]
fn test_action_kind_serde() {
    let s = serde_json::to_string(&ActionKind::TakeReference).unwrap();
    assert_eq!(s, r#""take_reference""#);
    let back: ActionKind = serde_json::from_str(&s).unwrap();
    assert_eq!(back, ActionKind::TakeReference);
}

#[test]
fn test_vote_payload_serde() {
    let mut scores = BTreeMap::new();
    scores.insert("design".to_string(), 9u8);
    let p = ActionPayload::VoteScores { scores };
    let v = serde_json::to_value(&p).unwrap();
    assert_eq!(v["type"], "vote_scores");
    assert_eq!(v["scores"]["design"], 9);
}

#[test]
fn test_priority_table() {
    assert_eq!(ActionKind::Vote.priority(), Priority::High);
    assert_eq!(ActionKind::Follow.priority(), Priority::Medium);
    assert_eq!(ActionKind::Like.priority(), Priority::Medium);
    assert_eq!(ActionKind::Comment.priority(), Priority::Low);
    assert_eq!(ActionKind::TakeReference.priority(), Priority::Low);
    assert!(Priority::High > Priority::Low);
}

#[test]
fn test_action_sets_by_target() {
    assert_eq!(
        TargetKind::Content.action_set(),
        &[ActionKind::Vote, ActionKind::Follow]
    );
    assert_eq!(TargetKind::User.action_set(), &[ActionKind::Follow]);
    assert_eq!(TargetKind::SecondaryArtifact.action_set().len(), 3);
}

#[test]
fn test_status_strings_round_trip() {
    for s in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Failed] {
        assert_eq!(TaskStatus::from_str_opt(s.as_str()), Some(s));
    }
    for k in [
        StageKind::InitialBoost,
        StageKind::CuratorReview,
        StageKind::MultiplierAdjust,
    ] {
        assert_eq!(StageKind::from_str_opt(k.as_str()), Some(k));
    }
}

#[test]
fn test_id_boundary() {
    let c = ContentId::parse(" content:01HZX ").unwrap();
    assert_eq!(c.as_str(), "01HZX");
    assert!(matches!(
        ContentId::parse("actor:01HZX"),
        Err(PulseError::Validation(_))
    ));
    assert!(ContentId::parse("").is_err());
    assert!(ContentId::parse("a b").is_err());
    assert!(ContentId::parse(&"x".repeat(65)).is_err());
    let t = TargetId::from(&c);
    assert_eq!(t.as_str(), "01HZX");
}

#[test]
fn test_boost_volume_pipeline() {
    let cfg = EngineConfig::default();
    let stats = pulse_core::model::ContentStats {
        views: 200,
        saves: 10,
        shares: 5,
        secondary_likes: 2,
    };
    // 20 + 20 + 15 + 3
    let score = real_activity_score(&stats);
    assert_eq!(score, 58);
    let tiers = tiers_for(score, &cfg.selection.volume);
    assert_eq!(tiers.len(), 3);

    let curator = Curator {
        id: CuratorId::new(),
        name: "ana".into(),
        weight: 2.0,
        specializations: vec!["design".into()],
        active: true,
    };
    let rating = CuratorRating {
        curator_id: curator.id.clone(),
        content_id: ContentId::new(),
        overall: RatingCategory::Excellent,
        aspects: BTreeMap::new(),
        confidence: 0.9,
        submitted_ms: 1,
    };
    let w = weighted_score(&[curator], &[rating]);
    let snap = snapshot(&w, 7);
    assert_eq!(snap.multiplier, multiplier_for(1.5));
    let scaled = apply_multiplier(
        &tiers,
        snap.multiplier,
        cfg.quality.tier_floor,
        cfg.quality.tier_ceiling,
    );
    for t in scaled {
        assert!(34 <= t.min && t.min <= t.max && t.max <= 349);
    }
}
