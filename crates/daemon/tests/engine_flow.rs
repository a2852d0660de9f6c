//! End-to-end flows through the wired engine.

use std::sync::Arc;

use pulse_core::api::InteractionOutcome;
use pulse_core::config::EngineConfig;
use pulse_core::events::DomainEvent;
use pulse_core::model::{Actor, Content, StageStatus, TaskStatus};
use pulse_core::popularity::InteractionKind;
use pulse_core::{UserId, DAY_MS, HOUR_MS};
use pulse_daemon::events::handle_event;
use pulse_daemon::rng::SharedRng;
use pulse_daemon::scheduler::Job;
use pulse_daemon::state::Engine;
use pulse_store::{InMemoryStorage, SqliteStorage, Storage};

fn seeded_engine(store: Arc<dyn Storage>, actors: usize) -> (Engine, Content) {
    for i in 0..actors {
        store
            .try_insert_actor(&Actor::new(format!("member_{i}"), i % 4 == 0, 0))
            .unwrap();
    }
    let content = Content::new(UserId::parse("owner").unwrap(), "Landing page", 0);
    store.upsert_content(&content).unwrap();
    let engine = Engine::new(store, EngineConfig::default(), SharedRng::seeded(99));
    (engine, content)
}

#[test]
fn published_content_gets_boosted_and_tasks_execute() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Storage> =
        Arc::new(SqliteStorage::open(&dir.path().join("pulse.db")).unwrap());
    let (engine, content) = seeded_engine(store, 200);

    handle_event(
        &engine,
        &DomainEvent::ContentPublished {
            content_id: content.id.clone(),
        },
        0,
    )
    .unwrap();
    assert_eq!(engine.orchestrator.stages(&content.id).unwrap().len(), 3);

    Job::StageRunner.run(&engine, DAY_MS).unwrap();
    let pending = engine.tasks.counts().unwrap().pending;
    assert!(pending > 0);

    let summary = engine.tasks.tick(2 * DAY_MS).unwrap();
    assert!(summary.claimed > 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.executed + summary.duplicates, summary.claimed);

    let counts = engine.tasks.counts().unwrap();
    assert_eq!(counts.completed as usize, summary.claimed);
    assert_eq!(counts.pending + counts.completed, pending);
}

#[test]
fn retraction_stops_the_pipeline() {
    let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let (engine, content) = seeded_engine(store, 50);
    handle_event(
        &engine,
        &DomainEvent::ContentPublished {
            content_id: content.id.clone(),
        },
        0,
    )
    .unwrap();
    handle_event(
        &engine,
        &DomainEvent::ContentRetracted {
            content_id: content.id.clone(),
        },
        HOUR_MS,
    )
    .unwrap();

    let run = engine.orchestrator.run_due_stages(DAY_MS, 10).unwrap();
    assert_eq!(run.claimed, 0);
    assert!(engine
        .orchestrator
        .stages(&content.id)
        .unwrap()
        .iter()
        .all(|s| s.status == StageStatus::Cancelled));
    assert!(engine
        .store
        .list_tasks(Some(TaskStatus::Pending))
        .unwrap()
        .is_empty());
}

#[test]
fn interactions_are_deduplicated_per_source() {
    let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let (engine, content) = seeded_engine(store, 0);
    let save = DomainEvent::Interaction {
        kind: InteractionKind::Save,
        content_id: content.id.clone(),
        source: "fp-1".into(),
    };
    handle_event(&engine, &save, 0).unwrap();
    handle_event(&engine, &save, 1_000).unwrap();

    let stored = engine.store.get_content(&content.id).unwrap().unwrap();
    assert_eq!(stored.stats.saves, 1);

    let again = engine
        .popularity
        .on_interaction(InteractionKind::Save, &content.id, "fp-2", 2_000)
        .unwrap();
    assert!(matches!(again, InteractionOutcome::Counted { .. }));
}

#[test]
fn every_job_runs_on_an_empty_engine() {
    let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let engine = Engine::new(store, EngineConfig::default(), SharedRng::seeded(1));
    for job in Job::ALL {
        job.run(&engine, DAY_MS)
            .unwrap_or_else(|e| panic!("{} failed: {e}", job.name()));
    }
}
