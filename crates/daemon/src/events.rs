//! One-way event delivery from ingestion to the services.

use std::sync::Arc;

use pulse_core::events::DomainEvent;
use pulse_core::{now_ms, EpochMs, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::Engine;

pub const EVENT_BUFFER: usize = 1024;

pub fn channel() -> (mpsc::Sender<DomainEvent>, mpsc::Receiver<DomainEvent>) {
    mpsc::channel(EVENT_BUFFER)
}

/// Routes one event to its subscriber.
pub fn handle_event(engine: &Engine, event: &DomainEvent, now: EpochMs) -> Result<()> {
    match event {
        DomainEvent::ContentPublished { content_id } => {
            engine.orchestrator.on_content_published(content_id, now)?;
        }
        DomainEvent::ContentRetracted { content_id } => {
            engine.orchestrator.on_content_retracted(content_id, now)?;
        }
        DomainEvent::RatingSubmitted { content_id, .. } => {
            engine.orchestrator.on_rating_submitted(content_id, now)?;
        }
        DomainEvent::Interaction {
            kind,
            content_id,
            source,
        } => {
            let outcome = engine
                .popularity
                .on_interaction(*kind, content_id, source, now)?;
            debug!(content = %content_id, ?outcome, "interaction handled");
        }
    }
    Ok(())
}

/// Drains the channel until every sender is dropped.
pub fn spawn_dispatcher(
    engine: Arc<Engine>,
    mut rx: mpsc::Receiver<DomainEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let kind = event.kind();
            let content = event.content_id().clone();
            let engine = engine.clone();
            let res =
                tokio::task::spawn_blocking(move || handle_event(&engine, &event, now_ms())).await;
            match res {
                Ok(Ok(())) => debug!(kind, content = %content, "event handled"),
                Ok(Err(e)) => warn!(kind, content = %content, "event handling failed: {e}"),
                Err(e) => warn!(kind, content = %content, "event handler panicked: {e}"),
            }
        }
        debug!("event channel closed");
    })
}
