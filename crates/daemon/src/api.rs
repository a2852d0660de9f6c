//! Admin and ingest HTTP surface.
//!
//! Every admin route answers `200` with an [`AdminResponse`] envelope; a
//! failing operation sets `success = false` instead of an error status.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pulse_core::api::*;
use pulse_core::events::DomainEvent;
use pulse_core::model::{
    Actor, Artifact, Content, CuratedQueueItem, Curator, CuratorRating, IdentityAsset,
    PipelineStage, TaskCounts, CONFIDENCE_MAX, CONFIDENCE_MIN, CURATOR_WEIGHT_MAX,
    CURATOR_WEIGHT_MIN,
};
use pulse_core::{
    now_ms, ActorId, ArtifactId, ContentId, CuratorId, EpochMs, IdentityId, PulseError, Result,
    TaskId, UserId,
};
use pulse_store::ActorFilter;
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::Engine;

pub const ADMIN_SECRET_HEADER: &str = "x-pulse-admin-secret";

const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub events: mpsc::Sender<DomainEvent>,
    pub admin_secret: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, events: mpsc::Sender<DomainEvent>, admin_secret: &str) -> Self {
        Self {
            engine,
            events,
            admin_secret: Arc::from(admin_secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/v1/admin/actors", get(list_actors))
        .route("/v1/admin/actors/generate", post(generate_actors))
        .route("/v1/admin/actors/{id}", get(get_actor))
        .route("/v1/admin/actors/{id}/force-activity", post(force_activity))
        .route("/v1/admin/health", get(health_status))
        .route("/v1/admin/health/sweep", post(health_sweep))
        .route("/v1/admin/identities", post(add_identity))
        .route("/v1/admin/identities/distribute", post(distribute_identities))
        .route("/v1/admin/identities/reset", post(reset_identities))
        .route("/v1/admin/tasks/tick", post(task_tick))
        .route("/v1/admin/tasks/counts", get(task_counts))
        .route("/v1/admin/tasks/{id}/resubmit", post(resubmit_task))
        .route("/v1/admin/references/distribute", post(distribute_references))
        .route("/v1/admin/popular/queue", post(queue_content))
        .route("/v1/admin/popular/force", post(force_today))
        .route("/v1/admin/popular/preview", get(preview_batch))
        .route("/v1/admin/popular/publish", post(publish_batch))
        .route("/v1/admin/popular/decay", post(decay))
        .route("/v1/admin/popular/leaderboard", get(leaderboard))
        .route("/v1/admin/content/{id}/stages", get(content_stages))
        .route("/v1/content", post(ingest_content))
        .route("/v1/curators", post(ingest_curator))
        .route("/v1/ratings", post(ingest_rating))
        .route("/v1/events", post(publish_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Constant-time comparison of the shared-secret header. An empty expected
/// secret rejects everything.
pub fn secret_ok(headers: &HeaderMap, expected: &str) -> bool {
    let Some(given) = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    if expected.is_empty() || given.len() != expected.len() {
        return false;
    }
    given
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn require_secret(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if secret_ok(req.headers(), &state.admin_secret) {
        next.run(req).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Runs synchronous service code off the async runtime.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Engine, EpochMs) -> Result<T> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&engine, now_ms()))
        .await
        .map_err(|e| PulseError::Storage(anyhow::anyhow!("worker task failed: {e}")))?
}

fn respond<T: Serialize>(message: &str, res: Result<T>) -> Json<AdminResponse<T>> {
    Json(match res {
        Ok(data) => AdminResponse::ok(message, data),
        Err(e) => {
            if matches!(e, PulseError::Storage(_)) {
                warn!("{message}: {e:?}");
            }
            AdminResponse::fail(e.to_string())
        }
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn list_actors(
    State(state): State<AppState>,
    Query(q): Query<ActorsQuery>,
) -> Json<AdminResponse<Vec<Actor>>> {
    let filter = ActorFilter {
        status: q.status,
        can_vote: q.can_vote,
        limit: q.limit,
    };
    let res = blocking(&state, move |e, _| e.registry.list(&filter)).await;
    respond("actors listed", res)
}

pub async fn generate_actors(
    State(state): State<AppState>,
    Json(req): Json<GenerateActorsRequest>,
) -> Json<AdminResponse<GenerateSummary>> {
    let res = blocking(&state, move |e, now| e.registry.generate(req.count, now)).await;
    respond("actors generated", res)
}

pub async fn get_actor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AdminResponse<Actor>> {
    let res = match ActorId::parse(&id) {
        Ok(id) => blocking(&state, move |e, _| e.registry.get(&id)).await,
        Err(e) => Err(e),
    };
    respond("actor found", res)
}

pub async fn force_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AdminResponse<ForceActivityResponse>> {
    let res = match ActorId::parse(&id) {
        Ok(id) => blocking(&state, move |e, now| e.health.force_activity(&id, now)).await,
        Err(e) => Err(e),
    };
    respond("activity forced", res)
}

pub async fn health_status(State(state): State<AppState>) -> Json<AdminResponse<HealthStatus>> {
    let res = blocking(&state, |e, _| e.health.status()).await;
    respond("health status", res)
}

pub async fn health_sweep(State(state): State<AppState>) -> Json<AdminResponse<SweepSummary>> {
    let res = blocking(&state, |e, now| e.health.sweep(now)).await;
    respond("health sweep completed", res)
}

pub async fn add_identity(
    State(state): State<AppState>,
    Json(req): Json<IdentityIngest>,
) -> Json<AdminResponse<IdentityAsset>> {
    let res = blocking(&state, move |e, _| {
        let url = req.url.trim();
        if url.is_empty() {
            return Err(PulseError::Validation("identity url is empty".into()));
        }
        let asset = IdentityAsset {
            id: IdentityId::new(),
            url: url.to_string(),
            assigned_to: None,
        };
        e.store.insert_identity(&asset)?;
        Ok(asset)
    })
    .await;
    respond("identity added", res)
}

pub async fn distribute_identities(
    State(state): State<AppState>,
) -> Json<AdminResponse<DistributionSummary>> {
    let res = blocking(&state, |e, _| e.registry.distribute_identities()).await;
    respond("identities distributed", res)
}

pub async fn reset_identities(State(state): State<AppState>) -> Json<AdminResponse<ResetSummary>> {
    let res = blocking(&state, |e, _| e.registry.reset_identities()).await;
    respond("identities reset", res)
}

pub async fn task_tick(State(state): State<AppState>) -> Json<AdminResponse<TickSummary>> {
    let res = blocking(&state, |e, now| e.tasks.tick(now)).await;
    respond("task tick completed", res)
}

pub async fn task_counts(State(state): State<AppState>) -> Json<AdminResponse<TaskCounts>> {
    let res = blocking(&state, |e, _| e.tasks.counts()).await;
    respond("task counts", res)
}

pub async fn resubmit_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AdminResponse<ResubmitResponse>> {
    let res = match TaskId::parse(&id) {
        Ok(id) => blocking(&state, move |e, now| e.tasks.resubmit(&id, now)).await,
        Err(e) => Err(e),
    };
    respond("task resubmitted", res)
}

pub async fn distribute_references(
    State(state): State<AppState>,
) -> Json<AdminResponse<ReferenceSummary>> {
    let res = blocking(&state, |e, now| e.distributor.run(now)).await;
    respond("references distributed", res)
}

pub async fn queue_content(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Json<AdminResponse<CuratedQueueItem>> {
    let res = match ContentId::parse(&req.content_id) {
        Ok(id) => {
            blocking(&state, move |e, now| {
                e.popularity.enqueue(&id, req.force_today, now)
            })
            .await
        }
        Err(e) => Err(e),
    };
    respond("content queued", res)
}

pub async fn force_today(
    State(state): State<AppState>,
    Json(req): Json<QueueRequest>,
) -> Json<AdminResponse<bool>> {
    let res = match ContentId::parse(&req.content_id) {
        Ok(id) => {
            blocking(&state, move |e, _| {
                e.popularity
                    .set_force_today(&id, req.force_today)
                    .map(|()| req.force_today)
            })
            .await
        }
        Err(e) => Err(e),
    };
    respond("force-today updated", res)
}

pub async fn preview_batch(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Json<AdminResponse<Vec<CuratedQueueItem>>> {
    let limit = q
        .limit
        .unwrap_or(state.engine.config.popularity.daily_batch_size);
    let res = blocking(&state, move |e, _| e.popularity.preview_batch(limit)).await;
    respond("batch preview", res)
}

pub async fn publish_batch(
    State(state): State<AppState>,
    body: Option<Json<PublishRequest>>,
) -> Json<AdminResponse<PublishSummary>> {
    let limit = body
        .and_then(|Json(b)| b.limit)
        .unwrap_or(state.engine.config.popularity.daily_batch_size);
    let res = blocking(&state, move |e, now| e.popularity.publish_batch(limit, now)).await;
    respond("batch published", res)
}

pub async fn decay(
    State(state): State<AppState>,
    body: Option<Json<DecayRequest>>,
) -> Json<AdminResponse<DecaySummary>> {
    let step = body
        .and_then(|Json(b)| b.step)
        .unwrap_or(state.engine.config.popularity.decay_step);
    let res = blocking(&state, move |e, _| e.popularity.decay(step)).await;
    respond("life scores decayed", res)
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Json<AdminResponse<Vec<LeaderboardEntry>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let res = blocking(&state, move |e, _| e.popularity.leaderboard(limit)).await;
    respond("leaderboard", res)
}

pub async fn content_stages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AdminResponse<Vec<PipelineStage>>> {
    let res = match ContentId::parse(&id) {
        Ok(id) => blocking(&state, move |e, _| e.orchestrator.stages(&id)).await,
        Err(e) => Err(e),
    };
    respond("pipeline stages", res)
}

fn content_from(req: &ContentIngest, now: EpochMs) -> Result<(Content, Vec<Artifact>)> {
    let id = ContentId::parse(&req.id)?;
    let owner = UserId::parse(&req.owner_id)?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(PulseError::Validation("content title is empty".into()));
    }
    let mut content = Content::new(owner.clone(), title, req.published_ms.unwrap_or(now));
    content.id = id;
    content.tags = req.tags.clone();
    content.category = req.category.clone();

    let artifacts = req
        .artifact_ids
        .iter()
        .map(|raw| {
            Ok(Artifact {
                id: ArtifactId::parse(raw)?,
                content_id: content.id.clone(),
                owner_id: owner.clone(),
                like_count: 0,
                created_ms: content.published_ms,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((content, artifacts))
}

/// Upserts the content mirror and its artifacts; `publish` also starts the
/// engagement pipeline.
pub async fn ingest_content(
    State(state): State<AppState>,
    Json(req): Json<ContentIngest>,
) -> Json<AdminResponse<ContentId>> {
    let publish = req.publish;
    let res = match content_from(&req, now_ms()) {
        Ok((content, artifacts)) => {
            blocking(&state, move |e, _| {
                e.store.upsert_content(&content)?;
                for a in &artifacts {
                    e.store.upsert_artifact(a)?;
                }
                Ok(content.id)
            })
            .await
        }
        Err(e) => Err(e),
    };
    let res = match res {
        Ok(id) if publish => emit(
            &state,
            DomainEvent::ContentPublished {
                content_id: id.clone(),
            },
        )
        .await
        .map(|()| id),
        other => other,
    };
    respond("content stored", res)
}

pub async fn ingest_curator(
    State(state): State<AppState>,
    Json(req): Json<CuratorIngest>,
) -> Json<AdminResponse<CuratorId>> {
    let res = blocking(&state, move |e, _| {
        let id = CuratorId::parse(&req.id)?;
        if !req.weight.is_finite() || !(CURATOR_WEIGHT_MIN..=CURATOR_WEIGHT_MAX).contains(&req.weight)
        {
            return Err(PulseError::Validation(format!(
                "curator weight must be within [{CURATOR_WEIGHT_MIN}, {CURATOR_WEIGHT_MAX}]"
            )));
        }
        let curator = Curator {
            id: id.clone(),
            name: req.name,
            weight: req.weight,
            specializations: req.specializations,
            active: req.active,
        };
        e.store.upsert_curator(&curator)?;
        Ok(id)
    })
    .await;
    respond("curator stored", res)
}

/// Stores a rating, then lets the aggregator recompute through the event path.
pub async fn ingest_rating(
    State(state): State<AppState>,
    Json(req): Json<RatingIngest>,
) -> Json<AdminResponse<ContentId>> {
    let res = blocking(&state, move |e, now| {
        let curator_id = CuratorId::parse(&req.curator_id)?;
        let content_id = ContentId::parse(&req.content_id)?;
        if !req.confidence.is_finite()
            || !(CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&req.confidence)
        {
            return Err(PulseError::Validation(format!(
                "confidence must be within [{CONFIDENCE_MIN}, {CONFIDENCE_MAX}]"
            )));
        }
        if e.store.get_curator(&curator_id)?.is_none() {
            return Err(PulseError::not_found("curator", &curator_id));
        }
        if e.store.get_content(&content_id)?.is_none() {
            return Err(PulseError::not_found("content", &content_id));
        }
        e.store.upsert_rating(&CuratorRating {
            curator_id: curator_id.clone(),
            content_id: content_id.clone(),
            overall: req.overall,
            aspects: req.aspects,
            confidence: req.confidence,
            submitted_ms: now,
        })?;
        Ok((content_id, curator_id))
    })
    .await;
    let res = match res {
        Ok((content_id, curator_id)) => emit(
            &state,
            DomainEvent::RatingSubmitted {
                content_id: content_id.clone(),
                curator_id,
            },
        )
        .await
        .map(|()| content_id),
        Err(e) => Err(e),
    };
    respond("rating stored", res)
}

async fn emit(state: &AppState, event: DomainEvent) -> Result<()> {
    state
        .events
        .send(event)
        .await
        .map_err(|_| PulseError::ExternalDependency("event dispatcher stopped".into()))
}

pub async fn publish_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> Json<AdminResponse<EventAck>> {
    let res = match req.parse() {
        Ok(event) => {
            let ack = EventAck {
                kind: event.kind().to_string(),
                content_id: event.content_id().clone(),
            };
            emit(&state, event).await.map(|()| ack)
        }
        Err(e) => Err(e),
    };
    respond("event accepted", res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pulse_core::config::EngineConfig;
    use pulse_core::model::ActorStatus;
    use pulse_store::{InMemoryStorage, Storage};

    use crate::rng::SharedRng;

    fn state() -> (AppState, mpsc::Receiver<DomainEvent>) {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let engine = Arc::new(Engine::new(
            store,
            EngineConfig::default(),
            SharedRng::seeded(21),
        ));
        let (tx, rx) = mpsc::channel(16);
        (AppState::new(engine, tx, "s3cret"), rx)
    }

    #[test]
    fn secret_header_is_required() {
        let mut h = HeaderMap::new();
        assert!(!secret_ok(&h, "s3cret"));
        h.insert(ADMIN_SECRET_HEADER, HeaderValue::from_static("nope!!"));
        assert!(!secret_ok(&h, "s3cret"));
        h.insert(ADMIN_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(secret_ok(&h, "s3cret"));
        assert!(!secret_ok(&h, ""));
    }

    #[tokio::test]
    async fn generate_then_fetch_actor() {
        let (state, _rx) = state();
        let Json(r) = generate_actors(
            State(state.clone()),
            Json(GenerateActorsRequest { count: 3 }),
        )
        .await;
        assert!(r.success);
        assert_eq!(r.data.unwrap().created, 3);

        let Json(list) = list_actors(
            State(state.clone()),
            Query(ActorsQuery {
                status: Some(ActorStatus::Active),
                ..Default::default()
            }),
        )
        .await;
        let actors = list.data.unwrap();
        assert_eq!(actors.len(), 3);

        let Json(one) = get_actor(State(state.clone()), Path(actors[0].id.to_string())).await;
        assert_eq!(one.data.unwrap().id, actors[0].id);
    }

    #[tokio::test]
    async fn failures_come_back_in_the_envelope() {
        let (state, _rx) = state();
        let Json(r) = get_actor(State(state.clone()), Path("bad id!".into())).await;
        assert!(!r.success);
        assert!(r.message.contains("validation"));

        let Json(r) = queue_content(
            State(state),
            Json(QueueRequest {
                content_id: "missing".into(),
                force_today: false,
            }),
        )
        .await;
        assert!(!r.success);
        assert!(r.message.contains("not found"));
    }

    #[tokio::test]
    async fn ingest_with_publish_emits_event() {
        let (state, mut rx) = state();
        let Json(r) = ingest_content(
            State(state.clone()),
            Json(ContentIngest {
                id: "content:c1".into(),
                owner_id: "u1".into(),
                title: "Checkout flow".into(),
                tags: vec!["ux".into()],
                category: None,
                published_ms: None,
                artifact_ids: vec!["a1".into(), "a2".into()],
                publish: true,
            }),
        )
        .await;
        assert!(r.success, "{}", r.message);
        let id = r.data.unwrap();
        assert_eq!(id.as_str(), "c1");
        assert!(state
            .engine
            .store
            .get_artifact(&ArtifactId::parse("a2").unwrap())
            .unwrap()
            .is_some());
        assert_eq!(
            rx.recv().await,
            Some(DomainEvent::ContentPublished { content_id: id })
        );
    }

    #[tokio::test]
    async fn rating_requires_known_curator() {
        let (state, mut rx) = state();
        let store = state.engine.store.clone();

        let Json(r) = ingest_rating(
            State(state.clone()),
            Json(RatingIngest {
                curator_id: "nobody".into(),
                content_id: "c9".into(),
                overall: pulse_core::model::RatingCategory::Good,
                aspects: Default::default(),
                confidence: 0.8,
            }),
        )
        .await;
        assert!(!r.success);

        let Json(c) = ingest_curator(
            State(state.clone()),
            Json(CuratorIngest {
                id: "cur1".into(),
                name: "Ana".into(),
                weight: 2.0,
                specializations: vec!["design".into()],
                active: true,
            }),
        )
        .await;
        assert!(c.success);
        let mut content = Content::new(UserId::parse("u1").unwrap(), "Rated", 0);
        content.id = ContentId::parse("c9").unwrap();
        store.upsert_content(&content).unwrap();

        let Json(r) = ingest_rating(
            State(state.clone()),
            Json(RatingIngest {
                curator_id: "cur1".into(),
                content_id: "c9".into(),
                overall: pulse_core::model::RatingCategory::Good,
                aspects: Default::default(),
                confidence: 0.8,
            }),
        )
        .await;
        assert!(r.success, "{}", r.message);
        assert!(matches!(
            rx.recv().await,
            Some(DomainEvent::RatingSubmitted { .. })
        ));
    }

    #[tokio::test]
    async fn event_endpoint_validates_before_enqueueing() {
        let (state, mut rx) = state();
        let Json(r) = publish_event(
            State(state.clone()),
            Json(EventRequest::Interaction {
                kind: pulse_core::popularity::InteractionKind::Save,
                content_id: "c1".into(),
                source: "fp-1".into(),
            }),
        )
        .await;
        assert!(r.success);
        assert_eq!(r.data.unwrap().kind, "interaction");
        assert!(rx.recv().await.is_some());

        let Json(r) = publish_event(
            State(state),
            Json(EventRequest::ContentRetracted {
                content_id: "".into(),
            }),
        )
        .await;
        assert!(!r.success);
        assert!(rx.try_recv().is_err());
    }
}
