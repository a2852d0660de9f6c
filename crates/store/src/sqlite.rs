use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use pulse_core::model::{
    ActionKind, ActionPayload, Actor, ActorStatus, Artifact, Content, ContentStats,
    CuratedQueueItem, Curator, CuratorRating, IdentityAsset, Notification, PipelineStage,
    PopularityState, Priority, QualitySnapshot, QueueStatus, RatingCategory,
    ReferenceAssignment, ReviewRequest, StageKind, StageStatus, TargetKind, Task, TaskCounts,
    TaskStatus,
};
use pulse_core::popularity::InteractionKind;
use pulse_core::{
    ActorId, ArtifactId, ContentId, CuratorId, EpochMs, IdentityId, QueueItemId, StageId, TargetId,
    TaskId, UserId,
};

use crate::traits::{ActorCounts, ActorFilter, DecayOutcome, PublishStamp, Storage};

const ACTOR_COLS: &str = "id, handle, can_vote, identity_id, last_activity_ms, activity_count, \
     status, reactivation_attempts, created_ms";
const TASK_COLS: &str = "id, actor_id, action, target_kind, target_id, scheduled_for_ms, status, \
     attempts, last_attempt_ms, error, priority, payload_json, created_ms, completed_ms";
const CONTENT_COLS: &str = "id, owner_id, title, tags_json, category, published_ms, retracted, \
     views, saves, shares, secondary_likes, quality_json, life_score, popular_active, \
     batch_date_ms, popular_published_ms, queued_ms";
const QUEUE_COLS: &str = "id, content_id, status, force_today, enqueued_ms, published_ms";
const STAGE_COLS: &str = "id, content_id, kind, due_ms, status, error, created_ms, finished_ms";

/// Durable SQLite backend. One connection behind a mutex; callers are
/// expected to run on blocking threads.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db {}", db_path.display()))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .context("enable WAL")?;
        Self::init(conn)
    }

    /// Private in-memory database, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql).context("apply migrations")?;
        debug!("sqlite schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parsed<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s: String = r.get(idx)?;
    s.parse()
        .map_err(|e: T::Err| conversion_err(idx, format!("{s:?}: {e}")))
}

fn parsed_opt<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let s: Option<String> = r.get(idx)?;
    s.map(|s| {
        s.parse()
            .map_err(|e: T::Err| conversion_err(idx, format!("{s:?}: {e}")))
    })
    .transpose()
}

fn enum_col<T>(r: &Row<'_>, idx: usize, f: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let s: String = r.get(idx)?;
    f(&s).ok_or_else(|| conversion_err(idx, format!("unknown value {s:?}")))
}

fn json_col<T: serde::de::DeserializeOwned>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = r.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_err(idx, e.to_string()))
}

fn json_col_opt<T: serde::de::DeserializeOwned>(
    r: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = r.get(idx)?;
    s.map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(idx, e.to_string())))
        .transpose()
}

fn actor_status_str(s: ActorStatus) -> &'static str {
    match s {
        ActorStatus::Active => "active",
        ActorStatus::Inactive => "inactive",
        ActorStatus::Dead => "dead",
    }
}

fn actor_status_from(s: &str) -> Option<ActorStatus> {
    match s {
        "active" => Some(ActorStatus::Active),
        "inactive" => Some(ActorStatus::Inactive),
        "dead" => Some(ActorStatus::Dead),
        _ => None,
    }
}

fn queue_status_str(s: QueueStatus) -> &'static str {
    match s {
        QueueStatus::Queued => "queued",
        QueueStatus::Published => "published",
    }
}

fn queue_status_from(s: &str) -> Option<QueueStatus> {
    match s {
        "queued" => Some(QueueStatus::Queued),
        "published" => Some(QueueStatus::Published),
        _ => None,
    }
}

fn rating_str(c: RatingCategory) -> &'static str {
    match c {
        RatingCategory::Excellent => "excellent",
        RatingCategory::Good => "good",
        RatingCategory::Neutral => "neutral",
        RatingCategory::Bad => "bad",
        RatingCategory::VeryBad => "very_bad",
    }
}

fn rating_from(s: &str) -> Option<RatingCategory> {
    match s {
        "excellent" => Some(RatingCategory::Excellent),
        "good" => Some(RatingCategory::Good),
        "neutral" => Some(RatingCategory::Neutral),
        "bad" => Some(RatingCategory::Bad),
        "very_bad" => Some(RatingCategory::VeryBad),
        _ => None,
    }
}

fn actor_from_row(r: &Row<'_>) -> rusqlite::Result<Actor> {
    Ok(Actor {
        id: parsed(r, 0)?,
        handle: r.get(1)?,
        can_vote: r.get(2)?,
        identity_id: parsed_opt(r, 3)?,
        last_activity_ms: r.get(4)?,
        activity_count: r.get::<_, i64>(5)? as u64,
        status: enum_col(r, 6, actor_status_from)?,
        reactivation_attempts: r.get::<_, i64>(7)? as u32,
        created_ms: r.get(8)?,
    })
}

fn task_from_row(r: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parsed(r, 0)?,
        actor_id: parsed(r, 1)?,
        action: enum_col(r, 2, ActionKind::from_str_opt)?,
        target_kind: enum_col(r, 3, TargetKind::from_str_opt)?,
        target_id: parsed(r, 4)?,
        scheduled_for_ms: r.get(5)?,
        status: enum_col(r, 6, TaskStatus::from_str_opt)?,
        attempts: r.get::<_, i64>(7)? as u32,
        last_attempt_ms: r.get(8)?,
        error: r.get(9)?,
        priority: Priority::from_rank(r.get(10)?),
        payload: json_col_opt::<ActionPayload>(r, 11)?,
        created_ms: r.get(12)?,
        completed_ms: r.get(13)?,
    })
}

fn content_from_row(r: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content {
        id: parsed(r, 0)?,
        owner_id: parsed(r, 1)?,
        title: r.get(2)?,
        tags: json_col(r, 3)?,
        category: r.get(4)?,
        published_ms: r.get(5)?,
        retracted: r.get(6)?,
        stats: ContentStats {
            views: r.get::<_, i64>(7)? as u64,
            saves: r.get::<_, i64>(8)? as u64,
            shares: r.get::<_, i64>(9)? as u64,
            secondary_likes: r.get::<_, i64>(10)? as u64,
        },
        quality: json_col_opt::<QualitySnapshot>(r, 11)?,
        popularity: PopularityState {
            life_score: r.get::<_, i64>(12)? as u32,
            active: r.get(13)?,
            batch_date_ms: r.get(14)?,
            published_ms: r.get(15)?,
            queued_ms: r.get(16)?,
        },
    })
}

fn artifact_from_row(r: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        id: parsed(r, 0)?,
        content_id: parsed(r, 1)?,
        owner_id: parsed(r, 2)?,
        like_count: r.get::<_, i64>(3)? as u64,
        created_ms: r.get(4)?,
    })
}

fn curator_from_row(r: &Row<'_>) -> rusqlite::Result<Curator> {
    Ok(Curator {
        id: parsed(r, 0)?,
        name: r.get(1)?,
        weight: r.get(2)?,
        specializations: json_col(r, 3)?,
        active: r.get(4)?,
    })
}

fn rating_from_row(r: &Row<'_>) -> rusqlite::Result<CuratorRating> {
    let aspects: BTreeMap<String, String> = json_col(r, 3)?;
    let aspects: BTreeMap<String, RatingCategory> = aspects
        .into_iter()
        .map(|(k, v)| {
            rating_from(&v)
                .map(|c| (k, c))
                .ok_or_else(|| conversion_err(3, format!("unknown rating {v:?}")))
        })
        .collect::<rusqlite::Result<_>>()?;
    Ok(CuratorRating {
        curator_id: parsed(r, 0)?,
        content_id: parsed(r, 1)?,
        overall: enum_col(r, 2, rating_from)?,
        aspects,
        confidence: r.get(4)?,
        submitted_ms: r.get(5)?,
    })
}

fn queue_from_row(r: &Row<'_>) -> rusqlite::Result<CuratedQueueItem> {
    Ok(CuratedQueueItem {
        id: parsed(r, 0)?,
        content_id: parsed(r, 1)?,
        status: enum_col(r, 2, queue_status_from)?,
        force_today: r.get(3)?,
        enqueued_ms: r.get(4)?,
        published_ms: r.get(5)?,
    })
}

fn stage_from_row(r: &Row<'_>) -> rusqlite::Result<PipelineStage> {
    Ok(PipelineStage {
        id: parsed(r, 0)?,
        content_id: parsed(r, 1)?,
        kind: enum_col(r, 2, StageKind::from_str_opt)?,
        due_ms: r.get(3)?,
        status: enum_col(r, 4, StageStatus::from_str_opt)?,
        error: r.get(5)?,
        created_ms: r.get(6)?,
        finished_ms: r.get(7)?,
    })
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    let mut out = vec![];
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

impl Storage for SqliteStorage {
    fn try_insert_actor(&self, actor: &Actor) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            &format!("INSERT OR IGNORE INTO actors({ACTOR_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                actor.id.as_str(),
                actor.handle,
                actor.can_vote,
                actor.identity_id.as_ref().map(|i| i.as_str()),
                actor.last_activity_ms,
                actor.activity_count as i64,
                actor_status_str(actor.status),
                actor.reactivation_attempts as i64,
                actor.created_ms,
            ],
        )?;
        Ok(n == 1)
    }

    fn get_actor(&self, id: &ActorId) -> Result<Option<Actor>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                &format!("SELECT {ACTOR_COLS} FROM actors WHERE id=?1"),
                params![id.as_str()],
                actor_from_row,
            )
            .optional()?)
    }

    fn list_actors(&self, filter: &ActorFilter) -> Result<Vec<Actor>> {
        let conn = self.conn();
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        collect(
            &conn,
            &format!(
                "SELECT {ACTOR_COLS} FROM actors
                 WHERE (?1 IS NULL OR status=?1) AND (?2 IS NULL OR can_vote=?2)
                 ORDER BY created_ms, id LIMIT ?3"
            ),
            params![filter.status.map(actor_status_str), filter.can_vote, limit],
            actor_from_row,
        )
    }

    fn eligible_actors(&self, cutoff: EpochMs) -> Result<Vec<Actor>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!(
                "SELECT {ACTOR_COLS} FROM actors
                 WHERE status='active' AND (last_activity_ms IS NULL OR last_activity_ms < ?1)
                 ORDER BY created_ms, id"
            ),
            params![cutoff],
            actor_from_row,
        )
    }

    fn actor_counts(&self) -> Result<ActorCounts> {
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT COUNT(1),
                    COALESCE(SUM(status='active'), 0),
                    COALESCE(SUM(status='inactive'), 0),
                    COALESCE(SUM(status='dead'), 0),
                    COALESCE(SUM(can_vote), 0)
             FROM actors",
            [],
            |r| {
                Ok(ActorCounts {
                    total: r.get::<_, i64>(0)? as u64,
                    active: r.get::<_, i64>(1)? as u64,
                    inactive: r.get::<_, i64>(2)? as u64,
                    dead: r.get::<_, i64>(3)? as u64,
                    vote_eligible: r.get::<_, i64>(4)? as u64,
                })
            },
        )?)
    }

    fn record_activity(&self, id: &ActorId, now: EpochMs) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE actors SET last_activity_ms=?1, activity_count=activity_count+1 WHERE id=?2",
            params![now, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn record_reactivation(&self, id: &ActorId, now: EpochMs) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE actors SET reactivation_attempts=reactivation_attempts+1, last_activity_ms=?1
             WHERE id=?2 AND status='active'",
            params![now, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn demote_actor(&self, id: &ActorId, attempts: u32) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE actors SET status='inactive', reactivation_attempts=?1
             WHERE id=?2 AND status='active'",
            params![attempts as i64, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn force_activity(&self, id: &ActorId, now: EpochMs) -> Result<Option<Actor>> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE actors SET status='active', reactivation_attempts=0, last_activity_ms=?1,
                               activity_count=activity_count+1
             WHERE id=?2",
            params![now, id.as_str()],
        )?;
        if n == 0 {
            return Ok(None);
        }
        Ok(conn
            .query_row(
                &format!("SELECT {ACTOR_COLS} FROM actors WHERE id=?1"),
                params![id.as_str()],
                actor_from_row,
            )
            .optional()?)
    }

    fn insert_identity(&self, asset: &IdentityAsset) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO identity_assets(id, url, assigned_to) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET url=excluded.url",
            params![
                asset.id.as_str(),
                asset.url,
                asset.assigned_to.as_ref().map(|a| a.as_str())
            ],
        )?;
        Ok(())
    }

    fn unassigned_identities(&self) -> Result<Vec<IdentityAsset>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT id, url, assigned_to FROM identity_assets WHERE assigned_to IS NULL ORDER BY id",
            [],
            |r| {
                Ok(IdentityAsset {
                    id: parsed(r, 0)?,
                    url: r.get(1)?,
                    assigned_to: parsed_opt(r, 2)?,
                })
            },
        )
    }

    fn assign_identity(&self, actor: &ActorId, identity: &IdentityId) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let a = tx.execute(
            "UPDATE actors SET identity_id=?1 WHERE id=?2 AND identity_id IS NULL",
            params![identity.as_str(), actor.as_str()],
        )?;
        if a == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        let i = tx.execute(
            "UPDATE identity_assets SET assigned_to=?1 WHERE id=?2 AND assigned_to IS NULL",
            params![actor.as_str(), identity.as_str()],
        )?;
        if i == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    fn unassign_identity(&self, identity: &IdentityId) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let holder: Option<Option<String>> = tx
            .query_row(
                "SELECT assigned_to FROM identity_assets WHERE id=?1",
                params![identity.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        let Some(Some(actor)) = holder else {
            tx.commit()?;
            return Ok(false);
        };
        tx.execute(
            "UPDATE identity_assets SET assigned_to=NULL WHERE id=?1",
            params![identity.as_str()],
        )?;
        tx.execute(
            "UPDATE actors SET identity_id=NULL WHERE id=?1 AND identity_id=?2",
            params![actor, identity.as_str()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn reset_identities(&self) -> Result<usize> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let cleared = tx.execute(
            "UPDATE identity_assets SET assigned_to=NULL WHERE assigned_to IS NOT NULL",
            [],
        )?;
        tx.execute(
            "UPDATE actors SET identity_id=NULL WHERE identity_id IS NOT NULL",
            [],
        )?;
        tx.commit()?;
        Ok(cleared)
    }

    fn insert_task(&self, task: &Task) -> Result<()> {
        let conn = self.conn();
        let payload = task
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            &format!(
                "INSERT INTO tasks({TASK_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                task.id.as_str(),
                task.actor_id.as_str(),
                task.action.as_str(),
                task.target_kind.as_str(),
                task.target_id.as_str(),
                task.scheduled_for_ms,
                task.status.as_str(),
                task.attempts as i64,
                task.last_attempt_ms,
                task.error,
                task.priority.rank(),
                payload,
                task.created_ms,
                task.completed_ms,
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                &format!("SELECT {TASK_COLS} FROM tasks WHERE id=?1"),
                params![id.as_str()],
                task_from_row,
            )
            .optional()?)
    }

    fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!(
                "SELECT {TASK_COLS} FROM tasks WHERE (?1 IS NULL OR status=?1)
                 ORDER BY scheduled_for_ms, id"
            ),
            params![status.map(TaskStatus::as_str)],
            task_from_row,
        )
    }

    fn due_tasks(&self, now: EpochMs, limit: usize) -> Result<Vec<Task>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!(
                "SELECT {TASK_COLS} FROM tasks
                 WHERE status='pending' AND scheduled_for_ms <= ?1
                 ORDER BY priority DESC, scheduled_for_ms ASC, id ASC
                 LIMIT ?2"
            ),
            params![now, limit as i64],
            task_from_row,
        )
    }

    fn has_completed(&self, actor: &ActorId, target: &TargetId, action: ActionKind) -> Result<bool> {
        let conn = self.conn();
        let n: i64 = conn.query_row(
            "SELECT COUNT(1) FROM tasks
             WHERE actor_id=?1 AND target_id=?2 AND action=?3 AND status='completed'",
            params![actor.as_str(), target.as_str(), action.as_str()],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    fn complete_task(&self, id: &TaskId, now: EpochMs) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE tasks SET status='completed', attempts=attempts+1, last_attempt_ms=?1,
                              completed_ms=?1, error=NULL
             WHERE id=?2 AND status='pending'",
            params![now, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn fail_task(&self, id: &TaskId, now: EpochMs, error: &str) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE tasks SET status='failed', attempts=attempts+1, last_attempt_ms=?1, error=?2
             WHERE id=?3 AND status='pending'",
            params![now, error, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn requeue_task(&self, id: &TaskId, scheduled_for: EpochMs) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE tasks SET status='pending', scheduled_for_ms=?1, error=NULL
             WHERE id=?2 AND status='failed'",
            params![scheduled_for, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn task_counts(&self) -> Result<TaskCounts> {
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(status='pending'), 0),
                    COALESCE(SUM(status='completed'), 0),
                    COALESCE(SUM(status='failed'), 0)
             FROM tasks",
            [],
            |r| {
                Ok(TaskCounts {
                    pending: r.get::<_, i64>(0)? as u64,
                    completed: r.get::<_, i64>(1)? as u64,
                    failed: r.get::<_, i64>(2)? as u64,
                })
            },
        )?)
    }

    fn upsert_content(&self, c: &Content) -> Result<()> {
        let conn = self.conn();
        let tags = serde_json::to_string(&c.tags)?;
        let quality = c.quality.as_ref().map(serde_json::to_string).transpose()?;
        conn.execute(
            &format!(
                "INSERT INTO content({CONTENT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(id) DO UPDATE SET
                   owner_id=excluded.owner_id, title=excluded.title, tags_json=excluded.tags_json,
                   category=excluded.category, published_ms=excluded.published_ms"
            ),
            params![
                c.id.as_str(),
                c.owner_id.as_str(),
                c.title,
                tags,
                c.category,
                c.published_ms,
                c.retracted,
                c.stats.views as i64,
                c.stats.saves as i64,
                c.stats.shares as i64,
                c.stats.secondary_likes as i64,
                quality,
                c.popularity.life_score as i64,
                c.popularity.active,
                c.popularity.batch_date_ms,
                c.popularity.published_ms,
                c.popularity.queued_ms,
            ],
        )?;
        Ok(())
    }

    fn get_content(&self, id: &ContentId) -> Result<Option<Content>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                &format!("SELECT {CONTENT_COLS} FROM content WHERE id=?1"),
                params![id.as_str()],
                content_from_row,
            )
            .optional()?)
    }

    fn set_retracted(&self, id: &ContentId) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE content SET retracted=1 WHERE id=?1 AND retracted=0",
            params![id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn set_quality(&self, id: &ContentId, snapshot: &QualitySnapshot) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE content SET quality_json=?1 WHERE id=?2",
            params![serde_json::to_string(snapshot)?, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn increment_stat(&self, id: &ContentId, kind: InteractionKind) -> Result<bool> {
        let column = match kind {
            InteractionKind::View => "views",
            InteractionKind::Save => "saves",
            InteractionKind::Share => "shares",
            InteractionKind::SecondaryLike => "secondary_likes",
        };
        let conn = self.conn();
        let n = conn.execute(
            &format!("UPDATE content SET {column}={column}+1 WHERE id=?1"),
            params![id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn upsert_artifact(&self, a: &Artifact) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO artifacts(id, content_id, owner_id, like_count, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET content_id=excluded.content_id, owner_id=excluded.owner_id",
            params![
                a.id.as_str(),
                a.content_id.as_str(),
                a.owner_id.as_str(),
                a.like_count as i64,
                a.created_ms
            ],
        )?;
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, content_id, owner_id, like_count, created_ms FROM artifacts WHERE id=?1",
                params![id.as_str()],
                artifact_from_row,
            )
            .optional()?)
    }

    fn recent_artifacts(&self, since: EpochMs, limit: usize) -> Result<Vec<Artifact>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT a.id, a.content_id, a.owner_id, a.like_count, a.created_ms
             FROM artifacts a JOIN content c ON c.id = a.content_id
             WHERE c.retracted=0 AND c.published_ms >= ?1
             ORDER BY c.published_ms DESC, a.id ASC
             LIMIT ?2",
            params![since, limit as i64],
            artifact_from_row,
        )
    }

    fn increment_artifact_likes(&self, id: &ArtifactId) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE artifacts SET like_count=like_count+1 WHERE id=?1",
            params![id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn upsert_curator(&self, c: &Curator) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO curators(id, name, weight, specializations_json, active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, weight=excluded.weight,
               specializations_json=excluded.specializations_json, active=excluded.active",
            params![
                c.id.as_str(),
                c.name,
                c.weight,
                serde_json::to_string(&c.specializations)?,
                c.active
            ],
        )?;
        Ok(())
    }

    fn get_curator(&self, id: &CuratorId) -> Result<Option<Curator>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, name, weight, specializations_json, active FROM curators WHERE id=?1",
                params![id.as_str()],
                curator_from_row,
            )
            .optional()?)
    }

    fn list_curators(&self) -> Result<Vec<Curator>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT id, name, weight, specializations_json, active FROM curators ORDER BY id",
            [],
            curator_from_row,
        )
    }

    fn upsert_rating(&self, rating: &CuratorRating) -> Result<()> {
        let aspects: BTreeMap<&str, &str> = rating
            .aspects
            .iter()
            .map(|(k, v)| (k.as_str(), rating_str(*v)))
            .collect();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO curator_ratings(curator_id, content_id, overall, aspects_json, confidence, submitted_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(curator_id, content_id) DO UPDATE SET overall=excluded.overall,
               aspects_json=excluded.aspects_json, confidence=excluded.confidence,
               submitted_ms=excluded.submitted_ms",
            params![
                rating.curator_id.as_str(),
                rating.content_id.as_str(),
                rating_str(rating.overall),
                serde_json::to_string(&aspects)?,
                rating.confidence,
                rating.submitted_ms
            ],
        )?;
        Ok(())
    }

    fn ratings_for(&self, content: &ContentId) -> Result<Vec<CuratorRating>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT curator_id, content_id, overall, aspects_json, confidence, submitted_ms
             FROM curator_ratings WHERE content_id=?1 ORDER BY submitted_ms, curator_id",
            params![content.as_str()],
            rating_from_row,
        )
    }

    fn insert_review_request(&self, req: &ReviewRequest) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO review_requests(id, content_id, curator_id, specializations_json, requested_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                req.id.as_str(),
                req.content_id.as_str(),
                req.curator_id.as_str(),
                serde_json::to_string(&req.specializations)?,
                req.requested_ms
            ],
        )?;
        Ok(())
    }

    fn review_requests_for(&self, content: &ContentId) -> Result<Vec<ReviewRequest>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT id, content_id, curator_id, specializations_json, requested_ms
             FROM review_requests WHERE content_id=?1 ORDER BY requested_ms, id",
            params![content.as_str()],
            |r| {
                Ok(ReviewRequest {
                    id: parsed(r, 0)?,
                    content_id: parsed(r, 1)?,
                    curator_id: parsed(r, 2)?,
                    specializations: json_col(r, 3)?,
                    requested_ms: r.get(4)?,
                })
            },
        )
    }

    fn insert_reference(&self, a: &ReferenceAssignment) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO reference_assignments(actor_id, content_id, artifact_id, assigned_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                a.actor_id.as_str(),
                a.content_id.as_str(),
                a.artifact_id.as_str(),
                a.assigned_ms
            ],
        )?;
        Ok(())
    }

    fn list_references(&self) -> Result<Vec<ReferenceAssignment>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT actor_id, content_id, artifact_id, assigned_ms
             FROM reference_assignments ORDER BY seq",
            [],
            |r| {
                Ok(ReferenceAssignment {
                    actor_id: parsed(r, 0)?,
                    content_id: parsed(r, 1)?,
                    artifact_id: parsed(r, 2)?,
                    assigned_ms: r.get(3)?,
                })
            },
        )
    }

    fn insert_queue_item(&self, item: &CuratedQueueItem) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let n = tx.execute(
            &format!("INSERT OR IGNORE INTO curated_queue({QUEUE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                item.id.as_str(),
                item.content_id.as_str(),
                queue_status_str(item.status),
                item.force_today,
                item.enqueued_ms,
                item.published_ms
            ],
        )?;
        if n == 1 {
            tx.execute(
                "UPDATE content SET queued_ms=?1 WHERE id=?2",
                params![item.enqueued_ms, item.content_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(n == 1)
    }

    fn get_queue_item(&self, content: &ContentId) -> Result<Option<CuratedQueueItem>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                &format!("SELECT {QUEUE_COLS} FROM curated_queue WHERE content_id=?1"),
                params![content.as_str()],
                queue_from_row,
            )
            .optional()?)
    }

    fn queued_items(&self, limit: usize) -> Result<Vec<CuratedQueueItem>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!(
                "SELECT {QUEUE_COLS} FROM curated_queue WHERE status='queued'
                 ORDER BY force_today DESC, enqueued_ms ASC, id ASC LIMIT ?1"
            ),
            params![limit as i64],
            queue_from_row,
        )
    }

    fn set_force_today(&self, content: &ContentId, flag: bool) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE curated_queue SET force_today=?1 WHERE content_id=?2 AND status='queued'",
            params![flag, content.as_str()],
        )?;
        Ok(n == 1)
    }

    fn remove_queued_item(&self, content: &ContentId) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let n = tx.execute(
            "DELETE FROM curated_queue WHERE content_id=?1 AND status='queued'",
            params![content.as_str()],
        )?;
        if n == 1 {
            tx.execute(
                "UPDATE content SET queued_ms=NULL WHERE id=?1",
                params![content.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(n == 1)
    }

    fn publish_queue_item(&self, id: &QueueItemId, stamp: PublishStamp) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let n = tx.execute(
            "UPDATE curated_queue SET status='published', published_ms=?1, force_today=0
             WHERE id=?2 AND status='queued'",
            params![stamp.now, id.as_str()],
        )?;
        if n == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        let content_id: String = tx.query_row(
            "SELECT content_id FROM curated_queue WHERE id=?1",
            params![id.as_str()],
            |r| r.get(0),
        )?;
        tx.execute(
            "UPDATE content SET popular_active=1, life_score=?1, batch_date_ms=?2,
                                popular_published_ms=?3
             WHERE id=?4",
            params![
                stamp.start_life_score as i64,
                stamp.batch_date_ms,
                stamp.now,
                content_id
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn decay_popularity(&self, step: u32) -> Result<DecayOutcome> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let decayed = tx.execute(
            "UPDATE content SET life_score = MAX(life_score - ?1, 0)
             WHERE popular_active=1 AND life_score > 0",
            params![step as i64],
        )?;
        let deactivated = tx.execute(
            "UPDATE content SET popular_active=0 WHERE popular_active=1 AND life_score=0",
            [],
        )?;
        tx.commit()?;
        Ok(DecayOutcome {
            decayed,
            deactivated,
        })
    }

    fn bump_life(&self, id: &ContentId, bonus: u32, max: u32) -> Result<Option<u32>> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE content SET life_score = MIN(life_score + ?1, ?2)
             WHERE id=?3 AND popular_active=1",
            params![bonus as i64, max as i64, id.as_str()],
        )?;
        if n == 0 {
            return Ok(None);
        }
        let score: i64 = conn.query_row(
            "SELECT life_score FROM content WHERE id=?1",
            params![id.as_str()],
            |r| r.get(0),
        )?;
        Ok(Some(score as u32))
    }

    fn deactivate_popularity(&self, id: &ContentId) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE content SET popular_active=0 WHERE id=?1 AND popular_active=1",
            params![id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<Content>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!(
                "SELECT {CONTENT_COLS} FROM content WHERE popular_active=1
                 ORDER BY life_score DESC, popular_published_ms DESC, id ASC LIMIT ?1"
            ),
            params![limit as i64],
            content_from_row,
        )
    }

    fn try_mark(&self, key: &str, now: EpochMs, ttl_ms: EpochMs) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "INSERT INTO dedup_marks(key, expires_ms) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET expires_ms=excluded.expires_ms
             WHERE dedup_marks.expires_ms <= ?3",
            params![key, now + ttl_ms, now],
        )?;
        Ok(n == 1)
    }

    fn purge_expired_marks(&self, now: EpochMs) -> Result<usize> {
        let conn = self.conn();
        Ok(conn.execute(
            "DELETE FROM dedup_marks WHERE expires_ms <= ?1",
            params![now],
        )?)
    }

    fn insert_stages_if_absent(&self, content: &ContentId, stages: &[PipelineStage]) -> Result<bool> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(1) FROM pipeline_stages WHERE content_id=?1",
            params![content.as_str()],
            |r| r.get(0),
        )?;
        if existing > 0 {
            tx.commit()?;
            return Ok(false);
        }
        for s in stages {
            tx.execute(
                &format!("INSERT INTO pipeline_stages({STAGE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    s.id.as_str(),
                    s.content_id.as_str(),
                    s.kind.as_str(),
                    s.due_ms,
                    s.status.as_str(),
                    s.error,
                    s.created_ms,
                    s.finished_ms
                ],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn claim_due_stages(&self, now: EpochMs, limit: usize) -> Result<Vec<PipelineStage>> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let due = collect(
            &tx,
            &format!(
                "SELECT {STAGE_COLS} FROM pipeline_stages
                 WHERE status='pending' AND due_ms <= ?1
                 ORDER BY due_ms, id LIMIT ?2"
            ),
            params![now, limit as i64],
            stage_from_row,
        )?;
        let mut claimed = Vec::with_capacity(due.len());
        for mut s in due {
            let n = tx.execute(
                "UPDATE pipeline_stages SET status='running' WHERE id=?1 AND status='pending'",
                params![s.id.as_str()],
            )?;
            if n == 1 {
                s.status = StageStatus::Running;
                claimed.push(s);
            }
        }
        tx.commit()?;
        Ok(claimed)
    }

    fn finish_stage(
        &self,
        id: &StageId,
        status: StageStatus,
        error: Option<&str>,
        now: EpochMs,
    ) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE pipeline_stages SET status=?1, error=?2, finished_ms=?3
             WHERE id=?4 AND status='running'",
            params![status.as_str(), error, now, id.as_str()],
        )?;
        Ok(n == 1)
    }

    fn cancel_pending_stages(&self, content: &ContentId, now: EpochMs) -> Result<usize> {
        let conn = self.conn();
        Ok(conn.execute(
            "UPDATE pipeline_stages SET status='cancelled', finished_ms=?1
             WHERE content_id=?2 AND status='pending'",
            params![now, content.as_str()],
        )?)
    }

    fn stages_for(&self, content: &ContentId) -> Result<Vec<PipelineStage>> {
        let conn = self.conn();
        collect(
            &conn,
            &format!("SELECT {STAGE_COLS} FROM pipeline_stages WHERE content_id=?1 ORDER BY due_ms, id"),
            params![content.as_str()],
            stage_from_row,
        )
    }

    fn record_action(
        &self,
        actor: &ActorId,
        target_kind: TargetKind,
        target: &TargetId,
        kind: ActionKind,
        now: EpochMs,
    ) -> Result<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "INSERT OR IGNORE INTO action_ledger(actor_id, target_kind, target_id, kind, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                actor.as_str(),
                target_kind.as_str(),
                target.as_str(),
                kind.as_str(),
                now
            ],
        )?;
        Ok(n == 1)
    }

    fn has_action(&self, actor: &ActorId, target: &TargetId, kind: ActionKind) -> Result<bool> {
        let conn = self.conn();
        let n: i64 = conn.query_row(
            "SELECT COUNT(1) FROM action_ledger WHERE actor_id=?1 AND target_id=?2 AND kind=?3",
            params![actor.as_str(), target.as_str(), kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    fn insert_notification(&self, n: &Notification) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notifications(recipient, actor_id, kind, metadata_json, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                n.recipient.as_str(),
                n.actor.as_str(),
                n.kind,
                serde_json::to_string(&n.metadata)?,
                n.created_ms
            ],
        )?;
        Ok(())
    }

    fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        let conn = self.conn();
        collect(
            &conn,
            "SELECT recipient, actor_id, kind, metadata_json, created_ms
             FROM notifications WHERE recipient=?1 ORDER BY seq",
            params![recipient.as_str()],
            |r| {
                Ok(Notification {
                    recipient: parsed(r, 0)?,
                    actor: parsed(r, 1)?,
                    kind: r.get(2)?,
                    metadata: json_col(r, 3)?,
                    created_ms: r.get(4)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn content(store: &SqliteStorage, published: EpochMs) -> Content {
        let mut c = Content::new(UserId::parse("owner-1").unwrap(), "Neon poster", published);
        c.tags = vec!["design".into()];
        store.upsert_content(&c).unwrap();
        c
    }

    #[test]
    fn sqlite_open_and_migrate() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("pulse.db");
        {
            let s = SqliteStorage::open(&db_path).unwrap();
            s.try_insert_actor(&Actor::new("amber_lynx7", true, 1)).unwrap();
        }
        // Reopening re-applies the idempotent migration and keeps data.
        let s = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(s.actor_counts().unwrap().total, 1);
    }

    #[test]
    fn actor_round_trip_and_handle_uniqueness() {
        let s = store();
        let a = Actor::new("amber_lynx7", true, 1);
        assert!(s.try_insert_actor(&a).unwrap());
        assert!(!s.try_insert_actor(&Actor::new("amber_lynx7", false, 2)).unwrap());
        assert_eq!(s.get_actor(&a.id).unwrap(), Some(a));
        let counts = s.actor_counts().unwrap();
        assert_eq!((counts.total, counts.active, counts.vote_eligible), (1, 1, 1));
    }

    #[test]
    fn task_round_trip_keeps_payload() {
        let s = store();
        let mut scores = BTreeMap::new();
        scores.insert("design".to_string(), 8);
        let t = Task {
            id: TaskId::new(),
            actor_id: ActorId::new(),
            action: ActionKind::Vote,
            target_kind: TargetKind::Content,
            target_id: TargetId::parse("c-1").unwrap(),
            scheduled_for_ms: 10,
            status: TaskStatus::Pending,
            attempts: 0,
            last_attempt_ms: None,
            error: None,
            priority: Priority::High,
            payload: Some(ActionPayload::VoteScores { scores }),
            created_ms: 1,
            completed_ms: None,
        };
        s.insert_task(&t).unwrap();
        assert_eq!(s.get_task(&t.id).unwrap(), Some(t.clone()));
        assert!(s.due_tasks(9, 10).unwrap().is_empty());
        assert_eq!(s.due_tasks(10, 10).unwrap().len(), 1);
        assert!(s.fail_task(&t.id, 11, "boom").unwrap());
        assert!(!s.complete_task(&t.id, 12).unwrap());
        let failed = s.get_task(&t.id).unwrap().unwrap();
        assert_eq!(failed.attempts, 1);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(s.requeue_task(&t.id, 20).unwrap());
        assert_eq!(s.task_counts().unwrap().pending, 1);
    }

    #[test]
    fn queue_publish_and_decay() {
        let s = store();
        let a = content(&s, 0);
        let b = content(&s, 0);
        let qa = CuratedQueueItem {
            id: QueueItemId::new(),
            content_id: a.id.clone(),
            status: QueueStatus::Queued,
            force_today: false,
            enqueued_ms: 1,
            published_ms: None,
        };
        let qb = CuratedQueueItem {
            id: QueueItemId::new(),
            content_id: b.id.clone(),
            enqueued_ms: 2,
            ..qa.clone()
        };
        assert!(s.insert_queue_item(&qa).unwrap());
        assert!(s.insert_queue_item(&qb).unwrap());
        let dup = CuratedQueueItem {
            id: QueueItemId::new(),
            ..qa.clone()
        };
        assert!(!s.insert_queue_item(&dup).unwrap());
        assert!(s.set_force_today(&b.id, true).unwrap());

        let order: Vec<_> = s.queued_items(10).unwrap().into_iter().map(|i| i.content_id).collect();
        assert_eq!(order, vec![b.id.clone(), a.id.clone()]);

        let stamp = PublishStamp {
            now: 100,
            batch_date_ms: 0,
            start_life_score: 12,
        };
        assert!(s.publish_queue_item(&qb.id, stamp).unwrap());
        assert!(!s.publish_queue_item(&qb.id, stamp).unwrap());
        let pub_item = s.get_queue_item(&b.id).unwrap().unwrap();
        assert_eq!(pub_item.status, QueueStatus::Published);
        assert!(!pub_item.force_today);

        assert_eq!(s.decay_popularity(5).unwrap().decayed, 1);
        assert_eq!(s.decay_popularity(5).unwrap().deactivated, 0);
        let last = s.decay_popularity(5).unwrap();
        assert_eq!(last.deactivated, 1);
        let c = s.get_content(&b.id).unwrap().unwrap();
        assert_eq!(c.popularity.life_score, 0);
        assert!(!c.popularity.active);
    }

    #[test]
    fn bump_is_clamped_and_needs_active() {
        let s = store();
        let c = content(&s, 0);
        assert_eq!(s.bump_life(&c.id, 5, 200).unwrap(), None);
        let q = CuratedQueueItem {
            id: QueueItemId::new(),
            content_id: c.id.clone(),
            status: QueueStatus::Queued,
            force_today: false,
            enqueued_ms: 0,
            published_ms: None,
        };
        s.insert_queue_item(&q).unwrap();
        s.publish_queue_item(
            &q.id,
            PublishStamp {
                now: 1,
                batch_date_ms: 0,
                start_life_score: 198,
            },
        )
        .unwrap();
        assert_eq!(s.bump_life(&c.id, 5, 200).unwrap(), Some(200));
    }

    #[test]
    fn dedup_mark_expires() {
        let s = store();
        assert!(s.try_mark("save:c:u", 0, 100).unwrap());
        assert!(!s.try_mark("save:c:u", 99, 100).unwrap());
        assert!(s.try_mark("save:c:u", 100, 100).unwrap());
    }

    #[test]
    fn stages_claim_once() {
        let s = store();
        let c = content(&s, 0);
        let stage = PipelineStage {
            id: StageId::new(),
            content_id: c.id.clone(),
            kind: StageKind::InitialBoost,
            due_ms: 10,
            status: StageStatus::Pending,
            error: None,
            created_ms: 0,
            finished_ms: None,
        };
        assert!(s.insert_stages_if_absent(&c.id, &[stage.clone()]).unwrap());
        assert!(!s.insert_stages_if_absent(&c.id, &[stage.clone()]).unwrap());
        assert!(s.claim_due_stages(5, 10).unwrap().is_empty());
        assert_eq!(s.claim_due_stages(10, 10).unwrap().len(), 1);
        assert!(s.claim_due_stages(10, 10).unwrap().is_empty());
        assert!(s.finish_stage(&stage.id, StageStatus::Done, None, 11).unwrap());
        assert_eq!(s.stages_for(&c.id).unwrap()[0].status, StageStatus::Done);
    }

    #[test]
    fn ledger_and_ratings() {
        let s = store();
        let actor = ActorId::new();
        let target = TargetId::parse("art-1").unwrap();
        assert!(s
            .record_action(&actor, TargetKind::SecondaryArtifact, &target, ActionKind::Like, 0)
            .unwrap());
        assert!(!s
            .record_action(&actor, TargetKind::SecondaryArtifact, &target, ActionKind::Like, 1)
            .unwrap());
        assert!(s.has_action(&actor, &target, ActionKind::Like).unwrap());

        let c = content(&s, 0);
        let cur = Curator {
            id: CuratorId::new(),
            name: "Ines".into(),
            weight: 1.5,
            specializations: vec!["design".into()],
            active: true,
        };
        s.upsert_curator(&cur).unwrap();
        let mut r = CuratorRating {
            curator_id: cur.id.clone(),
            content_id: c.id.clone(),
            overall: RatingCategory::Good,
            aspects: BTreeMap::new(),
            confidence: 0.8,
            submitted_ms: 1,
        };
        r.aspects.insert("color".into(), RatingCategory::VeryBad);
        s.upsert_rating(&r).unwrap();
        r.overall = RatingCategory::Excellent;
        s.upsert_rating(&r).unwrap();
        assert_eq!(s.ratings_for(&c.id).unwrap(), vec![r]);
        assert_eq!(s.list_curators().unwrap(), vec![cur]);
    }
}
