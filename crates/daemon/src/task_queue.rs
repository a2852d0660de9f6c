//! Durable, time-scheduled social actions.
//!
//! Waiting is a timestamp comparison: a task becomes claimable once
//! `scheduled_for_ms <= now`, so nothing sleeps in process and a restart
//! loses nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use pulse_core::api::{ResubmitResponse, TickSummary};
use pulse_core::config::TaskQueueConfig;
use pulse_core::model::{
    ActionKind, ActionPayload, Priority, TargetKind, Task, TaskCounts, TaskStatus,
};
use pulse_core::{ActorId, EpochMs, PulseError, Result, TargetId, TaskId};
use pulse_store::Storage;
use tracing::{debug, info, warn};

use crate::collaborators::{ActionExecutor, CollaboratorError};
use crate::rng::SharedRng;

const VOTE_ASPECTS: &[&str] = &["design", "usability", "creativity", "content"];

const COMMENTS: &[&str] = &[
    "Love the palette here.",
    "Really clean composition.",
    "This layout reads so well.",
    "Great attention to detail!",
    "The typography is spot on.",
    "Nice work, very polished.",
];

/// How one claimed task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Executed,
    /// Actor had already performed this action; completed without side effect.
    Duplicate,
    Failed(String),
    /// Another runner moved the task out of pending first.
    Skipped,
}

pub struct TaskQueue {
    store: Arc<dyn Storage>,
    executor: Arc<dyn ActionExecutor>,
    rng: Arc<SharedRng>,
    cfg: TaskQueueConfig,
}

impl TaskQueue {
    pub fn new(
        store: Arc<dyn Storage>,
        executor: Arc<dyn ActionExecutor>,
        rng: Arc<SharedRng>,
        cfg: TaskQueueConfig,
    ) -> Self {
        Self {
            store,
            executor,
            rng,
            cfg,
        }
    }

    fn random_delay(&self) -> EpochMs {
        let (lo, hi) = self.cfg.delay_range_ms();
        self.rng.between_i64(lo, hi)
    }

    /// Persists a pending task scheduled a random 2–4 minutes out.
    pub fn enqueue(
        &self,
        actor: &ActorId,
        action: ActionKind,
        target_kind: TargetKind,
        target: TargetId,
        priority: Priority,
        now: EpochMs,
    ) -> Result<Task> {
        let delay = self.random_delay();
        self.enqueue_with_delay(actor, action, target_kind, target, priority, now, delay)
    }

    /// Like [`TaskQueue::enqueue`] with an explicit delay.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_with_delay(
        &self,
        actor: &ActorId,
        action: ActionKind,
        target_kind: TargetKind,
        target: TargetId,
        priority: Priority,
        now: EpochMs,
        delay_ms: EpochMs,
    ) -> Result<Task> {
        let task = Task {
            id: TaskId::new(),
            actor_id: actor.clone(),
            action,
            target_kind,
            target_id: target,
            scheduled_for_ms: now + delay_ms.max(0),
            status: TaskStatus::Pending,
            attempts: 0,
            last_attempt_ms: None,
            error: None,
            priority,
            payload: None,
            created_ms: now,
            completed_ms: None,
        };
        self.store.insert_task(&task)?;
        debug!(
            task = %task.id,
            actor = %actor,
            action = action.as_str(),
            due = task.scheduled_for_ms,
            "task enqueued"
        );
        Ok(task)
    }

    pub fn claim_due(&self, now: EpochMs, limit: usize) -> Result<Vec<Task>> {
        Ok(self.store.due_tasks(now, limit)?)
    }

    fn payload_for(&self, task: &Task) -> Option<ActionPayload> {
        if let Some(p) = &task.payload {
            return Some(p.clone());
        }
        match task.action {
            ActionKind::Vote => {
                let scores: BTreeMap<String, u8> = VOTE_ASPECTS
                    .iter()
                    .map(|a| (a.to_string(), self.rng.between_u32(6, 10) as u8))
                    .collect();
                Some(ActionPayload::VoteScores { scores })
            }
            ActionKind::Comment => self.rng.choose(COMMENTS).map(|body| ActionPayload::Comment {
                body: body.to_string(),
            }),
            _ => None,
        }
    }

    fn dispatch(&self, task: &Task) -> std::result::Result<(), CollaboratorError> {
        let actor = &task.actor_id;
        let target = &task.target_id;
        match (task.action, task.target_kind) {
            (ActionKind::Vote, TargetKind::Content) => {
                let scores = match self.payload_for(task) {
                    Some(ActionPayload::VoteScores { scores }) => scores,
                    _ => BTreeMap::new(),
                };
                self.executor
                    .record_vote(actor, &target.to_content(), &scores)
            }
            (ActionKind::Follow, TargetKind::User) => {
                self.executor.record_follow(actor, &target.to_user())
            }
            (ActionKind::Like, TargetKind::SecondaryArtifact) => {
                self.executor.record_like(actor, &target.to_artifact())
            }
            (ActionKind::Comment, TargetKind::SecondaryArtifact) => {
                let body = match self.payload_for(task) {
                    Some(ActionPayload::Comment { body }) => body,
                    _ => String::new(),
                };
                self.executor
                    .record_comment(actor, &target.to_artifact(), &body)
            }
            (ActionKind::TakeReference, TargetKind::SecondaryArtifact) => self
                .executor
                .record_take_reference(actor, &target.to_artifact()),
            (action, kind) => Err(CollaboratorError::Unavailable(format!(
                "{} is not supported on a {} target",
                action.as_str(),
                kind.as_str()
            ))),
        }
    }

    fn already_done(&self, task: &Task) -> std::result::Result<bool, CollaboratorError> {
        if self
            .store
            .has_completed(&task.actor_id, &task.target_id, task.action)?
        {
            return Ok(true);
        }
        self.executor
            .has_actor_acted(&task.actor_id, &task.target_id, task.action)
    }

    /// Runs one claimed task. Failures are recorded on the task, never raised.
    pub fn execute(&self, task: &Task, now: EpochMs) -> Result<Execution> {
        let outcome = match self.already_done(task) {
            Ok(true) => {
                return Ok(if self.store.complete_task(&task.id, now)? {
                    debug!(task = %task.id, "duplicate action, completed without side effect");
                    Execution::Duplicate
                } else {
                    Execution::Skipped
                });
            }
            Ok(false) => self.dispatch(task),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                if !self.store.complete_task(&task.id, now)? {
                    return Ok(Execution::Skipped);
                }
                self.store.record_activity(&task.actor_id, now)?;
                debug!(task = %task.id, action = task.action.as_str(), "task executed");
                Ok(Execution::Executed)
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(task = %task.id, actor = %task.actor_id, "task failed: {msg}");
                if self.store.fail_task(&task.id, now, &msg)? {
                    Ok(Execution::Failed(msg))
                } else {
                    Ok(Execution::Skipped)
                }
            }
        }
    }

    /// Claims one bounded batch and executes it sequentially.
    pub fn tick(&self, now: EpochMs) -> Result<TickSummary> {
        let due = self.claim_due(now, self.cfg.batch_size)?;
        let mut summary = TickSummary {
            claimed: due.len(),
            ..Default::default()
        };
        for task in &due {
            match self.execute(task, now) {
                Ok(Execution::Executed) => summary.executed += 1,
                Ok(Execution::Duplicate) => summary.duplicates += 1,
                Ok(Execution::Failed(_)) => summary.failed += 1,
                Ok(Execution::Skipped) => {}
                Err(e) => {
                    warn!(task = %task.id, "task bookkeeping failed: {e}");
                    summary.failed += 1;
                }
            }
        }
        if summary.claimed > 0 {
            info!(
                claimed = summary.claimed,
                executed = summary.executed,
                duplicates = summary.duplicates,
                failed = summary.failed,
                "task tick"
            );
        }
        Ok(summary)
    }

    /// Moves a failed task back to pending with a fresh random delay.
    pub fn resubmit(&self, id: &TaskId, now: EpochMs) -> Result<ResubmitResponse> {
        let task = self
            .store
            .get_task(id)?
            .ok_or_else(|| PulseError::not_found("task", id))?;
        if task.status != TaskStatus::Failed {
            return Err(PulseError::Validation(format!(
                "task {id} is {}, only failed tasks can be resubmitted",
                task.status.as_str()
            )));
        }
        let scheduled_for_ms = now + self.random_delay();
        if !self.store.requeue_task(id, scheduled_for_ms)? {
            return Err(PulseError::Validation(format!(
                "task {id} changed status concurrently"
            )));
        }
        info!(task = %id, scheduled_for_ms, "task resubmitted");
        Ok(ResubmitResponse {
            task_id: id.clone(),
            scheduled_for_ms,
        })
    }

    pub fn counts(&self) -> Result<TaskCounts> {
        Ok(self.store.task_counts()?)
    }
}
