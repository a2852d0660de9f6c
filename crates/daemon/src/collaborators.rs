//! Ports to the systems the engine acts upon, and the store-backed adapters
//! the daemon wires in.

use std::collections::BTreeMap;
use std::sync::Arc;

use pulse_core::model::{
    ActionKind, ContentStats, Curator, CuratorRating, IdentityAsset, Notification, TargetKind,
};
use pulse_core::{now_ms, ActorId, ArtifactId, ContentId, IdentityId, TargetId, UserId};
use pulse_store::Storage;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("target unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// Performs the social side effect of a task.
pub trait ActionExecutor: Send + Sync {
    fn has_actor_acted(&self, actor: &ActorId, target: &TargetId, kind: ActionKind)
        -> CollabResult<bool>;
    fn record_vote(
        &self,
        actor: &ActorId,
        content: &ContentId,
        scores: &BTreeMap<String, u8>,
    ) -> CollabResult<()>;
    fn record_like(&self, actor: &ActorId, artifact: &ArtifactId) -> CollabResult<()>;
    fn record_follow(&self, actor: &ActorId, user: &UserId) -> CollabResult<()>;
    fn record_comment(&self, actor: &ActorId, artifact: &ArtifactId, body: &str)
        -> CollabResult<()>;
    fn record_take_reference(&self, actor: &ActorId, artifact: &ArtifactId) -> CollabResult<()>;
}

/// Read access to curator profiles and their ratings.
pub trait CuratorSource: Send + Sync {
    fn curators(&self) -> CollabResult<Vec<Curator>>;
    fn ratings_for(&self, content: &ContentId) -> CollabResult<Vec<CuratorRating>>;
}

pub trait IdentityStore: Send + Sync {
    fn list_unassigned(&self) -> CollabResult<Vec<IdentityAsset>>;
    /// `false` when either side is already paired.
    fn assign(&self, identity: &IdentityId, actor: &ActorId) -> CollabResult<bool>;
    fn unassign(&self, identity: &IdentityId) -> CollabResult<bool>;
    fn reset_all(&self) -> CollabResult<usize>;
}

pub trait StatsSource: Send + Sync {
    fn stats(&self, content: &ContentId) -> CollabResult<ContentStats>;
}

/// Best-effort delivery. Implementations never fail the caller.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, recipient: &UserId, actor: &ActorId, kind: &str, metadata: serde_json::Value);
}

/// Every collaborator port backed by the engine's own storage.
#[derive(Clone)]
pub struct StoreCollaborators {
    store: Arc<dyn Storage>,
}

impl StoreCollaborators {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    fn live_content(&self, id: &ContentId) -> CollabResult<()> {
        match self.store.get_content(id)? {
            None => Err(CollaboratorError::TargetNotFound(format!("content {id}"))),
            Some(c) if c.retracted => Err(CollaboratorError::Unavailable(format!(
                "content {id} is retracted"
            ))),
            Some(_) => Ok(()),
        }
    }

    fn live_artifact(&self, id: &ArtifactId) -> CollabResult<pulse_core::model::Artifact> {
        let artifact = self
            .store
            .get_artifact(id)?
            .ok_or_else(|| CollaboratorError::TargetNotFound(format!("artifact {id}")))?;
        self.live_content(&artifact.content_id)?;
        Ok(artifact)
    }

    fn ledger(
        &self,
        actor: &ActorId,
        target_kind: TargetKind,
        target: TargetId,
        kind: ActionKind,
    ) -> CollabResult<bool> {
        Ok(self
            .store
            .record_action(actor, target_kind, &target, kind, now_ms())?)
    }
}

impl ActionExecutor for StoreCollaborators {
    fn has_actor_acted(
        &self,
        actor: &ActorId,
        target: &TargetId,
        kind: ActionKind,
    ) -> CollabResult<bool> {
        Ok(self.store.has_action(actor, target, kind)?)
    }

    fn record_vote(
        &self,
        actor: &ActorId,
        content: &ContentId,
        scores: &BTreeMap<String, u8>,
    ) -> CollabResult<()> {
        self.live_content(content)?;
        if self.ledger(actor, TargetKind::Content, content.into(), ActionKind::Vote)? {
            debug!(%actor, %content, ?scores, "vote recorded");
        }
        Ok(())
    }

    fn record_like(&self, actor: &ActorId, artifact: &ArtifactId) -> CollabResult<()> {
        let a = self.live_artifact(artifact)?;
        if !self.ledger(
            actor,
            TargetKind::SecondaryArtifact,
            artifact.into(),
            ActionKind::Like,
        )? {
            return Ok(());
        }
        self.store.increment_artifact_likes(artifact)?;
        self.emit(
            &a.owner_id,
            actor,
            "like",
            serde_json::json!({ "artifact_id": artifact, "content_id": a.content_id }),
        );
        Ok(())
    }

    fn record_follow(&self, actor: &ActorId, user: &UserId) -> CollabResult<()> {
        if self.ledger(actor, TargetKind::User, user.into(), ActionKind::Follow)? {
            self.emit(user, actor, "follow", serde_json::json!({}));
        }
        Ok(())
    }

    fn record_comment(
        &self,
        actor: &ActorId,
        artifact: &ArtifactId,
        body: &str,
    ) -> CollabResult<()> {
        let a = self.live_artifact(artifact)?;
        if self.ledger(
            actor,
            TargetKind::SecondaryArtifact,
            artifact.into(),
            ActionKind::Comment,
        )? {
            self.emit(
                &a.owner_id,
                actor,
                "comment",
                serde_json::json!({ "artifact_id": artifact, "body": body }),
            );
        }
        Ok(())
    }

    fn record_take_reference(&self, actor: &ActorId, artifact: &ArtifactId) -> CollabResult<()> {
        self.live_artifact(artifact)?;
        self.ledger(
            actor,
            TargetKind::SecondaryArtifact,
            artifact.into(),
            ActionKind::TakeReference,
        )?;
        Ok(())
    }
}

impl CuratorSource for StoreCollaborators {
    fn curators(&self) -> CollabResult<Vec<Curator>> {
        Ok(self.store.list_curators()?)
    }

    fn ratings_for(&self, content: &ContentId) -> CollabResult<Vec<CuratorRating>> {
        Ok(self.store.ratings_for(content)?)
    }
}

impl IdentityStore for StoreCollaborators {
    fn list_unassigned(&self) -> CollabResult<Vec<IdentityAsset>> {
        Ok(self.store.unassigned_identities()?)
    }

    fn assign(&self, identity: &IdentityId, actor: &ActorId) -> CollabResult<bool> {
        Ok(self.store.assign_identity(actor, identity)?)
    }

    fn unassign(&self, identity: &IdentityId) -> CollabResult<bool> {
        Ok(self.store.unassign_identity(identity)?)
    }

    fn reset_all(&self) -> CollabResult<usize> {
        Ok(self.store.reset_identities()?)
    }
}

impl StatsSource for StoreCollaborators {
    fn stats(&self, content: &ContentId) -> CollabResult<ContentStats> {
        self.store
            .get_content(content)?
            .map(|c| c.stats)
            .ok_or_else(|| CollaboratorError::TargetNotFound(format!("content {content}")))
    }
}

impl NotificationSink for StoreCollaborators {
    fn emit(&self, recipient: &UserId, actor: &ActorId, kind: &str, metadata: serde_json::Value) {
        let n = Notification {
            recipient: recipient.clone(),
            actor: actor.clone(),
            kind: kind.to_string(),
            metadata,
            created_ms: now_ms(),
        };
        if let Err(e) = self.store.insert_notification(&n) {
            warn!(%recipient, kind, "notification dropped: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::model::{Artifact, Content};
    use pulse_store::InMemoryStorage;

    fn setup() -> (Arc<dyn Storage>, StoreCollaborators, Content, Artifact) {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let owner = UserId::parse("owner1").unwrap();
        let content = Content::new(owner.clone(), "Landing page", 0);
        store.upsert_content(&content).unwrap();
        let artifact = Artifact {
            id: ArtifactId::new(),
            content_id: content.id.clone(),
            owner_id: owner,
            like_count: 0,
            created_ms: 0,
        };
        store.upsert_artifact(&artifact).unwrap();
        (store.clone(), StoreCollaborators::new(store), content, artifact)
    }

    #[test]
    fn like_counts_once_and_notifies_owner() {
        let (store, collab, _, artifact) = setup();
        let actor = ActorId::new();
        collab.record_like(&actor, &artifact.id).unwrap();
        collab.record_like(&actor, &artifact.id).unwrap();

        let a = store.get_artifact(&artifact.id).unwrap().unwrap();
        assert_eq!(a.like_count, 1);
        let notes = store.notifications_for(&artifact.owner_id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, "like");
        assert!(collab
            .has_actor_acted(&actor, &(&artifact.id).into(), ActionKind::Like)
            .unwrap());
    }

    #[test]
    fn retracted_content_is_not_a_target() {
        let (store, collab, content, artifact) = setup();
        store.set_retracted(&content.id).unwrap();
        let actor = ActorId::new();
        let err = collab.record_like(&actor, &artifact.id).unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
        let err = collab
            .record_vote(&actor, &content.id, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[test]
    fn unknown_artifact_is_not_found() {
        let (_, collab, _, _) = setup();
        let err = collab
            .record_take_reference(&ActorId::new(), &ArtifactId::new())
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::TargetNotFound(_)));
    }
}
