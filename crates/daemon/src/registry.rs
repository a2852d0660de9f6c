//! Synthetic actor pool: bulk generation, lookup, identity pairing.

use std::sync::Arc;

use pulse_core::api::{DistributionSummary, GenerateSummary, ResetSummary};
use pulse_core::config::RegistryConfig;
use pulse_core::model::{Actor, ActorStatus};
use pulse_core::{ActorId, EpochMs, IdentityId, PulseError, Result};
use pulse_store::{ActorFilter, Storage};
use tracing::{info, warn};

use crate::collaborators::IdentityStore;
use crate::rng::SharedRng;

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "clever", "crisp", "daring", "eager", "fuzzy", "gentle",
    "golden", "happy", "hidden", "jolly", "keen", "lively", "lucky", "mellow", "misty", "nimble",
    "noble", "plucky", "quiet", "rapid", "rustic", "shiny", "silent", "sleepy", "steady", "sunny",
    "swift", "tidy", "vivid", "wild", "witty", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "brook", "canyon", "cedar", "comet", "coral", "crane", "dune", "ember",
    "falcon", "fern", "fox", "harbor", "heron", "lantern", "maple", "meadow", "otter", "owl",
    "panda", "pebble", "pixel", "quill", "raven", "reef", "river", "sparrow", "spruce", "tiger",
    "voyager", "willow", "wolf", "zephyr",
];

pub struct ActorRegistry {
    store: Arc<dyn Storage>,
    identities: Arc<dyn IdentityStore>,
    rng: Arc<SharedRng>,
    cfg: RegistryConfig,
}

impl ActorRegistry {
    pub fn new(
        store: Arc<dyn Storage>,
        identities: Arc<dyn IdentityStore>,
        rng: Arc<SharedRng>,
        cfg: RegistryConfig,
    ) -> Self {
        Self {
            store,
            identities,
            rng,
            cfg,
        }
    }

    fn handle(&self) -> String {
        let adj = self.rng.choose(ADJECTIVES).copied().unwrap_or("quiet");
        let noun = self.rng.choose(NOUNS).copied().unwrap_or("fox");
        let suffix = self.rng.between_u32(10, 9999);
        format!("{adj}_{noun}{suffix}")
    }

    fn fallback_handle(&self, now: EpochMs, i: usize) -> String {
        let adj = self.rng.choose(ADJECTIVES).copied().unwrap_or("quiet");
        let noun = self.rng.choose(NOUNS).copied().unwrap_or("fox");
        format!("{adj}_{noun}_{}", now + i as EpochMs)
    }

    /// Creates `count` actors with unique handles.
    ///
    /// Only the first actors up to the vote-eligible ceiling get `can_vote`;
    /// existing eligible actors count against the ceiling. Counts above
    /// `max_generate` are rejected before any insert.
    pub fn generate(&self, count: usize, now: EpochMs) -> Result<GenerateSummary> {
        if count > self.cfg.max_generate {
            return Err(PulseError::Validation(format!(
                "count {count} exceeds the maximum of {}",
                self.cfg.max_generate
            )));
        }
        let existing = self.store.actor_counts()?.vote_eligible as usize;
        let mut vote_slots = self.cfg.vote_eligible_limit.saturating_sub(existing);
        let mut summary = GenerateSummary::default();

        for i in 0..count {
            let can_vote = vote_slots > 0;
            let mut inserted = false;
            for _ in 0..self.cfg.handle_attempts.max(1) {
                let actor = Actor::new(self.handle(), can_vote, now);
                if self.store.try_insert_actor(&actor)? {
                    inserted = true;
                    break;
                }
            }
            if !inserted {
                let actor = Actor::new(self.fallback_handle(now, i), can_vote, now);
                if !self.store.try_insert_actor(&actor)? {
                    warn!(handle = %actor.handle, "fallback handle collided; actor skipped");
                    continue;
                }
                summary.fallback_handles += 1;
            }
            summary.created += 1;
            if can_vote {
                summary.vote_eligible += 1;
                vote_slots -= 1;
            }
        }

        info!(
            created = summary.created,
            vote_eligible = summary.vote_eligible,
            fallback = summary.fallback_handles,
            "actors generated"
        );
        Ok(summary)
    }

    pub fn get(&self, id: &ActorId) -> Result<Actor> {
        self.store
            .get_actor(id)?
            .ok_or_else(|| PulseError::not_found("actor", id))
    }

    pub fn list(&self, filter: &ActorFilter) -> Result<Vec<Actor>> {
        Ok(self.store.list_actors(filter)?)
    }

    /// Exclusive 1:1 pairing of an actor with an identity asset.
    pub fn assign_identity(&self, actor: &ActorId, identity: &IdentityId) -> Result<()> {
        let a = self.get(actor)?;
        if a.identity_id.is_some() {
            return Err(PulseError::AlreadyAssigned {
                actor: actor.clone(),
                identity: identity.clone(),
            });
        }
        let assigned = self
            .identities
            .assign(identity, actor)
            .map_err(|e| PulseError::ExternalDependency(e.to_string()))?;
        if !assigned {
            return Err(PulseError::AlreadyAssigned {
                actor: actor.clone(),
                identity: identity.clone(),
            });
        }
        Ok(())
    }

    /// Pairs unassigned vote-eligible actors with shuffled free identities.
    ///
    /// An unreachable identity source degrades to an empty asset list.
    pub fn distribute_identities(&self) -> Result<DistributionSummary> {
        let candidates: Vec<Actor> = self
            .store
            .list_actors(&ActorFilter {
                status: Some(ActorStatus::Active),
                can_vote: Some(true),
                limit: None,
            })?
            .into_iter()
            .filter(|a| a.identity_id.is_none())
            .collect();

        let mut assets = match self.identities.list_unassigned() {
            Ok(v) => v,
            Err(e) => {
                warn!("identity source unavailable, distributing nothing: {e}");
                Vec::new()
            }
        };
        self.rng.shuffle(&mut assets);

        let mut summary = DistributionSummary {
            candidates: candidates.len(),
            available: assets.len(),
            ..Default::default()
        };

        for (actor, asset) in candidates.iter().zip(assets.iter()) {
            match self.assign_identity(&actor.id, &asset.id) {
                Ok(()) => summary.assigned += 1,
                Err(e) => {
                    warn!(actor = %actor.id, identity = %asset.id, "identity pairing failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        info!(
            candidates = summary.candidates,
            available = summary.available,
            assigned = summary.assigned,
            "identities distributed"
        );
        Ok(summary)
    }

    /// Releases every pairing, then distributes again.
    pub fn reset_identities(&self) -> Result<ResetSummary> {
        let cleared = self
            .identities
            .reset_all()
            .map_err(|e| PulseError::ExternalDependency(e.to_string()))?;
        info!(cleared, "identities reset");
        let distribution = self.distribute_identities()?;
        Ok(ResetSummary {
            cleared,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::StoreCollaborators;
    use pulse_core::model::IdentityAsset;
    use pulse_store::InMemoryStorage;

    fn registry(limit: usize) -> (Arc<dyn Storage>, ActorRegistry) {
        let store: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let collab = Arc::new(StoreCollaborators::new(store.clone()));
        let cfg = RegistryConfig {
            vote_eligible_limit: limit,
            handle_attempts: 10,
            max_generate: 100,
        };
        let reg = ActorRegistry::new(store.clone(), collab, Arc::new(SharedRng::seeded(3)), cfg);
        (store, reg)
    }

    fn identity(url: &str) -> IdentityAsset {
        IdentityAsset {
            id: IdentityId::new(),
            url: url.to_string(),
            assigned_to: None,
        }
    }

    #[test]
    fn vote_eligible_never_exceeds_ceiling() {
        let (store, reg) = registry(5);
        let s = reg.generate(8, 1_000).unwrap();
        assert_eq!(s.created, 8);
        assert_eq!(s.vote_eligible, 5);

        let s = reg.generate(4, 2_000).unwrap();
        assert_eq!(s.vote_eligible, 0);
        let counts = store.actor_counts().unwrap();
        assert_eq!(counts.total, 12);
        assert_eq!(counts.vote_eligible, 5);
    }

    #[test]
    fn oversized_generate_is_rejected_without_inserting() {
        let (store, reg) = registry(5);
        let err = reg.generate(101, 0).unwrap_err();
        assert!(matches!(err, PulseError::Validation(_)), "{err}");
        assert_eq!(store.actor_counts().unwrap().total, 0);

        assert_eq!(reg.generate(100, 0).unwrap().created, 100);
    }

    #[test]
    fn handles_are_unique() {
        let (store, reg) = registry(80);
        reg.generate(60, 0).unwrap();
        let mut handles: Vec<String> = store
            .list_actors(&ActorFilter::default())
            .unwrap()
            .into_iter()
            .map(|a| a.handle)
            .collect();
        let n = handles.len();
        handles.sort();
        handles.dedup();
        assert_eq!(handles.len(), n);
        assert!(handles.iter().all(|h| h.contains('_')));
    }

    #[test]
    fn assignment_is_exclusive() {
        let (store, reg) = registry(2);
        reg.generate(2, 0).unwrap();
        let actors = store.list_actors(&ActorFilter::default()).unwrap();
        let asset = identity("https://cdn.example/a.png");
        store.insert_identity(&asset).unwrap();

        reg.assign_identity(&actors[0].id, &asset.id).unwrap();
        let err = reg.assign_identity(&actors[1].id, &asset.id).unwrap_err();
        assert!(matches!(err, PulseError::AlreadyAssigned { .. }));
        let err = reg.assign_identity(&ActorId::new(), &asset.id).unwrap_err();
        assert!(matches!(err, PulseError::NotFound { .. }));
    }

    #[test]
    fn distribution_is_capped_by_smaller_side() {
        let (store, reg) = registry(4);
        reg.generate(6, 0).unwrap();
        for i in 0..2 {
            store.insert_identity(&identity(&format!("u{i}"))).unwrap();
        }
        let s = reg.distribute_identities().unwrap();
        assert_eq!(s.candidates, 4);
        assert_eq!(s.available, 2);
        assert_eq!(s.assigned, 2);

        let r = reg.reset_identities().unwrap();
        assert_eq!(r.cleared, 2);
        assert_eq!(r.distribution.assigned, 2);
        assert_eq!(r.distribution.candidates, 4);
    }
}
