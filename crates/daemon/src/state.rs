use std::sync::Arc;

use pulse_core::config::EngineConfig;
use pulse_store::Storage;

use crate::collaborators::StoreCollaborators;
use crate::distributor::ReferenceDistributor;
use crate::health::HealthMonitor;
use crate::orchestrator::Orchestrator;
use crate::popularity::PopularityManager;
use crate::quality::QualityAggregator;
use crate::registry::ActorRegistry;
use crate::rng::SharedRng;
use crate::selector::EligibilitySelector;
use crate::task_queue::TaskQueue;

/// Every service, wired once over one store.
pub struct Engine {
    pub store: Arc<dyn Storage>,
    pub config: EngineConfig,
    pub registry: Arc<ActorRegistry>,
    pub tasks: Arc<TaskQueue>,
    pub selector: Arc<EligibilitySelector>,
    pub quality: Arc<QualityAggregator>,
    pub health: Arc<HealthMonitor>,
    pub distributor: Arc<ReferenceDistributor>,
    pub popularity: Arc<PopularityManager>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Engine {
    pub fn new(store: Arc<dyn Storage>, config: EngineConfig, rng: SharedRng) -> Self {
        let rng = Arc::new(rng);
        let collab = Arc::new(StoreCollaborators::new(store.clone()));

        let registry = Arc::new(ActorRegistry::new(
            store.clone(),
            collab.clone(),
            rng.clone(),
            config.registry.clone(),
        ));
        let tasks = Arc::new(TaskQueue::new(
            store.clone(),
            collab.clone(),
            rng.clone(),
            config.tasks.clone(),
        ));
        let selector = Arc::new(EligibilitySelector::new(
            store.clone(),
            collab.clone(),
            tasks.clone(),
            rng.clone(),
            config.selection.clone(),
            config.quality.clone(),
        ));
        let quality = Arc::new(QualityAggregator::new(
            store.clone(),
            collab,
            rng.clone(),
            config.quality.clone(),
        ));
        let health = Arc::new(HealthMonitor::new(
            store.clone(),
            tasks.clone(),
            rng.clone(),
            config.health.clone(),
        ));
        let distributor = Arc::new(ReferenceDistributor::new(
            store.clone(),
            tasks.clone(),
            rng.clone(),
            config.distributor.clone(),
        ));
        let popularity = Arc::new(PopularityManager::new(
            store.clone(),
            config.popularity.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            selector.clone(),
            quality.clone(),
            popularity.clone(),
            rng,
            config.pipeline.clone(),
        ));

        Self {
            store,
            config,
            registry,
            tasks,
            selector,
            quality,
            health,
            distributor,
            popularity,
            orchestrator,
        }
    }
}
