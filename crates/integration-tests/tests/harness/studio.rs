//! Fully wired studio built from a test configuration

use std::sync::Arc;

use atelier_config::Config;
use atelier_providers::AdapterRegistry;
use atelier_store::{QuotaTracker, SessionQuota, StatsRecorder, StoreClient};
use atelier_studio::{AssetPersistencePipeline, FeedbackCoordinator, GenerationOrchestrator, History};

/// Registry, orchestrator and feedback sharing one history
pub struct TestStudio {
    pub registry: Arc<AdapterRegistry>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub feedback: Option<Arc<FeedbackCoordinator>>,
}

impl TestStudio {
    pub fn build(config: &Config) -> Self {
        let registry = Arc::new(AdapterRegistry::from_config(config));
        let history = Arc::new(History::new());
        let store = config
            .store
            .as_ref()
            .map(|c| Arc::new(StoreClient::from_config(c).expect("store client")));

        let quota: Arc<dyn QuotaTracker> = match (&store, &config.store) {
            (Some(client), Some(c)) if c.remote_quota => Arc::clone(client) as Arc<dyn QuotaTracker>,
            _ => Arc::new(SessionQuota::new(config.quota.max_generations)),
        };

        let mut orchestrator = GenerationOrchestrator::new(Arc::clone(&registry), quota)
            .with_config(&config.studio)
            .with_history(Arc::clone(&history));

        let mut feedback = None;
        if let Some(client) = store {
            let pipeline = AssetPersistencePipeline::new(client.clone(), client.clone())
                .with_stats(StatsRecorder::new(client.clone()))
                .with_public_by_default(config.studio.public_by_default);
            orchestrator = orchestrator.with_persistence(Arc::new(pipeline));
            feedback = Some(Arc::new(FeedbackCoordinator::new(history, client)));
        }

        Self {
            registry,
            orchestrator: Arc::new(orchestrator),
            feedback,
        }
    }

    pub fn feedback(&self) -> &Arc<FeedbackCoordinator> {
        self.feedback.as_ref().expect("studio built without a store")
    }
}
