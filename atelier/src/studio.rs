use std::sync::Arc;

use atelier_config::Config;
use atelier_providers::AdapterRegistry;
use atelier_store::{QuotaTracker, SessionQuota, StatsRecorder, StoreClient};
use atelier_studio::{AssetPersistencePipeline, GenerationOrchestrator};

/// Components of one command line session, built once from config
pub struct Studio {
    pub registry: Arc<AdapterRegistry>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    store: Option<Arc<StoreClient>>,
}

impl Studio {
    /// Wire registry, quota, persistence and orchestrator
    ///
    /// Without a `[store]` section the session is local only: no uploads,
    /// no records and an in-process quota.
    pub fn build(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(AdapterRegistry::from_config(config));

        let store = config
            .store
            .as_ref()
            .map(StoreClient::from_config)
            .transpose()?
            .map(Arc::new);

        let quota: Arc<dyn QuotaTracker> = match (&store, &config.store) {
            (Some(client), Some(store_config)) if store_config.remote_quota => {
                tracing::info!("using remote quota");
                Arc::clone(client) as Arc<dyn QuotaTracker>
            }
            _ => Arc::new(SessionQuota::new(config.quota.max_generations)),
        };

        let mut orchestrator = GenerationOrchestrator::new(Arc::clone(&registry), quota)
            .with_config(&config.studio);

        if let Some(client) = &store {
            let pipeline = AssetPersistencePipeline::new(client.clone(), client.clone())
                .with_stats(StatsRecorder::new(client.clone()))
                .with_public_by_default(config.studio.public_by_default);
            orchestrator = orchestrator.with_persistence(Arc::new(pipeline));
        } else {
            tracing::info!("no store configured, generations stay local");
        }

        Ok(Self {
            registry,
            orchestrator: Arc::new(orchestrator),
            store,
        })
    }

    /// Whether generations are written to a store
    pub fn persists(&self) -> bool {
        self.store.is_some()
    }
}
