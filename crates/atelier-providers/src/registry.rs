//! Model to adapter mapping with lazily created, memoized instances
//!
//! One adapter instance exists per model. Creation for a given model is a
//! critical section: concurrent callers share a single
//! [`OnceCell`] so the factory and `initialize` run at most once per
//! successful instance. A failed initialization leaves the cell empty and
//! the next caller retries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use atelier_config::{Config, ProviderType};
use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::OnceCell;

use crate::adapter::{GenericAdapter, OpenAiAdapter, ProviderAdapter, ProviderAdapterStatus, ReplicateAdapter};
use crate::error::{ProviderError, Result};
use crate::settings::{ModelProfile, ProviderSettings};

/// Builds an adapter instance for a model
pub type AdapterFactory =
    Arc<dyn Fn(ModelProfile, &ProviderSettings) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync>;

type AdapterCell = Arc<OnceCell<Arc<dyn ProviderAdapter>>>;

/// Wrap a closure as an [`AdapterFactory`]
pub fn adapter_factory<F>(factory: F) -> AdapterFactory
where
    F: Fn(ModelProfile, &ProviderSettings) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Registry of adapter factories and live adapter instances
pub struct AdapterRegistry {
    factories: RwLock<HashMap<String, AdapterFactory>>,
    providers: IndexMap<String, ProviderSettings>,
    models: IndexMap<String, ModelProfile>,
    live: DashMap<String, AdapterCell>,
}

impl AdapterRegistry {
    /// Create a registry with the built-in adapters registered
    pub fn new(models: impl IntoIterator<Item = ModelProfile>, providers: impl IntoIterator<Item = ProviderSettings>) -> Self {
        let registry = Self {
            factories: RwLock::new(HashMap::new()),
            providers: providers.into_iter().map(|p| (p.name.clone(), p)).collect(),
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
            live: DashMap::new(),
        };

        registry.register(
            ProviderType::Replicate.adapter_id(),
            adapter_factory(|model, settings| Ok(Arc::new(ReplicateAdapter::new(model, settings)) as Arc<dyn ProviderAdapter>)),
        );
        registry.register(
            ProviderType::Openai.adapter_id(),
            adapter_factory(|model, settings| Ok(Arc::new(OpenAiAdapter::new(model, settings)) as Arc<dyn ProviderAdapter>)),
        );
        registry.register(
            ProviderType::Generic.adapter_id(),
            adapter_factory(|model, settings| Ok(Arc::new(GenericAdapter::new(model, settings)) as Arc<dyn ProviderAdapter>)),
        );

        registry
    }

    /// Build a registry from the configured providers and models
    pub fn from_config(config: &Config) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(name, provider)| ProviderSettings::from_config(name, provider));
        let models = config.models.iter().map(ModelProfile::from);

        let registry = Self::new(models, providers);

        tracing::info!(
            models = registry.models.len(),
            providers = registry.providers.len(),
            "adapter registry initialized"
        );

        registry
    }

    /// Register an adapter factory under `adapter_id`
    ///
    /// Returns false and keeps the existing factory when the id is taken.
    pub fn register(&self, adapter_id: &str, factory: AdapterFactory) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.contains_key(adapter_id) {
            tracing::warn!(adapter = adapter_id, "adapter already registered, keeping existing factory");
            return false;
        }
        factories.insert(adapter_id.to_owned(), factory);
        true
    }

    /// Look up a configured model
    pub fn model(&self, id: &str) -> Option<&ModelProfile> {
        self.models.get(id)
    }

    /// All configured models, in configuration order
    pub fn models(&self) -> impl Iterator<Item = &ModelProfile> {
        self.models.values()
    }

    /// Return the adapter serving `model_id`, creating it on first use
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownModel`] for unconfigured models and
    /// propagates factory or `initialize` failures
    pub async fn create_adapter(&self, model_id: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let model = self
            .models
            .get(model_id)
            .ok_or_else(|| ProviderError::UnknownModel(model_id.to_owned()))?;

        // Clone the cell out so no map guard is held across the await
        let cell = Arc::clone(
            self.live
                .entry(model_id.to_owned())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let adapter = cell.get_or_try_init(|| self.instantiate(model)).await?;
        Ok(Arc::clone(adapter))
    }

    async fn instantiate(&self, model: &ModelProfile) -> Result<Arc<dyn ProviderAdapter>> {
        let (adapter_id, settings) = self.resolve(model);

        let factory = {
            let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
            factories.get(&adapter_id).cloned()
        }
        .ok_or_else(|| ProviderError::Initialization {
            adapter: adapter_id.clone(),
            message: "no factory registered".to_owned(),
        })?;

        let adapter = factory(model.clone(), &settings)?;

        if let Err(e) = adapter.initialize().await {
            tracing::warn!(model = %model.id, adapter = %adapter_id, error = %e, "adapter initialization failed");
            return Err(e);
        }

        tracing::debug!(model = %model.id, adapter = %adapter_id, provider = %settings.name, "adapter created");
        Ok(adapter)
    }

    /// Pick the adapter id and settings for a model
    ///
    /// A configured provider entry wins. A provider field naming a
    /// registered plugin uses it with default settings. Anything else
    /// falls back to the first generic provider.
    fn resolve(&self, model: &ModelProfile) -> (String, ProviderSettings) {
        if let Some(settings) = self.providers.get(&model.provider) {
            return (settings.provider_type.adapter_id().to_owned(), settings.clone());
        }

        let is_plugin = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&model.provider);
        if is_plugin {
            let mut settings = ProviderSettings::unconfigured(ProviderType::Generic);
            settings.name.clone_from(&model.provider);
            return (model.provider.clone(), settings);
        }

        let settings = self
            .providers
            .values()
            .find(|p| p.provider_type == ProviderType::Generic)
            .cloned()
            .unwrap_or_else(|| ProviderSettings::unconfigured(ProviderType::Generic));

        (ProviderType::Generic.adapter_id().to_owned(), settings)
    }

    /// Live adapters, keyed by model id
    fn live_adapters(&self) -> Vec<(String, Arc<dyn ProviderAdapter>)> {
        self.live
            .iter()
            .filter_map(|entry| entry.value().get().map(|a| (entry.key().clone(), Arc::clone(a))))
            .collect()
    }

    /// Number of instantiated adapters
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|entry| entry.value().initialized()).count()
    }

    /// Probe every instantiated adapter concurrently
    ///
    /// Each probe runs on its own task, so a panicking adapter only marks
    /// its own model unavailable.
    pub async fn check_all_status(&self) -> BTreeMap<String, ProviderAdapterStatus> {
        let (models, handles): (Vec<_>, Vec<_>) = self
            .live_adapters()
            .into_iter()
            .map(|(model, adapter)| (model, tokio::spawn(async move { adapter.status().await })))
            .unzip();

        let outcomes = futures::future::join_all(handles).await;

        models
            .into_iter()
            .zip(outcomes)
            .map(|(model, outcome)| {
                let status = outcome.unwrap_or_else(|e| {
                    tracing::warn!(model = %model, error = %e, "status probe failed");
                    ProviderAdapterStatus::unavailable(true, format!("status probe failed: {e}"))
                });
                (model, status)
            })
            .collect()
    }

    /// Cancel and drop every live adapter
    pub fn cleanup(&self) {
        let adapters = self.live_adapters();
        for (_, adapter) in &adapters {
            adapter.cancel();
        }
        self.live.clear();

        tracing::debug!(adapters = adapters.len(), "adapter registry cleaned up");
    }
}
