//! Generation state machine
//!
//! One attempt at a time moves through `idle → processing → completed |
//! error`. The attempt slot is claimed synchronously, so a concurrent
//! submission sees [`GenerationError::Busy`] instead of racing. Every
//! terminal transition is published while the slot lock is held, which is
//! what lets [`GenerationOrchestrator::cancel`] and the result path agree on
//! who won.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use atelier_config::StudioConfig;
use atelier_core::{GenerationBatch, GenerationConfig, ValidationResult};
use atelier_providers::{AdapterRegistry, ProviderAdapter, ProviderError};
use atelier_store::QuotaTracker;
use atelier_telemetry::StudioMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{GenerationError, Result};
use crate::history::History;
use crate::persistence::AssetPersistencePipeline;
use crate::status::{self, GenerationPhase, GenerationStatus, ProgressStage};

/// The attempt currently holding the slot
struct Attempt {
    id: u64,
    /// Set once the attempt is processing
    adapter: Option<Arc<dyn ProviderAdapter>>,
    /// Stops the progress ticker and the provider call
    token: CancellationToken,
    cancelled: bool,
    /// Results arrived, cancel no longer applies
    finishing: bool,
}

type ActiveSlot = Mutex<Option<Attempt>>;

pub struct GenerationOrchestrator {
    registry: Arc<AdapterRegistry>,
    quota: Arc<dyn QuotaTracker>,
    persistence: Option<Arc<AssetPersistencePipeline>>,
    history: Arc<History>,
    status: Arc<watch::Sender<GenerationStatus>>,
    active: ActiveSlot,
    next_attempt: AtomicU64,
    progress_interval: Duration,
    persistence_grace: Duration,
    /// Persistence work that outlived its attempt
    background: TaskTracker,
    metrics: StudioMetrics,
}

impl GenerationOrchestrator {
    pub fn new(registry: Arc<AdapterRegistry>, quota: Arc<dyn QuotaTracker>) -> Self {
        let defaults = StudioConfig::default();
        let (status, _) = watch::channel(GenerationStatus::idle());

        Self {
            registry,
            quota,
            persistence: None,
            history: Arc::new(History::new()),
            status: Arc::new(status),
            active: Mutex::new(None),
            next_attempt: AtomicU64::new(0),
            progress_interval: defaults.progress_interval,
            persistence_grace: defaults.persistence_grace,
            background: TaskTracker::new(),
            metrics: StudioMetrics::new(),
        }
    }

    #[must_use]
    pub fn with_persistence(mut self, pipeline: Arc<AssetPersistencePipeline>) -> Self {
        self.persistence = Some(pipeline);
        self
    }

    /// Share a history with other components, e.g. the feedback coordinator
    #[must_use]
    pub fn with_history(mut self, history: Arc<History>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &StudioConfig) -> Self {
        self.progress_interval = config.progress_interval;
        self.persistence_grace = config.persistence_grace;
        self
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    /// Current status snapshot
    pub fn status(&self) -> GenerationStatus {
        self.status.borrow().clone()
    }

    /// Receive every status transition
    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.status.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Validate a config against the adapter of its model
    pub async fn validate(&self, config: &GenerationConfig) -> Result<ValidationResult> {
        let adapter = self.registry.create_adapter(&config.model).await?;
        Ok(adapter.validate(config))
    }

    pub async fn estimate_cost(&self, config: &GenerationConfig) -> Result<f64> {
        let adapter = self.registry.create_adapter(&config.model).await?;
        Ok(adapter.estimate_cost(config))
    }

    /// Run one generation attempt to a terminal state
    ///
    /// Returns the history batch the results landed in, which also holds
    /// earlier results of the same prompt and model from the same minute.
    /// Persistence is best effort and never fails the attempt.
    ///
    /// # Errors
    ///
    /// [`GenerationError::Busy`] while another attempt is active, plus every
    /// failure that moved the status to `error`. [`GenerationError::Cancelled`]
    /// leaves the status `idle`.
    pub async fn generate(&self, config: GenerationConfig) -> Result<GenerationBatch> {
        let slot = self.claim()?;
        let started = Instant::now();

        match self.quota.can_use().await {
            Ok(decision) if decision.allowed => {}
            Ok(decision) => {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "generation quota exceeded".to_owned());
                tracing::info!(model = %config.model, reason = %reason, "submission refused by quota");
                return Err(self.fail(slot, GenerationError::QuotaExceeded(reason)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "quota check failed");
                return Err(self.fail(
                    slot,
                    GenerationError::QuotaExceeded(format!("could not verify quota: {e}")),
                ));
            }
        }

        let adapter = match self.registry.create_adapter(&config.model).await {
            Ok(adapter) => adapter,
            Err(e) => return Err(self.fail(slot, e.into())),
        };

        let validation = adapter.validate(&config);
        if !validation.is_valid() {
            tracing::info!(model = %config.model, errors = %validation.error_message(), "config rejected");
            return Err(self.fail(slot, GenerationError::Validation(validation)));
        }
        let warnings = (!validation.warnings.is_empty()).then(|| validation.warnings.join("; "));

        slot.begin_processing(&self.status, Arc::clone(&adapter), warnings);
        self.spawn_ticker(slot.token.clone());
        tracing::info!(model = %config.model, outputs = config.num_outputs, "generation started");

        // cancel may land before the adapter registered its request
        let outcome = tokio::select! {
            outcome = adapter.generate(&config) => Some(outcome),
            () = slot.token.cancelled() => None,
        };
        slot.token.cancel();

        let outcome = match outcome {
            Some(outcome) if slot.finish() => outcome,
            _ => {
                tracing::info!(model = %config.model, "generation cancelled, discarding provider response");
                self.metrics.record_generation(&config.model, "cancelled", started);
                return Err(GenerationError::Cancelled);
            }
        };

        let results = match outcome {
            Ok(results) => results,
            Err(ProviderError::Cancelled) => {
                slot.release(&self.status, GenerationStatus::idle());
                self.metrics.record_generation(&config.model, "cancelled", started);
                return Err(GenerationError::Cancelled);
            }
            Err(e) => {
                tracing::error!(model = %config.model, error = %e, "generation failed");
                self.metrics.record_generation(&config.model, "failed", started);
                return Err(self.fail(slot, e.into()));
            }
        };

        self.status.send_modify(|status| {
            status.progress = 100.0;
            status.stage = Some(ProgressStage::Finalizing);
        });

        let Some(batch) = GenerationBatch::from_results(results) else {
            self.metrics.record_generation(&config.model, "failed", started);
            return Err(self.fail(
                slot,
                ProviderError::InvalidResponse("provider returned no images".to_owned()).into(),
            ));
        };

        let (batch, pending) = self.persist(batch, adapter.estimate_cost(&config)).await;
        let batch = self.history.insert(batch);
        if let Some(pending) = pending {
            let history = Arc::clone(&self.history);
            self.background.spawn(async move {
                match pending.await {
                    Ok(persisted) => {
                        history.merge_persisted(&persisted);
                    }
                    Err(e) => tracing::warn!(error = %e, "late persistence task failed"),
                }
            });
        }

        if let Err(e) = self.quota.record_usage().await {
            tracing::warn!(error = %e, "failed to record quota usage");
        }

        slot.release(&self.status, GenerationStatus::completed(batch.id.clone()));
        self.metrics.record_generation(&config.model, "completed", started);
        tracing::info!(model = %config.model, batch = %batch.id, images = batch.results.len(), "generation completed");

        Ok(batch)
    }

    /// Wait until late persistence has been merged into history
    pub async fn drain(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Cancel the attempt that is processing
    ///
    /// Returns `false` when nothing was processing or its results already
    /// arrived.
    pub fn cancel(&self) -> bool {
        let mut active = lock(&self.active);
        let Some(attempt) = active.as_mut() else {
            return false;
        };
        if attempt.cancelled || attempt.finishing {
            return false;
        }
        let Some(adapter) = attempt.adapter.as_ref() else {
            return false;
        };

        attempt.cancelled = true;
        attempt.token.cancel();
        adapter.cancel();
        self.status.send_replace(GenerationStatus::idle());
        tracing::info!(model = %adapter.model().id, "generation cancelled");
        true
    }

    fn claim(&self) -> Result<Slot<'_>> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(GenerationError::Busy);
        }

        let id = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *active = Some(Attempt {
            id,
            adapter: None,
            token: token.clone(),
            cancelled: false,
            finishing: false,
        });

        Ok(Slot {
            active: &self.active,
            id,
            token,
        })
    }

    /// Move to `error` and hand the error back
    fn fail(&self, slot: Slot<'_>, error: GenerationError) -> GenerationError {
        slot.release(&self.status, GenerationStatus::error(error.user_message()));
        error
    }

    /// Run the pipeline, waiting at most the grace period
    ///
    /// A pipeline still running after the grace period is returned as a
    /// handle so its outcome can be merged into history later.
    async fn persist(&self, batch: GenerationBatch, cost: f64) -> (GenerationBatch, Option<JoinHandle<GenerationBatch>>) {
        let Some(pipeline) = self.persistence.clone() else {
            return (batch, None);
        };

        let ephemeral = batch.clone();
        let mut handle = self
            .background
            .spawn(async move { pipeline.persist(batch, cost).await });

        match tokio::time::timeout(self.persistence_grace, &mut handle).await {
            Ok(Ok(persisted)) => (persisted, None),
            Ok(Err(e)) => {
                tracing::warn!(batch = %ephemeral.id, error = %e, "persistence task failed");
                (ephemeral, None)
            }
            Err(_) => {
                tracing::debug!(batch = %ephemeral.id, "persistence outlived grace period");
                (ephemeral, Some(handle))
            }
        }
    }

    /// Synthesize progress until `token` is cancelled
    fn spawn_ticker(&self, token: CancellationToken) {
        let status = Arc::clone(&self.status);
        let period = self.progress_interval;

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticks.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticks.tick() => {
                        status.send_if_modified(|current| {
                            if token.is_cancelled() || current.phase != GenerationPhase::Processing {
                                return false;
                            }
                            let next = status::advance(current.progress);
                            if next <= current.progress {
                                return false;
                            }
                            current.progress = next;
                            current.stage = Some(ProgressStage::for_progress(next));
                            true
                        });
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("status", &*self.status.borrow())
            .field("progress_interval", &self.progress_interval)
            .field("persistence_grace", &self.persistence_grace)
            .finish_non_exhaustive()
    }
}

/// Claim on the attempt slot, released on drop
struct Slot<'a> {
    active: &'a ActiveSlot,
    id: u64,
    token: CancellationToken,
}

impl Slot<'_> {
    fn begin_processing(
        &self,
        status: &watch::Sender<GenerationStatus>,
        adapter: Arc<dyn ProviderAdapter>,
        warnings: Option<String>,
    ) {
        let mut active = lock(self.active);
        if let Some(attempt) = active.as_mut().filter(|a| a.id == self.id) {
            attempt.adapter = Some(adapter);
            status.send_replace(GenerationStatus::processing(warnings));
        }
    }

    /// Mark results as arrived, `false` if the attempt was cancelled first
    fn finish(&self) -> bool {
        let mut active = lock(self.active);
        match active.as_mut().filter(|a| a.id == self.id) {
            Some(attempt) if !attempt.cancelled => {
                attempt.finishing = true;
                true
            }
            _ => false,
        }
    }

    /// Publish a terminal status and free the slot atomically
    fn release(self, status: &watch::Sender<GenerationStatus>, next: GenerationStatus) {
        let mut active = lock(self.active);
        status.send_replace(next);
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
        }
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        let mut active = lock(self.active);
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
        }
    }
}

fn lock(active: &ActiveSlot) -> MutexGuard<'_, Option<Attempt>> {
    active.lock().unwrap_or_else(|e| e.into_inner())
}
