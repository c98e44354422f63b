//! Optimistic feedback with compensating rollback
//!
//! Local state changes synchronously; the backend commit runs on a
//! background task. Commits for one batch are serialized and each local
//! change bumps the batch revision under the history lock, so a commit or
//! rollback can tell whether a newer change has happened since.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use atelier_core::{FeedbackType, GenerationBatch};
use atelier_store::{FeedbackRecord, FeedbackStore};
use atelier_telemetry::StudioMetrics;
use dashmap::DashMap;
use jiff::Timestamp;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::FeedbackError;
use crate::history::History;

/// How a background commit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CommitOutcome {
    /// The backend now holds the requested state
    Committed,
    /// The backend already held it, nothing was sent
    Unchanged,
    /// A newer local change will commit instead
    Superseded,
    /// The backend call failed and local state was restored
    RolledBack,
}

/// Result of [`FeedbackCoordinator::set_feedback`]
#[derive(Debug)]
pub struct FeedbackUpdate {
    /// Local feedback after the optimistic update
    pub feedback: Option<FeedbackType>,
    /// Background commit
    pub commit: JoinHandle<CommitOutcome>,
}

/// Per-batch commit state
struct BatchFeedback {
    /// What the backend holds, guarded so commits run one at a time
    committed: Mutex<Committed>,
    revision: AtomicU64,
}

/// Backend view of one batch's feedback
struct Committed {
    kind: Option<FeedbackType>,
    /// Generation id the record was created under, reused by updates and
    /// deletes even if the batch learns its durable id later
    generation_id: Option<String>,
}

pub struct FeedbackCoordinator {
    history: Arc<History>,
    store: Arc<dyn FeedbackStore>,
    batches: DashMap<String, Arc<BatchFeedback>>,
    metrics: StudioMetrics,
}

impl FeedbackCoordinator {
    pub fn new(history: Arc<History>, store: Arc<dyn FeedbackStore>) -> Self {
        Self {
            history,
            store,
            batches: DashMap::new(),
            metrics: StudioMetrics::new(),
        }
    }

    /// Current local feedback of a batch
    pub fn feedback(&self, batch_id: &str) -> Option<FeedbackType> {
        self.history.get(batch_id).and_then(|b| b.feedback())
    }

    /// Toggle `kind` on a batch
    ///
    /// Requesting the type the batch already has clears it. Every result
    /// is updated before this returns; the backend commit runs in the
    /// background and rolls local state back if it fails.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::UnknownBatch`] if the batch is not in history
    pub fn set_feedback(self: &Arc<Self>, batch_id: &str, kind: FeedbackType) -> Result<FeedbackUpdate, FeedbackError> {
        let (state, inverse, desired, revision) = self
            .history
            .update(batch_id, |batch| {
                let state = Arc::clone(
                    self.batches
                        .entry(batch_id.to_owned())
                        .or_insert_with(|| {
                            Arc::new(BatchFeedback {
                                committed: Mutex::new(Committed {
                                    kind: batch.feedback(),
                                    generation_id: batch.feedback().map(|_| batch.generation_id().to_owned()),
                                }),
                                revision: AtomicU64::new(0),
                            })
                        })
                        .value(),
                );

                let inverse = batch.feedback();
                let desired = if inverse == Some(kind) { None } else { Some(kind) };
                batch.apply_feedback(desired, Timestamp::now());
                let revision = state.revision.fetch_add(1, Ordering::SeqCst) + 1;

                (state, inverse, desired, revision)
            })
            .ok_or_else(|| FeedbackError::UnknownBatch(batch_id.to_owned()))?;

        tracing::debug!(batch = batch_id, ?desired, ?inverse, "feedback applied locally");

        let coordinator = Arc::clone(self);
        let batch_id = batch_id.to_owned();
        let commit = tokio::spawn(async move {
            coordinator
                .commit(&batch_id, &state, desired, inverse, revision)
                .await
        });

        Ok(FeedbackUpdate {
            feedback: desired,
            commit,
        })
    }

    async fn commit(
        &self,
        batch_id: &str,
        state: &BatchFeedback,
        desired: Option<FeedbackType>,
        inverse: Option<FeedbackType>,
        revision: u64,
    ) -> CommitOutcome {
        let mut committed = state.committed.lock().await;

        if state.revision.load(Ordering::SeqCst) != revision {
            return CommitOutcome::Superseded;
        }
        if committed.kind == desired {
            return CommitOutcome::Unchanged;
        }
        let Some(batch) = self.history.get(batch_id) else {
            return CommitOutcome::Superseded;
        };

        let generation_id = committed
            .generation_id
            .clone()
            .unwrap_or_else(|| batch.generation_id().to_owned());
        let outcome = match (committed.kind, desired) {
            (_, None) => self.store.delete_feedback(&generation_id).await,
            (None, Some(kind)) => self.store.create_feedback(&record(&batch, &generation_id, kind)).await,
            (Some(_), Some(kind)) => self.store.update_feedback(&record(&batch, &generation_id, kind)).await,
        };

        match outcome {
            Ok(()) => {
                committed.kind = desired;
                committed.generation_id = desired.map(|_| generation_id);
                CommitOutcome::Committed
            }
            Err(e) => {
                tracing::warn!(batch = batch_id, error = %e, "feedback commit failed, rolling back");
                self.metrics.record_feedback_rollback();

                self.history.update(batch_id, |batch| {
                    // A newer local change owns the state now
                    if state.revision.load(Ordering::SeqCst) == revision {
                        batch.apply_feedback(inverse, Timestamp::now());
                    }
                });
                CommitOutcome::RolledBack
            }
        }
    }
}

fn record(batch: &GenerationBatch, generation_id: &str, kind: FeedbackType) -> FeedbackRecord {
    FeedbackRecord {
        generation_id: generation_id.to_owned(),
        image_urls: batch.image_urls(),
        feedback_type: kind,
        tags_used: batch.tag_keys(),
        model: batch.model.clone(),
    }
}

impl std::fmt::Debug for FeedbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackCoordinator")
            .field("tracked_batches", &self.batches.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use atelier_core::{GenerationConfig, GenerationResult, TagSelection};

    use super::*;
    use crate::testing::FakeFeedbackStore;

    fn setup() -> (Arc<FeedbackCoordinator>, Arc<FakeFeedbackStore>, String) {
        let history = Arc::new(History::new());
        let config = GenerationConfig::new("a cat", "fast-model", 4).with_tags(TagSelection {
            art_style: Some("watercolor".to_owned()),
            ..TagSelection::default()
        });
        let batch = GenerationBatch::from_results(vec![
            GenerationResult::completed("https://p/1", config.clone()),
            GenerationResult::completed("https://p/2", config),
        ])
        .unwrap();
        let batch_id = batch.id.clone();
        history.insert(batch);

        let store = Arc::new(FakeFeedbackStore::default());
        let coordinator = Arc::new(FeedbackCoordinator::new(history, store.clone()));
        (coordinator, store, batch_id)
    }

    fn all_results(coordinator: &FeedbackCoordinator, batch_id: &str) -> Vec<Option<FeedbackType>> {
        coordinator
            .history
            .get(batch_id)
            .unwrap()
            .results
            .iter()
            .map(GenerationResult::feedback_type)
            .collect()
    }

    #[tokio::test]
    async fn like_is_visible_before_commit_and_then_committed() {
        let (coordinator, store, batch_id) = setup();

        let update = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();

        assert_eq!(update.feedback, Some(FeedbackType::Like));
        assert_eq!(all_results(&coordinator, &batch_id), vec![Some(FeedbackType::Like); 2]);
        assert!(store.calls().is_empty());

        assert_eq!(update.commit.await.unwrap(), CommitOutcome::Committed);
        assert_eq!(store.calls(), vec!["create:like".to_owned()]);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_to_none() {
        let (coordinator, store, batch_id) = setup();
        store.fail.store(true, Ordering::SeqCst);

        let update = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        assert_eq!(coordinator.feedback(&batch_id), Some(FeedbackType::Like));

        assert_eq!(update.commit.await.unwrap(), CommitOutcome::RolledBack);
        assert_eq!(all_results(&coordinator, &batch_id), vec![None, None]);
    }

    #[tokio::test]
    async fn toggle_without_committed_record_makes_no_call() {
        let (coordinator, store, batch_id) = setup();

        let first = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        let second = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();

        assert_eq!(second.feedback, None);
        assert_eq!(first.commit.await.unwrap(), CommitOutcome::Superseded);
        assert_eq!(second.commit.await.unwrap(), CommitOutcome::Unchanged);
        assert!(store.calls().is_empty());
        assert_eq!(coordinator.feedback(&batch_id), None);
    }

    #[tokio::test]
    async fn switching_and_clearing_use_update_and_delete() {
        let (coordinator, store, batch_id) = setup();

        let like = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        like.commit.await.unwrap();
        let dislike = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        dislike.commit.await.unwrap();
        let cleared = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        assert_eq!(cleared.commit.await.unwrap(), CommitOutcome::Committed);

        assert_eq!(
            store.calls(),
            vec![
                "create:like".to_owned(),
                "update:dislike".to_owned(),
                format!("delete:{batch_id}"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_never_overwrites_newer_change() {
        let history = Arc::new(History::new());
        let config = GenerationConfig::new("a cat", "fast-model", 4);
        let batch = GenerationBatch::from_results(vec![GenerationResult::completed("https://p/1", config)]).unwrap();
        let batch_id = batch.id.clone();
        history.insert(batch);
        let store = Arc::new(FakeFeedbackStore {
            delay: Duration::from_millis(100),
            ..FakeFeedbackStore::default()
        });
        let coordinator = Arc::new(FeedbackCoordinator::new(history, store.clone()));

        let like = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        like.commit.await.unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let dislike = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        // let the failing update reach the backend
        tokio::task::yield_now().await;
        store.fail.store(false, Ordering::SeqCst);

        let cleared = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        assert_eq!(cleared.feedback, None);

        assert_eq!(dislike.commit.await.unwrap(), CommitOutcome::RolledBack);
        assert_eq!(coordinator.feedback(&batch_id), None);

        assert_eq!(cleared.commit.await.unwrap(), CommitOutcome::Committed);
        assert_eq!(coordinator.feedback(&batch_id), None);
        assert_eq!(
            store.calls(),
            vec![
                "create:like".to_owned(),
                "update:dislike".to_owned(),
                format!("delete:{batch_id}"),
            ]
        );
    }

    #[tokio::test]
    async fn record_keeps_the_id_it_was_created_under() {
        let (coordinator, store, batch_id) = setup();

        let like = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        like.commit.await.unwrap();

        // durable id arrives after the record was created
        coordinator.history.update(&batch_id, |batch| {
            batch.real_generation_id = Some("gen_9".to_owned());
        });

        let dislike = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        dislike.commit.await.unwrap();
        let cleared = coordinator.set_feedback(&batch_id, FeedbackType::Dislike).unwrap();
        cleared.commit.await.unwrap();
        assert_eq!(store.targets(), vec![batch_id.clone(); 3]);

        // a fresh record after deletion uses the durable id
        let again = coordinator.set_feedback(&batch_id, FeedbackType::Like).unwrap();
        again.commit.await.unwrap();
        assert_eq!(store.targets().last().map(String::as_str), Some("gen_9"));
    }

    #[test]
    fn unknown_batch_is_rejected() {
        let (coordinator, _store, _batch_id) = setup();
        let err = coordinator.set_feedback("missing", FeedbackType::Like).unwrap_err();
        assert!(matches!(err, FeedbackError::UnknownBatch(id) if id == "missing"));
    }
}
