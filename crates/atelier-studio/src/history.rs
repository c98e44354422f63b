use std::sync::RwLock;

use atelier_core::GenerationBatch;

/// In-memory generation history for one session, oldest first
#[derive(Debug, Default)]
pub struct History {
    batches: RwLock<Vec<GenerationBatch>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch, folding it into a batch of the same group if present
    ///
    /// Returns the stored batch the results ended up in.
    pub fn insert(&self, batch: GenerationBatch) -> GenerationBatch {
        let mut batches = self.write();
        if let Some(existing) = batches.iter_mut().rev().find(|b| b.groups_with(&batch)) {
            existing.absorb(batch);
            return existing.clone();
        }
        batches.push(batch.clone());
        batch
    }

    pub fn get(&self, batch_id: &str) -> Option<GenerationBatch> {
        self.read().iter().find(|b| b.id == batch_id).cloned()
    }

    /// Snapshot of every batch
    pub fn list(&self) -> Vec<GenerationBatch> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Mutate a batch in place under the write lock
    pub fn update<R>(&self, batch_id: &str, f: impl FnOnce(&mut GenerationBatch) -> R) -> Option<R> {
        self.write().iter_mut().find(|b| b.id == batch_id).map(f)
    }

    /// Merge a late persistence outcome into the stored batch
    ///
    /// Results are matched by id, so this works after the batch was folded
    /// into its group. Copies migrated URLs and fills an unset durable record
    /// id. Local feedback on the stored batch is left alone.
    pub fn merge_persisted(&self, persisted: &GenerationBatch) -> bool {
        let mut batches = self.write();
        let Some(batch) = batches
            .iter_mut()
            .find(|b| b.results.iter().any(|r| persisted.results.iter().any(|p| p.id == r.id)))
        else {
            return false;
        };

        for result in &mut batch.results {
            if let Some(source) = persisted.results.iter().find(|r| r.id == result.id) {
                result.image_url.clone_from(&source.image_url);
                result.original_url.clone_from(&source.original_url);
            }
        }
        if batch.real_generation_id.is_none() {
            batch.real_generation_id.clone_from(&persisted.real_generation_id);
        }
        true
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<GenerationBatch>> {
        self.batches.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<GenerationBatch>> {
        self.batches.write().unwrap_or_else(|e| e.into_inner())
    }
}
