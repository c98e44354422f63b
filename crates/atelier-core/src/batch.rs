use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::tags::{self, TagSelection, TagUsage};
use crate::{FeedbackType, GenerationResult};

/// Results sharing prompt, model and creation minute
///
/// Feedback is given on a batch as a unit; its aggregate feedback is
/// read from the first result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationBatch {
    pub id: String,
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSelection>,
    pub results: Vec<GenerationResult>,
    pub created_at: Timestamp,
    /// Durable record identifier, set once persistence succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_generation_id: Option<String>,
}

impl GenerationBatch {
    /// Build a batch from the results of one generation, `None` if empty
    pub fn from_results(results: Vec<GenerationResult>) -> Option<Self> {
        let first = results.first()?;

        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: first.config.prompt.clone(),
            model: first.config.model.clone(),
            tags: first.config.tags.clone(),
            created_at: first.created_at,
            results,
            real_generation_id: None,
        })
    }

    /// Regroup a flat result list by (prompt, model, minute), keeping first-seen order
    pub fn group(results: impl IntoIterator<Item = GenerationResult>) -> Vec<Self> {
        let mut batches: Vec<Self> = Vec::new();

        for single in results.into_iter().filter_map(|r| Self::from_results(vec![r])) {
            match batches.iter_mut().find(|b| b.groups_with(&single)) {
                Some(batch) => batch.absorb(single),
                None => batches.push(single),
            }
        }

        batches
    }

    /// Same prompt, same model and created in the same minute
    pub fn groups_with(&self, other: &Self) -> bool {
        self.prompt == other.prompt
            && self.model == other.model
            && minute_bucket(self.created_at) == minute_bucket(other.created_at)
    }

    /// Append the results of a batch from the same group
    ///
    /// Appended results take the batch's current feedback. The first
    /// durable record id wins; a later one only fills an unset id.
    pub fn absorb(&mut self, other: Self) {
        let feedback = self.results.first().and_then(|r| r.feedback);
        self.results.extend(other.results.into_iter().map(|mut result| {
            result.feedback = feedback;
            result
        }));
        if self.real_generation_id.is_none() {
            self.real_generation_id = other.real_generation_id;
        }
    }

    /// Aggregate feedback, read from the first result
    pub fn feedback(&self) -> Option<FeedbackType> {
        self.results.first().and_then(GenerationResult::feedback_type)
    }

    /// Set the same local feedback on every result
    pub fn apply_feedback(&mut self, kind: Option<FeedbackType>, at: Timestamp) {
        for result in &mut self.results {
            result.set_feedback(kind, at);
        }
    }

    /// Current image URLs, durable where migrated
    pub fn image_urls(&self) -> Vec<String> {
        self.results.iter().map(|r| r.image_url.clone()).collect()
    }

    /// Provider URLs as originally returned
    pub fn source_urls(&self) -> Vec<String> {
        self.results.iter().map(|r| r.source_url().to_owned()).collect()
    }

    pub fn tag_usage(&self) -> Vec<TagUsage> {
        self.tags.as_ref().map(tags::extract).unwrap_or_default()
    }

    pub fn tag_keys(&self) -> Vec<String> {
        tags::tag_keys(self.tags.as_ref())
    }

    /// Identifier used for durable references, the record id when known
    pub fn generation_id(&self) -> &str {
        self.real_generation_id.as_deref().unwrap_or(&self.id)
    }
}

fn minute_bucket(at: Timestamp) -> i64 {
    at.as_second().div_euclid(60)
}
