//! Generation orchestration for an Atelier session
//!
//! [`GenerationOrchestrator`] drives one attempt at a time through the
//! provider registry, hands finished batches to the
//! [`AssetPersistencePipeline`] and keeps them in [`History`], where the
//! [`FeedbackCoordinator`] applies optimistic feedback.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod error;
mod feedback;
mod history;
mod orchestrator;
mod persistence;
pub mod status;
#[cfg(test)]
mod testing;

pub use error::{FeedbackError, GenerationError, Result};
pub use feedback::{CommitOutcome, FeedbackCoordinator, FeedbackUpdate};
pub use history::History;
pub use orchestrator::GenerationOrchestrator;
pub use persistence::AssetPersistencePipeline;
pub use status::{GenerationPhase, GenerationStatus, ProgressStage};
