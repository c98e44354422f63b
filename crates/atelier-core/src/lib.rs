//! Domain types shared by every Atelier crate
//!
//! Generation requests, results, batches and the tag selection model,
//! plus the pure tag extraction used by both prompt assembly and the
//! statistics pipeline.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

mod batch;
mod config;
mod result;
pub mod tags;
mod validation;

pub use batch::GenerationBatch;
pub use config::{AspectRatio, GenerationConfig, MAX_PROMPT_LENGTH, OutputFormat};
pub use result::{Feedback, FeedbackType, GenerationResult, ResultStatus};
pub use tags::{TagCategory, TagSelection, TagUsage};
pub use validation::{ConfigField, ValidationError, ValidationResult};
