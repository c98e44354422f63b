use atelier_core::ValidationResult;
use atelier_providers::ProviderError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors returned by [`crate::GenerationOrchestrator::generate`]
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Another generation is still in flight
    #[error("a generation is already in progress")]
    Busy,

    /// The quota collaborator refused the submission
    #[error("{0}")]
    QuotaExceeded(String),

    /// The model id is not configured
    #[error("model '{0}' is not configured")]
    UnknownModel(String),

    /// The config failed the adapter's pre-flight validation
    #[error("invalid generation config: {}", .0.error_message())]
    Validation(ValidationResult),

    /// The user cancelled the generation
    #[error("generation cancelled")]
    Cancelled,

    /// The provider failed, the caller may resubmit
    #[error(transparent)]
    Provider(ProviderError),
}

impl GenerationError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(result) => result.error_message(),
            Self::Provider(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}

impl From<ProviderError> for GenerationError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Validation(result) => Self::Validation(result),
            ProviderError::UnknownModel(model) => Self::UnknownModel(model),
            ProviderError::Cancelled => Self::Cancelled,
            other => Self::Provider(other),
        }
    }
}

/// Errors returned by [`crate::FeedbackCoordinator::set_feedback`]
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// No batch with this id is in history
    #[error("batch '{0}' is not in history")]
    UnknownBatch(String),
}
