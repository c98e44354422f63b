use std::time::Duration;

use atelier_core::ValidationResult;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by provider adapters and the registry
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The config failed the adapter's pre-flight validation
    #[error("invalid generation config: {}", .0.error_message())]
    Validation(ValidationResult),

    /// The model id is not configured
    #[error("model '{0}' is not configured")]
    UnknownModel(String),

    /// The user cancelled the in-flight generation
    #[error("generation cancelled")]
    Cancelled,

    /// Provider API returned an error
    #[error("provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider answered with something the adapter cannot use
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    /// The provider did not answer in time
    #[error("provider did not respond within {0:?}")]
    Timeout(Duration),

    /// The adapter could not be constructed or initialized
    #[error("adapter '{adapter}' failed to initialize: {message}")]
    Initialization { adapter: String, message: String },
}

/// Coarse error category callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug, never retried
    Validation,
    /// User-initiated, not a failure
    Cancelled,
    /// Provider-side failure, the caller may resubmit
    ProviderFailure,
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::UnknownModel(_) => ErrorKind::Validation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Api { .. }
            | Self::Connection(_)
            | Self::InvalidResponse(_)
            | Self::Timeout(_)
            | Self::Initialization { .. } => ErrorKind::ProviderFailure,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(result) => result.error_message(),
            Self::Api { status: 401 | 403, .. } => "The provider rejected our credentials".to_owned(),
            Self::Api { status: 429, .. } => "The provider is rate limiting requests, try again shortly".to_owned(),
            Self::Timeout(_) => "The provider took too long to respond".to_owned(),
            _ => self.to_string(),
        }
    }
}
