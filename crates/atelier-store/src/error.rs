pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by store collaborators
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP transport or connection error
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store returned a non-success status
    #[error("store API error ({status}): {message}")]
    Api {
        /// HTTP status from the store
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// A request URL could not be built from the base URL
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
}
