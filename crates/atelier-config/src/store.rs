use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Durable store API used for uploads, records, feedback and statistics
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL, joined with relative endpoint paths
    pub base_url: Url,
    /// Key sent in the `x-api-key` header
    pub api_key: SecretString,
    /// Ask the store for quota decisions instead of the local session quota
    #[serde(default)]
    pub remote_quota: bool,
    /// Per-request timeout
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(15)
}
