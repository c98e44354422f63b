#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod adapter;
mod capabilities;
mod error;
mod registry;
mod settings;

pub use adapter::{GenericAdapter, OpenAiAdapter, ProviderAdapter, ProviderAdapterStatus, ReplicateAdapter};
pub use capabilities::AdapterCapabilities;
pub use error::{ErrorKind, ProviderError, Result};
pub use registry::{AdapterFactory, AdapterRegistry, adapter_factory};
pub use settings::{ModelProfile, ProviderSettings};
