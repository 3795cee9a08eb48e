//! Read-only access to build artifacts.
//!
//! Artifacts are addressed by colon-separated keys such as
//! `build:content:raw:dump.posts.sql`. Absence is a normal outcome and is
//! reported as `Ok(None)`; only genuine backend failures are errors.

pub mod fs;
pub mod legacy;
pub mod memory;

pub use fs::FsStorage;
pub use legacy::{JsonModule, LegacyModule};
pub use memory::MemoryStorage;

use async_trait::async_trait;
use dump_common::ServiceError;
use thiserror::Error;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key cannot be mapped onto this backend (e.g. a `..` segment).
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The backend failed while reading an existing item.
    #[error("failed to read {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

/// Key-value read interface over stored artifacts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the item stored under `key`, or `None` if there is none.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
}
