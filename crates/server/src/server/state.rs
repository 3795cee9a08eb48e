//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use dump_common::Keyring;

use crate::delivery::{Delivery, EncryptionPolicy};
use crate::storage::MemoryStorage;

/// Application state shared across all request handlers.
///
/// Cloned per request; everything behind it is `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    /// Dump and key delivery.
    pub delivery: Arc<Delivery>,
}

impl AppState {
    /// Create a new [`AppState`] around `delivery`.
    pub fn new(delivery: Delivery) -> Self {
        Self {
            delivery: Arc::new(delivery),
        }
    }
}

impl Default for AppState {
    /// Encryption off, no master key, empty in-memory storage. Suitable for tests.
    fn default() -> Self {
        Self::new(Delivery::new(
            EncryptionPolicy::default(),
            Arc::new(Keyring::default()),
            Arc::new(MemoryStorage::new()),
        ))
    }
}
