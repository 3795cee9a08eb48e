//! Shared building blocks for `content-dump-svc` crates.
//!
//! - [`kdf`]: per-collection key derivation from the deployment master key.
//! - [`envelope`]: the versioned AES-256-GCM container wrapping a compressed dump.
//! - [`dump`]: turns a (decrypted) compressed dump back into JSON rows.
//! - [`protocol`]: route paths, storage keys and JSON bodies exchanged over HTTP.

pub mod dump;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod protocol;
pub mod transport;

pub use error::{CodecError, ServiceError};
pub use kdf::{DerivedKey, Keyring, MasterKey};
