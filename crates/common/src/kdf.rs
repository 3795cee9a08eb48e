//! Per-collection content key derivation.
//!
//! ```text
//! DerivedKey = HKDF-SHA256(ikm = master key, salt = checksum, info = "content:" || collection)[..32]
//! ```
//!
//! The checksum is the salt, so every content build implicitly retires the keys
//! issued for the previous build. The collection name is bound through `info`,
//! so one collection's key never opens another collection's envelope.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CodecError;
use crate::transport;

/// Byte length of a derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Version tag prefixed to every key identifier.
pub const KEY_ID_VERSION: &str = "v1";

/// The deployment-wide secret all content keys are derived from.
///
/// Held only in memory; zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Wrap raw master key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if `bytes` is empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Configuration("master key must not be empty".into()));
        }
        Ok(Self(bytes))
    }

    /// Decode a base64 master key as found in configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if the value is not base64 or decodes to nothing.
    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let bytes = transport::decode(encoded)
            .map_err(|_| CodecError::Configuration("master key is not valid base64".into()))?;
        Self::from_bytes(bytes)
    }

    /// Length of the master key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; construction rejects empty keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// A 256-bit content key for one (collection, checksum) pair. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Transport form handed to clients as the `k` field of a key response.
    pub fn to_base64(&self) -> String {
        transport::encode(self.0)
    }

    /// Parse the transport form back into a key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] unless `encoded` is base64 of exactly [`KEY_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let mut bytes = transport::decode(encoded).map_err(|_| CodecError::InvalidKey)?;
        if bytes.len() != KEY_LEN {
            bytes.zeroize();
            return Err(CodecError::InvalidKey);
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Informational key identifier: `v1:<collection>:<checksum>`. Not secret.
pub fn key_id(collection: &str, checksum: &str) -> String {
    format!("{KEY_ID_VERSION}:{collection}:{checksum}")
}

/// Process-wide, read-only handle to the master key.
///
/// Built once at startup and shared (behind an `Arc`) with everything that
/// derives keys. A keyring without a master key is valid to construct: the
/// misconfiguration only surfaces when a key is actually needed.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    master: Option<MasterKey>,
}

impl Keyring {
    /// Create a keyring, optionally holding a master key.
    pub fn new(master: Option<MasterKey>) -> Self {
        Self { master }
    }

    /// Whether a master key is loaded.
    pub fn is_ready(&self) -> bool {
        self.master.is_some()
    }

    /// Derive the content key for `collection` at content version `checksum`.
    ///
    /// Deterministic: identical inputs always produce identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if no master key is configured.
    pub fn derive(&self, checksum: &str, collection: &str) -> Result<DerivedKey, CodecError> {
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| CodecError::Configuration("no master key configured".into()))?;

        let info = format!("content:{collection}");
        let hk = Hkdf::<Sha256>::new(Some(checksum.as_bytes()), &master.0);
        let mut okm = [0u8; KEY_LEN];
        hk.expand(info.as_bytes(), &mut okm)
            .map_err(|e| CodecError::Configuration(format!("HKDF expand failed: {e}")))?;
        Ok(DerivedKey(okm))
    }

    /// [`Keyring::derive`], returned already in transport form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if no master key is configured.
    pub fn derive_base64(&self, checksum: &str, collection: &str) -> Result<String, CodecError> {
        Ok(self.derive(checksum, collection)?.to_base64())
    }
}
