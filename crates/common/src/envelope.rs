//! Versioned AES-256-GCM container for an encrypted dump.
//!
//! # Wire format
//!
//! ```text
//! base64( {"v":1,"alg":"A256GCM","kid":"v1:<collection>:<checksum>","iv":"<b64 12 bytes>","ciphertext":"<b64 ct||tag>"} )
//! ```
//!
//! The bare JSON object (without the outer base64) is also accepted on open.
//! Exactly one version and one algorithm exist; anything else fails closed.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::kdf::{self, DerivedKey, Keyring};
use crate::transport;

/// The only supported envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// The only supported algorithm identifier (AES-256-GCM, no AAD).
pub const ALGORITHM: &str = "A256GCM";

/// Byte length of the AES-GCM IV.
pub const IV_LEN: usize = 12;

/// An encrypted dump as stored and transmitted.
///
/// Created fresh, with a fresh random IV, on every [`seal`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Format version; must equal [`ENVELOPE_VERSION`].
    pub v: u32,
    /// Algorithm identifier; must equal [`ALGORITHM`].
    pub alg: String,
    /// Informational key identifier (`v1:<collection>:<checksum>`).
    pub kid: String,
    /// Base64 of the 12-byte IV.
    pub iv: String,
    /// Base64 of ciphertext with the 16-byte GCM tag appended.
    pub ciphertext: String,
}

impl Envelope {
    /// Parse an envelope from either its base64-wrapped or its bare JSON form.
    ///
    /// The two forms are tried in that order and the first that yields a JSON
    /// object wins; the version/algorithm gate is applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidEnvelope`] if neither form parses, or if
    /// `v`/`alg` are not the supported combination.
    pub fn parse(input: &str) -> Result<Self, CodecError> {
        let envelope = parse_wrapped(input)
            .or_else(|| parse_bare(input))
            .ok_or_else(|| CodecError::InvalidEnvelope("not an envelope record".into()))?;
        envelope.check_supported()?;
        Ok(envelope)
    }

    /// Serialise to the transport form (base64 of the JSON record).
    pub fn to_transport(&self) -> Result<String, CodecError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CodecError::InvalidEnvelope(format!("serialise failed: {e}")))?;
        Ok(transport::encode(json))
    }

    fn check_supported(&self) -> Result<(), CodecError> {
        if self.v != ENVELOPE_VERSION {
            return Err(CodecError::InvalidEnvelope(format!(
                "unsupported version {}",
                self.v
            )));
        }
        if self.alg != ALGORITHM {
            return Err(CodecError::InvalidEnvelope(format!(
                "unsupported algorithm {}",
                self.alg
            )));
        }
        Ok(())
    }

    fn iv_bytes(&self) -> Result<[u8; IV_LEN], CodecError> {
        let raw = transport::decode(&self.iv)
            .map_err(|_| CodecError::InvalidEnvelope("iv is not base64".into()))?;
        raw.try_into()
            .map_err(|_| CodecError::InvalidEnvelope(format!("iv must be {IV_LEN} bytes")))
    }
}

fn parse_wrapped(input: &str) -> Option<Envelope> {
    let json = transport::decode(input).ok()?;
    serde_json::from_slice(&json).ok()
}

fn parse_bare(input: &str) -> Option<Envelope> {
    serde_json::from_str(input.trim()).ok()
}

/// Cheap sniff: does `input` look like a supported envelope in either form?
pub fn is_envelope(input: &str) -> bool {
    Envelope::parse(input).is_ok()
}

/// Encrypt compressed dump bytes for `collection` at content version `checksum`.
///
/// Derives the content key from `keyring`, draws a fresh IV from the OS CSPRNG
/// and returns the transport-encoded envelope.
///
/// # Errors
///
/// Returns [`CodecError::Configuration`] if the keyring holds no master key.
pub fn seal(
    payload: &[u8],
    keyring: &Keyring,
    checksum: &str,
    collection: &str,
) -> Result<String, CodecError> {
    let key = keyring.derive(checksum, collection)?;
    let envelope = seal_with_key(payload, &key, kdf::key_id(collection, checksum))?;
    envelope.to_transport()
}

/// [`seal`] for a payload that is itself stored in transport (base64) form.
///
/// # Errors
///
/// Returns [`CodecError::CorruptDump`] if `payload_b64` is not base64, or
/// [`CodecError::Configuration`] if the keyring holds no master key.
pub fn seal_transport(
    payload_b64: &str,
    keyring: &Keyring,
    checksum: &str,
    collection: &str,
) -> Result<String, CodecError> {
    let payload = transport::decode(payload_b64)
        .map_err(|e| CodecError::CorruptDump(format!("stored payload is not base64: {e}")))?;
    seal(&payload, keyring, checksum, collection)
}

/// Encrypt under an already-derived key.
pub fn seal_with_key(payload: &[u8], key: &DerivedKey, kid: String) -> Result<Envelope, CodecError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    // IV uniqueness per key rests entirely on this draw; never a counter or clock.
    let iv = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&iv, payload)
        .map_err(|_| CodecError::InvalidEnvelope("aead encryption failed".into()))?;

    Ok(Envelope {
        v: ENVELOPE_VERSION,
        alg: ALGORITHM.into(),
        kid,
        iv: transport::encode(iv),
        ciphertext: transport::encode(ciphertext),
    })
}

/// Open an envelope (either form) with the base64 content key handed out by
/// the key endpoint, returning the compressed dump bytes.
///
/// # Errors
///
/// - [`CodecError::InvalidEnvelope`] for malformed or unsupported containers.
/// - [`CodecError::InvalidKey`] if `key_b64` is not a 32-byte base64 key.
/// - [`CodecError::DecryptionFailure`] if authentication fails.
pub fn open(input: &str, key_b64: &str) -> Result<Vec<u8>, CodecError> {
    let envelope = Envelope::parse(input)?;
    let key = DerivedKey::from_base64(key_b64)?;
    open_with_key(&envelope, &key)
}

/// Open a parsed envelope under an already-derived key.
pub fn open_with_key(envelope: &Envelope, key: &DerivedKey) -> Result<Vec<u8>, CodecError> {
    envelope.check_supported()?;
    let iv = envelope.iv_bytes()?;
    let ciphertext = transport::decode(&envelope.ciphertext)
        .map_err(|_| CodecError::InvalidEnvelope("ciphertext is not base64".into()))?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CodecError::DecryptionFailure)
}
