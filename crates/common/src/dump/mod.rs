//! Expansion of a compressed dump back into its JSON rows.
//!
//! A dump is `base64(gzip(JSON array))` when stored in plaintext, or the same
//! compressed bytes inside an [`crate::envelope::Envelope`] when encrypted.
//! The pipeline does not care which: [`DumpDecoder::expand`] takes the
//! transport form, [`DumpDecoder::expand_bytes`] takes raw decrypted bytes.

pub mod backend;

pub use backend::{Backend, BackendChoice, BufferBackend, StreamBackend};

use std::sync::Arc;

use serde::Deserialize;

use crate::envelope;
use crate::error::CodecError;

/// One record of a dump. Dumps are opaque JSON arrays; rows are kept as values.
pub type Row = serde_json::Value;

/// Compression applied to a dump before transport encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// RFC 1952 gzip.
    #[default]
    Gzip,
    /// RFC 1950 zlib-wrapped deflate.
    Deflate,
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Compression::Gzip),
            "deflate" => Ok(Compression::Deflate),
            other => Err(format!("unknown compression: {other}")),
        }
    }
}

/// Turns compressed dumps into rows using one selected [`Backend`].
#[derive(Clone)]
pub struct DumpDecoder {
    backend: Arc<dyn Backend>,
}

impl DumpDecoder {
    /// Decoder over the probed process-wide backend.
    pub fn new() -> Self {
        Self::with_backend(backend::probe())
    }

    /// Decoder over an explicit backend.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Expand a transport-encoded compressed dump.
    ///
    /// An empty body means "no data" and yields no rows.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptDump`] if decoding, decompression, or JSON
    /// parsing fails.
    pub fn expand(&self, payload: &str, compression: Compression) -> Result<Vec<Row>, CodecError> {
        if payload.trim().is_empty() {
            return Ok(Vec::new());
        }
        let text = self.backend.inflate_transport(payload, compression)?;
        parse_rows(&text)
    }

    /// Expand compressed bytes that were already recovered from an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptDump`] if decompression or JSON parsing fails.
    pub fn expand_bytes(
        &self,
        compressed: &[u8],
        compression: Compression,
    ) -> Result<Vec<Row>, CodecError> {
        let text = self.backend.inflate(compressed, compression)?;
        parse_rows(&text)
    }

    /// Open an encrypted dump with its content key and expand it.
    ///
    /// An empty body yields no rows, as on the plaintext path.
    ///
    /// # Errors
    ///
    /// Any [`CodecError`] from [`envelope::open`], or [`CodecError::CorruptDump`].
    pub fn decrypt_and_expand(
        &self,
        envelope_input: &str,
        key_b64: &str,
        compression: Compression,
    ) -> Result<Vec<Row>, CodecError> {
        if envelope_input.trim().is_empty() {
            return Ok(Vec::new());
        }
        let compressed = envelope::open(envelope_input, key_b64)?;
        self.expand_bytes(&compressed, compression)
    }
}

impl Default for DumpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DumpDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpDecoder")
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn parse_rows(text: &[u8]) -> Result<Vec<Row>, CodecError> {
    let text = std::str::from_utf8(text)
        .map_err(|e| CodecError::CorruptDump(format!("dump is not UTF-8: {e}")))?;
    serde_json::from_str::<Vec<Row>>(text)
        .map_err(|e| CodecError::CorruptDump(format!("dump is not a JSON array: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{Keyring, MasterKey};
    use crate::transport;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use serde_json::json;
    use std::io::Write;

    fn gzip_b64(text: &str) -> String {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        transport::encode(enc.finish().unwrap())
    }

    fn zlib_b64(text: &str) -> String {
        let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        transport::encode(enc.finish().unwrap())
    }

    fn decoders() -> [DumpDecoder; 2] {
        [
            DumpDecoder::with_backend(Arc::new(StreamBackend)),
            DumpDecoder::with_backend(Arc::new(BufferBackend)),
        ]
    }

    #[test]
    fn expands_gzip_rows() {
        let payload = gzip_b64(r#"["CREATE TABLE posts (id TEXT)", {"id": "a"}]"#);
        for d in decoders() {
            let rows = d.expand(&payload, Compression::Gzip).unwrap();
            assert_eq!(rows, vec![json!("CREATE TABLE posts (id TEXT)"), json!({"id": "a"})]);
        }
    }

    #[test]
    fn expands_deflate_rows() {
        let payload = zlib_b64(r#"[1, 2, 3]"#);
        for d in decoders() {
            assert_eq!(d.expand(&payload, Compression::Deflate).unwrap().len(), 3);
        }
    }

    #[test]
    fn empty_body_is_no_rows() {
        for d in decoders() {
            assert!(d.expand("", Compression::Gzip).unwrap().is_empty());
            assert!(d.decrypt_and_expand("  ", "k", Compression::Gzip).unwrap().is_empty());
        }
    }

    #[test]
    fn non_array_json_is_corrupt() {
        let payload = gzip_b64(r#"{"rows": []}"#);
        for d in decoders() {
            assert!(matches!(
                d.expand(&payload, Compression::Gzip),
                Err(CodecError::CorruptDump(_))
            ));
        }
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&[0xFF, 0xFE, 0x5B]).unwrap();
        let payload = transport::encode(enc.finish().unwrap());
        for d in decoders() {
            assert!(matches!(
                d.expand(&payload, Compression::Gzip),
                Err(CodecError::CorruptDump(_))
            ));
        }
    }

    #[test]
    fn encrypted_dump_expands_after_decrypt() {
        let ring = Keyring::new(Some(MasterKey::from_bytes(vec![1; 32]).unwrap()));
        let stored = gzip_b64(r#"["row 1", "row 2"]"#);
        let sealed = envelope::seal_transport(&stored, &ring, "abc123", "posts").unwrap();
        let k = ring.derive_base64("abc123", "posts").unwrap();

        for d in decoders() {
            let rows = d.decrypt_and_expand(&sealed, &k, Compression::Gzip).unwrap();
            assert_eq!(rows, vec![json!("row 1"), json!("row 2")]);
        }
    }

    #[test]
    fn decrypt_failure_is_not_degraded_to_plaintext() {
        let ring = Keyring::new(Some(MasterKey::from_bytes(vec![1; 32]).unwrap()));
        let sealed = envelope::seal_transport(&gzip_b64("[]"), &ring, "abc123", "posts").unwrap();
        let wrong = ring.derive_base64("other", "posts").unwrap();
        let d = DumpDecoder::new();
        assert_eq!(
            d.decrypt_and_expand(&sealed, &wrong, Compression::Gzip),
            Err(CodecError::DecryptionFailure)
        );
    }

    #[test]
    fn compression_parses() {
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("DEFLATE".parse::<Compression>().unwrap(), Compression::Deflate);
        assert!("br".parse::<Compression>().is_err());
    }
}
