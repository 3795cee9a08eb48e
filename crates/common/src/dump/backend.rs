//! Decompression backends and the one-time capability probe.
//!
//! Two interchangeable variants inflate a compressed dump:
//!
//! - [`StreamBackend`] chains readers (base64 → inflate) and never holds the
//!   whole decoded payload in memory.
//! - [`BufferBackend`] decodes the whole payload first and inflates it with a
//!   single synchronous call over the in-memory buffer.
//!
//! Both must produce byte-identical output for the same input.

use std::io::{self, Read, Write};
use std::sync::{Arc, OnceLock};

use base64::read::DecoderReader;
use flate2::{
    bufread,
    read::{MultiGzDecoder, ZlibDecoder},
    write::GzEncoder,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::Compression;
use crate::error::CodecError;
use crate::transport;

/// A way of turning compressed bytes into decompressed bytes.
pub trait Backend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Inflate a transport-encoded (base64) compressed payload.
    fn inflate_transport(&self, payload: &str, compression: Compression)
        -> Result<Vec<u8>, CodecError>;

    /// Inflate raw compressed bytes, e.g. as recovered from an envelope.
    fn inflate(&self, compressed: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError>;
}

/// Streaming variant: base64 reader piped into a streaming decompressor.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamBackend;

impl StreamBackend {
    fn drain<R: Read>(reader: R, compression: Compression) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        match compression {
            Compression::Gzip => MultiGzDecoder::new(reader).read_to_end(&mut out)?,
            Compression::Deflate => ZlibDecoder::new(reader).read_to_end(&mut out)?,
        };
        Ok(out)
    }
}

impl Backend for StreamBackend {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn inflate_transport(
        &self,
        payload: &str,
        compression: Compression,
    ) -> Result<Vec<u8>, CodecError> {
        let text = payload.trim().as_bytes();
        let decoded = DecoderReader::new(text, &transport::ENGINE);
        Self::drain(decoded, compression).map_err(corrupt)
    }

    fn inflate(&self, compressed: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
        Self::drain(compressed, compression).map_err(corrupt)
    }
}

/// Buffer variant: full decode, then one inflate call over the buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BufferBackend;

impl Backend for BufferBackend {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn inflate_transport(
        &self,
        payload: &str,
        compression: Compression,
    ) -> Result<Vec<u8>, CodecError> {
        let compressed = transport::decode(payload)
            .map_err(|e| CodecError::CorruptDump(format!("payload is not base64: {e}")))?;
        self.inflate(&compressed, compression)
    }

    fn inflate(&self, compressed: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(compressed.len() * 4);
        let res = match compression {
            Compression::Gzip => bufread::MultiGzDecoder::new(compressed).read_to_end(&mut out),
            Compression::Deflate => bufread::ZlibDecoder::new(compressed).read_to_end(&mut out),
        };
        res.map_err(corrupt)?;
        Ok(out)
    }
}

fn corrupt(e: io::Error) -> CodecError {
    CodecError::CorruptDump(format!("decompression failed: {e}"))
}

/// Which backend to use; configuration may pin one instead of probing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Probe once and use whatever passes.
    #[default]
    Auto,
    /// Always use [`StreamBackend`].
    Stream,
    /// Always use [`BufferBackend`].
    Buffer,
}

impl BackendChoice {
    /// Resolve the choice to a concrete backend.
    pub fn resolve(self) -> Arc<dyn Backend> {
        match self {
            BackendChoice::Auto => probe(),
            BackendChoice::Stream => Arc::new(StreamBackend),
            BackendChoice::Buffer => Arc::new(BufferBackend),
        }
    }
}

impl std::str::FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(BackendChoice::Auto),
            "stream" => Ok(BackendChoice::Stream),
            "buffer" => Ok(BackendChoice::Buffer),
            other => Err(format!("unknown decompression backend: {other}")),
        }
    }
}

static SELECTED: OnceLock<Arc<dyn Backend>> = OnceLock::new();

/// Return the process-wide backend, probing on first use only.
///
/// The probe pushes a small gzip sample through [`StreamBackend`]; if that
/// round trip does not reproduce the sample exactly, [`BufferBackend`] is used.
pub fn probe() -> Arc<dyn Backend> {
    SELECTED
        .get_or_init(|| {
            let backend: Arc<dyn Backend> = if stream_self_test() {
                Arc::new(StreamBackend)
            } else {
                warn!("stream decompression self-test failed; using buffer backend");
                Arc::new(BufferBackend)
            };
            debug!(backend = backend.name(), "decompression backend selected");
            backend
        })
        .clone()
}

fn stream_self_test() -> bool {
    const SAMPLE: &[u8] = br#"["probe"]"#;
    let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    if enc.write_all(SAMPLE).is_err() {
        return false;
    }
    let Ok(compressed) = enc.finish() else {
        return false;
    };
    let encoded = transport::encode(compressed);
    matches!(
        StreamBackend.inflate_transport(&encoded, Compression::Gzip),
        Ok(out) if out == SAMPLE
    )
}
