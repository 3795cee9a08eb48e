//! Base64 text encoding used for every binary field that crosses HTTP.
//!
//! Output is always standard, padded base64. Input is accepted with or without
//! trailing padding, since dumps produced by older tooling are not consistent
//! about it.

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    DecodeError, Engine as _,
};

/// Standard alphabet; pads on encode, indifferent to padding on decode.
pub const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode raw bytes for transport.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    ENGINE.encode(bytes)
}

/// Decode a transport string back into raw bytes.
///
/// Surrounding whitespace (e.g. a trailing newline in a stored file) is ignored.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    ENGINE.decode(text.trim())
}
