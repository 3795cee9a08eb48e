//! Routes, storage keys, and JSON bodies exchanged between components.
//!
//! Both the server and the client build paths from the constants here so the
//! two sides cannot drift apart.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Plaintext dump route (axum path syntax).
pub const PLAIN_DUMP_ROUTE: &str = "/__content/:collection/sql_dump.txt";

/// Encrypted dump route (axum path syntax).
pub const ENCRYPTED_DUMP_ROUTE: &str = "/__content/:collection/sql_dump.enc";

/// Content key route (axum path syntax).
pub const KEY_ROUTE: &str = "/api/__content/:collection/key";

/// Query parameter carrying the content checksum.
pub const CHECKSUM_PARAM: &str = "v";

/// Concrete plaintext dump path for `collection`.
pub fn plain_dump_path(collection: &str) -> String {
    PLAIN_DUMP_ROUTE.replace(":collection", collection)
}

/// Concrete encrypted dump path for `collection`.
pub fn encrypted_dump_path(collection: &str) -> String {
    ENCRYPTED_DUMP_ROUTE.replace(":collection", collection)
}

/// Concrete key path for `collection`.
pub fn key_path(collection: &str) -> String {
    KEY_ROUTE.replace(":collection", collection)
}

// ---------------------------------------------------------------------------
// Storage keys
// ---------------------------------------------------------------------------

/// Storage key of the plaintext compressed payload for `collection`.
pub fn plain_dump_key(collection: &str) -> String {
    format!("build:content:raw:dump.{collection}.sql")
}

/// Storage key of the prebuilt envelope for `collection`.
pub fn encrypted_dump_key(collection: &str) -> String {
    format!("build:content:raw:dump.{collection}.sql.enc")
}

/// Storage key of the bundled multi-collection legacy artifact.
pub const LEGACY_BUNDLE_KEY: &str = "build:content:database.compressed.mjs";

// ---------------------------------------------------------------------------
// Key endpoint
// ---------------------------------------------------------------------------

/// Query string accepted by the dump and key endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DumpQuery {
    /// Content checksum; absent is treated as the empty string.
    pub v: Option<String>,
}

impl DumpQuery {
    /// The checksum, defaulting to `""`.
    pub fn checksum(&self) -> &str {
        self.v.as_deref().unwrap_or("")
    }
}

/// Response body for `GET /api/__content/:collection/key`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResponse {
    /// Informational key identifier, `v1:<collection>:<checksum>`.
    pub kid: String,
    /// Base64 of the 32-byte content key.
    pub k: String,
}

impl std::fmt::Debug for KeyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResponse")
            .field("kid", &self.kid)
            .field("k", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether encrypted delivery is switched on.
    pub encryption_enabled: bool,
    /// Whether a master key is loaded.
    pub key_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_paths() {
        assert_eq!(plain_dump_path("posts"), "/__content/posts/sql_dump.txt");
        assert_eq!(encrypted_dump_path("posts"), "/__content/posts/sql_dump.enc");
        assert_eq!(key_path("posts"), "/api/__content/posts/key");
    }

    #[test]
    fn storage_keys() {
        assert_eq!(plain_dump_key("posts"), "build:content:raw:dump.posts.sql");
        assert_eq!(encrypted_dump_key("posts"), "build:content:raw:dump.posts.sql.enc");
    }

    #[test]
    fn missing_checksum_is_empty() {
        assert_eq!(DumpQuery::default().checksum(), "");
        let q: DumpQuery = serde_json::from_str(r#"{"v":"abc123"}"#).unwrap();
        assert_eq!(q.checksum(), "abc123");
    }

    #[test]
    fn key_response_wire_shape() {
        let r = KeyResponse {
            kid: "v1:posts:abc123".into(),
            k: "c2VjcmV0".into(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kid"], "v1:posts:abc123");
        assert_eq!(json["k"], "c2VjcmV0");
        assert!(!format!("{r:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("not_found", "the requested resource does not exist");
        assert_eq!(e.code, "not_found");
        assert!(e.message.contains("does not exist"));
    }
}
