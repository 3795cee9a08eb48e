//! Configuration loading and validation for the dump client.

use anyhow::{Context, Result};
use dump_common::dump::{BackendChoice, Compression};
use serde::Deserialize;

/// Validated client configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base URL of the delivery server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Collection to fetch. **Required.**
    pub collection: String,

    /// Content checksum sent as `?v=`. Also the key derivation salt.
    #[serde(default)]
    pub checksum: String,

    /// Fetch the encrypted envelope and its key instead of the plaintext dump.
    #[serde(default)]
    pub encrypted: bool,

    /// Compression the dump was built with.
    #[serde(default)]
    pub compression: Compression,

    /// Pin a decompression backend instead of probing.
    #[serde(default)]
    pub decompression_backend: BackendChoice,

    /// Bearer token presented to the key endpoint.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".into()
}
fn default_log_level() -> String {
    "warn".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build dump-client configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise dump-client configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            anyhow::bail!("COLLECTION is required and must not be empty");
        }
        let url = self.server_url.trim();
        if !url.starts_with("http://") {
            anyhow::bail!("SERVER_URL must be an http:// URL, got {url:?}");
        }
        Ok(())
    }

    /// The auth token, if one is configured. Blank counts as absent.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("collection", &self.collection)
            .field("checksum", &self.checksum)
            .field("encrypted", &self.encrypted)
            .field("compression", &self.compression)
            .field("decompression_backend", &self.decompression_backend)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            server_url: default_server_url(),
            collection: "posts".into(),
            checksum: "abc123".into(),
            encrypted: false,
            compression: Compression::Gzip,
            decompression_backend: BackendChoice::Auto,
            auth_token: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(default_server_url(), "http://127.0.0.1:3000");
        assert_eq!(default_log_level(), "warn");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_collection() {
        let cfg = Config {
            collection: " ".into(),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_https_url() {
        let cfg = Config {
            server_url: "https://example.com".into(),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn token_redacted_and_blank_is_absent() {
        let cfg = Config {
            auth_token: Some("s3cret".into()),
            ..base()
        };
        assert!(!format!("{cfg:?}").contains("s3cret"));
        assert_eq!(cfg.auth_token(), Some("s3cret"));

        let blank = Config {
            auth_token: Some("  ".into()),
            ..base()
        };
        assert!(blank.auth_token().is_none());
    }
}
