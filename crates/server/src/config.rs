//! Configuration loading and validation for the delivery server.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use dump_common::MasterKey;
use serde::Deserialize;

/// Validated server configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Directory holding build artifacts, addressed by storage key. **Required.**
    pub storage_root: String,

    /// Serve dumps encrypted (`sql_dump.enc` + key endpoint) instead of plaintext.
    #[serde(default)]
    pub encryption_enabled: bool,

    /// Base64 master key for content key derivation. Required for key
    /// issuance and on-the-fly encryption.
    #[serde(default)]
    pub encryption_master_key: Option<String>,

    /// Optional JSON file acting as the legacy aliased dump module.
    #[serde(default)]
    pub legacy_module_path: Option<String>,

    /// When set, key requests must present `Authorization: Bearer <token>`.
    #[serde(default)]
    pub key_access_token: Option<String>,

    /// OTLP/gRPC collector endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    3000
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.storage_root, "STORAGE_ROOT")?;
        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        // Parse early so a malformed key stops startup instead of every request.
        self.master_key()?;
        Ok(())
    }

    /// The decoded master key, if one is configured. Blank counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not valid base64.
    pub fn master_key(&self) -> Result<Option<MasterKey>> {
        match non_blank(&self.encryption_master_key) {
            None => Ok(None),
            Some(encoded) => MasterKey::from_base64(encoded)
                .map(Some)
                .context("ENCRYPTION_MASTER_KEY must be base64"),
        }
    }

    /// The key access token, if one is configured. Blank counts as absent.
    pub fn key_access_token(&self) -> Option<&str> {
        non_blank(&self.key_access_token)
    }

    /// The legacy module path, if one is configured. Blank counts as absent.
    pub fn legacy_module_path(&self) -> Option<&str> {
        non_blank(&self.legacy_module_path)
    }

    /// The OTLP endpoint, if one is configured. Blank counts as absent.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_blank(&self.otel_exporter_otlp_endpoint)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("listen_port", &self.listen_port)
            .field("storage_root", &self.storage_root)
            .field("encryption_enabled", &self.encryption_enabled)
            .field("encryption_master_key", &redact(&self.encryption_master_key))
            .field("legacy_module_path", &self.legacy_module_path)
            .field("key_access_token", &redact(&self.key_access_token))
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            listen_port: default_listen_port(),
            storage_root: "/srv/build".into(),
            encryption_enabled: false,
            encryption_master_key: None,
            legacy_module_path: None,
            key_access_token: None,
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_port(), 3000);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_minimal() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_storage_root() {
        let cfg = Config {
            storage_root: "  ".into(),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_master_key() {
        let cfg = Config {
            encryption_master_key: Some("not base64!!".into()),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_values_are_absent() {
        let cfg = Config {
            encryption_master_key: Some("".into()),
            key_access_token: Some("   ".into()),
            otel_exporter_otlp_endpoint: Some("".into()),
            ..base()
        };
        assert!(cfg.master_key().unwrap().is_none());
        assert!(cfg.key_access_token().is_none());
        assert!(cfg.otlp_endpoint().is_none());
    }

    #[test]
    fn master_key_decodes() {
        let cfg = Config {
            encryption_master_key: Some(dump_common::transport::encode([7u8; 32])),
            ..base()
        };
        assert_eq!(cfg.master_key().unwrap().unwrap().len(), 32);
    }

    #[test]
    fn secrets_redacted_in_debug() {
        let cfg = Config {
            encryption_master_key: Some("bWFzdGVy".into()),
            key_access_token: Some("s3cret".into()),
            ..base()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("bWFzdGVy"));
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("/srv/build"));
    }
}
