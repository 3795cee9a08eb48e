//! The legacy aliased dump module: one object exposing every collection's
//! payload by name, kept for deployments built before per-collection dumps.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Lookup of a collection's transport-encoded payload by name.
pub trait LegacyModule: Send + Sync {
    /// The payload exported under `collection`, if any.
    fn export(&self, collection: &str) -> Option<String>;
}

/// A legacy module loaded from a JSON object of `{ "<collection>": "<payload>" }`.
#[derive(Debug, Clone, Default)]
pub struct JsonModule {
    exports: HashMap<String, String>,
}

impl JsonModule {
    /// Parse the module from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error unless `text` is a JSON object of string values.
    pub fn from_json(text: &str) -> Result<Self> {
        let exports: HashMap<String, String> =
            serde_json::from_str(text).context("legacy module must be a JSON object of strings")?;
        Ok(Self { exports })
    }

    /// Read and parse the module file once, at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read legacy module {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Number of collections exported.
    pub fn len(&self) -> usize {
        self.exports.len()
    }
}

impl LegacyModule for JsonModule {
    fn export(&self, collection: &str) -> Option<String> {
        self.exports.get(collection).cloned()
    }
}
