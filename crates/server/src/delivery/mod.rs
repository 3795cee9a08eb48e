//! Per-request decision of what to serve for a dump or key request.
//!
//! | Request         | encryption off                   | encryption on                              |
//! |-----------------|----------------------------------|--------------------------------------------|
//! | key             | 404                              | authorize, derive, `{kid, k}`, no-store    |
//! | `sql_dump.enc`  | 404                              | prebuilt envelope, else seal plaintext, else empty |
//! | `sql_dump.txt`  | plaintext, else legacy chain, else empty | 404                                |
//!
//! Storage absence is never an error here: it moves on to the next source and
//! ends in an empty body, which consumers read as "no rows".

pub mod legacy;

use std::sync::Arc;

use dump_common::{envelope, kdf, protocol, protocol::KeyResponse, Keyring, ServiceError};
use tracing::{debug, info};

use crate::server::auth::{AllowAll, KeyAuthorizer, KeyRequest};
use crate::storage::{LegacyModule, Storage};

/// What a request is asking for, derived from its URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// `sql_dump.txt`
    Plaintext,
    /// `sql_dump.enc`
    Encrypted,
    /// `key`
    KeyOnly,
}

/// Server-side encryption policy, fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptionPolicy {
    /// Whether dumps are delivered encrypted.
    pub enabled: bool,
}

impl EncryptionPolicy {
    /// Reject request shapes the policy hides.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for plaintext requests while encryption
    /// is on, and for encrypted/key requests while it is off.
    pub fn admit(self, mode: RequestMode) -> Result<(), ServiceError> {
        match (self.enabled, mode) {
            (false, RequestMode::Plaintext)
            | (true, RequestMode::Encrypted)
            | (true, RequestMode::KeyOnly) => Ok(()),
            _ => Err(ServiceError::NotFound),
        }
    }
}

/// Caching directive attached to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Checksum-addressed artifact; safe to cache forever.
    Immutable,
    /// Key material; never cache or share.
    NoStore,
}

impl CachePolicy {
    /// `Cache-Control` header value.
    pub fn header_value(self) -> &'static str {
        match self {
            CachePolicy::Immutable => "public, max-age=31536000, immutable",
            CachePolicy::NoStore => "no-store",
        }
    }
}

/// A resolved dump body ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Response body; empty means "no data available".
    pub body: String,
    /// `Cache-Control`, set only when an artifact was resolved.
    pub cache: Option<CachePolicy>,
}

impl Delivered {
    /// Content type of every dump body.
    pub const CONTENT_TYPE: &'static str = "text/plain";

    fn artifact(body: String) -> Self {
        Self {
            body,
            cache: Some(CachePolicy::Immutable),
        }
    }

    fn empty() -> Self {
        Self {
            body: String::new(),
            cache: None,
        }
    }
}

/// Dump and key delivery over a storage backend.
#[derive(Clone)]
pub struct Delivery {
    policy: EncryptionPolicy,
    keyring: Arc<Keyring>,
    storage: Arc<dyn Storage>,
    legacy: Option<Arc<dyn LegacyModule>>,
    authorizer: Arc<dyn KeyAuthorizer>,
}

impl Delivery {
    /// Deliver from `storage` under `policy`, deriving keys from `keyring`.
    ///
    /// No legacy module is consulted and every key request is authorized until
    /// [`Delivery::with_legacy`] / [`Delivery::with_authorizer`] say otherwise.
    pub fn new(policy: EncryptionPolicy, keyring: Arc<Keyring>, storage: Arc<dyn Storage>) -> Self {
        Self {
            policy,
            keyring,
            storage,
            legacy: None,
            authorizer: Arc::new(AllowAll),
        }
    }

    /// Consult `module` as the last plaintext fallback.
    pub fn with_legacy(mut self, module: Arc<dyn LegacyModule>) -> Self {
        self.legacy = Some(module);
        self
    }

    /// Gate key issuance on `authorizer`.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn KeyAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// The active encryption policy.
    pub fn policy(&self) -> EncryptionPolicy {
        self.policy
    }

    /// Whether a master key is loaded.
    pub fn key_ready(&self) -> bool {
        self.keyring.is_ready()
    }

    /// Resolve a dump request.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the policy hides this request shape or
    ///   the collection name is not a plain identifier.
    /// - [`ServiceError::Configuration`] if on-the-fly encryption is needed
    ///   but no master key is configured.
    /// - [`ServiceError::Storage`] on backend failure.
    pub async fn dump(
        &self,
        collection: &str,
        mode: RequestMode,
        checksum: &str,
    ) -> Result<Delivered, ServiceError> {
        self.policy.admit(mode)?;
        ensure_collection_name(collection)?;

        match mode {
            RequestMode::Plaintext => self.plaintext(collection).await,
            RequestMode::Encrypted => self.encrypted(collection, checksum).await,
            RequestMode::KeyOnly => Err(ServiceError::NotFound),
        }
    }

    /// Issue the content key for `collection` at `checksum`.
    ///
    /// The authorizer runs after the policy check and before derivation.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] while encryption is off.
    /// - Whatever the authorizer refuses with.
    /// - [`ServiceError::Configuration`] if no master key is configured.
    pub async fn key(
        &self,
        collection: &str,
        checksum: &str,
        headers: &axum::http::HeaderMap,
    ) -> Result<KeyResponse, ServiceError> {
        self.policy.admit(RequestMode::KeyOnly)?;
        ensure_collection_name(collection)?;

        let request = KeyRequest {
            collection,
            checksum,
            headers,
        };
        self.authorizer.authorize(&request).await?;

        let k = self.keyring.derive_base64(checksum, collection)?;
        info!(collection, "content key issued");
        Ok(KeyResponse {
            kid: kdf::key_id(collection, checksum),
            k,
        })
    }

    async fn plaintext(&self, collection: &str) -> Result<Delivered, ServiceError> {
        if let Some(plain) = self.fetch(&protocol::plain_dump_key(collection)).await? {
            return Ok(Delivered::artifact(plain));
        }

        if let Some(bundle) = self.fetch(protocol::LEGACY_BUNDLE_KEY).await? {
            if let Some(payload) = legacy::extract_export(&bundle, collection) {
                if !payload.is_empty() {
                    debug!(collection, "served from legacy bundle");
                    return Ok(Delivered::artifact(payload.to_owned()));
                }
            }
        }

        if let Some(payload) = self
            .legacy
            .as_ref()
            .and_then(|m| m.export(collection))
            .filter(|p| !p.is_empty())
        {
            debug!(collection, "served from legacy module");
            return Ok(Delivered::artifact(payload));
        }

        debug!(collection, "no plaintext dump available");
        Ok(Delivered::empty())
    }

    async fn encrypted(&self, collection: &str, checksum: &str) -> Result<Delivered, ServiceError> {
        if let Some(prebuilt) = self.fetch(&protocol::encrypted_dump_key(collection)).await? {
            return Ok(Delivered::artifact(prebuilt));
        }

        let Some(plain) = self.fetch(&protocol::plain_dump_key(collection)).await? else {
            debug!(collection, "no dump available to encrypt");
            return Ok(Delivered::empty());
        };

        let keyring = Arc::clone(&self.keyring);
        let checksum_owned = checksum.to_owned();
        let collection_owned = collection.to_owned();
        let sealed = tokio::task::spawn_blocking(move || {
            envelope::seal_transport(&plain, &keyring, &checksum_owned, &collection_owned)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("encryption task failed: {e}")))??;

        debug!(collection, "encrypted plaintext dump on the fly");
        Ok(Delivered::artifact(sealed))
    }

    /// Storage read with empty items treated as absent.
    async fn fetch(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self
            .storage
            .get_item(key)
            .await?
            .filter(|item| !item.is_empty()))
    }
}

/// Collection names end up in storage keys; only plain identifiers are served.
fn ensure_collection_name(collection: &str) -> Result<(), ServiceError> {
    let plain = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        Ok(())
    } else {
        Err(ServiceError::NotFound)
    }
}
