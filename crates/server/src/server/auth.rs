//! Authorization hook consulted before a content key is derived.
//!
//! The service does not define who may read which collection; it only
//! guarantees that a [`KeyAuthorizer`] runs, and can refuse, before any key
//! material is produced.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use dump_common::ServiceError;
use sha2::{Digest, Sha256};

/// The parts of a key request an authorizer may inspect.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// Collection whose key is requested.
    pub collection: &'a str,
    /// Content checksum the key is bound to.
    pub checksum: &'a str,
    /// Incoming request headers (cookies, authorization, ...).
    pub headers: &'a HeaderMap,
}

/// Decides whether a caller may receive a collection's content key.
#[async_trait]
pub trait KeyAuthorizer: Send + Sync {
    /// Return `Ok(())` to allow, or [`ServiceError::Unauthorized`] /
    /// [`ServiceError::Forbidden`] to refuse.
    async fn authorize(&self, request: &KeyRequest<'_>) -> Result<(), ServiceError>;
}

/// Allows every request. The default when no access token is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl KeyAuthorizer for AllowAll {
    async fn authorize(&self, _request: &KeyRequest<'_>) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Requires `Authorization: Bearer <token>` matching a configured token.
///
/// Only the SHA-256 digest of the token is kept, and digests are what get compared.
#[derive(Clone)]
pub struct BearerToken {
    digest: [u8; 32],
}

impl BearerToken {
    /// Accept callers presenting `token`.
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[async_trait]
impl KeyAuthorizer for BearerToken {
    async fn authorize(&self, request: &KeyRequest<'_>) -> Result<(), ServiceError> {
        let presented = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?;

        let digest: [u8; 32] = Sha256::digest(presented.trim().as_bytes()).into();
        if digest != self.digest {
            return Err(ServiceError::Forbidden(format!(
                "not entitled to keys for {}",
                request.collection
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(headers: &HeaderMap) -> KeyRequest<'_> {
        KeyRequest {
            collection: "posts",
            checksum: "abc123",
            headers,
        }
    }

    #[tokio::test]
    async fn allow_all_allows() {
        let headers = HeaderMap::new();
        assert!(AllowAll.authorize(&request(&headers)).await.is_ok());
    }

    #[tokio::test]
    async fn bearer_missing_is_unauthorized() {
        let headers = HeaderMap::new();
        let err = BearerToken::new("s3cret")
            .authorize(&request(&headers))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn bearer_mismatch_is_forbidden() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        let err = BearerToken::new("s3cret")
            .authorize(&request(&headers))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 403);
    }

    #[tokio::test]
    async fn bearer_match_is_allowed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert!(BearerToken::new("s3cret")
            .authorize(&request(&headers))
            .await
            .is_ok());
    }

    #[test]
    fn token_redacted_in_debug() {
        assert!(format!("{:?}", BearerToken::new("s3cret")).contains("REDACTED"));
    }
}
