//! HTTP retrieval of dumps and content keys.
//!
//! The encrypted flow is two requests carrying the same checksum: the
//! envelope (`sql_dump.enc`) and the key. An empty dump body means the server
//! has no data for the collection; no key is requested in that case.

use bytes::Bytes;
use dump_common::{
    dump::{Compression, DumpDecoder, Row},
    protocol::{self, ErrorResponse, KeyResponse},
    CodecError,
};
use http_body_util::{BodyExt, Empty};
use hyper::{header::AUTHORIZATION, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tracing::debug;

/// Errors while fetching or decoding a dump.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built (bad base URL or collection).
    #[error("invalid request: {0}")]
    Request(String),

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status} ({code})")]
    Status {
        /// HTTP status.
        status: u16,
        /// `code` from the error body, or `"unknown"`.
        code: String,
    },

    /// The response body was not what the endpoint promises.
    #[error("malformed response: {0}")]
    Body(String),

    /// Decrypting or decompressing the dump failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Client for one delivery server.
#[derive(Clone)]
pub struct DumpClient {
    base_url: String,
    token: Option<String>,
    http: Client<HttpConnector, Empty<Bytes>>,
}

impl DumpClient {
    /// Client for the server at `base_url`, presenting `token` to the key endpoint.
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let http = Client::builder(TokioExecutor::new()).build_http();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            token,
            http,
        }
    }

    /// URL of the plaintext or encrypted dump.
    pub fn dump_url(&self, collection: &str, checksum: &str, encrypted: bool) -> String {
        let path = if encrypted {
            protocol::encrypted_dump_path(collection)
        } else {
            protocol::plain_dump_path(collection)
        };
        self.with_checksum(&path, checksum)
    }

    /// URL of the key endpoint.
    pub fn key_url(&self, collection: &str, checksum: &str) -> String {
        self.with_checksum(&protocol::key_path(collection), checksum)
    }

    fn with_checksum(&self, path: &str, checksum: &str) -> String {
        format!(
            "{}{path}?{}={}",
            self.base_url,
            protocol::CHECKSUM_PARAM,
            query_escape(checksum)
        )
    }

    /// Fetch the dump body; `encrypted` selects `.enc` over `.txt`.
    ///
    /// # Errors
    ///
    /// Any non-2xx status, transport failure or non-UTF-8 body.
    pub async fn fetch_dump(
        &self,
        collection: &str,
        checksum: &str,
        encrypted: bool,
    ) -> Result<String, FetchError> {
        let body = self.get(&self.dump_url(collection, checksum, encrypted), false).await?;
        String::from_utf8(body.to_vec()).map_err(|_| FetchError::Body("dump is not UTF-8".into()))
    }

    /// Fetch the content key bound to `checksum`.
    ///
    /// # Errors
    ///
    /// Any non-2xx status (401/403 from the authorizer), transport failure or
    /// a body that is not a key response.
    pub async fn fetch_key(&self, collection: &str, checksum: &str) -> Result<KeyResponse, FetchError> {
        let body = self.get(&self.key_url(collection, checksum), true).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Body(format!("key response: {e}")))
    }

    /// Fetch, decrypt if needed, and expand a dump into rows.
    ///
    /// # Errors
    ///
    /// See [`DumpClient::fetch_dump`], [`DumpClient::fetch_key`], and the
    /// codec errors of [`DumpDecoder`].
    pub async fn fetch_rows(
        &self,
        collection: &str,
        checksum: &str,
        encrypted: bool,
        decoder: &DumpDecoder,
        compression: Compression,
    ) -> Result<Vec<Row>, FetchError> {
        let body = self.fetch_dump(collection, checksum, encrypted).await?;
        if body.is_empty() {
            debug!(collection, "empty dump");
            return Ok(Vec::new());
        }

        if !encrypted {
            return Ok(decoder.expand(&body, compression)?);
        }

        let key = self.fetch_key(collection, checksum).await?;
        debug!(collection, kid = %key.kid, "content key received");
        Ok(decoder.decrypt_and_expand(&body, &key.k, compression)?)
    }

    async fn get(&self, url: &str, authenticate: bool) -> Result<Bytes, FetchError> {
        let mut request = Request::builder().method("GET").uri(url);
        if authenticate {
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        let request = request
            .body(Empty::<Bytes>::new())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_bytes();

        if status != StatusCode::OK {
            let code = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.code)
                .unwrap_or_else(|_| "unknown".into());
            return Err(FetchError::Status {
                status: status.as_u16(),
                code,
            });
        }
        Ok(body)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn query_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::io::Write;
    use std::net::SocketAddr;

    use dump_common::{envelope, Keyring, MasterKey};
    use flate2::write::GzEncoder;
    use http_body_util::Full;
    use hyper::{body::Incoming, server::conn::http1, service::service_fn, Response};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    const CHECKSUM: &str = "abc123";

    fn gzip(text: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    fn keyring() -> Keyring {
        Keyring::new(Some(MasterKey::from_bytes(vec![9; 32]).unwrap()))
    }

    async fn route(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let ok = |body: String| Response::new(Full::new(Bytes::from(body)));
        let keyring = keyring();
        let resp = match req.uri().path() {
            "/__content/posts/sql_dump.txt" => {
                ok(dump_common::transport::encode(gzip(r#"["a", "b", "c"]"#)))
            }
            "/__content/posts/sql_dump.enc" => ok(envelope::seal(
                &gzip(r#"["secret row"]"#),
                &keyring,
                CHECKSUM,
                "posts",
            )
            .unwrap()),
            "/__content/empty/sql_dump.enc" => ok(String::new()),
            "/api/__content/posts/key" => {
                let authorized = req
                    .headers()
                    .get(AUTHORIZATION)
                    .is_some_and(|v| v == "Bearer s3cret");
                if authorized {
                    let checksum = req.uri().query().unwrap_or("").trim_start_matches("v=");
                    let key = KeyResponse {
                        kid: dump_common::kdf::key_id("posts", checksum),
                        k: keyring.derive_base64(checksum, "posts").unwrap(),
                    };
                    ok(serde_json::to_string(&key).unwrap())
                } else {
                    let mut r = ok(r#"{"code":"unauthorized","message":"no"}"#.into());
                    *r.status_mut() = StatusCode::UNAUTHORIZED;
                    r
                }
            }
            _ => {
                let mut r = ok(r#"{"code":"not_found","message":"nope"}"#.into());
                *r.status_mut() = StatusCode::NOT_FOUND;
                r
            }
        };
        Ok(resp)
    }

    async fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(route))
                        .await;
                });
            }
        });
        addr
    }

    #[test]
    fn urls_carry_checksum() {
        let c = DumpClient::new("http://localhost:3000/", None);
        assert_eq!(
            c.dump_url("posts", CHECKSUM, false),
            "http://localhost:3000/__content/posts/sql_dump.txt?v=abc123"
        );
        assert_eq!(
            c.dump_url("posts", CHECKSUM, true),
            "http://localhost:3000/__content/posts/sql_dump.enc?v=abc123"
        );
        assert_eq!(
            c.key_url("posts", CHECKSUM),
            "http://localhost:3000/api/__content/posts/key?v=abc123"
        );
    }

    #[test]
    fn checksum_is_escaped() {
        assert_eq!(query_escape("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(query_escape(""), "");
    }

    #[tokio::test]
    async fn plaintext_rows() {
        let addr = spawn_server().await;
        let c = DumpClient::new(&format!("http://{addr}"), None);
        let rows = c
            .fetch_rows("posts", CHECKSUM, false, &DumpDecoder::new(), Compression::Gzip)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn encrypted_rows_with_token() {
        let addr = spawn_server().await;
        let c = DumpClient::new(&format!("http://{addr}"), Some("s3cret".into()));
        let rows = c
            .fetch_rows("posts", CHECKSUM, true, &DumpDecoder::new(), Compression::Gzip)
            .await
            .unwrap();
        assert_eq!(rows, vec![serde_json::json!("secret row")]);
    }

    #[tokio::test]
    async fn encrypted_without_token_is_unauthorized() {
        let addr = spawn_server().await;
        let c = DumpClient::new(&format!("http://{addr}"), None);
        let err = c
            .fetch_rows("posts", CHECKSUM, true, &DumpDecoder::new(), Compression::Gzip)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 401, ref code } if code == "unauthorized"));
    }

    #[tokio::test]
    async fn empty_dump_skips_key_request() {
        let addr = spawn_server().await;
        // No token: a key request would be refused, so success proves it was skipped.
        let c = DumpClient::new(&format!("http://{addr}"), None);
        let rows = c
            .fetch_rows("empty", CHECKSUM, true, &DumpDecoder::new(), Compression::Gzip)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn stale_checksum_fails_decryption() {
        let addr = spawn_server().await;
        let c = DumpClient::new(&format!("http://{addr}"), Some("s3cret".into()));
        let env = c.fetch_dump("posts", CHECKSUM, true).await.unwrap();
        let stale = c.fetch_key("posts", "def456").await.unwrap();
        let err = DumpDecoder::new()
            .decrypt_and_expand(&env, &stale.k, Compression::Gzip)
            .unwrap_err();
        assert_eq!(err, CodecError::DecryptionFailure);
    }

    #[tokio::test]
    async fn unknown_collection_is_404() {
        let addr = spawn_server().await;
        let c = DumpClient::new(&format!("http://{addr}"), None);
        let err = c.fetch_dump("nope", CHECKSUM, false).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
