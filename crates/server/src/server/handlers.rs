//! Axum request handlers for all service endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use dump_common::{
    protocol::{DumpQuery, ErrorResponse, HealthResponse},
    ServiceError,
};
use tracing::{error, warn};

use super::state::AppState;
use crate::delivery::{CachePolicy, Delivered, RequestMode};

/// `GET /__content/:collection/sql_dump.txt` — plaintext compressed dump.
pub async fn plain_dump(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<DumpQuery>,
) -> Response {
    dump(&state, &collection, RequestMode::Plaintext, query.checksum()).await
}

/// `GET /__content/:collection/sql_dump.enc` — encrypted envelope.
pub async fn encrypted_dump(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<DumpQuery>,
) -> Response {
    dump(&state, &collection, RequestMode::Encrypted, query.checksum()).await
}

async fn dump(state: &AppState, collection: &str, mode: RequestMode, checksum: &str) -> Response {
    match state.delivery.dump(collection, mode, checksum).await {
        Ok(delivered) => dump_response(delivered),
        Err(e) => error_response(e),
    }
}

fn dump_response(delivered: Delivered) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(Delivered::CONTENT_TYPE));
    if let Some(cache) = delivered.cache {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache.header_value()));
    }
    (StatusCode::OK, headers, delivered.body).into_response()
}

/// `GET /api/__content/:collection/key` — per-collection content key.
///
/// Every response from this route, refusals included, carries `no-store`.
pub async fn key(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<DumpQuery>,
    headers: HeaderMap,
) -> Response {
    let mut response = match state
        .delivery
        .key(&collection, query.checksum(), &headers)
        .await
    {
        Ok(key) => (StatusCode::OK, Json(key)).into_response(),
        Err(e) => error_response(e),
    };
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static(CachePolicy::NoStore.header_value()),
    );
    response
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `503 Service Unavailable` when encryption is enabled but no master
/// key is loaded, since key issuance and on-the-fly encryption would fail.
pub async fn health(State(state): State<AppState>) -> Response {
    let encryption_enabled = state.delivery.policy().enabled;
    let key_ready = state.delivery.key_ready();

    let (status_code, status_str) = if encryption_enabled && !key_ready {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    let body = HealthResponse {
        status: status_str.into(),
        encryption_enabled,
        key_ready,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> Response {
    error_response(ServiceError::NotFound)
}

/// Map a [`ServiceError`] to its JSON error response.
///
/// Server-side failures are logged here and reported to callers without detail.
pub fn error_response(err: ServiceError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match &err {
        ServiceError::NotFound => "the requested resource does not exist".to_owned(),
        ServiceError::Unauthorized(msg) | ServiceError::Forbidden(msg) => {
            warn!(code = err.code(), "key request refused");
            msg.clone()
        }
        ServiceError::Configuration(_) | ServiceError::Storage(_) | ServiceError::Internal(_) => {
            error!(error = %err, "request failed");
            "internal server error".to_owned()
        }
    };
    (status, Json(ErrorResponse::new(err.code(), message))).into_response()
}
