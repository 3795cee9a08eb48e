//! Axum router construction.

use axum::{routing::get, Router};
use dump_common::protocol::{ENCRYPTED_DUMP_ROUTE, KEY_ROUTE, PLAIN_DUMP_ROUTE};
use tower_http::{
    compression::CompressionLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route(PLAIN_DUMP_ROUTE, get(handlers::plain_dump))
        .route(ENCRYPTED_DUMP_ROUTE, get(handlers::encrypted_dump))
        .route(KEY_ROUTE, get(handlers::key))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(middleware::UuidRequestId))
        .with_state(state)
}
