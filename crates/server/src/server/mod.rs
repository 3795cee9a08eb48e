//! Axum HTTP surface: routing, handlers, middleware, and key authorization.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
