//! `dump-server` — content dump delivery binary.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP spans).
//! 3. Load the master key into the [`Keyring`].
//! 4. Open artifact storage, the legacy module, and the key authorizer.
//! 5. Build the Axum router and serve until Ctrl-C.

mod config;
mod delivery;
mod server;
mod storage;
mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use dump_common::Keyring;
use tracing::{info, warn};

use config::Config;
use delivery::{Delivery, EncryptionPolicy};
use server::auth::{AllowAll, BearerToken, KeyAuthorizer};
use server::state::AppState;
use storage::{FsStorage, JsonModule};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        encryption_enabled = cfg.encryption_enabled,
        "dump-server starting"
    );

    // -----------------------------------------------------------------------
    // 3. Keyring
    // -----------------------------------------------------------------------
    let keyring = Keyring::new(cfg.master_key()?);
    if cfg.encryption_enabled && !keyring.is_ready() {
        warn!("encryption enabled without ENCRYPTION_MASTER_KEY; key requests will fail");
    }

    // -----------------------------------------------------------------------
    // 4. Storage, legacy module, authorizer
    // -----------------------------------------------------------------------
    let storage = FsStorage::new(&cfg.storage_root);
    let policy = EncryptionPolicy {
        enabled: cfg.encryption_enabled,
    };

    let authorizer: Arc<dyn KeyAuthorizer> = match cfg.key_access_token() {
        Some(token) => Arc::new(BearerToken::new(token)),
        None => Arc::new(AllowAll),
    };

    let mut delivery =
        Delivery::new(policy, Arc::new(keyring), Arc::new(storage)).with_authorizer(authorizer);

    if let Some(path) = cfg.legacy_module_path() {
        let module = JsonModule::load(path).await?;
        info!(path, collections = module.len(), "legacy module loaded");
        delivery = delivery.with_legacy(Arc::new(module));
    }

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(delivery));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dump-server stopped");
    telemetry::shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
