//! `dump-client` — fetches one collection's dump and prints its rows.
//!
//! Startup sequence:
//! 1. Load and validate [`config::Config`] from environment variables.
//! 2. Initialise structured JSON logging on stderr.
//! 3. Fetch the dump (and, when encrypted, its key), decode, and write one
//!    JSON row per line to stdout.

mod config;
mod fetch;
mod telemetry;

use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use dump_common::dump::DumpDecoder;
use tracing::info;

use fetch::DumpClient;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = config::Config::from_env().map_err(|e| {
        eprintln!("ERROR: dump-client configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Fetch and print
    // -----------------------------------------------------------------------
    let client = DumpClient::new(&cfg.server_url, cfg.auth_token().map(str::to_owned));
    let decoder = DumpDecoder::with_backend(cfg.decompression_backend.resolve());

    let rows = client
        .fetch_rows(
            &cfg.collection,
            &cfg.checksum,
            cfg.encrypted,
            &decoder,
            cfg.compression,
        )
        .await
        .with_context(|| format!("failed to load collection {}", cfg.collection))?;

    info!(
        collection = %cfg.collection,
        rows = rows.len(),
        backend = decoder.backend_name(),
        encrypted = cfg.encrypted,
        "dump loaded"
    );

    let mut out = BufWriter::new(std::io::stdout().lock());
    for row in &rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
