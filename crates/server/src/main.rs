// crates/server/src/main.rs
//! Hostwarden gateway binary.
//!
//! Reads configuration from the environment, refuses to start without an
//! upstream address and shared secret, then serves the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use hostwarden_server::auth::StaticKeyStore;
use hostwarden_server::{create_app, AppState, GatewayConfig};

/// Parse `HOSTWARDEN_API_KEYS` into a credential store.
///
/// Format: comma-separated `principal=key` pairs, e.g.
/// `panel=k-3f9a...,ops=k-77b1...`. Bearer-token sessions come from an
/// external session service and are not configured here.
fn credential_store_from_env() -> Result<StaticKeyStore> {
    let mut store = StaticKeyStore::new();
    if let Ok(raw) = std::env::var("HOSTWARDEN_API_KEYS") {
        for pair in raw.split(',').filter(|p| !p.is_empty()) {
            let (name, key) = pair
                .split_once('=')
                .with_context(|| format!("malformed HOSTWARDEN_API_KEYS entry: {pair:?}"))?;
            store = store.with_key(key.trim(), name.trim());
        }
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Missing upstream or shared secret is fatal: the gateway must never
    // run with auth silently disabled.
    let config = GatewayConfig::from_env()?;
    let credentials = Arc::new(credential_store_from_env()?);

    let port = config.port;
    let upstream = config.upstream_base.clone();
    let state = AppState::new(config, credentials);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, upstream = %upstream, "hostwarden gateway listening");
    eprintln!("hostwarden v{} \u{2192} http://{}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app).await?;

    Ok(())
}
