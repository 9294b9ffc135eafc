//! Bootstrap for the zen-lock admission webhook (spec.md §6 "Wire protocol",
//! "Environment"). Thin per the teacher's `src/bin/citadel.rs` /
//! `citadel-api/src/main.rs` split: read configuration, build process-wide
//! state, serve.

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;

use zen_lock_cipher::Identity;
use zen_lock_webhook::config::Config;
use zen_lock_webhook::store::SecretStore;
use zen_lock_webhook::{build_router, init_tracing, AppState};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            // spec.md §7: missing private identity is a configuration
            // error, fatal at startup.
            eprintln!("zen-lock-webhook: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let identity = load_identity(&config.identity_b64).unwrap_or_else(|err| {
        tracing::error!(%err, "ZEN_LOCK_IDENTITY could not be parsed");
        std::process::exit(1);
    });

    let client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(%err, "failed to build Kubernetes client");
            std::process::exit(1);
        }
    };

    let state: Arc<AppState> =
        Arc::new(AppState::new(identity, config.cache_ttl, config.retry.clone(), SecretStore::kube(client)));
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(port = config.port, "starting zen-lock admission webhook");

    match load_tls_config().await {
        Some(tls) => {
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
                .expect("admission server failed");
        }
        None => {
            tracing::warn!("ZEN_LOCK_TLS_CERT/ZEN_LOCK_TLS_KEY not set; serving plaintext (development only)");
            let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind admission port");
            axum::serve(listener, app.into_make_service()).await.expect("admission server failed");
        }
    }
}

fn load_identity(identity_b64: &str) -> Result<Identity, String> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(identity_b64)
        .map_err(|e| format!("ZEN_LOCK_IDENTITY is not valid base64: {e}"))?;
    Identity::from_bytes(&bytes).map_err(|e| format!("ZEN_LOCK_IDENTITY: {e}"))
}

/// mTLS / cluster-provisioned serving certs (spec.md §6 "Wire protocol").
/// Both paths must be set or TLS is skipped — development convenience only.
async fn load_tls_config() -> Option<RustlsConfig> {
    let cert_path = std::env::var("ZEN_LOCK_TLS_CERT").ok()?;
    let key_path = std::env::var("ZEN_LOCK_TLS_KEY").ok()?;
    RustlsConfig::from_pem_file(cert_path, key_path).await.ok()
}
