//! Bootstrap for the zen-lock reconcilers (spec.md §4.7, §4.8). Both
//! controllers run concurrently in the same process, each gated behind
//! [`zen_lock_operator::LeaderElector`] (spec.md §5 "Leader election
//! (external): bundle and ownership reconcilers run only on the elected
//! leader").

use std::sync::Arc;

use zen_lock_cipher::Identity;
use zen_lock_operator::config::Config;
use zen_lock_operator::{init_tracing, ownership, AlwaysLeader, LeaderElector};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("zen-lock-operator: {err}");
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

    let leader: Arc<dyn LeaderElector> = Arc::new(AlwaysLeader);

    tracing::info!(orphan_grace_secs = config.orphan_grace.as_secs(), "starting zen-lock reconcilers");

    tokio::join!(
        ownership::run(client.clone(), config.orphan_grace, leader.clone()),
        zen_lock_operator::bundle::run(client, Arc::new(identity), leader),
    );
}

fn load_identity(identity_b64: &str) -> Result<Identity, String> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(identity_b64)
        .map_err(|e| format!("ZEN_LOCK_IDENTITY is not valid base64: {e}"))?;
    Identity::from_bytes(&bytes).map_err(|e| format!("ZEN_LOCK_IDENTITY: {e}"))
}
