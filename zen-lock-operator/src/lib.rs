//! # zen-lock-operator
//!
//! C7 ([`ownership`]) and C8 ([`bundle`]): the two long-lived reconciliation
//! loops that complete the lifecycle the admission injector starts. Built
//! on `kube::runtime::Controller`, grounded on the `eosin` storage
//! operator's reconcile-loop shape (see `ownership`'s module docs) since
//! the teacher crate has no Kubernetes watch loop of its own.

pub mod bundle;
pub mod config;
pub mod error;
pub mod leader;
pub mod ownership;

pub use error::Error;
pub use leader::{AlwaysLeader, LeaderElector};

/// Initialise `tracing_subscriber`, matching `zen_lock_webhook::init_tracing`.
pub fn init_tracing(config: &config::Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zen_lock_operator=info".into());
    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).with_thread_ids(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
