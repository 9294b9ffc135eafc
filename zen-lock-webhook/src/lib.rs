//! # zen-lock-webhook
//!
//! C6, the admission-time injector (spec.md §4.6). An `axum` service that
//! terminates the cluster's mutating-webhook call, runs the pipeline in
//! [`pipeline`], and answers with an allow/deny/error admission review.
//!
//! Kept as a `lib.rs` + thin `main.rs` split — the same shape as the
//! teacher's root `citadel_envelope` crate (`src/lib.rs` + `src/bin/citadel.rs`)
//! — rather than `citadel-api`'s bin-only layout, so [`pipeline::handle`] and
//! the router are both unit-testable without a running process.

pub mod admission;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use zen_lock_cipher::Identity;
use zen_lock_core::cache::{BundleCache, CacheManager};
use zen_lock_core::model::Bundle;

use admission::{AdmissionReview, AdmissionReviewResponse};
use config::{Config, RetryConfig};
use metrics::{MetricsSink, TracingMetricsSink};
use pipeline::HandleDeps;
use store::SecretStore;

/// The 10-second hard deadline bounding the whole admission call
/// (spec.md §4.6, §5).
pub const ADMISSION_DEADLINE: Duration = Duration::from_secs(10);

/// Everything a running webhook process shares across requests
/// (spec.md §5 "Shared resources and discipline").
pub struct AppState {
    pub deps: HandleDeps,
}

pub type Shared = Arc<AppState>;

impl AppState {
    /// Build process-wide state: the private identity loaded once at
    /// startup (spec.md §6 "Environment"), a fresh [`BundleCache`]
    /// registered with a fresh [`CacheManager`], and the given store.
    pub fn new(identity: Identity, cache_ttl: Duration, retry: RetryConfig, store: SecretStore) -> Self {
        let cache = BundleCache::<Bundle>::new(cache_ttl);
        let cache_manager = Arc::new(CacheManager::new());
        cache_manager.register(&cache);
        Self {
            deps: HandleDeps {
                identity: Arc::new(identity),
                cache,
                cache_manager,
                store: Arc::new(store),
                retry,
                metrics: Arc::new(TracingMetricsSink) as Arc<dyn MetricsSink>,
            },
        }
    }
}

/// Build the router: `POST /mutate` (the mutating-webhook path) and
/// `GET /healthz` (liveness/readiness, unauthenticated, no rate limit —
/// mirrors the teacher's `/health` exemption in `rate_limit_middleware`).
pub fn build_router(state: Shared) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn mutate(State(state): State<Shared>, Json(review): Json<AdmissionReview>) -> impl IntoResponse {
    let api_version = review.api_version.clone();
    let kind = review.kind.clone();
    let uid = review.request.uid.clone();
    let namespace = review.request.namespace.clone();
    let dry_run = review.request.dry_run;
    let object = review.request.object;

    let outcome = match tokio::time::timeout(
        ADMISSION_DEADLINE,
        pipeline::handle(&state.deps, namespace, dry_run, object),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => pipeline::AdmissionOutcome::Errored { code: 500, message: "admission deadline exceeded".to_string() },
    };

    Json(AdmissionReviewResponse::from_outcome(api_version, kind, uid, outcome))
}

/// Initialise `tracing_subscriber` the way the teacher's `main()` does
/// (spec.md SPEC_FULL.md "Ambient stack"): pretty for dev, JSON when
/// `ZEN_LOCK_LOG_FORMAT=json`.
pub fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zen_lock_webhook=info,tower_http=info".into());
    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).with_thread_ids(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
