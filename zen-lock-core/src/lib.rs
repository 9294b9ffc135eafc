//! # zen-lock-core
//!
//! Shared data model and the non-networked pieces of zen-lock: the bundle
//! cache (C2), secret-name derivation (C3), input validation (C4), the
//! subject authorisation predicate (C5), and the sanitised error wrapper
//! used across the workspace.
//!
//! Kept free of any `kube`/`k8s-openapi`/`axum` dependency so every piece
//! here is unit-testable without a cluster or an HTTP server — `zen-lock-crd`
//! and `zen-lock-webhook` build on top of this crate.

pub mod cache;
pub mod error;
pub mod model;
pub mod name;
pub mod subject;
pub mod validate;

pub use cache::{BundleCache, CacheKey, CacheManager};
pub use error::{redact, SanitizeKind, SanitizedError, ValidationError};
pub use model::{
    AllowedSubject, Bundle, BundleCondition, BundlePhase, BundleSpec, BundleStatus,
    MaterialisedSecretRef, ANNOTATION_INJECT, ANNOTATION_MOUNT_PATH, DEFAULT_MOUNT_PATH,
    LABEL_BUNDLE_NAME, LABEL_POD_NAME, LABEL_POD_NAMESPACE, VOLUME_NAME,
};
pub use name::derive_secret_name;
pub use subject::{subject_allowed, WorkloadIdentity};
pub use validate::{validate_inject_annotation, validate_mount_path};
