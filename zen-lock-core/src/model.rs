//! Shared data model: `Bundle` and `MaterialisedSecret` shapes (spec.md §3),
//! kept free of any `kube`/`k8s-openapi` dependency so `zen-lock-core` stays
//! unit-testable without a cluster. `zen-lock-crd` wraps [`BundleSpec`] /
//! [`BundleStatus`] as the `spec`/`status` of its `kube::CustomResource`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation consumed on pods to trigger injection (spec.md §6).
pub const ANNOTATION_INJECT: &str = "zen-lock/inject";
/// Annotation overriding the default mount path (spec.md §6).
pub const ANNOTATION_MOUNT_PATH: &str = "zen-lock/mount-path";
/// Default mount path when `ANNOTATION_MOUNT_PATH` is absent.
pub const DEFAULT_MOUNT_PATH: &str = "/zen-lock/secrets";
/// Well-known name shared by the injected volume and every volume mount.
pub const VOLUME_NAME: &str = "zen-lock-secrets";

/// Labels set on materialised Secrets (spec.md §6). Exact strings are part
/// of the public contract shared by the injector and the reconcilers.
pub const LABEL_POD_NAME: &str = "zen-lock.dev/pod-name";
pub const LABEL_POD_NAMESPACE: &str = "zen-lock.dev/pod-namespace";
pub const LABEL_BUNDLE_NAME: &str = "zen-lock.dev/bundle-name";

/// Subject kind honoured by `SubjectGate` (C5); other kinds are skipped, not
/// rejected, during matching (spec.md §4.5).
pub const SUBJECT_KIND_WORKLOAD_IDENTITY: &str = "workload-identity";

/// An entry in `Bundle.allowedSubjects` (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedSubject {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// `Bundle.status.phase` (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BundlePhase {
    Pending,
    Ready,
    Error,
}

impl Default for BundlePhase {
    fn default() -> Self {
        Self::Pending
    }
}

/// One entry of `Bundle.status.conditions` (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: DateTime<Utc>,
    pub reason: String,
    pub message: String,
}

impl BundleCondition {
    pub const TYPE_DECRYPTABLE: &'static str = "Decryptable";
    pub const STATUS_TRUE: &'static str = "True";
    pub const STATUS_FALSE: &'static str = "False";
}

/// `Bundle` spec fields (spec.md §3), persisted by the CRD crate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSpec {
    pub encrypted_data: BTreeMap<String, String>,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub allowed_subjects: Vec<AllowedSubject>,
}

impl BundleSpec {
    /// Invariants from spec.md §3: non-empty data, every key non-empty,
    /// every value valid base64, algorithm empty or supported.
    pub fn validate_invariants(&self) -> Result<(), String> {
        if self.encrypted_data.is_empty() {
            return Err("encryptedData must be non-empty".to_string());
        }
        for (key, value) in &self.encrypted_data {
            if key.is_empty() {
                return Err("encryptedData key must be non-empty".to_string());
            }
            if zen_lock_cipher_base64_decode(value).is_none() {
                return Err(format!("encryptedData[{}] is not valid base64", key));
            }
        }
        if zen_lock_cipher::resolve_algorithm(&self.algorithm).is_none() {
            return Err(format!("unsupported algorithm: {}", self.algorithm));
        }
        Ok(())
    }
}

fn zen_lock_cipher_base64_decode(s: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

/// `Bundle.status` (spec.md §3). Mutated only by C8 (`BundleReconciler`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BundleStatus {
    pub phase: Option<BundlePhase>,
    #[serde(default)]
    pub conditions: Vec<BundleCondition>,
}

/// A `Bundle` identified by (namespace, name), carrying its current spec
/// and (if known) status — the shape cached by [`crate::cache::BundleCache`]
/// and consumed throughout the injector pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub namespace: String,
    pub name: String,
    pub spec: BundleSpec,
}

impl Bundle {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: BundleSpec) -> Self {
        Self { namespace: namespace.into(), name: name.into(), spec }
    }
}

/// Identity of a materialised Secret: derived name lives in the pod's
/// namespace (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialisedSecretRef {
    pub namespace: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_spec_rejects_empty_data() {
        let spec = BundleSpec::default();
        assert!(spec.validate_invariants().is_err());
    }

    #[test]
    fn bundle_spec_rejects_bad_base64() {
        let mut spec = BundleSpec::default();
        spec.encrypted_data.insert("USER".to_string(), "not base64!!".to_string());
        assert!(spec.validate_invariants().is_err());
    }

    #[test]
    fn bundle_spec_accepts_empty_algorithm_as_default() {
        let mut spec = BundleSpec::default();
        spec.encrypted_data.insert("USER".to_string(), "YWxpY2U=".to_string());
        assert!(spec.validate_invariants().is_ok());
    }
}
