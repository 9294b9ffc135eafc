//! The `SecretBundle` custom resource (spec.md §3, §6 "Custom resource").
//!
//! Grounded on the `kube::CustomResource` derive shape used by the
//! `ASoldo-rust_operator` and `stackabletech-operator-rs` reference repos
//! (neither is the teacher — the teacher crate has no CRD of its own — but
//! both are the pack's only idiomatic examples of this derive, so their
//! `kube`/`k8s-openapi`/`schemars` dependency choices are imported here).
//!
//! Kept as thin wire types: the real data model, invariants, and status
//! vocabulary live in `zen_lock_core::model` so they stay testable without a
//! `kube::Client`. This crate only adds the `#[kube(...)]` derive and the
//! `JsonSchema` bound the custom resource needs, plus conversions to/from
//! the core types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use zen_lock_core::model::{
    AllowedSubject as CoreAllowedSubject, Bundle, BundleCondition as CoreBundleCondition,
    BundlePhase as CoreBundlePhase, BundleSpec as CoreBundleSpec, BundleStatus as CoreBundleStatus,
};

/// The `SecretBundle` custom resource. `group`/`version`/`kind`/`plural`
/// are part of the public contract (they determine the CRD's API path).
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "zen-lock.dev",
    version = "v1",
    kind = "SecretBundle",
    plural = "secretbundles",
    namespaced
)]
#[kube(status = "SecretBundleStatus")]
pub struct SecretBundleSpec {
    /// Mapping from logical key to base64-encoded, recipient-encrypted
    /// ciphertext. Keys are opaque; this key set becomes the materialised
    /// Secret's key set verbatim.
    pub encrypted_data: BTreeMap<String, String>,
    /// Identifier of the cryptographic scheme. Empty means default.
    #[serde(default)]
    pub algorithm: String,
    /// Subjects permitted to trigger injection of this bundle. Empty means
    /// the gate is unconfigured (every subject is allowed by the injector).
    #[serde(default)]
    pub allowed_subjects: Vec<SecretBundleAllowedSubject>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct SecretBundleAllowedSubject {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct SecretBundleStatus {
    pub phase: Option<String>,
    #[serde(default)]
    pub conditions: Vec<SecretBundleCondition>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct SecretBundleCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_transition_time: DateTime<Utc>,
    pub reason: String,
    pub message: String,
}

impl SecretBundleSpec {
    /// Convert to the cluster-free model used by the rest of the workspace.
    pub fn to_core(&self) -> CoreBundleSpec {
        CoreBundleSpec {
            encrypted_data: self.encrypted_data.clone(),
            algorithm: self.algorithm.clone(),
            allowed_subjects: self.allowed_subjects.iter().map(SecretBundleAllowedSubject::to_core).collect(),
        }
    }
}

impl SecretBundleAllowedSubject {
    pub fn to_core(&self) -> CoreAllowedSubject {
        CoreAllowedSubject { kind: self.kind.clone(), name: self.name.clone(), namespace: self.namespace.clone() }
    }
}

impl SecretBundle {
    /// Build the cluster-free [`Bundle`] this resource's `(namespace, name,
    /// spec)` represents, for feeding into the cache and the cipher.
    pub fn to_core_bundle(&self) -> Option<Bundle> {
        let namespace = self.metadata.namespace.clone()?;
        let name = self.metadata.name.clone()?;
        Some(Bundle::new(namespace, name, self.spec.to_core()))
    }
}

impl From<CoreBundlePhase> for String {
    fn from(phase: CoreBundlePhase) -> Self {
        match phase {
            CoreBundlePhase::Pending => "Pending".to_string(),
            CoreBundlePhase::Ready => "Ready".to_string(),
            CoreBundlePhase::Error => "Error".to_string(),
        }
    }
}

impl From<CoreBundleCondition> for SecretBundleCondition {
    fn from(c: CoreBundleCondition) -> Self {
        Self {
            type_: c.type_,
            status: c.status,
            last_transition_time: c.last_transition_time,
            reason: c.reason,
            message: c.message,
        }
    }
}

impl From<CoreBundleStatus> for SecretBundleStatus {
    fn from(status: CoreBundleStatus) -> Self {
        Self {
            phase: status.phase.map(String::from),
            conditions: status.conditions.into_iter().map(SecretBundleCondition::from).collect(),
        }
    }
}
