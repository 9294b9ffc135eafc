//! SubjectGate (C5) — spec.md §4.5.

use crate::model::{AllowedSubject, SUBJECT_KIND_WORKLOAD_IDENTITY};

/// A pod's workload identity: `(serviceAccountName, namespace)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub service_account: String,
    pub namespace: String,
}

impl WorkloadIdentity {
    pub const DEFAULT_SERVICE_ACCOUNT: &'static str = "default";
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Build a workload identity from a pod's (possibly absent)
    /// `serviceAccountName` and its namespace field.
    pub fn from_pod(service_account_name: Option<&str>, pod_namespace: Option<&str>) -> Self {
        Self {
            service_account: service_account_name
                .filter(|s| !s.is_empty())
                .unwrap_or(Self::DEFAULT_SERVICE_ACCOUNT)
                .to_string(),
            namespace: pod_namespace
                .filter(|s| !s.is_empty())
                .unwrap_or(Self::DEFAULT_NAMESPACE)
                .to_string(),
        }
    }
}

/// Does `identity` satisfy at least one `workload-identity` entry in
/// `allowed_subjects`?
///
/// Entries with other kinds are skipped, not errored on. An empty list
/// means "gate not configured" and is the *caller's* responsibility to
/// interpret (this predicate would otherwise deny, which the caller must
/// not apply when the gate isn't configured at all).
pub fn subject_allowed(allowed_subjects: &[AllowedSubject], identity: &WorkloadIdentity) -> bool {
    allowed_subjects.iter().any(|subject| {
        subject.kind == SUBJECT_KIND_WORKLOAD_IDENTITY
            && subject.name == identity.service_account
            && (subject.namespace.is_empty() || subject.namespace == identity.namespace)
    })
}
