//! Wire shapes for the cluster's admission-review protocol (spec.md §6
//! "Wire protocol"): a `POST /mutate` body wraps a pod object in a
//! `AdmissionReview`/`AdmissionRequest` envelope; the response echoes the
//! same `uid` with an allow/deny verdict and, on a mutating allow, a
//! base64-encoded JSON-Patch document.
//!
//! Kept schema-minimal: only the fields the pipeline actually reads or
//! writes. A production deployment's full `admission.k8s.io/v1` schema has
//! many more optional fields; unknown fields are ignored on the way in via
//! `serde`'s default `deny_unknown_fields`-off behaviour.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::AdmissionOutcome;

#[derive(Debug, Deserialize)]
pub struct AdmissionReview {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub request: AdmissionRequest,
}

#[derive(Debug, Deserialize)]
pub struct AdmissionRequest {
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, rename = "dryRun")]
    pub dry_run: bool,
    pub object: Value,
}

#[derive(Debug, Serialize)]
pub struct AdmissionReviewResponse {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "patchType")]
    pub patch_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct AdmissionStatus {
    pub code: u16,
    pub message: String,
}

impl AdmissionReviewResponse {
    /// Translate one of the pipeline's four outcome shapes (spec.md §4.6
    /// "Public contract") into the wire response envelope, preserving the
    /// request's `apiVersion`/`kind`/`uid` per the admission-review contract.
    pub fn from_outcome(api_version: String, kind: String, uid: String, outcome: AdmissionOutcome) -> Self {
        let response = match outcome {
            AdmissionOutcome::Allowed { .. } => {
                AdmissionResponse { uid, allowed: true, status: None, patch: None, patch_type: None }
            }
            AdmissionOutcome::AllowedWithPatch { patch, .. } => {
                let patch_bytes = serde_json::to_vec(&patch).expect("json_patch::Patch always serialises");
                AdmissionResponse {
                    uid,
                    allowed: true,
                    status: None,
                    patch: Some(base64_encode(&patch_bytes)),
                    patch_type: Some("JSONPatch"),
                }
            }
            AdmissionOutcome::Denied { reason } => AdmissionResponse {
                uid,
                allowed: false,
                status: Some(AdmissionStatus { code: 403, message: reason }),
                patch: None,
                patch_type: None,
            },
            AdmissionOutcome::Errored { code, message } => AdmissionResponse {
                uid,
                allowed: false,
                status: Some(AdmissionStatus { code, message }),
                patch: None,
                patch_type: None,
            },
        };
        Self { api_version, kind, response }
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
