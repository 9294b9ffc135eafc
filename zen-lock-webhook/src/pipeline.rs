//! The admission state machine (spec.md §4.6, §9 "Admission handler as a
//! pipeline"): `Decode → AnnotationGate → Validate → ResolveBundle →
//! AuthoriseSubject → Decrypt → DeriveName → MaterialiseSecret → MutatePod →
//! Emit`, expressed as small stage functions over a shared
//! [`AdmissionContext`], each either advancing or short-circuiting with a
//! response. Grounded on the pipeline design note rather than any single
//! teacher file — the teacher's handlers are flat request handlers, this is
//! the generalisation SPEC_FULL.md calls for so the dry-run branch is a
//! declarative skip of one stage instead of an `if` buried in a monolith.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::{Container, Pod, SecretVolumeSource, Volume, VolumeMount};
use serde_json::Value;

use zen_lock_cipher::{Cipher, Identity};
use zen_lock_core::cache::{BundleCache, CacheManager};
use zen_lock_core::error::{SanitizeKind, SanitizedError};
use zen_lock_core::model::{
    Bundle, ANNOTATION_INJECT, ANNOTATION_MOUNT_PATH, DEFAULT_MOUNT_PATH, LABEL_BUNDLE_NAME, LABEL_POD_NAME,
    LABEL_POD_NAMESPACE, VOLUME_NAME,
};
use zen_lock_core::{derive_secret_name, subject_allowed, validate_inject_annotation, validate_mount_path, WorkloadIdentity};

use crate::config::RetryConfig;
use crate::metrics::MetricsSink;
use crate::store::{with_retry, DesiredSecret, SecretStore, StoreError};

/// One of the four shapes `Handle` may return (spec.md §4.6 "Public
/// contract").
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    Allowed { reason: String },
    AllowedWithPatch { reason: String, patch: json_patch::Patch },
    Denied { reason: String },
    Errored { code: u16, message: String },
}

impl AdmissionOutcome {
    /// A short label for metrics (spec.md §4.6 "Each unsuccessful exit
    /// records a metric labelled by namespace and bundle name").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed { .. } => "allowed",
            Self::AllowedWithPatch { .. } => "allowed_with_patch",
            Self::Denied { .. } => "denied",
            Self::Errored { .. } => "errored",
        }
    }
}

enum StageOutcome {
    Continue,
    Respond(AdmissionOutcome),
}

/// Everything one admission request threads through the pipeline.
pub struct AdmissionContext {
    pub namespace: String,
    pub pod_name: String,
    pub dry_run: bool,
    pub original_pod: Value,
    pub pod: Pod,
    pub annotation_value: String,
    pub mount_path: String,
    pub bundle: Option<Bundle>,
    pub workload_identity: Option<WorkloadIdentity>,
    pub decrypted: Option<BTreeMap<String, Vec<u8>>>,
    pub secret_name: Option<String>,
}

/// Everything `handle` needs that outlives a single request.
pub struct HandleDeps {
    pub identity: Arc<Identity>,
    pub cache: Arc<BundleCache<Bundle>>,
    pub cache_manager: Arc<CacheManager>,
    pub store: Arc<SecretStore>,
    pub retry: RetryConfig,
    pub metrics: Arc<dyn MetricsSink>,
}

/// Run the full pipeline for one admission request. Bounded by a 10-second
/// hard deadline at the call site (spec.md §4.6, §5).
pub async fn handle(deps: &HandleDeps, namespace: String, dry_run: bool, object: Value) -> AdmissionOutcome {
    let start = Instant::now();

    let pod = match decode(&object) {
        Ok(pod) => pod,
        Err(outcome) => return outcome,
    };
    let pod_name = pod.metadata.name.clone().unwrap_or_default();

    let annotations = pod.metadata.annotations.clone().unwrap_or_default();
    let annotation_value = match annotations.get(ANNOTATION_INJECT) {
        Some(value) => value.clone(),
        None => return AdmissionOutcome::Allowed { reason: "no injection requested".to_string() },
    };

    let mut ctx = AdmissionContext {
        namespace,
        pod_name,
        dry_run,
        original_pod: object,
        annotation_value: annotation_value.clone(),
        mount_path: annotations.get(ANNOTATION_MOUNT_PATH).cloned().unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
        bundle: None,
        workload_identity: None,
        decrypted: None,
        secret_name: None,
        pod,
    };

    macro_rules! run_stage {
        ($stage:expr) => {
            match $stage {
                StageOutcome::Continue => {}
                StageOutcome::Respond(outcome) => {
                    deps.metrics.record_exit(&ctx.namespace, &ctx.annotation_value, outcome.label());
                    return outcome;
                }
            }
        };
    }

    run_stage!(stage_validate(&ctx));
    run_stage!(stage_resolve_bundle(deps, &mut ctx).await);
    run_stage!(stage_authorise_subject(&mut ctx));
    run_stage!(stage_decrypt(deps, &mut ctx).await);

    stage_derive_name(&mut ctx);

    if !ctx.dry_run {
        run_stage!(stage_materialise_secret(deps, &ctx).await);
    }

    let patch = stage_mutate_pod_and_emit(&mut ctx);

    deps.metrics.record_success(&ctx.namespace, &ctx.annotation_value, start.elapsed());
    match patch {
        Some(patch) => AdmissionOutcome::AllowedWithPatch { reason: "bundle injected".to_string(), patch },
        None => AdmissionOutcome::Allowed { reason: "pod already carries the mount".to_string() },
    }
}

fn decode(object: &Value) -> Result<Pod, AdmissionOutcome> {
    serde_json::from_value(object.clone())
        .map_err(|e| AdmissionOutcome::Errored { code: 400, message: format!("could not decode pod: {}", e) })
}

fn stage_validate(ctx: &AdmissionContext) -> StageOutcome {
    if let Err(e) = validate_inject_annotation(&ctx.annotation_value) {
        return StageOutcome::Respond(AdmissionOutcome::Denied { reason: e.to_string() });
    }
    if let Err(e) = validate_mount_path(&ctx.mount_path) {
        return StageOutcome::Respond(AdmissionOutcome::Denied { reason: e.to_string() });
    }
    StageOutcome::Continue
}

async fn stage_resolve_bundle(deps: &HandleDeps, ctx: &mut AdmissionContext) -> StageOutcome {
    let key = (ctx.namespace.clone(), ctx.annotation_value.clone());
    if let Some(bundle) = deps.cache.get(&key).await {
        ctx.bundle = Some(bundle);
        return StageOutcome::Continue;
    }

    match deps.store.get_bundle(&ctx.namespace, &ctx.annotation_value).await {
        Ok(Some(bundle)) => {
            deps.cache.set(key, bundle.clone()).await;
            ctx.bundle = Some(bundle);
            StageOutcome::Continue
        }
        Ok(None) => StageOutcome::Respond(AdmissionOutcome::Denied {
            reason: format!("bundle {}/{} does not exist", ctx.namespace, ctx.annotation_value),
        }),
        Err(err) => StageOutcome::Respond(errored_store(&ctx.namespace, &ctx.annotation_value, "fetch bundle", &err)),
    }
}

fn stage_authorise_subject(ctx: &mut AdmissionContext) -> StageOutcome {
    let bundle = ctx.bundle.as_ref().expect("resolve_bundle populates bundle before authorise_subject runs");
    if bundle.spec.allowed_subjects.is_empty() {
        return StageOutcome::Continue;
    }

    let identity = WorkloadIdentity::from_pod(
        ctx.pod.spec.as_ref().and_then(|s| s.service_account_name.as_deref()),
        Some(ctx.namespace.as_str()),
    );
    let allowed = subject_allowed(&bundle.spec.allowed_subjects, &identity);
    ctx.workload_identity = Some(identity.clone());
    if !allowed {
        return StageOutcome::Respond(AdmissionOutcome::Denied {
            reason: format!(
                "workload identity {}/{} is not permitted to use bundle {}",
                identity.namespace, identity.service_account, bundle.name
            ),
        });
    }
    StageOutcome::Continue
}

async fn stage_decrypt(deps: &HandleDeps, ctx: &mut AdmissionContext) -> StageOutcome {
    let bundle = ctx.bundle.as_ref().expect("resolve_bundle populates bundle before decrypt runs");
    let cipher = Cipher::new();
    match cipher.decrypt_map(&bundle.spec.encrypted_data, &deps.identity) {
        Ok(decrypted) => {
            ctx.decrypted = Some(decrypted);
            StageOutcome::Continue
        }
        Err(err) => {
            let key = (ctx.namespace.clone(), ctx.annotation_value.clone());
            deps.cache.invalidate(&key).await;
            deps.cache_manager.invalidate_all().await;
            StageOutcome::Respond(errored_store(&ctx.namespace, &ctx.annotation_value, "decrypt bundle", &err))
        }
    }
}

fn stage_derive_name(ctx: &mut AdmissionContext) {
    ctx.secret_name = Some(derive_secret_name(&ctx.namespace, &ctx.pod_name));
}

async fn stage_materialise_secret(deps: &HandleDeps, ctx: &AdmissionContext) -> StageOutcome {
    let bundle = ctx.bundle.as_ref().expect("resolve_bundle populates bundle before materialise runs");
    let decrypted = ctx.decrypted.as_ref().expect("decrypt populates decrypted before materialise runs");
    let secret_name = ctx.secret_name.as_ref().expect("derive_name runs before materialise");

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_POD_NAME.to_string(), ctx.pod_name.clone());
    labels.insert(LABEL_POD_NAMESPACE.to_string(), ctx.namespace.clone());
    labels.insert(LABEL_BUNDLE_NAME.to_string(), ctx.annotation_value.clone());

    let desired = DesiredSecret {
        namespace: ctx.namespace.clone(),
        name: secret_name.clone(),
        labels: labels.clone(),
        data: decrypted.clone(),
    };

    match materialise(deps, &desired).await {
        Ok(()) => StageOutcome::Continue,
        Err(err) => StageOutcome::Respond(errored_store(&ctx.namespace, &bundle.name, "materialise secret", &err)),
    }
}

/// spec.md §4.6.1: create, or on `AlreadyExists`, fetch-and-converge.
async fn materialise(deps: &HandleDeps, desired: &DesiredSecret) -> Result<(), StoreError> {
    let create_result = with_retry(&deps.retry, || deps.store.create_secret(desired)).await;

    match create_result {
        Ok(()) => Ok(()),
        Err(StoreError::AlreadyExists) => {
            let existing = with_retry(&deps.retry, || async {
                deps.store
                    .get_secret(&desired.namespace, &desired.name)
                    .await?
                    .ok_or(StoreError::NotFound)
            })
            .await?;

            let bundle_label_matches = existing.labels.get(LABEL_BUNDLE_NAME) == desired.labels.get(LABEL_BUNDLE_NAME);
            let data_matches = existing.data == desired.data;

            if !bundle_label_matches || !data_matches {
                with_retry(&deps.retry, || deps.store.update_secret(desired)).await
            } else {
                Ok(())
            }
        }
        Err(err) => Err(err),
    }
}

/// Mutate a deep copy of the decoded pod (spec.md §4.6.2), then diff it
/// against the original request object to produce the patch `Emit` returns.
/// Returns `None` when the pod already carries the mount (patch would be
/// empty) so the caller can emit a plain `Allowed`.
fn stage_mutate_pod_and_emit(ctx: &mut AdmissionContext) -> Option<json_patch::Patch> {
    let secret_name = ctx.secret_name.clone().unwrap_or_default();
    mutate_pod(&mut ctx.pod, &secret_name, &ctx.mount_path);

    let mutated = serde_json::to_value(&ctx.pod).expect("Pod always serialises");
    let patch = json_patch::diff(&ctx.original_pod, &mutated);
    if patch.0.is_empty() {
        None
    } else {
        Some(patch)
    }
}

/// Additive, idempotent pod mutation (spec.md §4.6.2): append the
/// well-known volume if absent, append a mount on every container and init
/// container if absent. Never removes or reorders anything.
pub fn mutate_pod(pod: &mut Pod, secret_name: &str, mount_path: &str) {
    let spec = pod.spec.get_or_insert_with(Default::default);

    let volumes = spec.volumes.get_or_insert_with(Vec::new);
    if !volumes.iter().any(|v| v.name == VOLUME_NAME) {
        volumes.push(Volume {
            name: VOLUME_NAME.to_string(),
            secret: Some(SecretVolumeSource { secret_name: Some(secret_name.to_string()), ..Default::default() }),
            ..Default::default()
        });
    }

    add_mount_if_absent(&mut spec.containers, mount_path);
    if let Some(init_containers) = spec.init_containers.as_mut() {
        add_mount_if_absent(init_containers, mount_path);
    }
}

fn add_mount_if_absent(containers: &mut [Container], mount_path: &str) {
    for container in containers.iter_mut() {
        let mounts = container.volume_mounts.get_or_insert_with(Vec::new);
        if !mounts.iter().any(|m| m.name == VOLUME_NAME) {
            mounts.push(VolumeMount {
                name: VOLUME_NAME.to_string(),
                mount_path: mount_path.to_string(),
                read_only: Some(true),
                ..Default::default()
            });
        }
    }
}

fn errored_store(namespace: &str, bundle: &str, op: &str, cause: &dyn std::fmt::Display) -> AdmissionOutcome {
    let mut context = BTreeMap::new();
    context.insert("namespace".to_string(), namespace.to_string());
    context.insert("bundle".to_string(), bundle.to_string());
    let sanitized = SanitizedError::new(SanitizeKind::Store, op, context, cause);
    AdmissionOutcome::Errored { code: 500, message: sanitized.to_string() }
}
