//! C7, the OwnershipReconciler (spec.md §4.7): upgrades the label-based
//! soft reference a materialised Secret carries at admission time into a
//! hard owner reference once the referenced pod exists, or reclaims the
//! Secret once it has aged past the orphan grace window without one.
//!
//! Grounded on the `eosin` storage operator's `Controller::new(...).run(
//! reconcile, on_error, context)` shape (`other_examples/
//! ...storage-operator-src-shards-reconcile.rs`), with the same
//! read-then-decide-then-write split as its `determine_action`/`reconcile`
//! pair: [`determine_ownership_action`] is the pure decision function
//! (unit-tested without a cluster), `reconcile` is the thin `kube`-calling
//! wrapper around it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::Controller;
use kube::{Client, ResourceExt};

use zen_lock_core::model::{LABEL_BUNDLE_NAME, LABEL_POD_NAME, LABEL_POD_NAMESPACE};

use crate::error::Error;
use crate::leader::LeaderElector;

/// The decision `determine_ownership_action` reaches, independent of how
/// the caller carries it out (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipAction {
    /// Already has a controller owner reference; nothing to do.
    NoOp,
    /// The referenced pod exists: install a hard owner reference.
    SetOwner,
    /// The pod is absent but the Secret is still within the grace window.
    RequeueGrace(Duration),
    /// The pod is absent and the grace window has elapsed: reclaim it.
    Delete,
}

/// Pure decision function (spec.md §4.7 bullet list), unit-testable without
/// a `kube::Client`.
pub fn determine_ownership_action(
    has_controller_owner: bool,
    pod_exists: bool,
    secret_age: Duration,
    grace: Duration,
) -> OwnershipAction {
    if has_controller_owner {
        return OwnershipAction::NoOp;
    }
    if pod_exists {
        return OwnershipAction::SetOwner;
    }
    if secret_age < grace {
        return OwnershipAction::RequeueGrace(grace - secret_age);
    }
    OwnershipAction::Delete
}

pub struct Context {
    pub client: Client,
    pub grace: Duration,
    pub leader: Arc<dyn LeaderElector>,
}

/// Run the OwnershipReconciler until cancelled. Watches Secrets carrying
/// the `bundle-name` label (spec.md §4.7 "Watches materialised Secrets
/// (filtered by the well-known label `bundle-name`)").
pub async fn run(client: Client, grace: Duration, leader: Arc<dyn LeaderElector>) {
    let secrets: Api<Secret> = Api::all(client.clone());
    let context = Arc::new(Context { client, grace, leader });
    let list_params = ListParams::default().labels(LABEL_BUNDLE_NAME);

    Controller::new(secrets, list_params)
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(err) = result {
                tracing::warn!(%err, "ownership reconcile error");
            }
        })
        .await;
}

async fn reconcile(secret: Arc<Secret>, ctx: Arc<Context>) -> Result<Action, Error> {
    if !ctx.leader.is_leader() {
        return Ok(Action::requeue(Duration::from_secs(5)));
    }

    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();

    let has_controller_owner = secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.controller == Some(true)));

    let labels = secret.metadata.labels.clone().unwrap_or_default();
    let pod_name = labels.get(LABEL_POD_NAME).cloned().ok_or_else(|| Error::MissingLabel {
        namespace: namespace.clone(),
        name: name.clone(),
        label: LABEL_POD_NAME,
    })?;
    let pod_namespace = labels.get(LABEL_POD_NAMESPACE).cloned().unwrap_or_else(|| namespace.clone());

    let pods: Api<Pod> = Api::namespaced(ctx.client.clone(), &pod_namespace);
    let pod = pods.get_opt(&pod_name).await?;

    let age = secret
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| (Utc::now() - t.0).to_std().unwrap_or_default())
        .unwrap_or_default();

    let action = determine_ownership_action(has_controller_owner, pod.is_some(), age, ctx.grace);

    match action {
        OwnershipAction::NoOp => Ok(Action::await_change()),
        OwnershipAction::SetOwner => {
            let pod = pod.expect("SetOwner is only reached when the pod lookup returned Some");
            set_owner_reference(&ctx.client, &namespace, &name, &pod).await?;
            Ok(Action::await_change())
        }
        OwnershipAction::RequeueGrace(remaining) => Ok(Action::requeue(remaining)),
        OwnershipAction::Delete => {
            let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
            secrets.delete(&name, &Default::default()).await?;
            tracing::info!(namespace, name, "reclaimed orphaned materialised secret");
            Ok(Action::await_change())
        }
    }
}

async fn set_owner_reference(client: &Client, namespace: &str, name: &str, pod: &Pod) -> Result<(), Error> {
    let owner = OwnerReference {
        api_version: "v1".to_string(),
        kind: "Pod".to_string(),
        name: pod.name_any(),
        uid: pod.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };
    let patch = serde_json::json!({
        "metadata": { "ownerReferences": [owner] }
    });
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    secrets.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    tracing::info!(namespace, name, pod = %pod.name_any(), "installed hard owner reference");
    Ok(())
}

fn on_error(_secret: Arc<Secret>, err: &Error, _ctx: Arc<Context>) -> Action {
    tracing::warn!(%err, "ownership reconcile failed, backing off");
    Action::requeue(Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_owned_is_no_op() {
        let action = determine_ownership_action(true, true, Duration::from_secs(0), Duration::from_secs(60));
        assert_eq!(action, OwnershipAction::NoOp);
    }

    #[test]
    fn pod_present_sets_owner() {
        let action = determine_ownership_action(false, true, Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(action, OwnershipAction::SetOwner);
    }

    #[test]
    fn young_orphan_requeues_for_remaining_grace() {
        let action = determine_ownership_action(false, false, Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(action, OwnershipAction::RequeueGrace(Duration::from_secs(50)));
    }

    #[test]
    fn old_orphan_is_deleted() {
        let action = determine_ownership_action(false, false, Duration::from_secs(120), Duration::from_secs(60));
        assert_eq!(action, OwnershipAction::Delete);
    }

    #[test]
    fn orphan_exactly_at_grace_boundary_is_deleted() {
        // spec.md §8 S6: "younger" is requeued, so the boundary itself
        // (age == grace, not age < grace) falls through to delete.
        let action = determine_ownership_action(false, false, Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(action, OwnershipAction::Delete);
    }
}
