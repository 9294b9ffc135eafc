//! Bundle/Secret store access (spec.md §4.6 "ResolveBundle", §4.6.1
//! "MaterialiseSecret").
//!
//! `SecretStore` is a plain enum over "real `kube::Client`" and "in-memory
//! fake", rather than a `dyn Trait`: every store method is `async`, and no
//! crate in the example pack depends on `async-trait` for async trait-object
//! dispatch, so — following the same precedent established for
//! `zen_lock_core::cache::CacheManager` — this stays a concrete type with a
//! `match` inside each method instead of pulling in that dependency.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use zen_lock_core::model::Bundle;
use zen_lock_crd::SecretBundle;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("bundle or secret not found")]
    NotFound,
    #[error("secret already exists")]
    AlreadyExists,
    #[error("transient store error: {0}")]
    Transient(String),
    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Only conflicts and server timeouts are treated as retryable
    /// (spec.md §4.6.1 step 2, §7 "Store errors").
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// The desired state of a materialised Secret (spec.md §4.6.1 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSecret {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// A previously-materialised Secret, as last observed (spec.md §4.6.1 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSnapshot {
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, Vec<u8>>,
}

pub enum SecretStore {
    Kube { client: Client },
    Fake(FakeBackend),
}

impl SecretStore {
    pub fn kube(client: Client) -> Self {
        Self::Kube { client }
    }

    pub fn fake() -> Self {
        Self::Fake(FakeBackend::default())
    }

    pub async fn get_bundle(&self, namespace: &str, name: &str) -> Result<Option<Bundle>, StoreError> {
        match self {
            Self::Kube { client } => {
                let api: Api<SecretBundle> = Api::namespaced(client.clone(), namespace);
                match api.get(name).await {
                    Ok(crd) => Ok(crd.to_core_bundle()),
                    Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                    Err(e) => Err(classify_kube_error(&e)),
                }
            }
            Self::Fake(backend) => Ok(backend.get_bundle(namespace, name)),
        }
    }

    pub async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretSnapshot>, StoreError> {
        match self {
            Self::Kube { client } => {
                let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
                match api.get(name).await {
                    Ok(secret) => Ok(Some(snapshot_of(&secret))),
                    Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
                    Err(e) => Err(classify_kube_error(&e)),
                }
            }
            Self::Fake(backend) => Ok(backend.get_secret(namespace, name)),
        }
    }

    pub async fn create_secret(&self, desired: &DesiredSecret) -> Result<(), StoreError> {
        match self {
            Self::Kube { client } => {
                let api: Api<Secret> = Api::namespaced(client.clone(), &desired.namespace);
                let secret = to_k8s_secret(desired);
                match api.create(&PostParams::default(), &secret).await {
                    Ok(_) => Ok(()),
                    Err(kube::Error::Api(e)) if e.code == 409 => Err(StoreError::AlreadyExists),
                    Err(e) => Err(classify_kube_error(&e)),
                }
            }
            Self::Fake(backend) => backend.create_secret(desired),
        }
    }

    pub async fn update_secret(&self, desired: &DesiredSecret) -> Result<(), StoreError> {
        match self {
            Self::Kube { client } => {
                let api: Api<Secret> = Api::namespaced(client.clone(), &desired.namespace);
                let secret = to_k8s_secret(desired);
                let patch = Patch::Merge(&secret);
                api.patch(&desired.name, &PatchParams::default(), &patch)
                    .await
                    .map(|_| ())
                    .map_err(|e| classify_kube_error(&e))
            }
            Self::Fake(backend) => backend.update_secret(desired),
        }
    }
}

fn classify_kube_error(e: &kube::Error) -> StoreError {
    match e {
        kube::Error::Api(status) if status.code == 409 || status.code == 429 || status.code >= 500 => {
            StoreError::Transient(status.message.clone())
        }
        other => StoreError::Permanent(other.to_string()),
    }
}

fn to_k8s_secret(desired: &DesiredSecret) -> Secret {
    use std::collections::BTreeMap as StdBTreeMap;
    Secret {
        metadata: ObjectMeta {
            name: Some(desired.name.clone()),
            namespace: Some(desired.namespace.clone()),
            labels: Some(desired.labels.clone().into_iter().collect()),
            ..Default::default()
        },
        data: Some(
            desired
                .data
                .iter()
                .map(|(k, v)| (k.clone(), k8s_openapi::ByteString(v.clone())))
                .collect::<StdBTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

fn snapshot_of(secret: &Secret) -> SecretSnapshot {
    let labels = secret.metadata.labels.clone().unwrap_or_default().into_iter().collect();
    let data = secret
        .data
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect();
    SecretSnapshot { labels, data }
}

/// In-memory backend for tests (SPEC_FULL.md "Test tooling" — S1-S6 run
/// against this rather than a real cluster).
#[derive(Default)]
pub struct FakeBackend {
    bundles: Mutex<BTreeMap<(String, String), Bundle>>,
    secrets: Mutex<BTreeMap<(String, String), SecretSnapshot>>,
}

impl FakeBackend {
    pub fn put_bundle(&self, bundle: Bundle) {
        self.bundles.lock().unwrap().insert((bundle.namespace.clone(), bundle.name.clone()), bundle);
    }

    pub fn get_bundle(&self, namespace: &str, name: &str) -> Option<Bundle> {
        self.bundles.lock().unwrap().get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn get_secret(&self, namespace: &str, name: &str) -> Option<SecretSnapshot> {
        self.secrets.lock().unwrap().get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    fn create_secret(&self, desired: &DesiredSecret) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().unwrap();
        let key = (desired.namespace.clone(), desired.name.clone());
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        secrets.insert(key, SecretSnapshot { labels: desired.labels.clone(), data: desired.data.clone() });
        Ok(())
    }

    fn update_secret(&self, desired: &DesiredSecret) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().unwrap();
        let key = (desired.namespace.clone(), desired.name.clone());
        secrets.insert(key, SecretSnapshot { labels: desired.labels.clone(), data: desired.data.clone() });
        Ok(())
    }
}

/// Bounded exponential backoff around `op` (spec.md §4.6.1 step 2: max 3
/// attempts, initial delay 50 ms, max delay 1 s). Only `StoreError::Transient`
/// is retried; any other error or exhaustion returns immediately.
pub async fn with_retry<F, Fut, T>(config: &crate::config::RetryConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}
