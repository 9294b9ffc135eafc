//! Error type surfaced to the `kube::runtime::Controller` machinery
//! (spec.md §4.7/§4.8 "Errors during lookup/update are surfaced to the
//! reconciliation framework, which applies its own backoff").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kube API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("secret {namespace}/{name} is missing a required label: {label}")]
    MissingLabel { namespace: String, name: String, label: &'static str },
}
