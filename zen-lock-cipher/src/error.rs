//! Unified error types for the zen-lock cipher.
//!
//! All decryption failure modes collapse into `CipherError::DecryptFailed` —
//! malformed wire bytes, a recipient stanza none of our keys can open, and a
//! tampered AEAD tag are indistinguishable to a caller. This is deliberate:
//! distinguishing them would give an attacker a decryption oracle.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("no recipients supplied")]
    NoRecipients,

    #[error("recipient could not be parsed")]
    BadRecipient,

    #[error("no identity supplied")]
    NoIdentity,

    #[error("identity could not be parsed")]
    BadIdentity,

    #[error("decryption failed")]
    DecryptFailed,

    #[error("encoding failed")]
    EncodingFailed,
}

/// Raised by `Cipher::decrypt_map` — names the offending key so the caller
/// can report *which* bundle entry failed without leaking ciphertext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decrypt bundle entry {key:?}: {source}")]
pub struct DecryptMapError {
    pub key: String,
    #[source]
    pub source: CipherError,
}
