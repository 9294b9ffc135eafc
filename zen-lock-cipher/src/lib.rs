//! # zen-lock-cipher
//!
//! Hybrid post-quantum, multi-recipient encryption for zen-lock `SecretBundle`
//! payloads.
//!
//! ## Quick Start
//!
//! ```
//! use zen_lock_cipher::Cipher;
//!
//! let cipher = Cipher::new();
//! let (recipient, identity) = cipher.generate_identity();
//!
//! let ciphertext = cipher.encrypt(b"hunter2", &[recipient]).unwrap();
//! let plaintext = cipher.decrypt(&ciphertext, &identity).unwrap();
//!
//! assert_eq!(plaintext, b"hunter2");
//! ```
//!
//! ## Security properties
//!
//! - **Hybrid KEM**: X25519 + ML-KEM-768 — secure if either holds.
//! - **Uniform errors**: every decryption failure mode returns the same
//!   [`CipherError::DecryptFailed`] variant.
//! - **Multi-recipient**: one payload encryption, N independent per-recipient
//!   key-wrapping stanzas (age-style), so encrypting to more recipients does
//!   not re-encrypt the payload.
//! - **Stable wire format**: versioned, self-describing (see [`wire`]).
//!
//! ## What's NOT provided
//!
//! - Key management / persistence (see the `zen-lock-core` identity loader).
//! - Streaming encryption.
//! - FIPS certification.
//! - Rotation of the cluster master identity, multi-tenant key isolation, or
//!   online re-encryption — these are explicit non-goals of the system this
//!   crate serves.

mod aead;
mod error;
mod kdf;
mod kem;

#[doc(hidden)]
pub mod wire;

use std::collections::BTreeMap;

pub use error::{CipherError, DecryptMapError};

use wire::{FILE_KEY_BYTES, NONCE_BYTES};

/// A recipient's public key — safe to store alongside ciphertext.
#[derive(Clone)]
pub struct Recipient(kem::PublicKey);

impl Recipient {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        Ok(Self(kem::PublicKey::from_bytes(bytes)?))
    }
}

/// A cluster (or recipient) identity — the secret half of a keypair.
///
/// Must be protected; zeroization of the underlying key material is handled
/// by the `x25519-dalek`/`ml-kem` crates' own `Drop` implementations.
pub struct Identity(kem::SecretKey);

impl Identity {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.is_empty() {
            return Err(CipherError::NoIdentity);
        }
        Ok(Self(kem::SecretKey::from_bytes(bytes)?))
    }
}

/// The zen-lock encryption engine: stateless, cheap to construct per call.
#[derive(Default)]
pub struct Cipher;

impl Cipher {
    pub fn new() -> Self {
        Self
    }

    /// Generate a new (recipient, identity) keypair.
    pub fn generate_identity(&self) -> (Recipient, Identity) {
        let (pk, sk) = kem::keygen();
        (Recipient(pk), Identity(sk))
    }

    /// Encrypt `plaintext` to every recipient in `recipients`.
    ///
    /// Any recipient holding the matching identity can later call
    /// [`Cipher::decrypt`] on the returned ciphertext and recover the exact
    /// plaintext.
    pub fn encrypt(&self, plaintext: &[u8], recipients: &[Recipient]) -> Result<Vec<u8>, CipherError> {
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients);
        }

        let file_key = random_file_key()?;

        let mut stanzas = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let (shared_secret, kem_ct) = kem::encapsulate(&recipient.0)?;
            let hash = kdf::ct_hash(&kem_ct);
            let wrap_key = kdf::derive_wrap_key(&shared_secret, &hash)?;
            let wrap_nonce = aead::nonce()?;
            let wrapped_key = aead::aead_seal(&wrap_key, &wrap_nonce, &file_key, wire::PROTOCOL_ID)?;
            stanzas.push((kem_ct, wrap_nonce, wrapped_key));
        }

        let payload_nonce = aead::nonce()?;
        let payload_ct = aead::aead_seal(&file_key, &payload_nonce, plaintext, wire::PROTOCOL_ID)?;

        wire::encode_wire(&stanzas, &payload_nonce, &payload_ct)
    }

    /// Decrypt `ciphertext` using a single identity.
    ///
    /// Tries every recipient stanza in the ciphertext against `identity`;
    /// exactly one should open if the identity was among the original
    /// recipients, all others are expected to fail their AEAD tag check.
    pub fn decrypt(&self, ciphertext: &[u8], identity: &Identity) -> Result<Vec<u8>, CipherError> {
        let components = wire::decode_wire(ciphertext)?;

        let file_key = wire::iter_stanzas(&components)
            .find_map(|stanza| try_open_stanza(&identity.0, &stanza))
            .ok_or(CipherError::DecryptFailed)?;

        aead::aead_open(
            &file_key,
            components.payload_nonce,
            components.payload_ciphertext,
            wire::PROTOCOL_ID,
        )
    }

    /// Decrypt a mapping of base64-encoded ciphertexts, aborting on the
    /// first entry that fails and naming the offending key.
    ///
    /// The result preserves the input key set.
    pub fn decrypt_map(
        &self,
        mapping: &BTreeMap<String, String>,
        identity: &Identity,
    ) -> Result<BTreeMap<String, Vec<u8>>, DecryptMapError> {
        let mut out = BTreeMap::new();
        for (key, encoded) in mapping {
            let ciphertext = base64_decode(encoded).map_err(|_| DecryptMapError {
                key: key.clone(),
                source: CipherError::DecryptFailed,
            })?;
            let plaintext = self
                .decrypt(&ciphertext, identity)
                .map_err(|source| DecryptMapError { key: key.clone(), source })?;
            out.insert(key.clone(), plaintext);
        }
        Ok(out)
    }
}

fn try_open_stanza(identity: &kem::SecretKey, stanza: &wire::Stanza<'_>) -> Option<[u8; FILE_KEY_BYTES]> {
    let shared_secret = kem::decapsulate(identity, stanza.kem_ciphertext).ok()?;
    let hash = kdf::ct_hash(stanza.kem_ciphertext);
    let wrap_key = kdf::derive_wrap_key(&shared_secret, &hash).ok()?;
    let file_key = aead::aead_open(
        &wrap_key,
        stanza.wrap_nonce,
        stanza.wrapped_file_key,
        wire::PROTOCOL_ID,
    )
    .ok()?;
    file_key.try_into().ok()
}

fn random_file_key() -> Result<[u8; FILE_KEY_BYTES], CipherError> {
    let mut key = [0u8; FILE_KEY_BYTES];
    getrandom::getrandom(&mut key).map_err(|_| CipherError::EncodingFailed)?;
    Ok(key)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s)
}

/// Metadata extracted from ciphertext without decrypting — useful for ops
/// tooling and logging.
#[derive(Debug, Clone)]
pub struct CiphertextInfo {
    pub version: u8,
    pub recipient_count: u16,
    pub total_bytes: usize,
}

/// Inspect ciphertext metadata without decrypting. Does not reveal secrets.
pub fn inspect(ciphertext: &[u8]) -> Result<CiphertextInfo, CipherError> {
    let components = wire::decode_wire(ciphertext)?;
    Ok(CiphertextInfo {
        version: components.version,
        recipient_count: components.recipient_count,
        total_bytes: ciphertext.len(),
    })
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: u8 = wire::PROTOCOL_VERSION;
pub const MIN_CIPHERTEXT_BYTES: usize = wire::MIN_CIPHERTEXT_BYTES;

/// The single cryptographic suite identifier `SecretBundle.algorithm` may
/// name, and the default when the field is empty (spec.md §3, §9 — the
/// plugin-registry extension point is preserved even though only one
/// algorithm ships).
pub const DEFAULT_ALGORITHM: &str = "x25519-mlkem768-aesgcm";

/// The set of algorithm identifiers this build can actually decrypt.
pub fn supported_algorithms() -> &'static [&'static str] {
    &[DEFAULT_ALGORITHM]
}

/// Resolve a bundle's `algorithm` field, treating `""` as the default.
pub fn resolve_algorithm(algorithm: &str) -> Option<&'static str> {
    let algorithm = if algorithm.is_empty() { DEFAULT_ALGORITHM } else { algorithm };
    supported_algorithms().iter().copied().find(|a| *a == algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plaintext_round_trips() {
        let cipher = Cipher::new();
        let (recipient, identity) = cipher.generate_identity();
        let ct = cipher.encrypt(b"", &[recipient]).unwrap();
        let pt = cipher.decrypt(&ct, &identity).unwrap();
        assert_eq!(pt, b"");
    }

    #[test]
    fn large_plaintext_round_trips() {
        let cipher = Cipher::new();
        let (recipient, identity) = cipher.generate_identity();
        let plaintext = vec![0x5au8; 1024 * 1024 + 17];
        let ct = cipher.encrypt(&plaintext, &[recipient]).unwrap();
        let pt = cipher.decrypt(&ct, &identity).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn multiple_recipients_each_decrypt() {
        let cipher = Cipher::new();
        let (r1, i1) = cipher.generate_identity();
        let (r2, i2) = cipher.generate_identity();
        let (r3, i3) = cipher.generate_identity();

        let ct = cipher.encrypt(b"shared secret", &[r1, r2, r3]).unwrap();

        assert_eq!(cipher.decrypt(&ct, &i1).unwrap(), b"shared secret");
        assert_eq!(cipher.decrypt(&ct, &i2).unwrap(), b"shared secret");
        assert_eq!(cipher.decrypt(&ct, &i3).unwrap(), b"shared secret");
    }

    #[test]
    fn wrong_identity_fails_uniformly() {
        let cipher = Cipher::new();
        let (recipient, _identity) = cipher.generate_identity();
        let (_, other_identity) = cipher.generate_identity();

        let ct = cipher.encrypt(b"secret", &[recipient]).unwrap();
        let err = cipher.decrypt(&ct, &other_identity).unwrap_err();
        assert_eq!(err, CipherError::DecryptFailed);
    }

    #[test]
    fn empty_recipients_rejected() {
        let cipher = Cipher::new();
        let err = cipher.encrypt(b"secret", &[]).unwrap_err();
        assert_eq!(err, CipherError::NoRecipients);
    }

    #[test]
    fn bad_recipient_bytes_rejected() {
        let err = Recipient::from_bytes(&[0u8; 4]).unwrap_err();
        assert_eq!(err, CipherError::BadRecipient);
    }

    #[test]
    fn empty_identity_rejected() {
        let err = Identity::from_bytes(&[]).unwrap_err();
        assert_eq!(err, CipherError::NoIdentity);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = Cipher::new();
        let (recipient, identity) = cipher.generate_identity();
        let mut ct = cipher.encrypt(b"secret", &[recipient]).unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert_eq!(cipher.decrypt(&ct, &identity).unwrap_err(), CipherError::DecryptFailed);
    }

    #[test]
    fn decrypt_map_preserves_key_set_and_values() {
        use base64::Engine;
        let cipher = Cipher::new();
        let (recipient, identity) = cipher.generate_identity();

        let mut mapping = BTreeMap::new();
        for (key, value) in [("USER", "alice"), ("PASS", "s3cret")] {
            let ct = cipher.encrypt(value.as_bytes(), &[recipient.clone()]).unwrap();
            mapping.insert(key.to_string(), base64::engine::general_purpose::STANDARD.encode(ct));
        }

        let decrypted = cipher.decrypt_map(&mapping, &identity).unwrap();
        assert_eq!(decrypted.keys().collect::<Vec<_>>(), mapping.keys().collect::<Vec<_>>());
        assert_eq!(decrypted["USER"], b"alice");
        assert_eq!(decrypted["PASS"], b"s3cret");
    }

    #[test]
    fn decrypt_map_names_offending_key_on_failure() {
        use base64::Engine;
        let cipher = Cipher::new();
        let (recipient, _identity) = cipher.generate_identity();
        let (_, other_identity) = cipher.generate_identity();

        let ct = cipher.encrypt(b"alice", &[recipient]).unwrap();
        let mut mapping = BTreeMap::new();
        mapping.insert("USER".to_string(), base64::engine::general_purpose::STANDARD.encode(ct));

        let err = cipher.decrypt_map(&mapping, &other_identity).unwrap_err();
        assert_eq!(err.key, "USER");
        assert_eq!(err.source, CipherError::DecryptFailed);
    }

    #[test]
    fn default_algorithm_resolves_from_empty_string() {
        assert_eq!(resolve_algorithm(""), Some(DEFAULT_ALGORITHM));
        assert_eq!(resolve_algorithm(DEFAULT_ALGORITHM), Some(DEFAULT_ALGORITHM));
        assert_eq!(resolve_algorithm("unknown-scheme"), None);
    }

    #[test]
    fn inspect_reports_recipient_count_without_decrypting() {
        let cipher = Cipher::new();
        let (r1, _) = cipher.generate_identity();
        let (r2, _) = cipher.generate_identity();
        let ct = cipher.encrypt(b"x", &[r1, r2]).unwrap();
        let info = inspect(&ct).unwrap();
        assert_eq!(info.recipient_count, 2);
        assert_eq!(info.version, PROTOCOL_VERSION);
    }
}
