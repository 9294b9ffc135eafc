//! KDF
//!
//! info = PROTOCOL_ID || b"|wrap|" || ct_hash
//! key  = HKDF-SHA256(shared_secret, salt=None, info=info, len=32)

use hkdf::Hkdf;
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::error::CipherError;
use crate::wire::PROTOCOL_ID;

pub fn ct_hash(kem_ct: &[u8]) -> [u8; 32] {
    let h = Sha3_256::digest(kem_ct);
    let mut out = [0u8; 32];
    out.copy_from_slice(&h);
    out
}

pub fn derive_wrap_key(shared_secret: &[u8], ct_hash: &[u8; 32]) -> Result<[u8; 32], CipherError> {
    let mut info = Vec::with_capacity(PROTOCOL_ID.len() + 6 + 32);
    info.extend_from_slice(PROTOCOL_ID);
    info.extend_from_slice(b"|wrap|");
    info.extend_from_slice(ct_hash);

    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut out = [0u8; 32];
    hk.expand(&info, &mut out)
        .map_err(|_| CipherError::EncodingFailed)?;
    Ok(out)
}
