//! Wire format (v1, multi-recipient)
//!
//! ```text
//! version[1] || suite_kem[1] || suite_aead[1] || flags[1] || recipient_count[2]
//!   || { kem_ct_len[2] || kem_ct[1120] || wrap_nonce[12] || wrapped_file_key[48] } × recipient_count
//!   || payload_nonce[12] || payload_ct[len+16]
//! ```
//!
//! Each recipient stanza wraps the same random *file key* under a key
//! derived from that recipient's KEM shared secret. The payload is sealed
//! exactly once under the file key, so `Encrypt` stays linear in the number
//! of recipients without re-encrypting the plaintext per recipient.

use crate::error::CipherError;

pub const PROTOCOL_ID: &[u8] = b"zen-lock-cipher-v1";
pub const PROTOCOL_VERSION: u8 = 0x01;

pub const SUITE_KEM_HYBRID_X25519_MLKEM768: u8 = 0xA3;
pub const SUITE_AEAD_AES256GCM: u8 = 0xB1;

pub const FLAGS_V1: u8 = 0x00;

pub const X25519_KEY_BYTES: usize = 32;
pub const MLKEM_CIPHERTEXT_BYTES: usize = 1088;
pub const MLKEM_PUBLIC_KEY_BYTES: usize = 1184;
pub const MLKEM_SECRET_KEY_BYTES: usize = 2400;

pub const KEM_CIPHERTEXT_BYTES: usize = X25519_KEY_BYTES + MLKEM_CIPHERTEXT_BYTES; // 1120
pub const KEM_PUBLIC_KEY_BYTES: usize = X25519_KEY_BYTES + MLKEM_PUBLIC_KEY_BYTES; // 1216
pub const KEM_SECRET_KEY_BYTES: usize = X25519_KEY_BYTES + MLKEM_SECRET_KEY_BYTES; // 2432

pub const SHARED_SECRET_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;
pub const FILE_KEY_BYTES: usize = 32;

/// wrap_nonce[12] || wrapped_file_key_ct[32] || tag[16]
pub const WRAPPED_FILE_KEY_BYTES: usize = FILE_KEY_BYTES + AEAD_TAG_BYTES; // 48
pub const STANZA_HEADER_BYTES: usize = 2; // kem_ct_len
pub const STANZA_BYTES: usize =
    STANZA_HEADER_BYTES + KEM_CIPHERTEXT_BYTES + NONCE_BYTES + WRAPPED_FILE_KEY_BYTES;

/// version + suite_kem + suite_aead + flags + recipient_count(u16)
pub const HEADER_BYTES: usize = 1 + 1 + 1 + 1 + 2;

/// Smallest possible ciphertext: header + one stanza + payload nonce + empty-plaintext tag.
pub const MIN_CIPHERTEXT_BYTES: usize = HEADER_BYTES + STANZA_BYTES + NONCE_BYTES + AEAD_TAG_BYTES;

/// A single recipient's wrapped-file-key stanza, borrowed from the wire.
#[derive(Debug, Clone, Copy)]
pub struct Stanza<'a> {
    pub kem_ciphertext: &'a [u8],
    pub wrap_nonce: &'a [u8; NONCE_BYTES],
    pub wrapped_file_key: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct WireComponents<'a> {
    pub version: u8,
    pub suite_kem: u8,
    pub suite_aead: u8,
    pub flags: u8,
    pub stanzas: &'a [u8],
    pub recipient_count: u16,
    pub payload_nonce: &'a [u8; NONCE_BYTES],
    pub payload_ciphertext: &'a [u8],
}

pub fn encode_wire(
    stanzas: &[(Vec<u8>, [u8; NONCE_BYTES], Vec<u8>)],
    payload_nonce: &[u8; NONCE_BYTES],
    payload_ct: &[u8],
) -> Result<Vec<u8>, CipherError> {
    if stanzas.is_empty() {
        return Err(CipherError::NoRecipients);
    }
    if stanzas.len() > u16::MAX as usize {
        return Err(CipherError::EncodingFailed);
    }

    let mut out = Vec::with_capacity(
        HEADER_BYTES + stanzas.len() * STANZA_BYTES + NONCE_BYTES + payload_ct.len(),
    );

    out.push(PROTOCOL_VERSION);
    out.push(SUITE_KEM_HYBRID_X25519_MLKEM768);
    out.push(SUITE_AEAD_AES256GCM);
    out.push(FLAGS_V1);
    out.extend_from_slice(&(stanzas.len() as u16).to_be_bytes());

    for (kem_ct, wrap_nonce, wrapped_key) in stanzas {
        if kem_ct.len() != KEM_CIPHERTEXT_BYTES || wrapped_key.len() != WRAPPED_FILE_KEY_BYTES {
            return Err(CipherError::EncodingFailed);
        }
        out.extend_from_slice(&(kem_ct.len() as u16).to_be_bytes());
        out.extend_from_slice(kem_ct);
        out.extend_from_slice(wrap_nonce);
        out.extend_from_slice(wrapped_key);
    }

    out.extend_from_slice(payload_nonce);
    out.extend_from_slice(payload_ct);

    Ok(out)
}

pub fn decode_wire(data: &[u8]) -> Result<WireComponents<'_>, CipherError> {
    if data.len() < MIN_CIPHERTEXT_BYTES {
        return Err(CipherError::DecryptFailed);
    }

    let version = data[0];
    let suite_kem = data[1];
    let suite_aead = data[2];
    let flags = data[3];
    let recipient_count = u16::from_be_bytes([data[4], data[5]]);

    if version != PROTOCOL_VERSION
        || suite_kem != SUITE_KEM_HYBRID_X25519_MLKEM768
        || suite_aead != SUITE_AEAD_AES256GCM
        || flags != FLAGS_V1
        || recipient_count == 0
    {
        return Err(CipherError::DecryptFailed);
    }

    let stanzas_start = HEADER_BYTES;
    let stanzas_len = recipient_count as usize * STANZA_BYTES;
    let stanzas_end = stanzas_start
        .checked_add(stanzas_len)
        .ok_or(CipherError::DecryptFailed)?;

    if data.len() < stanzas_end + NONCE_BYTES + AEAD_TAG_BYTES {
        return Err(CipherError::DecryptFailed);
    }

    let stanzas = &data[stanzas_start..stanzas_end];

    let nonce_start = stanzas_end;
    let nonce_end = nonce_start + NONCE_BYTES;
    let payload_nonce: &[u8; NONCE_BYTES] = data[nonce_start..nonce_end]
        .try_into()
        .map_err(|_| CipherError::DecryptFailed)?;

    let payload_ciphertext = &data[nonce_end..];

    Ok(WireComponents {
        version,
        suite_kem,
        suite_aead,
        flags,
        stanzas,
        recipient_count,
        payload_nonce,
        payload_ciphertext,
    })
}

/// Iterate the per-recipient stanzas of a decoded wire body.
pub fn iter_stanzas<'a>(components: &WireComponents<'a>) -> impl Iterator<Item = Stanza<'a>> {
    let stanzas = components.stanzas;
    (0..components.recipient_count as usize).map(move |i| {
        let start = i * STANZA_BYTES;
        let kem_ct_len =
            u16::from_be_bytes([stanzas[start], stanzas[start + 1]]) as usize;
        let kem_start = start + STANZA_HEADER_BYTES;
        let kem_end = kem_start + kem_ct_len.min(KEM_CIPHERTEXT_BYTES);
        let wrap_nonce_start = start + STANZA_HEADER_BYTES + KEM_CIPHERTEXT_BYTES;
        let wrap_nonce_end = wrap_nonce_start + NONCE_BYTES;
        let wrap_nonce: &[u8; NONCE_BYTES] = stanzas[wrap_nonce_start..wrap_nonce_end]
            .try_into()
            .expect("fixed stanza layout");
        let wrapped_key_start = wrap_nonce_end;
        let wrapped_key_end = wrapped_key_start + WRAPPED_FILE_KEY_BYTES;

        Stanza {
            kem_ciphertext: &stanzas[kem_start..kem_end],
            wrap_nonce,
            wrapped_file_key: &stanzas[wrapped_key_start..wrapped_key_end],
        }
    })
}
