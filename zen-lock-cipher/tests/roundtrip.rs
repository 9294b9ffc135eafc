use zen_lock_cipher::wire::{
    FLAGS_V1, HEADER_BYTES, KEM_CIPHERTEXT_BYTES, MIN_CIPHERTEXT_BYTES, PROTOCOL_VERSION,
    STANZA_BYTES, SUITE_AEAD_AES256GCM, SUITE_KEM_HYBRID_X25519_MLKEM768,
};
use zen_lock_cipher::{Cipher, CipherError, Identity, Recipient};

fn setup() -> (Cipher, Recipient, Identity) {
    let cipher = Cipher::new();
    let (recipient, identity) = cipher.generate_identity();
    (cipher, recipient, identity)
}

#[test]
fn roundtrip_basic() {
    let (cipher, recipient, identity) = setup();
    let plaintext = b"hello post-quantum kubernetes world";
    let ct = cipher.encrypt(plaintext, &[recipient]).unwrap();
    let pt = cipher.decrypt(&ct, &identity).unwrap();
    assert_eq!(&pt, plaintext);
}

#[test]
fn roundtrip_empty_plaintext() {
    let (cipher, recipient, identity) = setup();
    let ct = cipher.encrypt(b"", &[recipient]).unwrap();
    let pt = cipher.decrypt(&ct, &identity).unwrap();
    assert_eq!(pt, b"");
}

#[test]
fn roundtrip_large_plaintext() {
    let (cipher, recipient, identity) = setup();
    let plaintext = vec![0xABu8; 65536];
    let ct = cipher.encrypt(&plaintext, &[recipient]).unwrap();
    let pt = cipher.decrypt(&ct, &identity).unwrap();
    assert_eq!(pt, plaintext);
}

#[test]
fn wrong_identity_fails() {
    let (cipher, recipient, _identity) = setup();
    let (_, _, other_identity) = setup();
    let ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    let result = cipher.decrypt(&ct, &other_identity);
    assert_eq!(result, Err(CipherError::DecryptFailed));
}

#[test]
fn header_fields_are_stamped() {
    let (cipher, recipient, _identity) = setup();
    let ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    assert_eq!(ct[0], PROTOCOL_VERSION);
    assert_eq!(ct[1], SUITE_KEM_HYBRID_X25519_MLKEM768);
    assert_eq!(ct[2], SUITE_AEAD_AES256GCM);
    assert_eq!(ct[3], FLAGS_V1);
    let recipient_count = u16::from_be_bytes([ct[4], ct[5]]);
    assert_eq!(recipient_count, 1);
    let kem_ct_len = u16::from_be_bytes([ct[HEADER_BYTES], ct[HEADER_BYTES + 1]]);
    assert_eq!(kem_ct_len as usize, KEM_CIPHERTEXT_BYTES);
}

#[test]
fn recipient_count_matches_fan_out() {
    let cipher = Cipher::new();
    let (r1, _) = cipher.generate_identity();
    let (r2, _) = cipher.generate_identity();
    let (r3, _) = cipher.generate_identity();
    let ct = cipher.encrypt(b"data", &[r1, r2, r3]).unwrap();
    let recipient_count = u16::from_be_bytes([ct[4], ct[5]]);
    assert_eq!(recipient_count, 3);
}

#[test]
fn ciphertext_minimum_size() {
    let (cipher, recipient, _identity) = setup();
    let ct = cipher.encrypt(b"", &[recipient]).unwrap();
    assert!(ct.len() >= MIN_CIPHERTEXT_BYTES);
}

#[test]
fn tamper_version_fails() {
    let (cipher, recipient, identity) = setup();
    let mut ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    ct[0] = 0xFF;
    assert_eq!(cipher.decrypt(&ct, &identity), Err(CipherError::DecryptFailed));
}

#[test]
fn tamper_recipient_count_fails() {
    let (cipher, recipient, identity) = setup();
    let mut ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    ct[4] = 0xFF;
    ct[5] = 0xFF;
    assert_eq!(cipher.decrypt(&ct, &identity), Err(CipherError::DecryptFailed));
}

#[test]
fn tamper_kem_ciphertext_of_only_recipient_fails() {
    let (cipher, recipient, identity) = setup();
    let mut ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    ct[HEADER_BYTES + 10] ^= 0x01;
    assert_eq!(cipher.decrypt(&ct, &identity), Err(CipherError::DecryptFailed));
}

#[test]
fn tamper_payload_ciphertext_fails() {
    let (cipher, recipient, identity) = setup();
    let mut ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    let last = ct.len() - 1;
    ct[last] ^= 0x01;
    assert_eq!(cipher.decrypt(&ct, &identity), Err(CipherError::DecryptFailed));
}

#[test]
fn truncated_fails() {
    let (cipher, recipient, identity) = setup();
    let ct = cipher.encrypt(b"data", &[recipient]).unwrap();
    assert_eq!(cipher.decrypt(&ct[..10], &identity), Err(CipherError::DecryptFailed));
    assert_eq!(cipher.decrypt(b"short", &identity), Err(CipherError::DecryptFailed));
    assert_eq!(cipher.decrypt(b"", &identity), Err(CipherError::DecryptFailed));
}

#[test]
fn other_recipients_cannot_open_each_others_stanza() {
    let cipher = Cipher::new();
    let (r1, i1) = cipher.generate_identity();
    let (r2, i2) = cipher.generate_identity();
    let (_r3, i3) = cipher.generate_identity();

    let ct = cipher.encrypt(b"shared", &[r1, r2]).unwrap();

    assert!(cipher.decrypt(&ct, &i1).is_ok());
    assert!(cipher.decrypt(&ct, &i2).is_ok());
    assert_eq!(cipher.decrypt(&ct, &i3), Err(CipherError::DecryptFailed));
}

#[test]
fn all_errors_are_uniform() {
    let (cipher, recipient, identity) = setup();
    let ct = cipher.encrypt(b"data", &[recipient]).unwrap();

    let err1 = cipher.decrypt(b"short", &identity).unwrap_err();

    let mut tampered = ct.clone();
    tampered[HEADER_BYTES + STANZA_BYTES - 1] ^= 0x01;
    let err2 = cipher.decrypt(&tampered, &identity).unwrap_err();

    let mut tampered2 = ct.clone();
    let last = tampered2.len() - 1;
    tampered2[last] ^= 0x01;
    let err3 = cipher.decrypt(&tampered2, &identity).unwrap_err();

    assert_eq!(err1, err2);
    assert_eq!(err2, err3);
    assert_eq!(format!("{}", err1), "decryption failed");
}

#[test]
fn key_serialization_roundtrip() {
    let (cipher, recipient, identity) = setup();
    let plaintext = b"key serialization test";

    let recipient_bytes = recipient.to_bytes();
    let identity_bytes = identity.to_bytes();

    let recipient2 = Recipient::from_bytes(&recipient_bytes).unwrap();
    let identity2 = Identity::from_bytes(&identity_bytes).unwrap();

    let ct = cipher.encrypt(plaintext, &[recipient2]).unwrap();
    let pt = cipher.decrypt(&ct, &identity2).unwrap();
    assert_eq!(&pt, plaintext);
}
