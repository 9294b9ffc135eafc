//! Exploratory timing comparison across decryption failure modes.
//!
//! Not a rigorous side-channel audit — a quick sanity check that the
//! uniform-error design doesn't leak an obvious timing oracle between
//! "wrong recipient" and "tampered ciphertext".

use std::hint::black_box;
use std::time::Instant;

use zen_lock_cipher::Cipher;

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<16} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn main() {
    let cipher = Cipher::new();
    let (recipient, identity) = cipher.generate_identity();
    let (_, wrong_identity) = cipher.generate_identity();

    let plaintext = vec![0x42u8; 1024];
    let ct = cipher.encrypt(&plaintext, &[recipient]).unwrap();

    let mut ct_tampered = ct.clone();
    let last = ct_tampered.len() - 1;
    ct_tampered[last] ^= 0x01;

    let iters = 5_000;

    time_it("valid", iters, || {
        let pt = cipher.decrypt(black_box(&ct), &identity).unwrap();
        black_box(pt);
    });

    time_it("wrong_identity", iters, || {
        let r = cipher.decrypt(black_box(&ct), &wrong_identity);
        black_box(r.err());
    });

    time_it("tampered", iters, || {
        let r = cipher.decrypt(black_box(&ct_tampered), &identity);
        black_box(r.err());
    });

    time_it("short", iters, || {
        let r = cipher.decrypt(black_box(b"short"), &identity);
        black_box(r.err());
    });

    println!("\nDone.");
}
