//! Key mask helpers.
//!
//! The Seller API generates keys from a mask where every `X` is replaced by a
//! random uppercase letter or digit, e.g. `GZV-XXX-XXX` → `GZV-A1B-9QZ`.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produce an example key with the same shape the backend will generate.
pub fn sample_key(mask: &str) -> String {
    let mut rng = rand::thread_rng();
    mask.chars()
        .map(|c| {
            if c == 'X' {
                ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
            } else {
                c
            }
        })
        .collect()
}

/// Number of random positions in `mask`.
pub fn random_positions(mask: &str) -> usize {
    mask.chars().filter(|&c| c == 'X').count()
}
