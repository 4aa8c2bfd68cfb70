//! Deterministic "random" fractions derived from a seed string.
//!
//! Contract: the same seed always yields the same fraction, on every platform.
//! The fraction is the first 4 bytes of the SHA-256 digest of the seed (UTF-8),
//! read big-endian and divided by 2^32, so it always lies in `[0.0, 1.0)`.

use sha2::{Digest, Sha256};

const SPAN: f64 = 4_294_967_296.0; // 2^32

/// Map `seed` to a stable fraction in `[0.0, 1.0)`.
pub fn stable_unit(seed: &str) -> f64 {
    let digest = Sha256::digest(seed.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(prefix) / SPAN
}

/// Seed used by the tie jitter for one horse of one race.
pub fn jitter_seed(race_id: &str, number: u8) -> String {
    format!("{race_id}:{number}")
}

/// Seed used when a congestion value of exactly zero is replaced.
pub fn congestion_zero_seed(race_id: &str) -> String {
    format!("{race_id}:congestion-zero")
}
