use sha2::{Digest, Sha256};

pub const MAGIC_CONSTANT: u64 = 2862933555777941757;

/// Stable 64-bit hash of a routing key.
/// Every node must agree on this value, so it cannot depend on a per-process
/// seed or on the Rust release the node was built with.
pub fn stable_key_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Jump consistent hashing implementation
/// Based on:
/// https://arxiv.org/ftp/arxiv/papers/1406/1406.2294.pdf
pub fn jump_consistent_hash(key: &str, number_of_buckets: u32) -> u32 {
    let bucket_num = number_of_buckets as i64;

    let mut b: i64 = -1;
    let mut j: i64 = 0;
    let mut _key: u64 = stable_key_hash(key);

    while j < bucket_num {
        b = j;
        _key = _key.wrapping_mul(MAGIC_CONSTANT).wrapping_add(1);
        j = ((b + 1) as f64 * ((1i64 << 31) as f64 / ((_key >> 33) + 1) as f64)) as i64;
    }
    b as u32
}
