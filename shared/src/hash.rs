//! Stable 64-bit hashes used to identify RPC and component types on the wire

pub const FNV1A64_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
pub const FNV1A64_PRIME: u64 = 1_099_511_628_211;

/// FNV-1a over a byte string
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV1A64_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV1A64_PRIME)
    })
}

/// Fold a whole 64-bit value into `hash` with one FNV-1a step
pub fn combine_fnv1a64(hash: u64, value: u64) -> u64 {
    (hash ^ value).wrapping_mul(FNV1A64_PRIME)
}

/// Stable identifier of a named type. Independent of registration order,
/// compiler version and platform.
pub fn type_hash(name: &str) -> u64 {
    fnv1a64(name.as_bytes())
}

/// Order independent hash of a set of type hashes. The hashes are sorted, then
/// folded starting from the smallest one. An empty set hashes to 0.
pub fn collection_hash(hashes: &mut [u64]) -> u64 {
    hashes.sort_unstable();
    match hashes.first() {
        None => 0,
        Some(first) => hashes
            .iter()
            .fold(*first, |hash, value| combine_fnv1a64(hash, *value)),
    }
}
