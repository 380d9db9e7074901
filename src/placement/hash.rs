//! FNV-1a hashing for ring positions.
//!
//! Every node must derive identical positions from identical inputs, so
//! these functions are fixed forever: changing them reshuffles every object.

use crate::domain::ObjectId;

/// FNV-1a 64-bit offset basis
pub const FNV1A_64_INIT: u64 = 0xcbf2_9ce4_8422_2325;

const FNV_64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Continue an FNV-1a hash over `data` starting from `hval`.
pub fn fnv1a_64(data: &[u8], mut hval: u64) -> u64 {
    for byte in data {
        hval ^= *byte as u64;
        hval = hval.wrapping_mul(FNV_64_PRIME);
    }
    hval
}

/// Hash a byte string from the offset basis.
pub fn hash_bytes(data: &[u8]) -> u64 {
    fnv1a_64(data, FNV1A_64_INIT)
}

/// Next position in a node's chain of virtual nodes.
pub fn hash_next(hval: u64) -> u64 {
    fnv1a_64(&hval.to_le_bytes(), hval)
}

/// Ring position of an object.
pub fn hash_oid(oid: ObjectId) -> u64 {
    hash_next(hash_bytes(&oid.raw().to_le_bytes()))
}
