//! Deterministic mapping from byte strings to ring identifiers.

use sha1::{Digest, Sha1};

use crate::ids::Identifier;

/// SHA-1 the input and read the low 4 bytes of the digest, big-endian, as the identifier.
pub fn hash_bytes(bytes: &[u8]) -> Identifier {
    let digest = Sha1::digest(bytes);
    let low = &digest[digest.len() - 4..];
    u32::from_be_bytes(low.try_into().expect("slice is exactly 4 bytes"))
}

/// Hash a node's canonical `host:port` address into its id.
pub fn hash_address(canonical: &str) -> Identifier {
    hash_bytes(canonical.as_bytes())
}

/// Hash a store key into its id.
pub fn hash_key(key: &str) -> Identifier {
    hash_bytes(key.as_bytes())
}
