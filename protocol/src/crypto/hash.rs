//! # Hashing Utilities
//!
//! Crown uses exactly one hash function: **BLAKE3**. It derives role tags,
//! deterministic principal addresses, and contract deployment addresses.
//! None of these values are secret, but they must be collision-free and
//! stable across builds, which is what a proper cryptographic hash buys us.
//!
//! Domain separation matters here more than speed. A role named
//! `"MINTER_ROLE"` and a principal labelled `"MINTER_ROLE"` must never map to
//! the same bytes, so every derivation goes through
//! [`domain_separated_hash`] with its own context string.

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use crown_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"crown");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash data under a domain-separation context.
///
/// Uses BLAKE3's `derive_key` mode: the context string selects a different
/// internal IV, so `domain_separated_hash("a", x)` and
/// `domain_separated_hash("b", x)` never collide for the same `x`.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Used for composite preimages like `(deployer || nonce)`.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
