//! # Cryptographic Primitives
//!
//! Crown needs no signatures or encryption: callers are identified by the
//! execution context, not by proofs. What it does need is a stable,
//! domain-separated hash for deriving role tags and addresses. That lives
//! in [`hash`].

pub mod hash;

pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash};
