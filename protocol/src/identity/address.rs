//! # Principal Addresses
//!
//! A principal is anything that can call a contract or hold value: a
//! person's account, a contract, the vault itself. On the wire and in
//! scenario files an address is `0x` followed by 40 lowercase hex digits.
//!
//! ```text
//! label ("alice")
//!     -> BLAKE3 derive_key(ADDRESS_HASH_CONTEXT, label) -> 32 bytes
//!     -> first 20 bytes -> 0x3f1c...
//! ```
//!
//! The all-zero address is the **null principal**. It means "no one": mints
//! come from it, burns go to it, and no contract will ever accept it as an
//! argument. [`validate`] is the single predicate every component runs
//! before trusting an address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_HASH_CONTEXT, ADDRESS_LENGTH};
use crate::crypto::hash::{blake3_hash_multi, domain_separated_hash};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing or validating an address.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    /// The null principal was supplied where a real one is required.
    #[error("null address is not a valid principal")]
    NullAddress,

    /// The text form was not valid hex.
    #[error("invalid address hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The decoded bytes have the wrong length.
    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte principal identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The null principal.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Derives a deterministic address from a human label.
    ///
    /// Tests and scenario files name their actors ("king", "alice", ...)
    /// and this turns the name into a stable principal. The null principal
    /// is unreachable in practice: it would need a 160-bit preimage.
    pub fn derive(label: &str) -> Self {
        let digest = domain_separated_hash(ADDRESS_HASH_CONTEXT, label.as_bytes());
        Self::truncate(&digest)
    }

    /// Derives the address of a contract deployed by `deployer` at `nonce`.
    pub fn for_contract(deployer: &Address, nonce: u64) -> Self {
        let digest = blake3_hash_multi(&[b"crown contract", &deployer.0, &nonce.to_be_bytes()]);
        Self::truncate(&digest)
    }

    /// Returns `true` for the null principal.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses the hex form. The `0x` prefix is optional.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    fn truncate(digest: &[u8; 32]) -> Self {
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(arr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &self.to_hex()[..10])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Rejects the null principal.
///
/// Every contract entry point that accepts an address runs it through
/// here before touching state.
pub fn validate(address: &Address) -> Result<(), AddressError> {
    if address.is_zero() {
        return Err(AddressError::NullAddress);
    }
    Ok(())
}

/// Validates both ends of a two-party operation (transfer, approve).
pub fn validate_pair(a: &Address, b: &Address) -> Result<(), AddressError> {
    validate(a)?;
    validate(b)
}
