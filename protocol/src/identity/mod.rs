//! # Identity Module
//!
//! Principals in Crown are bare 20-byte addresses. There is no key material
//! here: who is calling is a fact of the execution context, supplied by the
//! caller of the kernel. What this module owns is the address type itself
//! and the null-principal check that every contract runs on its inputs.

pub mod address;

pub use address::{validate, validate_pair, Address, AddressError};
