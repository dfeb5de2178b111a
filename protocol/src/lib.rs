// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Crown Protocol: Core Primitives
//!
//! The shared vocabulary of the Crown kernel: who a principal is, how role
//! tags and addresses are derived, and every constant the contracts agree
//! on. Contract logic lives in `crown-contracts`; this crate stays small
//! and dependency-light so that both the contracts and the scenario runner
//! can lean on it.
//!
//! ## Modules
//!
//! - **config** - Kernel constants. Decimals, role names, the unlimited
//!   allowance sentinel, hash contexts.
//! - **crypto** - BLAKE3 helpers with domain separation.
//! - **identity** - The [`Address`](identity::Address) type and the
//!   null-principal validator.

pub mod config;
pub mod crypto;
pub mod identity;
