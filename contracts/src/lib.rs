//! # Crown Contracts
//!
//! The permission-and-accounting kernel: contract-style state machines that
//! are driven by explicit calls, each carrying a [`context::CallContext`].
//!
//! - **Access control**: a single king plus delegated roles.
//! - **Token**: a fungible ledger with allowances, an unlimited-allowance
//!   sentinel, role-gated mint/burn, an optional supply cap and an optional
//!   pause switch.
//! - **Reentrancy guard**: a lock that refuses nested entry.
//! - **Claim vault**: records native value sent by mistake and lets the
//!   sender claim it back.
//! - **Native bank**: the value host that moves native units and runs
//!   recipients' receive logic, re-entrant calls included.
//!
//! ## Design Principles
//!
//! 1. Every amount is `u128` and every arithmetic step is checked.
//! 2. Each entry point is all-or-nothing. A failed call restores state and
//!    drops any events it emitted.
//! 3. Validation happens before mutation; events are emitted last.
//! 4. Every public state type is serializable (serde) so a run can be
//!    dumped and inspected.

pub mod access;
pub mod bank;
pub mod claim_vault;
pub mod context;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod pausable;
pub mod token;

pub use access::{AccessControl, AccessError, KingPolicy, Role};
pub use bank::{BankError, NativeBank, ReceiveHook};
pub use claim_vault::{ClaimVault, TransferRejected, ValueSink, VaultError};
pub use context::{atomically, AccountDirectory, CallContext, NoContracts, Transactional};
pub use events::{Event, EventLog};
pub use guard::{non_reentrant, Guarded, ReentrancyError, ReentrancyGuard};
pub use ledger::{Ledger, LedgerError};
pub use pausable::{Pausable, PauseError};
pub use token::{Token, TokenConfig};
