//! # Claim Vault
//!
//! Catches native value that was sent to a contract by mistake and lets
//! the sender take it back. Any value arriving through the vault's
//! `receive` or `fallback` path is recorded against the sender; the sender
//! can later reclaim the full recorded amount to itself or to an alternate
//! recipient.
//!
//! Value only enters through [`NativeBank`](crate::bank::NativeBank), which
//! debits the sender before the vault records anything. The deposit paths
//! are crate-private so no caller can record value that never moved.
//!
//! ## Claim ordering
//!
//! A claim settles the vault's books before any value leaves:
//!
//! 1. Reject a null recipient or the vault itself.
//! 2. Read the claimant's balance; reject zero.
//! 3. Decrement the current-holdings counter.
//! 4. Zero the claimant's record.
//! 5. Pay out through the [`ValueSink`]. A rejected payout fails the claim
//!    with [`VaultError::ClaimFailed`] and the whole call is rolled back,
//!    steps 3 and 4 included.
//! 6. Emit `Claimed`.
//!
//! Step 5 hands control to the recipient, whose receive hook may call back
//! into this vault. The claim runs under the vault's [`ReentrancyGuard`],
//! so a nested claim fails with `NoReentrancy`. Because the books are
//! already settled by then, even an unguarded nested call would find
//! nothing left to take.
//!
//! ## Invariants
//!
//! - `total_mistaken_eth == sum(per-principal records) == value held`.
//! - `total_recorded_mistaken_eth` never decreases.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::access::{AccessControl, AccessError, KingPolicy};
use crate::context::{atomically, AccountDirectory, CallContext, NoContracts, Transactional};
use crate::events::{Event, EventLog};
use crate::guard::{non_reentrant, Guarded, ReentrancyError, ReentrancyGuard};
use crown_protocol::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from vault deposits, claims and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A deposit carried no value.
    #[error("deposit amount too low: must be greater than zero")]
    AmountTooLow,

    /// Claim recipient was null or the vault itself; or the vault was
    /// deployed at the null address.
    #[error("invalid address")]
    InvalidAddress,

    /// The claimant has nothing recorded.
    #[error("insufficient funds: nothing recorded for this principal")]
    InsufficientFunds,

    /// The payout was rejected by the recipient or the value host.
    #[error("claim failed: transfer to {recipient} rejected ({reason})")]
    ClaimFailed {
        /// Where the value was headed.
        recipient: Address,
        /// Why the transfer was refused.
        reason: String,
    },

    /// The king has closed the deposit path.
    #[error("deposits are closed")]
    DepositsClosed,

    /// A counter would overflow `u128`.
    #[error("vault counter overflow")]
    Overflow,

    /// A guarded operation was re-entered.
    #[error(transparent)]
    Reentrancy(#[from] ReentrancyError),

    /// King-only configuration was attempted by someone else.
    #[error(transparent)]
    Access(#[from] AccessError),
}

// ---------------------------------------------------------------------------
// ValueSink
// ---------------------------------------------------------------------------

/// A refusal from the party receiving an outbound transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transfer rejected: {reason}")]
pub struct TransferRejected {
    /// Human-readable cause.
    pub reason: String,
}

impl TransferRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Where vault payouts go.
///
/// An implementation moves `amount` of native value from the vault to `to`.
/// It is handed the vault itself so that a recipient with receive logic can
/// call back into it, exactly as a contract would during a value transfer.
/// On `Err` the implementation must have undone its own side of the
/// transfer; the vault undoes its side.
pub trait ValueSink {
    fn send(
        &mut self,
        vault: &mut ClaimVault,
        to: Address,
        amount: u128,
    ) -> Result<(), TransferRejected>;
}

// ---------------------------------------------------------------------------
// ClaimVault
// ---------------------------------------------------------------------------

/// The mistaken-deposit vault.
///
/// Deposits cannot be recorded from outside the crate; they go through the
/// native bank so the value really moves:
///
/// ```compile_fail
/// use crown_contracts::claim_vault::ClaimVault;
/// use crown_contracts::context::CallContext;
/// use crown_protocol::identity::Address;
///
/// let mut vault = ClaimVault::deploy(Address::derive("vault"), Address::derive("king")).unwrap();
/// vault.receive(&CallContext::with_value(Address::derive("dora"), 1_000)).unwrap();
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClaimVault {
    address: Address,
    access: AccessControl,
    guard: ReentrancyGuard,
    deposits_open: bool,
    deposits: BTreeMap<Address, u128>,
    /// Value currently held on behalf of depositors.
    total_current: u128,
    /// Value ever deposited. Monotonic.
    total_recorded: u128,
    events: EventLog,
}

/// Saved vault state for rollback. The guard is not part of it: the guard
/// manages its own lifecycle.
pub struct VaultCheckpoint {
    access: AccessControl,
    deposits_open: bool,
    deposits: BTreeMap<Address, u128>,
    total_current: u128,
    total_recorded: u128,
    events_len: usize,
}

impl Transactional for ClaimVault {
    type Checkpoint = VaultCheckpoint;

    fn checkpoint(&self) -> VaultCheckpoint {
        VaultCheckpoint {
            access: self.access.clone(),
            deposits_open: self.deposits_open,
            deposits: self.deposits.clone(),
            total_current: self.total_current,
            total_recorded: self.total_recorded,
            events_len: self.events.len(),
        }
    }

    fn rollback(&mut self, checkpoint: VaultCheckpoint) {
        self.access = checkpoint.access;
        self.deposits_open = checkpoint.deposits_open;
        self.deposits = checkpoint.deposits;
        self.total_current = checkpoint.total_current;
        self.total_recorded = checkpoint.total_recorded;
        self.events.truncate(checkpoint.events_len);
    }
}

impl Guarded for ClaimVault {
    fn guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }
}

impl ClaimVault {
    /// Deploys a vault at `address` administered by `king`.
    pub fn deploy(address: Address, king: Address) -> Result<Self, VaultError> {
        Self::deploy_with_policy(address, king, KingPolicy::Open, &NoContracts)
    }

    /// Deploys a vault whose kingship is constrained by `policy`.
    pub fn deploy_with_policy(
        address: Address,
        king: Address,
        policy: KingPolicy,
        directory: &dyn AccountDirectory,
    ) -> Result<Self, VaultError> {
        if address.is_zero() {
            return Err(VaultError::InvalidAddress);
        }
        let mut events = EventLog::new();
        let access = AccessControl::with_policy(king, policy, directory, &mut events)?;
        info!(%address, %king, "claim vault deployed");

        Ok(Self {
            address,
            access,
            guard: ReentrancyGuard::new(),
            deposits_open: true,
            deposits: BTreeMap::new(),
            total_current: 0,
            total_recorded: 0,
            events,
        })
    }

    // -- deposit entry points ----------------------------------------------

    /// Plain value transfer into the vault. The value must already have
    /// been credited to the vault's address.
    pub(crate) fn receive(&mut self, ctx: &CallContext) -> Result<(), VaultError> {
        atomically(self, |vault| vault.record_deposit(ctx.caller, ctx.value))
    }

    /// Value transfer carrying call data the vault does not understand.
    /// The data is ignored; the value is recorded like any other deposit.
    pub(crate) fn fallback(&mut self, ctx: &CallContext, data: &[u8]) -> Result<(), VaultError> {
        debug!(from = %ctx.caller, data_len = data.len(), "fallback deposit");
        atomically(self, |vault| vault.record_deposit(ctx.caller, ctx.value))
    }

    // -- claim entry points ------------------------------------------------

    /// Reclaims the caller's whole record to the caller.
    pub fn claim_mistaken_eth(
        &mut self,
        ctx: &CallContext,
        sink: &mut dyn ValueSink,
    ) -> Result<u128, VaultError> {
        self.claim(ctx, ctx.caller, sink)
    }

    /// Reclaims the caller's whole record to `alternate`.
    pub fn claim_mistaken_eth_to(
        &mut self,
        ctx: &CallContext,
        alternate: Address,
        sink: &mut dyn ValueSink,
    ) -> Result<u128, VaultError> {
        self.claim(ctx, alternate, sink)
    }

    // -- configuration -----------------------------------------------------

    /// Opens or closes the deposit path. King-only. Claims stay open.
    pub fn set_deposits_open(&mut self, ctx: &CallContext, open: bool) -> Result<(), VaultError> {
        atomically(self, |vault| {
            vault.access.only_king(&ctx.caller)?;
            vault.deposits_open = open;
            info!(open, by = %ctx.caller, "vault deposit path updated");
            Ok(())
        })
    }

    pub fn transfer_king_role(
        &mut self,
        ctx: &CallContext,
        new_king: Address,
        directory: &dyn AccountDirectory,
    ) -> Result<(), VaultError> {
        atomically(self, |vault| {
            Ok(vault
                .access
                .transfer_king_role(ctx, new_king, directory, &mut vault.events)?)
        })
    }

    pub fn renounce_kingship(&mut self, ctx: &CallContext) -> Result<(), VaultError> {
        atomically(self, |vault| {
            Ok(vault.access.renounce_kingship(ctx, &mut vault.events)?)
        })
    }

    // -- reads -------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn king(&self) -> Option<Address> {
        self.access.king()
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn deposits_open(&self) -> bool {
        self.deposits_open
    }

    /// `true` only while a claim is in flight.
    pub fn is_locked(&self) -> bool {
        self.guard.is_locked()
    }

    /// The caller's own record.
    pub fn my_mistaken_eth_balance(&self, ctx: &CallContext) -> u128 {
        self.user_mistaken_eth_balance(&ctx.caller)
    }

    /// Any principal's record.
    pub fn user_mistaken_eth_balance(&self, account: &Address) -> u128 {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    /// Value currently held for depositors.
    pub fn total_mistaken_eth(&self) -> u128 {
        self.total_current
    }

    /// Value ever deposited.
    pub fn total_recorded_mistaken_eth(&self) -> u128 {
        self.total_recorded
    }

    /// Every principal with a record, including zeroed ones.
    pub fn deposits(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.deposits.iter()
    }

    // -- internals ---------------------------------------------------------

    fn record_deposit(&mut self, from: Address, amount: u128) -> Result<(), VaultError> {
        if amount == 0 {
            return Err(VaultError::AmountTooLow);
        }
        if !self.deposits_open {
            return Err(VaultError::DepositsClosed);
        }

        let balance = self
            .user_mistaken_eth_balance(&from)
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        let current = self
            .total_current
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        let recorded = self
            .total_recorded
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;

        self.deposits.insert(from, balance);
        self.total_current = current;
        self.total_recorded = recorded;

        debug!(%from, amount, held = current, "mistaken deposit recorded");
        self.events.emit(Event::Deposited { from, amount });
        Ok(())
    }

    fn claim(
        &mut self,
        ctx: &CallContext,
        recipient: Address,
        sink: &mut dyn ValueSink,
    ) -> Result<u128, VaultError> {
        let claimant = ctx.caller;
        atomically(self, |vault| {
            non_reentrant(vault, |vault| vault.settle_and_pay(claimant, recipient, sink))
        })
    }

    fn settle_and_pay(
        &mut self,
        claimant: Address,
        recipient: Address,
        sink: &mut dyn ValueSink,
    ) -> Result<u128, VaultError> {
        if recipient.is_zero() || recipient == self.address {
            return Err(VaultError::InvalidAddress);
        }

        let amount = self.user_mistaken_eth_balance(&claimant);
        if amount == 0 {
            return Err(VaultError::InsufficientFunds);
        }

        self.total_current = self
            .total_current
            .checked_sub(amount)
            .ok_or(VaultError::Overflow)?;
        self.deposits.insert(claimant, 0);

        if let Err(rejected) = sink.send(self, recipient, amount) {
            warn!(
                %claimant,
                %recipient,
                amount,
                reason = %rejected.reason,
                "claim payout rejected"
            );
            return Err(VaultError::ClaimFailed {
                recipient,
                reason: rejected.reason,
            });
        }

        info!(%claimant, %recipient, amount, "mistaken deposit claimed");
        self.events.emit(Event::Claimed {
            claimant,
            recipient,
            amount,
        });
        Ok(amount)
    }
}
