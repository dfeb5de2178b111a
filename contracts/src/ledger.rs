//! # Ledger
//!
//! The balance book behind every Crown token: per-principal balances, the
//! owner/spender allowance matrix, and the total supply. This module holds
//! the unauthenticated primitives. Who is allowed to call them, and with
//! what caller, is decided one level up in [`crate::token`].
//!
//! ## Invariants
//!
//! - `sum(balances) == total_supply`, after every primitive.
//! - Supply only moves through [`Ledger::mint_to`] (+) and
//!   [`Ledger::burn_from_balance`] (-).
//! - An allowance equal to [`UNLIMITED_ALLOWANCE`] never depletes.
//!
//! All additions are checked. Subtractions that a preceding comparison has
//! already proven safe are plain `-`.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::access::AccessError;
use crate::events::{Event, EventLog};
use crate::pausable::PauseError;
use crown_protocol::config::{TOKEN_DECIMALS, UNLIMITED_ALLOWANCE};
use crown_protocol::identity::{self, Address, AddressError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from ledger primitives and token entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// An address argument was the null principal.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Deployment with zero initial supply.
    #[error("initial supply must be greater than zero")]
    ZeroInitialSupply,

    /// Deployment with a cap of zero.
    #[error("supply cap must be greater than zero")]
    ZeroCap,

    /// Debit larger than the holder's balance.
    #[error("insufficient balance: account holds {balance}")]
    InsufficientBalance {
        /// The balance that was too small.
        balance: u128,
    },

    /// Spend larger than the caller's allowance.
    #[error("insufficient allowance: spender may move {allowance}")]
    InsufficientAllowance {
        /// The allowance that was too small.
        allowance: u128,
    },

    /// `decrease_allowance` below zero.
    #[error("allowance underflow: current allowance is {allowance}")]
    AllowanceUnderflow {
        /// The current allowance.
        allowance: u128,
    },

    /// `increase_allowance` past `u128::MAX`.
    #[error("allowance overflow")]
    AllowanceOverflow,

    /// A mint would push supply past the cap.
    #[error("cap exceeded: supply would reach {requested}, cap is {cap}")]
    CapExceeded {
        /// The configured cap.
        cap: u128,
        /// Total supply the mint would have produced.
        requested: u128,
    },

    /// A mint would overflow `u128`.
    #[error("supply overflow")]
    SupplyOverflow,

    /// `pause`/`activate` on a token deployed without a breaker.
    #[error("token is not pausable")]
    NotPausable,

    /// Role check failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Pause state refused the operation.
    #[error(transparent)]
    Pause(#[from] PauseError),
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Balances, allowances and supply for one token.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    name: String,
    symbol: String,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    /// `owner -> spender -> allowance`.
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
}

impl Ledger {
    /// An empty ledger with zero supply.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        TOKEN_DECIMALS
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Every principal that has ever been credited, with its balance.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAddress`] if either side is null,
    /// [`LedgerError::InsufficientBalance`] if `from` holds less than `amount`.
    pub fn transfer_between(
        &mut self,
        from: Address,
        to: Address,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<(), LedgerError> {
        identity::validate_pair(&from, &to)?;

        let from_balance = self.balance_of(&from);
        if amount > from_balance {
            return Err(LedgerError::InsufficientBalance {
                balance: from_balance,
            });
        }

        self.balances.insert(from, from_balance - amount);
        // Cannot overflow: every balance is bounded by total supply.
        let to_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        self.balances.insert(to, to_balance);

        events.emit(Event::Transfer { from, to, amount });
        Ok(())
    }

    /// Overwrites `owner`'s allowance for `spender`.
    pub fn set_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<(), LedgerError> {
        identity::validate_pair(&owner, &spender)?;

        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
        events.emit(Event::Approval {
            owner,
            spender,
            amount,
        });
        Ok(())
    }

    /// Deducts `amount` from `spender`'s allowance over `owner`.
    ///
    /// The unlimited sentinel is left untouched. No event is emitted: the
    /// `Transfer` that follows is the record of the spend.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let current = self.allowance(&owner, &spender);
        if amount > current {
            return Err(LedgerError::InsufficientAllowance { allowance: current });
        }
        if current == UNLIMITED_ALLOWANCE {
            return Ok(());
        }

        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, current - amount);
        Ok(())
    }

    /// Creates `amount` new units for `to`.
    ///
    /// Emits `Transfer` from the null principal, then `Minted`. Cap
    /// enforcement is the caller's job and must happen before this.
    pub fn mint_to(
        &mut self,
        to: Address,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<(), LedgerError> {
        identity::validate(&to)?;

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        let new_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;

        self.total_supply = new_supply;
        self.balances.insert(to, new_balance);

        debug!(%to, amount, supply = new_supply, "minted");
        events.emit(Event::Transfer {
            from: Address::ZERO,
            to,
            amount,
        });
        events.emit(Event::Minted { to, amount });
        Ok(())
    }

    /// Destroys `amount` units held by `from`.
    ///
    /// Emits `Transfer` to the null principal, then `Burned`.
    pub fn burn_from_balance(
        &mut self,
        from: Address,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<(), LedgerError> {
        identity::validate(&from)?;

        let balance = self.balance_of(&from);
        if amount > balance {
            return Err(LedgerError::InsufficientBalance { balance });
        }

        self.balances.insert(from, balance - amount);
        // Supply >= any single balance, so this cannot underflow.
        self.total_supply -= amount;

        debug!(%from, amount, supply = self.total_supply, "burned");
        events.emit(Event::Transfer {
            from,
            to: Address::ZERO,
            amount,
        });
        events.emit(Event::Burned { from, amount });
        Ok(())
    }
}
