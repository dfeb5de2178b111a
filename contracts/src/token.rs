//! # Token Contract
//!
//! The deployable fungible token. A [`Token`] composes:
//!
//! - an [`AccessControl`] that owns kingship and the mint/burn roles,
//! - a [`Ledger`] holding balances, allowances and supply,
//! - an optional supply cap,
//! - an optional [`Pausable`] breaker gating transfers, mint and burn,
//! - its own [`EventLog`].
//!
//! Every public mutating method is an external entry point: it takes the
//! [`CallContext`] of the call and runs atomically, so a failure leaves
//! balances, roles, pause state and the event log exactly as they were.
//!
//! ## Deployment
//!
//! The whole initial supply is minted to the king. A capped token refuses
//! any mint, including the initial one, that would take supply past the
//! cap.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{AccessControl, KingPolicy, Role};
use crate::context::{atomically, AccountDirectory, CallContext, Transactional};
use crate::events::EventLog;
use crate::ledger::{Ledger, LedgerError};
use crate::pausable::Pausable;
use crown_protocol::identity::{self, Address};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment parameters for a [`Token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Units minted to the king at deployment. Must be non-zero.
    pub initial_supply: u128,
    /// Hard ceiling on total supply. `None` means uncapped.
    #[serde(default)]
    pub cap: Option<u128>,
    /// Whether the token carries a pause breaker.
    #[serde(default)]
    pub pausable: bool,
    /// Constraint on who may hold kingship.
    #[serde(default)]
    pub king_policy: KingPolicy,
}

impl TokenConfig {
    /// An uncapped, unpausable token under the open king policy.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, initial_supply: u128) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            initial_supply,
            cap: None,
            pausable: false,
            king_policy: KingPolicy::Open,
        }
    }

    /// Sets a supply cap.
    pub fn with_cap(mut self, cap: u128) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Adds a pause breaker.
    pub fn pausable(mut self) -> Self {
        self.pausable = true;
        self
    }

    /// Sets the king policy.
    pub fn with_king_policy(mut self, policy: KingPolicy) -> Self {
        self.king_policy = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A deployed token instance.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    address: Address,
    access: AccessControl,
    ledger: Ledger,
    cap: Option<u128>,
    pause: Option<Pausable>,
    events: EventLog,
}

/// Saved token state for rollback.
pub struct TokenCheckpoint {
    access: AccessControl,
    ledger: Ledger,
    pause: Option<Pausable>,
    events_len: usize,
}

impl Transactional for Token {
    type Checkpoint = TokenCheckpoint;

    fn checkpoint(&self) -> TokenCheckpoint {
        TokenCheckpoint {
            access: self.access.clone(),
            ledger: self.ledger.clone(),
            pause: self.pause,
            events_len: self.events.len(),
        }
    }

    fn rollback(&mut self, checkpoint: TokenCheckpoint) {
        self.access = checkpoint.access;
        self.ledger = checkpoint.ledger;
        self.pause = checkpoint.pause;
        self.events.truncate(checkpoint.events_len);
    }
}

impl Token {
    /// Deploys a token at `address` with `king` as its administrator.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAddress`] if `address` or `king` is null.
    /// - [`LedgerError::ZeroInitialSupply`] / [`LedgerError::ZeroCap`].
    /// - [`LedgerError::CapExceeded`] if the initial supply is over the cap.
    /// - [`LedgerError::Access`] if the king policy rejects `king`.
    pub fn deploy(
        address: Address,
        king: Address,
        config: TokenConfig,
        directory: &dyn AccountDirectory,
    ) -> Result<Self, LedgerError> {
        identity::validate_pair(&address, &king)?;
        if config.initial_supply == 0 {
            return Err(LedgerError::ZeroInitialSupply);
        }
        if let Some(cap) = config.cap {
            if cap == 0 {
                return Err(LedgerError::ZeroCap);
            }
            if config.initial_supply > cap {
                return Err(LedgerError::CapExceeded {
                    cap,
                    requested: config.initial_supply,
                });
            }
        }

        let mut events = EventLog::new();
        let access = AccessControl::with_policy(king, config.king_policy, directory, &mut events)?;
        let mut ledger = Ledger::new(config.name, config.symbol);
        ledger.mint_to(king, config.initial_supply, &mut events)?;

        info!(
            %address,
            %king,
            symbol = ledger.symbol(),
            supply = config.initial_supply,
            cap = ?config.cap,
            "token deployed"
        );

        Ok(Self {
            address,
            access,
            ledger,
            cap: config.cap,
            pause: config.pausable.then(Pausable::new),
            events,
        })
    }

    // -- reads -------------------------------------------------------------

    /// This token's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        self.ledger.name()
    }

    pub fn symbol(&self) -> &str {
        self.ledger.symbol()
    }

    /// Always 18.
    pub fn decimals(&self) -> u8 {
        self.ledger.decimals()
    }

    pub fn total_supply(&self) -> u128 {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.ledger.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.ledger.allowance(owner, spender)
    }

    /// The supply cap, for capped tokens.
    pub fn cap(&self) -> Option<u128> {
        self.cap
    }

    /// The current king, if kingship has not been renounced.
    pub fn king(&self) -> Option<Address> {
        self.access.king()
    }

    pub fn has_role(&self, role: &Role, account: &Address) -> bool {
        self.access.has_role(role, account)
    }

    /// `false` for tokens without a breaker.
    pub fn is_paused(&self) -> bool {
        self.pause.is_some_and(|p| p.is_paused())
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // -- ledger entry points -----------------------------------------------

    /// Moves `amount` from the caller to `to`.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        to: Address,
        amount: u128,
    ) -> Result<bool, LedgerError> {
        atomically(self, |token| {
            token.ensure_active()?;
            token
                .ledger
                .transfer_between(ctx.caller, to, amount, &mut token.events)?;
            Ok(true)
        })
    }

    /// Sets `spender`'s allowance over the caller's balance. Zero and the
    /// unlimited sentinel are both legal.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        amount: u128,
    ) -> Result<bool, LedgerError> {
        atomically(self, |token| {
            token
                .ledger
                .set_allowance(ctx.caller, spender, amount, &mut token.events)?;
            Ok(true)
        })
    }

    /// Moves `amount` from `from` to `to`, spending the caller's allowance.
    ///
    /// An allowance of [`UNLIMITED_ALLOWANCE`](crown_protocol::config::UNLIMITED_ALLOWANCE)
    /// is never decremented.
    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<bool, LedgerError> {
        atomically(self, |token| {
            token.ensure_active()?;
            token.ledger.spend_allowance(from, ctx.caller, amount)?;
            token
                .ledger
                .transfer_between(from, to, amount, &mut token.events)?;
            Ok(true)
        })
    }

    /// Raises `spender`'s allowance by `added`.
    pub fn increase_allowance(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        added: u128,
    ) -> Result<bool, LedgerError> {
        atomically(self, |token| {
            let current = token.ledger.allowance(&ctx.caller, &spender);
            let raised = current
                .checked_add(added)
                .ok_or(LedgerError::AllowanceOverflow)?;
            token
                .ledger
                .set_allowance(ctx.caller, spender, raised, &mut token.events)?;
            Ok(true)
        })
    }

    /// Lowers `spender`'s allowance by `subtracted`.
    ///
    /// Works on the unlimited sentinel too: the result is an ordinary finite
    /// allowance.
    pub fn decrease_allowance(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        subtracted: u128,
    ) -> Result<bool, LedgerError> {
        atomically(self, |token| {
            let current = token.ledger.allowance(&ctx.caller, &spender);
            if subtracted > current {
                return Err(LedgerError::AllowanceUnderflow { allowance: current });
            }
            token
                .ledger
                .set_allowance(ctx.caller, spender, current - subtracted, &mut token.events)?;
            Ok(true)
        })
    }

    /// Mints `amount` to `to`. Requires `MINTER_ROLE` (or kingship).
    ///
    /// On capped tokens the cap is checked before any state changes.
    pub fn mint(
        &mut self,
        ctx: &CallContext,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        atomically(self, |token| {
            token.access.only_role(&Role::minter(), &ctx.caller)?;
            token.ensure_active()?;
            if let Some(cap) = token.cap {
                let requested = token
                    .ledger
                    .total_supply()
                    .checked_add(amount)
                    .ok_or(LedgerError::SupplyOverflow)?;
                if requested > cap {
                    return Err(LedgerError::CapExceeded { cap, requested });
                }
            }
            token.ledger.mint_to(to, amount, &mut token.events)
        })
    }

    /// Burns `amount` of the caller's own balance.
    pub fn burn(&mut self, ctx: &CallContext, amount: u128) -> Result<(), LedgerError> {
        atomically(self, |token| {
            token.ensure_active()?;
            token
                .ledger
                .burn_from_balance(ctx.caller, amount, &mut token.events)
        })
    }

    /// Burns `amount` from `from`. Requires `BURNER_ROLE` (or kingship).
    pub fn burn_from(
        &mut self,
        ctx: &CallContext,
        from: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        atomically(self, |token| {
            token.access.only_role(&Role::burner(), &ctx.caller)?;
            token.ensure_active()?;
            token.ledger.burn_from_balance(from, amount, &mut token.events)
        })
    }

    // -- access entry points -----------------------------------------------

    pub fn grant_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
    ) -> Result<(), LedgerError> {
        atomically(self, |token| {
            Ok(token
                .access
                .grant_role(ctx, role, account, &mut token.events)?)
        })
    }

    pub fn revoke_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
    ) -> Result<(), LedgerError> {
        atomically(self, |token| {
            Ok(token
                .access
                .revoke_role(ctx, role, account, &mut token.events)?)
        })
    }

    /// Drops one of the caller's roles. A no-op for the king.
    pub fn renounce_role(&mut self, ctx: &CallContext, role: Role) {
        self.access.renounce_role(ctx, role, &mut self.events);
    }

    pub fn transfer_king_role(
        &mut self,
        ctx: &CallContext,
        new_king: Address,
        directory: &dyn AccountDirectory,
    ) -> Result<(), LedgerError> {
        atomically(self, |token| {
            Ok(token
                .access
                .transfer_king_role(ctx, new_king, directory, &mut token.events)?)
        })
    }

    pub fn renounce_kingship(&mut self, ctx: &CallContext) -> Result<(), LedgerError> {
        atomically(self, |token| {
            Ok(token.access.renounce_kingship(ctx, &mut token.events)?)
        })
    }

    // -- pause entry points ------------------------------------------------

    /// Halts transfers, mint and burn. King-only.
    pub fn pause(&mut self, ctx: &CallContext) -> Result<(), LedgerError> {
        atomically(self, |token| {
            let pause = token.pause.as_mut().ok_or(LedgerError::NotPausable)?;
            Ok(pause.pause(ctx, &token.access, &mut token.events)?)
        })
    }

    /// Resumes transfers, mint and burn. King-only.
    pub fn activate(&mut self, ctx: &CallContext) -> Result<(), LedgerError> {
        atomically(self, |token| {
            let pause = token.pause.as_mut().ok_or(LedgerError::NotPausable)?;
            Ok(pause.activate(ctx, &token.access, &mut token.events)?)
        })
    }

    fn ensure_active(&self) -> Result<(), LedgerError> {
        if let Some(pause) = &self.pause {
            pause.ensure_active()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessError;
    use crate::context::NoContracts;
    use crate::events::Event;
    use crate::pausable::PauseError;
    use crown_protocol::config::UNLIMITED_ALLOWANCE;

    fn deploy(config: TokenConfig) -> (Token, Address) {
        let king = Address::derive("king");
        let token = Token::deploy(Address::derive("token"), king, config, &NoContracts).unwrap();
        (token, king)
    }

    #[test]
    fn deploy_credits_king() {
        let (token, king) = deploy(TokenConfig::new("Crown", "CRN", 1_000));
        assert_eq!(token.balance_of(&king), 1_000);
        assert_eq!(token.total_supply(), 1_000);
        assert_eq!(token.king(), Some(king));
        assert_eq!(token.cap(), None);
        let names: Vec<_> = token.events().entries().iter().map(Event::name).collect();
        assert_eq!(names, ["RoleGranted", "Transfer", "Minted"]);
    }

    #[test]
    fn deploy_validation() {
        let king = Address::derive("king");
        let at = Address::derive("token");
        assert_eq!(
            Token::deploy(at, king, TokenConfig::new("A", "A", 0), &NoContracts).unwrap_err(),
            LedgerError::ZeroInitialSupply
        );
        assert!(matches!(
            Token::deploy(at, Address::ZERO, TokenConfig::new("A", "A", 1), &NoContracts),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert_eq!(
            Token::deploy(at, king, TokenConfig::new("A", "A", 1).with_cap(0), &NoContracts)
                .unwrap_err(),
            LedgerError::ZeroCap
        );
        assert_eq!(
            Token::deploy(at, king, TokenConfig::new("A", "A", 11).with_cap(10), &NoContracts)
                .unwrap_err(),
            LedgerError::CapExceeded {
                cap: 10,
                requested: 11
            }
        );
    }

    #[test]
    fn failed_call_leaves_no_events() {
        let (mut token, _) = deploy(TokenConfig::new("Crown", "CRN", 10));
        let before = token.events().len();
        let stranger = CallContext::from(Address::derive("stranger"));
        assert!(token.transfer(&stranger, Address::derive("x"), 1).is_err());
        assert_eq!(token.events().len(), before);
    }

    #[test]
    fn transfer_from_rolls_back_allowance_on_bad_recipient() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 100));
        let spender = Address::derive("spender");
        token.approve(&CallContext::from(king), spender, 50).unwrap();

        let err = token
            .transfer_from(&CallContext::from(spender), king, Address::ZERO, 10)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
        assert_eq!(token.allowance(&king, &spender), 50);
    }

    #[test]
    fn mint_requires_role() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 100));
        let minter = Address::derive("minter");
        let ctx = CallContext::from(minter);

        assert!(matches!(
            token.mint(&ctx, minter, 5),
            Err(LedgerError::Access(AccessError::Unauthorized { .. }))
        ));

        token
            .grant_role(&CallContext::from(king), Role::minter(), minter)
            .unwrap();
        token.mint(&ctx, minter, 5).unwrap();
        assert_eq!(token.total_supply(), 105);
    }

    #[test]
    fn cap_checked_before_mint() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 90).with_cap(100));
        let ctx = CallContext::from(king);
        token.mint(&ctx, king, 10).unwrap();
        let before = token.events().len();
        assert_eq!(
            token.mint(&ctx, king, 1),
            Err(LedgerError::CapExceeded {
                cap: 100,
                requested: 101
            })
        );
        assert_eq!(token.total_supply(), 100);
        assert_eq!(token.events().len(), before);
    }

    #[test]
    fn allowance_helpers() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 100));
        let ctx = CallContext::from(king);
        let spender = Address::derive("spender");
        token.increase_allowance(&ctx, spender, 10).unwrap();
        token.decrease_allowance(&ctx, spender, 4).unwrap();
        assert_eq!(token.allowance(&king, &spender), 6);
        assert_eq!(
            token.decrease_allowance(&ctx, spender, 7),
            Err(LedgerError::AllowanceUnderflow { allowance: 6 })
        );
        token.approve(&ctx, spender, UNLIMITED_ALLOWANCE).unwrap();
        assert_eq!(
            token.increase_allowance(&ctx, spender, 1),
            Err(LedgerError::AllowanceOverflow)
        );
    }

    #[test]
    fn pause_gates_value_movement() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 100).pausable());
        let ctx = CallContext::from(king);
        token.pause(&ctx).unwrap();
        assert!(token.is_paused());
        assert_eq!(
            token.transfer(&ctx, Address::derive("bob"), 1),
            Err(LedgerError::Pause(PauseError::Paused))
        );
        assert_eq!(token.burn(&ctx, 1), Err(LedgerError::Pause(PauseError::Paused)));
        // Approvals are not value movement.
        assert!(token.approve(&ctx, Address::derive("bob"), 1).is_ok());
        token.activate(&ctx).unwrap();
        assert!(token.transfer(&ctx, Address::derive("bob"), 1).is_ok());
    }

    #[test]
    fn unpausable_token_refuses_pause() {
        let (mut token, king) = deploy(TokenConfig::new("Crown", "CRN", 100));
        assert_eq!(
            token.pause(&CallContext::from(king)),
            Err(LedgerError::NotPausable)
        );
        assert!(!token.is_paused());
    }
}
