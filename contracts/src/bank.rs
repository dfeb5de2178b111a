//! # Native Value Host
//!
//! [`NativeBank`] keeps the native-value balances of every principal and
//! plays the role of the chain when value moves: it debits, credits and,
//! when the recipient is a contract with receive logic, runs that logic
//! before the transfer is considered final.
//!
//! Receive logic is a [`ReceiveHook`]. A hook gets mutable access to the
//! vault that is paying it and to the bank itself, so it can deposit, claim
//! or do anything else an on-chain contract could do mid-transfer. A hook
//! that is already running is not run again: value sent to it from inside
//! its own call lands as a plain transfer.
//!
//! A hook that returns `Err` rejects the value. The bank is
//! [`Transactional`], and every value movement runs under [`atomically`],
//! so a rejection restores the whole bank as it was before the transfer:
//! balances, contract registrations, deployment nonces and installed hooks,
//! including whatever the hook changed through the bank. The rejection is
//! reported as [`TransferRejected`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::claim_vault::{ClaimVault, TransferRejected, ValueSink, VaultError};
use crate::context::{atomically, AccountDirectory, CallContext, Transactional};
use crown_protocol::identity::Address;

/// Errors from native-value movements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("insufficient native balance for {account}: have {balance}, need {requested}")]
    InsufficientNative {
        account: Address,
        balance: u128,
        requested: u128,
    },

    #[error("native balance overflow")]
    Overflow,

    /// The receiving vault refused the value; nothing moved.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Contract code that runs when the contract is sent native value.
pub trait ReceiveHook {
    /// Called after `amount` has been credited to the hook's owner.
    /// `from` is the principal that sent it. Returning `Err` reverts the
    /// transfer with the returned reason.
    fn on_receive(
        &mut self,
        vault: &mut ClaimVault,
        bank: &mut NativeBank,
        from: Address,
        amount: u128,
    ) -> Result<(), String>;
}

type HookCell = Rc<RefCell<Box<dyn ReceiveHook>>>;

/// Native-value balances plus the contract registry.
#[derive(Default)]
pub struct NativeBank {
    balances: BTreeMap<Address, u128>,
    contracts: BTreeSet<Address>,
    nonces: BTreeMap<Address, u64>,
    hooks: HashMap<Address, HookCell>,
}

/// Saved bank state for rollback. Hooks are shared handles, so saving the
/// table is cheap; a hook's own internal state is not rolled back.
pub struct BankCheckpoint {
    balances: BTreeMap<Address, u128>,
    contracts: BTreeSet<Address>,
    nonces: BTreeMap<Address, u64>,
    hooks: HashMap<Address, HookCell>,
}

impl Transactional for NativeBank {
    type Checkpoint = BankCheckpoint;

    fn checkpoint(&self) -> BankCheckpoint {
        BankCheckpoint {
            balances: self.balances.clone(),
            contracts: self.contracts.clone(),
            nonces: self.nonces.clone(),
            hooks: self.hooks.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: BankCheckpoint) {
        self.balances = checkpoint.balances;
        self.contracts = checkpoint.contracts;
        self.nonces = checkpoint.nonces;
        self.hooks = checkpoint.hooks;
    }
}

impl fmt::Debug for NativeBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBank")
            .field("balances", &self.balances)
            .field("contracts", &self.contracts)
            .field("nonces", &self.nonces)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl NativeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits fresh native value to `to`. Used to seed test accounts.
    pub fn fund(&mut self, to: Address, amount: u128) -> Result<(), BankError> {
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(BankError::Overflow)?;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total_native(&self) -> Result<u128, BankError> {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .ok_or(BankError::Overflow)
    }

    /// Allocates the next contract address for `deployer` and records it
    /// as a contract.
    pub fn deploy_address(&mut self, deployer: &Address) -> Address {
        let nonce = self.nonces.entry(*deployer).or_insert(0);
        let address = Address::for_contract(deployer, *nonce);
        *nonce += 1;
        self.contracts.insert(address);
        address
    }

    /// Marks `address` as a contract without receive logic.
    pub fn register_contract(&mut self, address: Address) {
        self.contracts.insert(address);
    }

    /// Installs receive logic at `address`, replacing any previous hook.
    pub fn install_hook(&mut self, address: Address, hook: Box<dyn ReceiveHook>) {
        self.contracts.insert(address);
        self.hooks.insert(address, Rc::new(RefCell::new(hook)));
    }

    pub fn has_hook(&self, address: &Address) -> bool {
        self.hooks.contains_key(address)
    }

    /// Moves value between two principals without running any hook.
    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), BankError> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(BankError::InsufficientNative {
                account: from,
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(BankError::Overflow)?;

        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, to_balance);
        trace!(%from, %to, amount, "native transfer");
        Ok(())
    }

    /// `from` sends `amount` to the vault with no call data, landing in
    /// its `receive` path.
    pub fn send_to_vault(
        &mut self,
        vault: &mut ClaimVault,
        from: Address,
        amount: u128,
    ) -> Result<(), BankError> {
        self.pay_vault(vault, from, amount, None)
    }

    /// `from` calls the vault with unknown call data and `amount` attached,
    /// landing in its `fallback` path.
    pub fn call_vault(
        &mut self,
        vault: &mut ClaimVault,
        from: Address,
        amount: u128,
        data: &[u8],
    ) -> Result<(), BankError> {
        self.pay_vault(vault, from, amount, Some(data))
    }

    fn pay_vault(
        &mut self,
        vault: &mut ClaimVault,
        from: Address,
        amount: u128,
        data: Option<&[u8]>,
    ) -> Result<(), BankError> {
        atomically(self, |bank| {
            bank.transfer(from, vault.address(), amount)?;

            let ctx = CallContext::with_value(from, amount);
            match data {
                Some(data) => vault.fallback(&ctx, data)?,
                None => vault.receive(&ctx)?,
            }
            Ok(())
        })
    }
}

impl ValueSink for NativeBank {
    fn send(
        &mut self,
        vault: &mut ClaimVault,
        to: Address,
        amount: u128,
    ) -> Result<(), TransferRejected> {
        let from = vault.address();
        atomically(self, |bank| {
            bank.transfer(from, to, amount)
                .map_err(|err| TransferRejected::new(err.to_string()))?;

            let Some(cell) = bank.hooks.get(&to).cloned() else {
                return Ok(());
            };
            let Ok(mut hook) = cell.try_borrow_mut() else {
                trace!(%to, "receive hook already running");
                return Ok(());
            };
            debug!(%to, amount, "running receive hook");
            let outcome = hook.on_receive(vault, bank, from, amount);
            outcome.map_err(TransferRejected::new)
        })
    }
}

impl AccountDirectory for NativeBank {
    fn is_contract(&self, address: &Address) -> bool {
        self.contracts.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refund;

    impl ReceiveHook for Refund {
        fn on_receive(
            &mut self,
            _: &mut ClaimVault,
            _: &mut NativeBank,
            _: Address,
            _: u128,
        ) -> Result<(), String> {
            Err("no thanks".into())
        }
    }

    /// Leaves traces in the bank's registry, then refuses the value.
    struct Squatter {
        ghost: Address,
    }

    impl ReceiveHook for Squatter {
        fn on_receive(
            &mut self,
            _: &mut ClaimVault,
            bank: &mut NativeBank,
            from: Address,
            _: u128,
        ) -> Result<(), String> {
            bank.register_contract(self.ghost);
            bank.deploy_address(&from);
            bank.install_hook(self.ghost, Box::new(Refund));
            Err("changed my mind".into())
        }
    }

    fn setup() -> (NativeBank, ClaimVault) {
        let mut bank = NativeBank::new();
        let king = Address::derive("king");
        let addr = bank.deploy_address(&king);
        let vault = ClaimVault::deploy(addr, king).unwrap();
        (bank, vault)
    }

    #[test]
    fn deploy_addresses_are_distinct_contracts() {
        let mut bank = NativeBank::new();
        let d = Address::derive("deployer");
        let a = bank.deploy_address(&d);
        let b = bank.deploy_address(&d);
        assert_ne!(a, b);
        assert!(bank.is_contract(&a));
        assert!(!bank.is_contract(&d));
    }

    #[test]
    fn transfer_checks_balance() {
        let mut bank = NativeBank::new();
        let a = Address::derive("a");
        let b = Address::derive("b");
        bank.fund(a, 5).unwrap();
        assert!(matches!(
            bank.transfer(a, b, 6),
            Err(BankError::InsufficientNative { balance: 5, requested: 6, .. })
        ));
        bank.transfer(a, b, 5).unwrap();
        assert_eq!(bank.balance_of(&b), 5);
        assert_eq!(bank.total_native().unwrap(), 5);
    }

    #[test]
    fn vault_deposit_moves_value() {
        let (mut bank, mut vault) = setup();
        let dora = Address::derive("dora");
        bank.fund(dora, 10).unwrap();

        bank.send_to_vault(&mut vault, dora, 4).unwrap();
        bank.call_vault(&mut vault, dora, 6, b"oops").unwrap();

        assert_eq!(bank.balance_of(&vault.address()), 10);
        assert_eq!(vault.total_mistaken_eth(), 10);
        assert_eq!(bank.balance_of(&dora), 0);
    }

    #[test]
    fn refused_deposit_restores_balances() {
        let (mut bank, mut vault) = setup();
        let dora = Address::derive("dora");
        bank.fund(dora, 10).unwrap();

        let err = bank.send_to_vault(&mut vault, dora, 0).unwrap_err();
        assert_eq!(err, BankError::Vault(VaultError::AmountTooLow));
        assert_eq!(bank.balance_of(&dora), 10);
    }

    #[test]
    fn rejecting_hook_reverts_payout() {
        let (mut bank, mut vault) = setup();
        let wallet = bank.deploy_address(&Address::derive("someone"));
        bank.install_hook(wallet, Box::new(Refund));
        bank.fund(wallet, 3).unwrap();
        bank.send_to_vault(&mut vault, wallet, 3).unwrap();

        let err = vault
            .claim_mistaken_eth(&CallContext::from(wallet), &mut bank)
            .unwrap_err();

        assert!(matches!(err, VaultError::ClaimFailed { ref reason, .. } if reason == "no thanks"));
        assert_eq!(bank.balance_of(&vault.address()), 3);
        assert_eq!(vault.user_mistaken_eth_balance(&wallet), 3);
        assert!(bank.has_hook(&wallet));
    }

    #[test]
    fn rejected_payout_reverts_registry_changes() {
        let (mut bank, mut vault) = setup();
        let wallet = bank.deploy_address(&Address::derive("someone"));
        let ghost = Address::derive("ghost");
        bank.install_hook(wallet, Box::new(Squatter { ghost }));
        bank.fund(wallet, 3).unwrap();
        bank.send_to_vault(&mut vault, wallet, 3).unwrap();

        // The next address the vault would deploy, had the hook's call stuck.
        let mut twin = NativeBank::new();
        let king = Address::derive("king");
        twin.deploy_address(&king);
        let expected_next = twin.deploy_address(&vault.address());

        let err = vault
            .claim_mistaken_eth(&CallContext::from(wallet), &mut bank)
            .unwrap_err();

        assert!(matches!(err, VaultError::ClaimFailed { .. }));
        assert!(!bank.is_contract(&ghost));
        assert!(!bank.has_hook(&ghost));
        assert_eq!(bank.deploy_address(&vault.address()), expected_next);
        assert_eq!(bank.balance_of(&vault.address()), 3);
        assert_eq!(bank.balance_of(&wallet), 0);
    }

    #[test]
    fn hook_sending_to_itself_is_a_plain_transfer() {
        struct Echo {
            me: Address,
        }

        impl ReceiveHook for Echo {
            fn on_receive(
                &mut self,
                vault: &mut ClaimVault,
                bank: &mut NativeBank,
                _: Address,
                amount: u128,
            ) -> Result<(), String> {
                // Bounce through the vault's sink back to ourselves.
                bank.fund(vault.address(), amount).map_err(|e| e.to_string())?;
                bank.send(vault, self.me, amount).map_err(|e| e.reason)
            }
        }

        let (mut bank, mut vault) = setup();
        let wallet = bank.deploy_address(&Address::derive("echo"));
        bank.install_hook(wallet, Box::new(Echo { me: wallet }));
        bank.fund(wallet, 2).unwrap();
        bank.send_to_vault(&mut vault, wallet, 2).unwrap();

        assert_eq!(
            vault.claim_mistaken_eth(&CallContext::from(wallet), &mut bank),
            Ok(2)
        );
        assert_eq!(bank.balance_of(&wallet), 4);
        assert!(bank.has_hook(&wallet));
    }
}
