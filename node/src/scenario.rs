//! # Scenario Files
//!
//! A scenario is a JSON document that names its actors, declares a token
//! and/or a claim vault, and lists the calls to make against them:
//!
//! ```json
//! {
//!   "version": 1,
//!   "king": "king",
//!   "funds": { "dora": 10 },
//!   "token": { "name": "Crown", "symbol": "CRN", "initial_supply": 1000 },
//!   "vault": true,
//!   "steps": [
//!     { "op": "transfer", "from": "king", "to": "alice", "amount": 300 },
//!     { "op": "deposit", "from": "dora", "amount": 5 },
//!     { "op": "claim", "caller": "dora" }
//!   ]
//! }
//! ```
//!
//! Actors are referred to by label. A label is turned into an address with
//! [`Address::derive`]; `0x`-prefixed hex is taken literally; `@token` and
//! `@vault` name the deployed contracts.
//!
//! Every step is a separate atomic call. A failing step is reported and
//! leaves no state behind; the runner then moves on to the next step.

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crown_contracts::access::{KingPolicy, Role};
use crown_contracts::bank::{BankError, NativeBank};
use crown_contracts::claim_vault::{ClaimVault, VaultError};
use crown_contracts::context::CallContext;
use crown_contracts::events::Event;
use crown_contracts::ledger::LedgerError;
use crown_contracts::token::{Token, TokenConfig};
use crown_protocol::config::{SCENARIO_FORMAT_VERSION, UNLIMITED_ALLOWANCE};
use crown_protocol::identity::{Address, AddressError};

use crate::metrics::RunMetrics;

const TOKEN_LABEL: &str = "@token";
const VAULT_LABEL: &str = "@vault";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a scenario or one of its steps could not be carried out.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("unsupported scenario version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("actor {label:?}: {source}")]
    Actor {
        label: String,
        #[source]
        source: AddressError,
    },

    #[error("step {index} ({op}) needs a {contract}, but the scenario does not declare one")]
    MissingContract {
        index: usize,
        op: &'static str,
        contract: &'static str,
    },

    #[error("invalid call data: {0}")]
    CallData(#[from] hex::FromHexError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Bank(#[from] BankError),
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A token or native amount.
///
/// JSON numbers cannot carry the whole `u128` range, so amounts may also
/// be written as decimal strings. `"unlimited"` stands for the unlimited
/// allowance sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Amount(pub u128);

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer, a decimal string or \"unlimited\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v.into()))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u128::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom("amount cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                if v.eq_ignore_ascii_case("unlimited") {
                    return Ok(Amount(UNLIMITED_ALLOWANCE));
                }
                v.parse().map(Amount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

// ---------------------------------------------------------------------------
// Scenario document
// ---------------------------------------------------------------------------

/// Which contract an administrative step addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    #[default]
    Token,
    Vault,
}

/// One call against the deployed contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Transfer { from: String, to: String, amount: Amount },
    Approve { owner: String, spender: String, amount: Amount },
    TransferFrom { spender: String, from: String, to: String, amount: Amount },
    IncreaseAllowance { owner: String, spender: String, amount: Amount },
    DecreaseAllowance { owner: String, spender: String, amount: Amount },
    Mint { caller: String, to: String, amount: Amount },
    Burn { from: String, amount: Amount },
    BurnFrom { caller: String, from: String, amount: Amount },
    GrantRole { caller: String, role: Role, account: String },
    RevokeRole { caller: String, role: Role, account: String },
    RenounceRole { caller: String, role: Role },
    TransferKingship {
        #[serde(default)]
        target: Target,
        caller: String,
        new_king: String,
    },
    RenounceKingship {
        #[serde(default)]
        target: Target,
        caller: String,
    },
    Pause { caller: String },
    Activate { caller: String },
    /// Credits fresh native value to an actor.
    Fund { account: String, amount: Amount },
    /// Sends native value to the vault; with `data`, through its fallback.
    Deposit {
        from: String,
        amount: Amount,
        #[serde(default)]
        data: Option<String>,
    },
    Claim {
        caller: String,
        #[serde(default)]
        to: Option<String>,
    },
    SetDepositsOpen { caller: String, open: bool },
}

impl Step {
    /// The step's `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Step::Transfer { .. } => "transfer",
            Step::Approve { .. } => "approve",
            Step::TransferFrom { .. } => "transfer_from",
            Step::IncreaseAllowance { .. } => "increase_allowance",
            Step::DecreaseAllowance { .. } => "decrease_allowance",
            Step::Mint { .. } => "mint",
            Step::Burn { .. } => "burn",
            Step::BurnFrom { .. } => "burn_from",
            Step::GrantRole { .. } => "grant_role",
            Step::RevokeRole { .. } => "revoke_role",
            Step::RenounceRole { .. } => "renounce_role",
            Step::TransferKingship { .. } => "transfer_kingship",
            Step::RenounceKingship { .. } => "renounce_kingship",
            Step::Pause { .. } => "pause",
            Step::Activate { .. } => "activate",
            Step::Fund { .. } => "fund",
            Step::Deposit { .. } => "deposit",
            Step::Claim { .. } => "claim",
            Step::SetDepositsOpen { .. } => "set_deposits_open",
        }
    }

    /// The contract this step calls, if any.
    fn target(&self) -> Option<Target> {
        match self {
            Step::Fund { .. } => None,
            Step::Deposit { .. } | Step::Claim { .. } | Step::SetDepositsOpen { .. } => {
                Some(Target::Vault)
            }
            Step::TransferKingship { target, .. } | Step::RenounceKingship { target, .. } => {
                Some(*target)
            }
            _ => Some(Target::Token),
        }
    }

    /// Every actor label the step mentions.
    fn labels(&self) -> Vec<&str> {
        let labels: Vec<&String> = match self {
            Step::Transfer { from, to, .. } => vec![from, to],
            Step::Approve { owner, spender, .. }
            | Step::IncreaseAllowance { owner, spender, .. }
            | Step::DecreaseAllowance { owner, spender, .. } => vec![owner, spender],
            Step::TransferFrom { spender, from, to, .. } => vec![spender, from, to],
            Step::Mint { caller, to, .. } => vec![caller, to],
            Step::Burn { from, .. } | Step::Deposit { from, .. } => vec![from],
            Step::BurnFrom { caller, from, .. } => vec![caller, from],
            Step::GrantRole { caller, account, .. } | Step::RevokeRole { caller, account, .. } => {
                vec![caller, account]
            }
            Step::RenounceRole { caller, .. }
            | Step::RenounceKingship { caller, .. }
            | Step::Pause { caller }
            | Step::Activate { caller }
            | Step::SetDepositsOpen { caller, .. } => vec![caller],
            Step::TransferKingship { caller, new_king, .. } => vec![caller, new_king],
            Step::Fund { account, .. } => vec![account],
            Step::Claim { caller, to } => std::iter::once(caller).chain(to).collect(),
        };
        labels.into_iter().map(String::as_str).collect()
    }
}

/// A parsed scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    /// Label of the principal that deploys and administers the contracts.
    pub king: String,
    /// Native value credited to actors before the first step.
    #[serde(default)]
    pub funds: BTreeMap<String, Amount>,
    /// Labels registered as contracts, for king policies that care.
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub token: Option<TokenConfig>,
    #[serde(default)]
    pub vault: bool,
    /// King policy of the vault.
    #[serde(default)]
    pub vault_king_policy: KingPolicy,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_version() -> u32 {
    SCENARIO_FORMAT_VERSION
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Checks everything that can be checked without executing: the format
    /// version, every actor label, and that each step's contract exists.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.version != SCENARIO_FORMAT_VERSION {
            return Err(ScenarioError::Version {
                found: self.version,
                expected: SCENARIO_FORMAT_VERSION,
            });
        }

        // Contract addresses are only known after deployment; any
        // stand-ins will do for label resolution.
        let stand_in = Actors::new(Address::derive(TOKEN_LABEL), Address::derive(VAULT_LABEL));
        stand_in.resolve(&self.king)?;
        for label in self.funds.keys().chain(&self.contracts) {
            stand_in.resolve(label)?;
        }

        for (index, step) in self.steps.iter().enumerate() {
            for label in step.labels() {
                stand_in.resolve(label)?;
            }
            let missing = match step.target() {
                Some(Target::Token) if self.token.is_none() => Some("token"),
                Some(Target::Vault) if !self.vault => Some("vault"),
                _ => None,
            };
            if let Some(contract) = missing {
                return Err(ScenarioError::MissingContract {
                    index,
                    op: step.op(),
                    contract,
                });
            }
            if let Step::Deposit { data: Some(data), .. } = step {
                decode_call_data(data)?;
            }
        }
        Ok(())
    }
}

fn decode_call_data(data: &str) -> Result<Vec<u8>, ScenarioError> {
    Ok(hex::decode(data.strip_prefix("0x").unwrap_or(data))?)
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Resolves labels to addresses.
struct Actors {
    token: Address,
    vault: Address,
}

impl Actors {
    fn new(token: Address, vault: Address) -> Self {
        Self { token, vault }
    }

    fn resolve(&self, label: &str) -> Result<Address, ScenarioError> {
        match label {
            TOKEN_LABEL => Ok(self.token),
            VAULT_LABEL => Ok(self.vault),
            hex if hex.starts_with("0x") => {
                Address::from_hex(hex).map_err(|source| ScenarioError::Actor {
                    label: label.to_string(),
                    source,
                })
            }
            _ => Ok(Address::derive(label)),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// What happened to one step. Printed as a JSON line.
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub events: Vec<Event>,
}

/// Final state after the last step. Printed as the last JSON line.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steps: usize,
    pub reverted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultSummary>,
}

#[derive(Debug, Serialize)]
pub struct TokenSummary {
    pub address: Address,
    pub king: Option<Address>,
    pub total_supply: u128,
    pub cap: Option<u128>,
    pub paused: bool,
    pub balances: BTreeMap<Address, u128>,
}

#[derive(Debug, Serialize)]
pub struct VaultSummary {
    pub address: Address,
    pub king: Option<Address>,
    pub total_mistaken_eth: u128,
    pub total_recorded_mistaken_eth: u128,
    pub held: u128,
}

/// Deployed contracts plus the native bank they live in.
pub struct Runner {
    bank: NativeBank,
    token: Option<Token>,
    vault: Option<ClaimVault>,
    actors: Actors,
    name: Option<String>,
    executed: usize,
    reverted: usize,
}

impl Runner {
    /// Deploys the contracts a scenario declares and applies its funding.
    pub fn deploy(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let mut bank = NativeBank::new();
        let king = Actors::new(Address::ZERO, Address::ZERO).resolve(&scenario.king)?;

        let token_address = bank.deploy_address(&king);
        let vault_address = bank.deploy_address(&king);
        let actors = Actors::new(token_address, vault_address);

        for label in &scenario.contracts {
            bank.register_contract(actors.resolve(label)?);
        }

        let token = match &scenario.token {
            Some(config) => Some(Token::deploy(token_address, king, config.clone(), &bank)?),
            None => None,
        };
        let vault = if scenario.vault {
            Some(ClaimVault::deploy_with_policy(
                vault_address,
                king,
                scenario.vault_king_policy,
                &bank,
            )?)
        } else {
            None
        };

        for (label, amount) in &scenario.funds {
            bank.fund(actors.resolve(label)?, amount.0)?;
        }

        info!(
            %king,
            token = token.is_some(),
            vault = vault.is_some(),
            "scenario deployed"
        );
        Ok(Self {
            bank,
            token,
            vault,
            actors,
            name: scenario.name.clone(),
            executed: 0,
            reverted: 0,
        })
    }

    /// Runs one step and reports its outcome and the events it emitted.
    pub fn execute(
        &mut self,
        index: usize,
        step: &Step,
        metrics: Option<&RunMetrics>,
    ) -> StepReport {
        let token_mark = self.token.as_ref().map_or(0, |t| t.events().len());
        let vault_mark = self.vault.as_ref().map_or(0, |v| v.events().len());

        let started = Instant::now();
        let outcome = self.apply(index, step);
        let elapsed = started.elapsed();

        let mut events = Vec::new();
        if let Some(token) = &self.token {
            events.extend_from_slice(token.events().since(token_mark));
        }
        if let Some(vault) = &self.vault {
            events.extend_from_slice(vault.events().since(vault_mark));
        }

        self.executed += 1;
        if outcome.is_err() {
            self.reverted += 1;
        }
        if let Some(metrics) = metrics {
            metrics.steps_executed_total.inc();
            metrics.step_duration_seconds.observe(elapsed.as_secs_f64());
            metrics.events_emitted_total.inc_by(events.len() as u64);
            if outcome.is_err() {
                metrics.steps_reverted_total.inc();
            }
        }

        match outcome {
            Ok(()) => {
                let names: Vec<&str> = events.iter().map(Event::name).collect();
                debug!(index, op = step.op(), events = ?names, "step applied");
                StepReport {
                    index,
                    op: step.op(),
                    ok: true,
                    error: None,
                    events,
                }
            }
            Err(err) => {
                warn!(index, op = step.op(), error = %err, "step reverted");
                StepReport {
                    index,
                    op: step.op(),
                    ok: false,
                    error: Some(err.to_string()),
                    events,
                }
            }
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            name: self.name.clone(),
            steps: self.executed,
            reverted: self.reverted,
            token: self.token.as_ref().map(|t| TokenSummary {
                address: t.address(),
                king: t.king(),
                total_supply: t.total_supply(),
                cap: t.cap(),
                paused: t.is_paused(),
                balances: t
                    .ledger()
                    .balances()
                    .filter(|(_, b)| **b > 0)
                    .map(|(a, b)| (*a, *b))
                    .collect(),
            }),
            vault: self.vault.as_ref().map(|v| VaultSummary {
                address: v.address(),
                king: v.king(),
                total_mistaken_eth: v.total_mistaken_eth(),
                total_recorded_mistaken_eth: v.total_recorded_mistaken_eth(),
                held: self.bank.balance_of(&v.address()),
            }),
        }
    }

    fn token(&mut self, index: usize, op: &'static str) -> Result<&mut Token, ScenarioError> {
        self.token.as_mut().ok_or(ScenarioError::MissingContract {
            index,
            op,
            contract: "token",
        })
    }

    fn vault(&mut self, index: usize, op: &'static str) -> Result<&mut ClaimVault, ScenarioError> {
        self.vault.as_mut().ok_or(ScenarioError::MissingContract {
            index,
            op,
            contract: "vault",
        })
    }

    fn ctx(&self, label: &str) -> Result<CallContext, ScenarioError> {
        Ok(CallContext::from(self.actors.resolve(label)?))
    }

    fn apply(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        let op = step.op();
        match step {
            Step::Transfer { from, to, amount } => {
                let (ctx, to) = (self.ctx(from)?, self.actors.resolve(to)?);
                self.token(index, op)?.transfer(&ctx, to, amount.0)?;
            }
            Step::Approve { owner, spender, amount } => {
                let (ctx, spender) = (self.ctx(owner)?, self.actors.resolve(spender)?);
                self.token(index, op)?.approve(&ctx, spender, amount.0)?;
            }
            Step::TransferFrom { spender, from, to, amount } => {
                let ctx = self.ctx(spender)?;
                let (from, to) = (self.actors.resolve(from)?, self.actors.resolve(to)?);
                self.token(index, op)?.transfer_from(&ctx, from, to, amount.0)?;
            }
            Step::IncreaseAllowance { owner, spender, amount } => {
                let (ctx, spender) = (self.ctx(owner)?, self.actors.resolve(spender)?);
                self.token(index, op)?
                    .increase_allowance(&ctx, spender, amount.0)?;
            }
            Step::DecreaseAllowance { owner, spender, amount } => {
                let (ctx, spender) = (self.ctx(owner)?, self.actors.resolve(spender)?);
                self.token(index, op)?
                    .decrease_allowance(&ctx, spender, amount.0)?;
            }
            Step::Mint { caller, to, amount } => {
                let (ctx, to) = (self.ctx(caller)?, self.actors.resolve(to)?);
                self.token(index, op)?.mint(&ctx, to, amount.0)?;
            }
            Step::Burn { from, amount } => {
                let ctx = self.ctx(from)?;
                self.token(index, op)?.burn(&ctx, amount.0)?;
            }
            Step::BurnFrom { caller, from, amount } => {
                let (ctx, from) = (self.ctx(caller)?, self.actors.resolve(from)?);
                self.token(index, op)?.burn_from(&ctx, from, amount.0)?;
            }
            Step::GrantRole { caller, role, account } => {
                let (ctx, account) = (self.ctx(caller)?, self.actors.resolve(account)?);
                self.token(index, op)?.grant_role(&ctx, *role, account)?;
            }
            Step::RevokeRole { caller, role, account } => {
                let (ctx, account) = (self.ctx(caller)?, self.actors.resolve(account)?);
                self.token(index, op)?.revoke_role(&ctx, *role, account)?;
            }
            Step::RenounceRole { caller, role } => {
                let ctx = self.ctx(caller)?;
                self.token(index, op)?.renounce_role(&ctx, *role);
            }
            Step::TransferKingship { target, caller, new_king } => {
                let (ctx, new_king) = (self.ctx(caller)?, self.actors.resolve(new_king)?);
                match target {
                    Target::Token => {
                        let token = self.token.as_mut().ok_or(ScenarioError::MissingContract {
                            index,
                            op,
                            contract: "token",
                        })?;
                        token.transfer_king_role(&ctx, new_king, &self.bank)?;
                    }
                    Target::Vault => {
                        let vault = self.vault.as_mut().ok_or(ScenarioError::MissingContract {
                            index,
                            op,
                            contract: "vault",
                        })?;
                        vault.transfer_king_role(&ctx, new_king, &self.bank)?;
                    }
                }
            }
            Step::RenounceKingship { target, caller } => {
                let ctx = self.ctx(caller)?;
                match target {
                    Target::Token => self.token(index, op)?.renounce_kingship(&ctx)?,
                    Target::Vault => self.vault(index, op)?.renounce_kingship(&ctx)?,
                }
            }
            Step::Pause { caller } => {
                let ctx = self.ctx(caller)?;
                self.token(index, op)?.pause(&ctx)?;
            }
            Step::Activate { caller } => {
                let ctx = self.ctx(caller)?;
                self.token(index, op)?.activate(&ctx)?;
            }
            Step::Fund { account, amount } => {
                let account = self.actors.resolve(account)?;
                self.bank.fund(account, amount.0)?;
            }
            Step::Deposit { from, amount, data } => {
                let from = self.actors.resolve(from)?;
                let vault = self.vault.as_mut().ok_or(ScenarioError::MissingContract {
                    index,
                    op,
                    contract: "vault",
                })?;
                match data {
                    Some(data) => {
                        let data = decode_call_data(data)?;
                        self.bank.call_vault(vault, from, amount.0, &data)?;
                    }
                    None => self.bank.send_to_vault(vault, from, amount.0)?,
                }
            }
            Step::Claim { caller, to } => {
                let ctx = self.ctx(caller)?;
                let to = to.as_deref().map(|l| self.actors.resolve(l)).transpose()?;
                let vault = self.vault.as_mut().ok_or(ScenarioError::MissingContract {
                    index,
                    op,
                    contract: "vault",
                })?;
                match to {
                    Some(to) => vault.claim_mistaken_eth_to(&ctx, to, &mut self.bank)?,
                    None => vault.claim_mistaken_eth(&ctx, &mut self.bank)?,
                };
            }
            Step::SetDepositsOpen { caller, open } => {
                let ctx = self.ctx(caller)?;
                self.vault(index, op)?.set_deposits_open(&ctx, *open)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Scenario {
        serde_json::from_str(json).unwrap()
    }

    fn run(scenario: &Scenario) -> (Runner, Vec<StepReport>) {
        scenario.validate().unwrap();
        let mut runner = Runner::deploy(scenario).unwrap();
        let reports = scenario
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| runner.execute(i, step, None))
            .collect();
        (runner, reports)
    }

    const BASIC: &str = r#"{
        "king": "king",
        "funds": { "dora": 10 },
        "token": { "name": "Crown", "symbol": "CRN", "initial_supply": 1000 },
        "vault": true,
        "steps": [
            { "op": "transfer", "from": "king", "to": "u", "amount": 300 },
            { "op": "transfer", "from": "u", "to": "v", "amount": 400 },
            { "op": "grant_role", "caller": "u", "role": "MINTER_ROLE", "account": "u" },
            { "op": "deposit", "from": "dora", "amount": 5 },
            { "op": "deposit", "from": "dora", "amount": 5, "data": "0xdeadbeef" },
            { "op": "claim", "caller": "dora" }
        ]
    }"#;

    #[test]
    fn basic_scenario_runs() {
        let scenario = parse(BASIC);
        let (runner, reports) = run(&scenario);

        let ok: Vec<bool> = reports.iter().map(|r| r.ok).collect();
        assert_eq!(ok, vec![true, false, false, true, true, true]);
        assert!(reports[1].error.as_deref().unwrap().contains("300"));
        assert!(reports[1].events.is_empty());
        assert!(matches!(reports[5].events.last(), Some(Event::Claimed { amount: 10, .. })));

        let summary = runner.summary();
        assert_eq!(summary.reverted, 2);
        let token = summary.token.unwrap();
        assert_eq!(token.total_supply, 1000);
        assert_eq!(token.balances[&Address::derive("u")], 300);
        let vault = summary.vault.unwrap();
        assert_eq!(vault.total_mistaken_eth, 0);
        assert_eq!(vault.total_recorded_mistaken_eth, 10);
        assert_eq!(vault.held, 0);
    }

    #[test]
    fn unlimited_amounts_parse() {
        let scenario = parse(
            r#"{
                "king": "king",
                "token": { "name": "C", "symbol": "C", "initial_supply": 1000 },
                "steps": [
                    { "op": "approve", "owner": "king", "spender": "s", "amount": "unlimited" },
                    {
                        "op": "transfer_from",
                        "spender": "s",
                        "from": "king",
                        "to": "t",
                        "amount": 10
                    }
                ]
            }"#,
        );
        let (runner, reports) = run(&scenario);
        assert!(reports.iter().all(|r| r.ok));
        let token = runner.token.as_ref().unwrap();
        assert_eq!(
            token.allowance(&Address::derive("king"), &Address::derive("s")),
            UNLIMITED_ALLOWANCE
        );
    }

    #[test]
    fn validation_catches_missing_contracts_and_bad_actors() {
        let scenario = parse(
            r#"{ "king": "king", "steps": [ { "op": "claim", "caller": "dora" } ] }"#,
        );
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::MissingContract { index: 0, contract: "vault", .. })
        ));

        let scenario = parse(r#"{ "king": "0x1234" }"#);
        assert!(matches!(scenario.validate(), Err(ScenarioError::Actor { .. })));

        let scenario = parse(r#"{ "version": 9, "king": "king" }"#);
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::Version { found: 9, .. })
        ));
    }

    #[test]
    fn claim_to_the_vault_itself_is_rejected() {
        let scenario = parse(
            r#"{
                "king": "king",
                "funds": { "dora": 3 },
                "vault": true,
                "steps": [
                    { "op": "deposit", "from": "dora", "amount": 3 },
                    { "op": "claim", "caller": "dora", "to": "@vault" }
                ]
            }"#,
        );
        let (runner, reports) = run(&scenario);
        assert!(reports[0].ok);
        assert!(!reports[1].ok);
        assert_eq!(runner.summary().vault.unwrap().held, 3);
    }

    #[test]
    fn unknown_op_is_a_parse_error() {
        let err = serde_json::from_str::<Scenario>(
            r#"{ "king": "k", "steps": [ { "op": "selfdestruct" } ] }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn load_reads_files_and_names_the_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basic.json");
        std::fs::write(&path, BASIC).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.steps.len(), 6);

        let missing = Scenario::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{missing:#}").contains("nope.json"));
    }

    #[test]
    fn shipped_demo_runs() {
        let scenario = parse(include_str!("../scenarios/basic.json"));
        let (runner, reports) = run(&scenario);

        let failed: Vec<usize> = reports.iter().filter(|r| !r.ok).map(|r| r.index).collect();
        assert_eq!(failed, vec![1, 2, 9, 13]);

        let summary = runner.summary();
        let token = summary.token.unwrap();
        assert_eq!(token.total_supply, 1250);
        assert_eq!(token.king, Some(Address::derive("heir")));
        assert_eq!(summary.vault.unwrap().king, None);
    }
}
