//! # Access Control
//!
//! One king, many delegated roles. The king is the administrative
//! principal of a contract: it alone grants and revokes roles, hands
//! kingship to a successor, or abdicates. Holding the king role also
//! satisfies every role gate, so a king can mint even without
//! `MINTER_ROLE`.
//!
//! ## State
//!
//! Delegated roles live in a `(role, principal) -> bool` map. Entries are
//! never deleted; a revoked role is a stored `false`. Kingship itself is a
//! single `Option<Address>` owned here and nowhere else. Contracts that
//! embed an [`AccessControl`] ask it who the king is instead of keeping a
//! copy, so a transfer can never leave two components disagreeing.
//!
//! ## Variants
//!
//! EOA-only kings, contract-only kings and immutable kings are the same
//! component with a different [`KingPolicy`]. The policy is consulted when
//! the contract is constructed and whenever kingship changes hands.
//!
//! ## Ordering
//!
//! Every mutating operation validates fully, then mutates, then emits. An
//! operation that fails has emitted nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::context::{AccountDirectory, CallContext};
use crate::events::{Event, EventLog};
use crown_protocol::config::{
    BURNER_ROLE_NAME, KING_ROLE_NAME, MINTER_ROLE_NAME, ROLE_HASH_CONTEXT, ROLE_LENGTH,
};
use crown_protocol::crypto::domain_separated_hash;
use crown_protocol::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by role checks and role management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The null principal was offered as a role holder or king.
    #[error("invalid principal: the null address cannot hold a role")]
    InvalidPrincipal,

    /// The caller lacks both kingship and the required role.
    #[error("unauthorized: {caller} does not hold {role}")]
    Unauthorized {
        /// The principal that attempted the call.
        caller: Address,
        /// The role the operation requires.
        role: Role,
    },

    /// `grant_role`/`revoke_role` was used on the king role.
    #[error("the king role can only change hands through a kingship transfer or renouncement")]
    KingRoleReserved,

    /// The candidate does not satisfy the contract's king policy.
    #[error("king rejected: {candidate} is not acceptable under the {policy} policy")]
    KingRejected {
        /// The principal that was proposed as king.
        candidate: Address,
        /// The policy it failed.
        policy: KingPolicy,
    },

    /// Kingship is fixed for the lifetime of this contract.
    #[error("kingship is immutable for this contract")]
    KingImmutable,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A 32-byte role tag, derived from the role's name.
///
/// In scenario files a role may be written either by name (`"MINTER_ROLE"`)
/// or as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role([u8; ROLE_LENGTH]);

impl Role {
    /// Derives the tag for a role name.
    pub fn named(name: &str) -> Self {
        Self(domain_separated_hash(ROLE_HASH_CONTEXT, name.as_bytes()))
    }

    /// The super-role.
    pub fn king() -> Self {
        Self::named(KING_ROLE_NAME)
    }

    /// Gate for minting.
    pub fn minter() -> Self {
        Self::named(MINTER_ROLE_NAME)
    }

    /// Gate for burning from other principals.
    pub fn burner() -> Self {
        Self::named(BURNER_ROLE_NAME)
    }

    /// Returns `true` for the king role.
    pub fn is_king(&self) -> bool {
        *self == Self::king()
    }

    /// `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// The well-known name for this tag, if it is one of ours.
    pub fn known_name(&self) -> Option<&'static str> {
        [KING_ROLE_NAME, MINTER_ROLE_NAME, BURNER_ROLE_NAME]
            .into_iter()
            .find(|name| Self::named(name) == *self)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => write!(f, "Role({})", name),
            None => write!(f, "Role({}..)", &self.to_hex()[..12]),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => f.write_str(name),
            None => f.write_str(&self.to_hex()),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let Some(digits) = value.strip_prefix("0x") else {
            return Ok(Self::named(&value));
        };
        let bytes = hex::decode(digits)?;
        if bytes.len() != ROLE_LENGTH {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; ROLE_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_hex()
    }
}

// ---------------------------------------------------------------------------
// KingPolicy
// ---------------------------------------------------------------------------

/// Who may hold kingship, and whether it may ever move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KingPolicy {
    /// Any non-null principal.
    #[default]
    Open,
    /// Only externally owned accounts, never contracts.
    ExternallyOwned,
    /// Only contracts (multisigs, timelocks, DAOs).
    ContractOnly,
    /// Set once at construction; transfer and renouncement are refused.
    Immutable,
}

impl KingPolicy {
    /// Returns `true` if `candidate` may hold kingship under this policy.
    pub fn admits(&self, candidate: &Address, directory: &dyn AccountDirectory) -> bool {
        match self {
            KingPolicy::Open | KingPolicy::Immutable => true,
            KingPolicy::ExternallyOwned => !directory.is_contract(candidate),
            KingPolicy::ContractOnly => directory.is_contract(candidate),
        }
    }

    /// Returns `true` if kingship may be transferred or renounced.
    pub fn allows_handover(&self) -> bool {
        !matches!(self, KingPolicy::Immutable)
    }
}

impl fmt::Display for KingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KingPolicy::Open => write!(f, "open"),
            KingPolicy::ExternallyOwned => write!(f, "externally-owned"),
            KingPolicy::ContractOnly => write!(f, "contract-only"),
            KingPolicy::Immutable => write!(f, "immutable"),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessControl
// ---------------------------------------------------------------------------

/// Role registry plus the single king slot.
#[derive(Debug, Clone, Serialize)]
pub struct AccessControl {
    /// Current king. `None` once kingship has been renounced.
    king: Option<Address>,
    /// Delegated roles. The king role never appears here.
    roles: BTreeMap<Role, BTreeMap<Address, bool>>,
    /// Construction-time constraint on kingship.
    policy: KingPolicy,
}

impl AccessControl {
    /// Creates a registry with `king` under the [`KingPolicy::Open`] policy.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidPrincipal`] if `king` is null.
    pub fn new(king: Address, events: &mut EventLog) -> Result<Self, AccessError> {
        Self::with_policy(king, KingPolicy::Open, &crate::context::NoContracts, events)
    }

    /// Creates a registry with `king` under an explicit policy.
    ///
    /// Emits `RoleGranted` for the initial king.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidPrincipal`] if `king` is null and
    /// [`AccessError::KingRejected`] if the policy refuses it.
    pub fn with_policy(
        king: Address,
        policy: KingPolicy,
        directory: &dyn AccountDirectory,
        events: &mut EventLog,
    ) -> Result<Self, AccessError> {
        if king.is_zero() {
            return Err(AccessError::InvalidPrincipal);
        }
        if !policy.admits(&king, directory) {
            return Err(AccessError::KingRejected {
                candidate: king,
                policy,
            });
        }

        events.emit(Event::RoleGranted {
            role: Role::king(),
            account: king,
            sender: king,
        });

        Ok(Self {
            king: Some(king),
            roles: BTreeMap::new(),
            policy,
        })
    }

    /// The current king, if any.
    pub fn king(&self) -> Option<Address> {
        self.king
    }

    /// The policy fixed at construction.
    pub fn policy(&self) -> KingPolicy {
        self.policy
    }

    /// Returns `true` if `account` is the king.
    pub fn is_king(&self, account: &Address) -> bool {
        self.king.as_ref() == Some(account)
    }

    /// Returns `true` if `account` holds `role`. Pure lookup.
    pub fn has_role(&self, role: &Role, account: &Address) -> bool {
        if role.is_king() {
            return self.is_king(account);
        }
        self.roles
            .get(role)
            .and_then(|holders| holders.get(account))
            .copied()
            .unwrap_or(false)
    }

    /// Returns `true` if `account` may pass a gate for `role`: it is the
    /// king, or it holds the role itself.
    pub fn is_authorized(&self, role: &Role, account: &Address) -> bool {
        self.is_king(account) || self.has_role(role, account)
    }

    /// Fails unless `caller` is the king.
    pub fn only_king(&self, caller: &Address) -> Result<(), AccessError> {
        if self.is_king(caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                caller: *caller,
                role: Role::king(),
            })
        }
    }

    /// Fails unless `caller` is authorized for `role`.
    pub fn only_role(&self, role: &Role, caller: &Address) -> Result<(), AccessError> {
        if self.is_authorized(role, caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                caller: *caller,
                role: *role,
            })
        }
    }

    /// Grants `role` to `account`. King-only. Granting a held role is a
    /// silent no-op.
    ///
    /// # Errors
    ///
    /// [`AccessError::Unauthorized`] for non-kings,
    /// [`AccessError::InvalidPrincipal`] for the null account, and
    /// [`AccessError::KingRoleReserved`] for the king role.
    pub fn grant_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
        events: &mut EventLog,
    ) -> Result<(), AccessError> {
        self.only_king(&ctx.caller)?;
        if role.is_king() {
            return Err(AccessError::KingRoleReserved);
        }
        if account.is_zero() {
            return Err(AccessError::InvalidPrincipal);
        }
        if self.has_role(&role, &account) {
            return Ok(());
        }

        self.set_role(role, account, true);
        debug!(%role, %account, sender = %ctx.caller, "role granted");
        events.emit(Event::RoleGranted {
            role,
            account,
            sender: ctx.caller,
        });
        Ok(())
    }

    /// Revokes `role` from `account`. King-only. Revoking an unheld role is
    /// a silent no-op.
    pub fn revoke_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
        events: &mut EventLog,
    ) -> Result<(), AccessError> {
        self.only_king(&ctx.caller)?;
        if role.is_king() {
            return Err(AccessError::KingRoleReserved);
        }
        if !self.has_role(&role, &account) {
            return Ok(());
        }

        self.set_role(role, account, false);
        debug!(%role, %account, sender = %ctx.caller, "role revoked");
        events.emit(Event::RoleRevoked {
            role,
            account,
            sender: ctx.caller,
        });
        Ok(())
    }

    /// The caller drops one of its own roles.
    ///
    /// A king calling this is a no-op for every role, so a king cannot lock
    /// itself out by accident. Kings abdicate through
    /// [`renounce_kingship`](Self::renounce_kingship).
    pub fn renounce_role(&mut self, ctx: &CallContext, role: Role, events: &mut EventLog) {
        if self.is_king(&ctx.caller) || !self.has_role(&role, &ctx.caller) {
            return;
        }

        self.set_role(role, ctx.caller, false);
        events.emit(Event::RoleRevoked {
            role,
            account: ctx.caller,
            sender: ctx.caller,
        });
    }

    /// Hands kingship from the caller to `new_king`.
    ///
    /// Emits `RoleRevoked` (old king), `RoleGranted` (new king) and
    /// `KingshipTransferred`, in that order. Transferring to oneself is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`AccessError::Unauthorized`], [`AccessError::KingImmutable`],
    /// [`AccessError::InvalidPrincipal`] for a null successor, and
    /// [`AccessError::KingRejected`] if the policy refuses the successor.
    pub fn transfer_king_role(
        &mut self,
        ctx: &CallContext,
        new_king: Address,
        directory: &dyn AccountDirectory,
        events: &mut EventLog,
    ) -> Result<(), AccessError> {
        self.only_king(&ctx.caller)?;
        if !self.policy.allows_handover() {
            return Err(AccessError::KingImmutable);
        }
        if new_king.is_zero() {
            return Err(AccessError::InvalidPrincipal);
        }
        if new_king == ctx.caller {
            return Ok(());
        }
        if !self.policy.admits(&new_king, directory) {
            return Err(AccessError::KingRejected {
                candidate: new_king,
                policy: self.policy,
            });
        }

        let previous = ctx.caller;
        self.king = Some(new_king);

        debug!(%previous, %new_king, "kingship transferred");
        events.emit(Event::RoleRevoked {
            role: Role::king(),
            account: previous,
            sender: previous,
        });
        events.emit(Event::RoleGranted {
            role: Role::king(),
            account: new_king,
            sender: previous,
        });
        events.emit(Event::KingshipTransferred { previous, new_king });
        Ok(())
    }

    /// The king abdicates. Afterwards nobody can pass a king-only gate,
    /// permanently.
    pub fn renounce_kingship(
        &mut self,
        ctx: &CallContext,
        events: &mut EventLog,
    ) -> Result<(), AccessError> {
        self.only_king(&ctx.caller)?;
        if !self.policy.allows_handover() {
            return Err(AccessError::KingImmutable);
        }

        let previous = ctx.caller;
        self.king = None;

        debug!(%previous, "kingship renounced");
        events.emit(Event::RoleRevoked {
            role: Role::king(),
            account: previous,
            sender: previous,
        });
        events.emit(Event::KingshipRenounced { previous });
        Ok(())
    }

    fn set_role(&mut self, role: Role, account: Address, granted: bool) {
        self.roles.entry(role).or_default().insert(account, granted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn setup() -> (AccessControl, EventLog, Address) {
        let king = Address::derive("king");
        let mut events = EventLog::new();
        let access = AccessControl::new(king, &mut events).unwrap();
        (access, events, king)
    }

    #[test]
    fn constructor_installs_king() {
        let (access, events, king) = setup();
        assert_eq!(access.king(), Some(king));
        assert!(access.has_role(&Role::king(), &king));
        assert_eq!(events.len(), 1);
        assert_eq!(access.policy(), KingPolicy::Open);
    }

    #[test]
    fn constructor_rejects_null_king() {
        let mut events = EventLog::new();
        let err = AccessControl::new(Address::ZERO, &mut events).unwrap_err();
        assert_eq!(err, AccessError::InvalidPrincipal);
        assert!(events.is_empty());
    }

    #[test]
    fn role_names_round_trip() {
        assert_eq!(Role::minter().to_string(), "MINTER_ROLE");
        assert_eq!(Role::named("CUSTOM").known_name(), None);
        let parsed = Role::try_from("BURNER_ROLE".to_string()).unwrap();
        assert_eq!(parsed, Role::burner());
        let parsed = Role::try_from(Role::king().to_hex()).unwrap();
        assert!(parsed.is_king());
        assert!(Role::try_from("0xabcd".to_string()).is_err());
    }

    #[test]
    fn king_satisfies_every_gate() {
        let (access, _, king) = setup();
        assert!(access.is_authorized(&Role::minter(), &king));
        assert!(access.only_role(&Role::burner(), &king).is_ok());
        assert!(!access.has_role(&Role::minter(), &king));
    }

    #[test]
    fn grant_is_idempotent() {
        let (mut access, mut events, king) = setup();
        let alice = Address::derive("alice");
        let ctx = CallContext::from(king);

        access.grant_role(&ctx, Role::minter(), alice, &mut events).unwrap();
        let after_first = events.len();
        access.grant_role(&ctx, Role::minter(), alice, &mut events).unwrap();

        assert_eq!(events.len(), after_first);
        assert!(access.has_role(&Role::minter(), &alice));
    }

    #[test]
    fn non_king_cannot_grant() {
        let (mut access, mut events, _) = setup();
        let mallory = Address::derive("mallory");
        let err = access
            .grant_role(&CallContext::from(mallory), Role::minter(), mallory, &mut events)
            .unwrap_err();
        assert!(matches!(err, AccessError::Unauthorized { caller, .. } if caller == mallory));
        assert!(!access.has_role(&Role::minter(), &mallory));
    }

    #[test]
    fn king_role_is_reserved() {
        let (mut access, mut events, king) = setup();
        let ctx = CallContext::from(king);
        let alice = Address::derive("alice");
        assert_eq!(
            access.grant_role(&ctx, Role::king(), alice, &mut events),
            Err(AccessError::KingRoleReserved)
        );
        assert_eq!(
            access.revoke_role(&ctx, Role::king(), king, &mut events),
            Err(AccessError::KingRoleReserved)
        );
    }

    #[test]
    fn revoke_unheld_is_noop() {
        let (mut access, mut events, king) = setup();
        let before = events.len();
        access
            .revoke_role(
                &CallContext::from(king),
                Role::minter(),
                Address::derive("x"),
                &mut events,
            )
            .unwrap();
        assert_eq!(events.len(), before);
    }

    #[test]
    fn king_cannot_renounce_via_renounce_role() {
        let (mut access, mut events, king) = setup();
        let before = events.len();
        access.renounce_role(&CallContext::from(king), Role::king(), &mut events);
        assert_eq!(access.king(), Some(king));
        assert_eq!(events.len(), before);
    }

    #[test]
    fn holder_renounces_own_role() {
        let (mut access, mut events, king) = setup();
        let alice = Address::derive("alice");
        access
            .grant_role(&CallContext::from(king), Role::burner(), alice, &mut events)
            .unwrap();
        access.renounce_role(&CallContext::from(alice), Role::burner(), &mut events);
        assert!(!access.has_role(&Role::burner(), &alice));
        assert!(matches!(
            events.last(),
            Some(Event::RoleRevoked { account, .. }) if *account == alice
        ));
    }

    #[test]
    fn transfer_emits_revoke_then_grant() {
        let (mut access, mut events, king) = setup();
        let heir = Address::derive("heir");
        let mark = events.len();
        access
            .transfer_king_role(
                &CallContext::from(king),
                heir,
                &crate::context::NoContracts,
                &mut events,
            )
            .unwrap();

        assert_eq!(access.king(), Some(heir));
        assert!(!access.is_king(&king));
        let emitted = events.since(mark);
        assert_eq!(emitted.len(), 3);
        assert!(matches!(emitted[0], Event::RoleRevoked { account, .. } if account == king));
        assert!(matches!(emitted[1], Event::RoleGranted { account, .. } if account == heir));
        assert!(matches!(emitted[2], Event::KingshipTransferred { .. }));
    }

    #[test]
    fn transfer_to_self_or_null() {
        let (mut access, mut events, king) = setup();
        let ctx = CallContext::from(king);
        let before = events.len();
        access
            .transfer_king_role(&ctx, king, &crate::context::NoContracts, &mut events)
            .unwrap();
        assert_eq!(events.len(), before);
        assert_eq!(
            access.transfer_king_role(
                &ctx,
                Address::ZERO,
                &crate::context::NoContracts,
                &mut events,
            ),
            Err(AccessError::InvalidPrincipal)
        );
    }

    #[test]
    fn renounce_kingship_leaves_contract_ownerless() {
        let (mut access, mut events, king) = setup();
        access
            .renounce_kingship(&CallContext::from(king), &mut events)
            .unwrap();
        assert_eq!(access.king(), None);
        assert!(access.only_king(&king).is_err());
        assert!(matches!(events.last(), Some(Event::KingshipRenounced { .. })));
    }

    #[test]
    fn policies_constrain_candidates() {
        let multisig = Address::derive("multisig");
        let person = Address::derive("person");
        let directory: HashSet<Address> = [multisig].into_iter().collect();
        let mut events = EventLog::new();

        assert!(matches!(
            AccessControl::with_policy(person, KingPolicy::ContractOnly, &directory, &mut events),
            Err(AccessError::KingRejected { .. })
        ));
        assert!(matches!(
            AccessControl::with_policy(
                multisig,
                KingPolicy::ExternallyOwned,
                &directory,
                &mut events,
            ),
            Err(AccessError::KingRejected { .. })
        ));

        let mut access =
            AccessControl::with_policy(person, KingPolicy::ExternallyOwned, &directory, &mut events)
                .unwrap();
        let err = access
            .transfer_king_role(&CallContext::from(person), multisig, &directory, &mut events)
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::KingRejected {
                candidate: multisig,
                policy: KingPolicy::ExternallyOwned
            }
        );
        assert_eq!(access.king(), Some(person));
    }

    #[test]
    fn immutable_king_cannot_move() {
        let king = Address::derive("king");
        let mut events = EventLog::new();
        let mut access = AccessControl::with_policy(
            king,
            KingPolicy::Immutable,
            &crate::context::NoContracts,
            &mut events,
        )
        .unwrap();
        let ctx = CallContext::from(king);
        assert_eq!(
            access.transfer_king_role(
                &ctx,
                Address::derive("heir"),
                &crate::context::NoContracts,
                &mut events,
            ),
            Err(AccessError::KingImmutable)
        );
        assert_eq!(
            access.renounce_kingship(&ctx, &mut events),
            Err(AccessError::KingImmutable)
        );
        assert_eq!(access.king(), Some(king));
    }
}
