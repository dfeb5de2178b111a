//! # Event Log
//!
//! Each contract keeps an append-only log of what happened to it. Indexers
//! read it; tests assert against it. Entries are only ever pushed, except
//! when a failed call is rolled back: the log is truncated to its length at
//! the start of that call, so reverted calls leave no events behind.

use serde::Serialize;

use crate::access::Role;
use crown_protocol::identity::Address;

/// Everything a Crown contract can announce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    /// `account` was granted `role` by `sender`.
    RoleGranted {
        /// The role granted.
        role: Role,
        /// The principal that now holds it.
        account: Address,
        /// The principal that made the call.
        sender: Address,
    },
    /// `account` lost `role`; `sender` made the call.
    RoleRevoked {
        /// The role revoked.
        role: Role,
        /// The principal that no longer holds it.
        account: Address,
        /// The principal that made the call.
        sender: Address,
    },
    /// Kingship moved from `previous` to `new_king`.
    KingshipTransferred {
        /// Outgoing king.
        previous: Address,
        /// Incoming king.
        new_king: Address,
    },
    /// `previous` gave up kingship and left the contract ownerless.
    KingshipRenounced {
        /// The last king.
        previous: Address,
    },
    /// Ledger units moved. `from` is null for mints, `to` is null for burns.
    Transfer {
        /// Debited principal.
        from: Address,
        /// Credited principal.
        to: Address,
        /// Units moved.
        amount: u128,
    },
    /// `owner` set `spender`'s allowance to `amount`.
    Approval {
        /// Allowance owner.
        owner: Address,
        /// Allowed spender.
        spender: Address,
        /// New allowance.
        amount: u128,
    },
    /// New supply created for `to`.
    Minted {
        /// Recipient of the new units.
        to: Address,
        /// Units created.
        amount: u128,
    },
    /// Supply destroyed from `from`.
    Burned {
        /// Principal whose units were destroyed.
        from: Address,
        /// Units destroyed.
        amount: u128,
    },
    /// Gated operations were halted by `by`.
    Paused {
        /// The king that paused.
        by: Address,
    },
    /// Gated operations were resumed by `by`.
    Activated {
        /// The king that resumed.
        by: Address,
    },
    /// The vault recorded a mistaken deposit.
    Deposited {
        /// The depositor.
        from: Address,
        /// Native units received.
        amount: u128,
    },
    /// A depositor reclaimed their recorded balance.
    Claimed {
        /// The depositor whose record was cleared.
        claimant: Address,
        /// Where the value was sent.
        recipient: Address,
        /// Native units paid out.
        amount: u128,
    },
}

impl Event {
    /// Short name of the variant, for logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Event::RoleGranted { .. } => "RoleGranted",
            Event::RoleRevoked { .. } => "RoleRevoked",
            Event::KingshipTransferred { .. } => "KingshipTransferred",
            Event::KingshipRenounced { .. } => "KingshipRenounced",
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
            Event::Minted { .. } => "Minted",
            Event::Burned { .. } => "Burned",
            Event::Paused { .. } => "Paused",
            Event::Activated { .. } => "Activated",
            Event::Deposited { .. } => "Deposited",
            Event::Claimed { .. } => "Claimed",
        }
    }
}

/// Append-only event storage for one contract instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    entries: Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn emit(&mut self, event: Event) {
        self.entries.push(event);
    }

    /// All events, oldest first.
    pub fn entries(&self) -> &[Event] {
        &self.entries
    }

    /// Events recorded at or after position `mark`.
    ///
    /// Take `mark` from [`len`](Self::len) before a call to see exactly
    /// what that call emitted.
    pub fn since(&self, mark: usize) -> &[Event] {
        self.entries.get(mark..).unwrap_or(&[])
    }

    /// The most recent event.
    pub fn last(&self) -> Option<&Event> {
        self.entries.last()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every event after position `len`. Used by rollback only.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}
