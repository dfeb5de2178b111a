//! # Call Context & Atomic Execution
//!
//! Every external entry point in Crown receives a [`CallContext`]: who is
//! calling and how much native value rides along with the call. There is
//! no ambient "current sender" global. The context is an ordinary argument,
//! which keeps contracts testable and makes re-entrant calls explicit.
//!
//! ## All-or-nothing
//!
//! A failed call must leave no trace: no half-applied transfer, no stray
//! event, no role flipped before the error was noticed. Contracts get this
//! by implementing [`Transactional`] and wrapping each entry point in
//! [`atomically`], which snapshots state on entry and restores it when the
//! body returns `Err`.
//!
//! Snapshots nest. A re-entrant call made from inside a payout takes its own
//! checkpoint, so an inner failure only unwinds the inner call, and an outer
//! failure unwinds everything, inner successes included.

use std::collections::{BTreeSet, HashSet};

use crown_protocol::identity::Address;

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// The caller and attached value of the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The immediate caller.
    pub caller: Address,
    /// Native value sent with the call. Zero for most entry points.
    pub value: u128,
}

impl CallContext {
    /// A call from `caller` carrying no value.
    pub fn from(caller: Address) -> Self {
        Self { caller, value: 0 }
    }

    /// A call from `caller` carrying `value` native units.
    pub fn with_value(caller: Address, value: u128) -> Self {
        Self { caller, value }
    }
}

// ---------------------------------------------------------------------------
// AccountDirectory
// ---------------------------------------------------------------------------

/// Answers "is this principal a contract?".
///
/// King policies that restrict who may hold kingship consult this. The
/// native value host implements it from its deployment records; tests can
/// use a plain set.
pub trait AccountDirectory {
    /// Returns `true` if `address` has contract code behind it.
    fn is_contract(&self, address: &Address) -> bool;
}

/// A directory in which nothing is a contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContracts;

impl AccountDirectory for NoContracts {
    fn is_contract(&self, _address: &Address) -> bool {
        false
    }
}

impl AccountDirectory for HashSet<Address> {
    fn is_contract(&self, address: &Address) -> bool {
        self.contains(address)
    }
}

impl AccountDirectory for BTreeSet<Address> {
    fn is_contract(&self, address: &Address) -> bool {
        self.contains(address)
    }
}

// ---------------------------------------------------------------------------
// Transactional
// ---------------------------------------------------------------------------

/// State that can be checkpointed and rolled back.
pub trait Transactional {
    /// Opaque saved state.
    type Checkpoint;

    /// Captures the current state.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restores a previously captured state.
    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}

/// Runs `body` as one atomic unit of work against `state`.
///
/// If `body` fails, every mutation it made to `state` is undone before the
/// error is returned.
pub fn atomically<S, T, E>(
    state: &mut S,
    body: impl FnOnce(&mut S) -> Result<T, E>,
) -> Result<T, E>
where
    S: Transactional,
{
    let checkpoint = state.checkpoint();
    let result = body(state);
    if result.is_err() {
        state.rollback(checkpoint);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u64,
    }

    impl Transactional for Counter {
        type Checkpoint = u64;

        fn checkpoint(&self) -> u64 {
            self.value
        }

        fn rollback(&mut self, checkpoint: u64) {
            self.value = checkpoint;
        }
    }

    #[test]
    fn success_keeps_mutations() {
        let mut c = Counter::default();
        let out: Result<u64, ()> = atomically(&mut c, |c| {
            c.value += 5;
            Ok(c.value)
        });
        assert_eq!(out, Ok(5));
        assert_eq!(c.value, 5);
    }

    #[test]
    fn failure_discards_mutations() {
        let mut c = Counter { value: 7 };
        let out: Result<(), &str> = atomically(&mut c, |c| {
            c.value = 100;
            Err("boom")
        });
        assert_eq!(out, Err("boom"));
        assert_eq!(c.value, 7);
    }

    #[test]
    fn nested_failure_only_unwinds_inner() {
        let mut c = Counter::default();
        let out: Result<(), ()> = atomically(&mut c, |c| {
            c.value = 1;
            let inner: Result<(), ()> = atomically(c, |c| {
                c.value = 2;
                Err(())
            });
            assert!(inner.is_err());
            assert_eq!(c.value, 1);
            Ok(())
        });
        assert!(out.is_ok());
        assert_eq!(c.value, 1);
    }

    #[test]
    fn directories() {
        let contract = Address::derive("contract");
        let mut set = HashSet::new();
        set.insert(contract);
        assert!(set.is_contract(&contract));
        assert!(!set.is_contract(&Address::derive("person")));
        assert!(!NoContracts.is_contract(&contract));
    }
}
