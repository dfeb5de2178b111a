//! # Reentrancy Guard
//!
//! A two-state lock, `Unlocked -> Locked -> Unlocked`, held for the
//! dynamic extent of one guarded operation. While it is locked, any other
//! guarded operation on the same instance fails immediately with
//! [`ReentrancyError::NoReentrancy`] and changes nothing.
//!
//! The lock exists for operations that hand control to someone else before
//! they are finished, which in Crown means paying out native value. A
//! recipient's receive hook runs inside the payout and may call straight
//! back into the contract; the guard is what turns that call away.
//!
//! The lock is per instance. Two vaults have two locks, and operations that
//! are not wrapped in [`non_reentrant`] are not protected at all.

use serde::Serialize;
use thiserror::Error;

/// Raised when a guarded operation is entered while the guard is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReentrancyError {
    /// The instance is already inside a guarded operation.
    #[error("reentrant call rejected: guard is already locked")]
    NoReentrancy,
}

/// The lock flag itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReentrancyGuard {
    locked: bool,
}

impl ReentrancyGuard {
    /// A fresh, unlocked guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a guarded operation is running.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn lock(&mut self) -> Result<(), ReentrancyError> {
        if self.locked {
            return Err(ReentrancyError::NoReentrancy);
        }
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

/// State that owns a [`ReentrancyGuard`].
pub trait Guarded {
    /// Shared access to the guard.
    fn guard(&self) -> &ReentrancyGuard;

    /// Exclusive access to the guard.
    fn guard_mut(&mut self) -> &mut ReentrancyGuard;
}

/// Runs `body` with the guard of `state` held.
///
/// Fails with [`ReentrancyError::NoReentrancy`] (converted into `E`)
/// without running `body` if the guard is already held. Otherwise the
/// guard is released after `body` returns, whether it succeeded or not.
pub fn non_reentrant<S, T, E>(
    state: &mut S,
    body: impl FnOnce(&mut S) -> Result<T, E>,
) -> Result<T, E>
where
    S: Guarded,
    E: From<ReentrancyError>,
{
    state.guard_mut().lock()?;
    let result = body(state);
    state.guard_mut().unlock();
    result
}
