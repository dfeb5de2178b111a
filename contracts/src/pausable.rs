//! # Pausable
//!
//! A king-controlled circuit breaker. When a contract is paused, the
//! operations it gates fail with [`PauseError::Paused`]; everything else,
//! including reads and role management, keeps working. Pausing an already
//! paused contract (or activating an active one) is an error rather than a
//! no-op, so a king always learns that its call changed nothing.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::access::{AccessControl, AccessError};
use crate::context::CallContext;
use crate::events::{Event, EventLog};

/// Errors from pausing, activating, or running a gated operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PauseError {
    /// `pause` on a paused contract.
    #[error("contract is already paused")]
    AlreadyPaused,

    /// `activate` on an active contract.
    #[error("contract is already active")]
    AlreadyActive,

    /// A gated operation was attempted while paused.
    #[error("contract is paused")]
    Paused,

    /// Only the king may pause or activate.
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// The pause flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pausable {
    paused: bool,
}

impl Pausable {
    /// An active (unpaused) breaker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fails with [`PauseError::Paused`] while paused.
    pub fn ensure_active(&self) -> Result<(), PauseError> {
        if self.paused {
            return Err(PauseError::Paused);
        }
        Ok(())
    }

    /// Halts gated operations. King-only.
    pub fn pause(
        &mut self,
        ctx: &CallContext,
        access: &AccessControl,
        events: &mut EventLog,
    ) -> Result<(), PauseError> {
        access.only_king(&ctx.caller)?;
        if self.paused {
            return Err(PauseError::AlreadyPaused);
        }
        self.paused = true;
        info!(by = %ctx.caller, "contract paused");
        events.emit(Event::Paused { by: ctx.caller });
        Ok(())
    }

    /// Resumes gated operations. King-only.
    pub fn activate(
        &mut self,
        ctx: &CallContext,
        access: &AccessControl,
        events: &mut EventLog,
    ) -> Result<(), PauseError> {
        access.only_king(&ctx.caller)?;
        if !self.paused {
            return Err(PauseError::AlreadyActive);
        }
        self.paused = false;
        info!(by = %ctx.caller, "contract activated");
        events.emit(Event::Activated { by: ctx.caller });
        Ok(())
    }
}
