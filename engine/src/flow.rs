//! State machines for the user-initiated sync flows.
//!
//! A push runs `Idle -> Reading -> Submitting` and ends in one of the
//! terminal states. A conflict is resolved by the user into `Success`
//! (overwrite) or `Abandoned`. Nothing retries automatically: every
//! terminal state needs a new user action, modelled by [`WriteFlow::reset`].

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};

/// Where a loaded payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    /// Fresh from the server, and written through to the cache
    Network,
    /// From the cache because the client is offline
    Cache,
    /// From the cache because the network fetch failed
    CacheAfterError,
}

impl ReadSource {
    /// Check if the payload was served locally.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Self::Network)
    }
}

/// States of a push from the sheet to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    Idle,
    Reading,
    Submitting,
    Success,
    Conflict,
    Queued,
    Failed,
    Abandoned,
}

impl WriteState {
    /// Stable lowercase name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Submitting => "submitting",
            Self::Success => "success",
            Self::Conflict => "conflict",
            Self::Queued => "queued",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Check if the flow has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Queued | Self::Failed | Self::Abandoned
        )
    }

    /// Check if `next` may follow this state.
    pub fn can_transition_to(&self, next: WriteState) -> bool {
        use WriteState::*;

        matches!(
            (self, next),
            (Idle, Reading)
                | (Reading, Submitting)
                | (Reading, Queued)
                | (Reading, Failed)
                | (Submitting, Success)
                | (Submitting, Conflict)
                | (Submitting, Failed)
                | (Conflict, Success)
                | (Conflict, Abandoned)
                | (Conflict, Failed)
        )
    }
}

/// Tracks one push through its states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFlow {
    state: WriteState,
    history: Vec<WriteState>,
}

impl Default for WriteFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteFlow {
    /// Start a flow in `Idle`.
    pub fn new() -> Self {
        Self {
            state: WriteState::Idle,
            history: vec![WriteState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[WriteState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the flow does not allow.
    pub fn advance(&mut self, next: WriteState) -> Result<WriteState> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(next)
    }

    /// Return to `Idle` after a terminal state.
    pub fn reset(&mut self) -> Result<()> {
        if !self.state.is_terminal() && self.state != WriteState::Idle {
            return Err(Error::InvalidTransition {
                from: self.state.name(),
                to: WriteState::Idle.name(),
            });
        }
        self.state = WriteState::Idle;
        self.history.clear();
        self.history.push(WriteState::Idle);
        Ok(())
    }
}
