//! Session state machine.
//!
//! One `AtomicU8` cell holds the whole lifecycle; every transition goes
//! through compare-and-swap so concurrent callers race on the CAS instead of
//! on a boolean flag. Valid transitions:
//!
//! ```text
//! Uninitialized → Initializing → {Idle | InitFailed}
//! InitFailed    → Initializing            (caller-driven retry)
//! Idle ⇄ Capturing        Idle → Processing → Idle
//! any           → Released                (terminal)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Initializing = 1,
    InitFailed = 2,
    /// Ready for the next action request.
    Idle = 3,
    Capturing = 4,
    Processing = 5,
    /// Terminal; every later operation reports an error.
    Released = 6,
}

impl SessionState {
    fn from_u8(value: u8) -> SessionState {
        match value {
            0 => SessionState::Uninitialized,
            1 => SessionState::Initializing,
            2 => SessionState::InitFailed,
            3 => SessionState::Idle,
            4 => SessionState::Capturing,
            5 => SessionState::Processing,
            _ => SessionState::Released,
        }
    }
}

/// Atomic holder of the session state.
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Uninitialized as u8))
    }

    pub fn current(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// CAS `from → to`. Returns whether this caller won the transition.
    pub fn try_transition(&self, from: SessionState, to: SessionState) -> bool {
        let won = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            debug!(from = ?from, to = ?to, "session state transition");
        }
        won
    }

    /// Unconditional transition; returns the state that was replaced.
    /// Only `release()` uses this — `Released` wins every race.
    pub fn force(&self, to: SessionState) -> SessionState {
        let prior = SessionState::from_u8(self.0.swap(to as u8, Ordering::AcqRel));
        debug!(from = ?prior, to = ?to, "session state forced");
        prior
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
