//! Dispatcher lifecycle phases.

use serde::{Deserialize, Serialize};

/// Where the dispatcher is in its trial-sequencing handshake.
///
/// Idle -> Armed -> Running -> AwaitingNextTrial, with acknowledgment
/// looping back into Running. `Terminated` is absorbing and reachable
/// from every phase via `die()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPhase {
    /// No matrix has been supplied yet.
    Idle,
    /// A matrix is queued but not yet uploaded.
    Armed,
    /// A trial is executing; the loop is polling.
    Running,
    /// The ready state was reached; waiting for the caller to
    /// acknowledge with `ready_to_start_trial`.
    AwaitingNextTrial,
    /// Torn down. Nothing runs and no notification will ever fire.
    Terminated,
}

impl DispatchPhase {
    /// False once the dispatcher has been torn down.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Terminated)
    }
}
