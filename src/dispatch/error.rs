//! Dispatcher handle errors.

use thiserror::Error;

use super::phase::DispatchPhase;
use crate::config::ConfigError;
use crate::device::DeviceError;
use crate::matrix::UnresolvedStateError;

/// Errors surfaced through the dispatcher's public operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher has been torn down (or its task is gone).
    #[error("dispatcher already terminated")]
    Terminated,

    /// A handshake operation arrived out of turn. The dispatcher's
    /// state is unchanged.
    #[error("call out of turn: dispatcher is {phase:?}")]
    ProtocolSequence { phase: DispatchPhase },

    #[error("invalid rig configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Matrix(#[from] UnresolvedStateError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
