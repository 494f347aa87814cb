//! Device channel errors.

use thiserror::Error;

/// Transport and protocol failures at the device boundary.
///
/// The poll loop treats these as transient: a failed poll is retried at
/// the next tick without advancing state, and teardown swallows close
/// failures by contract.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device communication failure: {0}")]
    Comm(String),

    #[error("no state table has been uploaded")]
    NoTable,

    #[error("malformed state table payload: {0}")]
    BadTable(String),
}
