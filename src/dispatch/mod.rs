//! Trial sequencing: the polling dispatcher and its notifications.
//!
//! The dispatcher owns the active state matrix, the device channel,
//! and the event log; it runs the fixed-interval poll loop, decodes
//! events into the log, detects trial completion, and drives the
//! Idle -> Armed -> Running -> AwaitingNextTrial handshake with the
//! host application.

mod dispatcher;
mod error;
mod notification;
mod phase;
mod status;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use notification::{Notification, Notifications};
pub use phase::DispatchPhase;
pub use status::{DispatchStatus, SessionInfo};
