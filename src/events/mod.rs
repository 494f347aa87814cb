//! Event records and the append-only session log.
//!
//! Every state transition decoded during trial execution lands here as
//! an `EventRecord`; the `EventLog` is the durable, time-ordered store
//! the dispatcher exposes read-only views of.

mod log;
mod record;

pub use log::EventLog;
pub use record::EventRecord;
