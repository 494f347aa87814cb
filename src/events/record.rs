//! A single decoded trial event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One input occurrence (or timer expiry) and the state it produced.
///
/// `timestamp` is device-clock seconds since the poll loop started,
/// `label` is the input label or the reserved timer-expiry label, and
/// `state` is the index of the state the automaton was in *after*
/// decoding the event.
///
/// # Example
///
/// ```rust
/// use operant::events::EventRecord;
///
/// let record = EventRecord {
///     timestamp: 0.2,
///     label: "Cin".to_string(),
///     state: 1,
/// };
/// assert_eq!(format!("{record}"), "   0.200\tCin\t1");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic seconds since the poll loop started.
    pub timestamp: f64,
    /// Input label or timer-expiry label.
    pub label: String,
    /// Resulting state index.
    pub state: usize,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:8.3}\t{}\t{}", self.timestamp, self.label, self.state)
    }
}
