//! Append-only, time-ordered store of trial events.

use serde::{Deserialize, Serialize};

use super::record::EventRecord;

/// Durable in-memory log of every event decoded during a session.
///
/// The log is append-only: records go in through [`append`] in
/// non-decreasing timestamp order and are never removed or reordered.
/// The dispatcher owns its log exclusively for the lifetime of one
/// session; everything handed to callers is a read-only view or a
/// cloned slice.
///
/// [`append`]: EventLog::append
///
/// # Example
///
/// ```rust
/// use operant::events::{EventLog, EventRecord};
///
/// let mut log = EventLog::new();
/// log.append(EventRecord { timestamp: 0.2, label: "Cin".into(), state: 1 });
/// log.append(EventRecord { timestamp: 2.0, label: "Tup".into(), state: 2 });
///
/// assert_eq!(log.len(), 2);
/// assert_eq!(log.recent(1)[0].label, "Tup");
/// assert!(log.records().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// Timestamps must be non-decreasing; the device reports events in
    /// order and the poll loop appends them in that order. Checked in
    /// debug builds.
    pub fn append(&mut self, record: EventRecord) {
        debug_assert!(
            self.records
                .last()
                .is_none_or(|last| last.timestamp <= record.timestamp),
            "event log timestamps must be non-decreasing"
        );
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at a position.
    pub fn get(&self, index: usize) -> Option<&EventRecord> {
        self.records.get(index)
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// The most recent `n` records (all of them if fewer exist).
    pub fn recent(&self, n: usize) -> &[EventRecord] {
        &self.records[self.records.len().saturating_sub(n)..]
    }

    /// Records from position `start` to the end; empty if out of range.
    pub fn since(&self, start: usize) -> &[EventRecord] {
        self.records.get(start..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: f64, label: &str, state: usize) -> EventRecord {
        EventRecord {
            timestamp,
            label: label.to_string(),
            state,
        }
    }

    #[test]
    fn new_log_is_empty() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.last().is_none());
    }

    #[test]
    fn append_preserves_order() {
        let mut log = EventLog::new();
        log.append(record(0.2, "Cin", 1));
        log.append(record(2.0, "Tup", 2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0).unwrap().label, "Cin");
        assert_eq!(log.last().unwrap().label, "Tup");
    }

    #[test]
    fn equal_timestamps_are_legal() {
        let mut log = EventLog::new();
        log.append(record(1.0, "Cin", 1));
        log.append(record(1.0, "Cout", 0));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn recent_returns_the_tail() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.append(record(i as f64, "Cin", i));
        }

        let tail = log.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].state, 3);
        assert_eq!(tail[1].state, 4);
    }

    #[test]
    fn recent_with_oversized_n_returns_everything() {
        let mut log = EventLog::new();
        log.append(record(0.5, "Lin", 1));
        assert_eq!(log.recent(10).len(), 1);
    }

    #[test]
    fn since_slices_from_a_position() {
        let mut log = EventLog::new();
        for i in 0..4 {
            log.append(record(i as f64, "Cin", i));
        }

        assert_eq!(log.since(2).len(), 2);
        assert!(log.since(9).is_empty());
    }

    #[test]
    fn log_serializes_round_trip() {
        let mut log = EventLog::new();
        log.append(record(0.2, "Cin", 1));

        let json = serde_json::to_string(&log).unwrap();
        let back: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(log, back);
    }
}
