//! Compiled tabular representation of a state matrix.
//!
//! This is the fixed-size form the device protocol consumes: one
//! next-state entry per (state, event column) pair plus the output
//! bitmasks applied on state entry. Instances are produced by
//! `StateMatrix::compile` and are immutable thereafter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One row of the compiled table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledState {
    name: String,
    timer: f64,
    next: Vec<usize>,
    outputs_on: u32,
    outputs_off: u32,
}

impl CompiledState {
    pub(crate) fn new(
        name: String,
        timer: f64,
        next: Vec<usize>,
        outputs_on: u32,
        outputs_off: u32,
    ) -> Self {
        Self {
            name,
            timer,
            next,
            outputs_on,
            outputs_off,
        }
    }

    /// State name, for rendering and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State timer in seconds; zero means no timer transition.
    pub fn timer(&self) -> f64 {
        self.timer
    }

    /// Output actions to perform on entry, deasserts strictly before
    /// asserts. Yields `(output bit, level)` pairs; applying them in
    /// order is what keeps overlapping on/off sets from ever driving a
    /// line through an illegal combined level.
    pub fn entry_actions(&self, num_outputs: usize) -> impl Iterator<Item = (usize, bool)> + '_ {
        let off = self.outputs_off;
        let on = self.outputs_on;
        (0..num_outputs)
            .filter(move |bit| off >> bit & 1 == 1)
            .map(|bit| (bit, false))
            .chain(
                (0..num_outputs)
                    .filter(move |bit| on >> bit & 1 == 1)
                    .map(|bit| (bit, true)),
            )
    }
}

/// The full compiled table: every declared state in insertion order,
/// then the ready state as the final row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompiledMatrix {
    columns: Vec<String>,
    outputs: Vec<String>,
    states: Vec<CompiledState>,
    ready_index: usize,
}

impl CompiledMatrix {
    pub(crate) fn new(
        columns: Vec<String>,
        outputs: Vec<String>,
        states: Vec<CompiledState>,
        ready_index: usize,
    ) -> Self {
        Self {
            columns,
            outputs,
            states,
            ready_index,
        }
    }

    /// Event columns: declared inputs in order, then the timer column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Output labels in bitmask order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Total number of rows, including the ready state.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Index of the terminal ready state (always the last row).
    pub fn ready_index(&self) -> usize {
        self.ready_index
    }

    /// Column index for an event label, if it is part of the vocabulary.
    pub fn column_of(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// Row for a state index.
    pub fn state(&self, index: usize) -> Option<&CompiledState> {
        self.states.get(index)
    }

    /// Name of a state index, or `"?"` if out of range.
    pub fn state_name(&self, index: usize) -> &str {
        self.states.get(index).map_or("?", |s| s.name())
    }

    /// Next-state lookup. Out-of-range coordinates decode as "stay",
    /// matching the sentinel behavior for events the current state does
    /// not route.
    pub fn next(&self, state: usize, column: usize) -> usize {
        self.states
            .get(state)
            .and_then(|s| s.next.get(column))
            .copied()
            .unwrap_or(state)
    }

    /// Serialize to the wire payload a device channel accepts.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode a wire payload back into a table.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

impl fmt::Display for CompiledMatrix {
    /// Render the full table for debugging. Pure view; not part of the
    /// functional contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3} {:<20} {:>7}", "#", "state", "timer")?;
        for column in &self.columns {
            write!(f, " {column:>6}")?;
        }
        writeln!(f, "  outputs")?;
        for (i, state) in self.states.iter().enumerate() {
            write!(f, "{:>3} {:<20} {:>7.3}", i, state.name(), state.timer())?;
            for next in &state.next {
                write!(f, " {next:>6}")?;
            }
            write!(f, " ")?;
            for (bit, level) in state.entry_actions(self.outputs.len()) {
                let sign = if level { '+' } else { '-' };
                write!(f, " {sign}{}", self.outputs[bit])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
