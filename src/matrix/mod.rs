//! State matrices: declarative finite automata for one trial.
//!
//! A matrix is assembled from named states with timers, input-triggered
//! transitions, and output entry actions, all checked against a fixed
//! vocabulary, then compiled into the fixed-size table the device
//! protocol expects. Everything in this module is pure data; the
//! dispatcher and device modules do the I/O.

mod compiled;
mod definition;
mod error;

pub use compiled::{CompiledMatrix, CompiledState};
pub use definition::{StateMatrix, StateSpec, TIMER_EVENT};
pub use error::{DefinitionError, UnresolvedStateError};
