//! Definition and compilation errors for state matrices.

use thiserror::Error;

/// Errors raised while declaring states against the matrix vocabulary.
///
/// All of these are detected eagerly, at `add_state`/construction time,
/// and are fatal to that matrix build.
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("duplicate state name '{name}'")]
    DuplicateState { name: String },

    #[error("'{name}' is reserved and cannot be declared as a state")]
    ReservedName { name: String },

    #[error("state '{state}' has invalid timer {timer}: timers must be finite and non-negative")]
    InvalidTimer { state: String, timer: f64 },

    #[error("state '{state}' keys a transition on undeclared event '{label}'")]
    UnknownEvent { state: String, label: String },

    #[error("state '{state}' drives undeclared output '{label}'")]
    UnknownOutput { state: String, label: String },

    #[error("duplicate label '{label}' in the matrix vocabulary")]
    DuplicateLabel { label: String },

    #[error("{count} outputs declared but the compiled table carries at most 32")]
    TooManyOutputs { count: usize },
}

/// A transition target that was never defined by compile time.
///
/// Forward references are legal while the matrix is being assembled;
/// this is raised by `compile`, before any device interaction.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("state '{state}' transitions to '{target}', which was never defined")]
pub struct UnresolvedStateError {
    pub state: String,
    pub target: String,
}
