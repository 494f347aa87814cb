//! State matrix definition: vocabulary, states, timers, and transitions.
//!
//! A [`StateMatrix`] is assembled one state at a time against a fixed
//! input/output vocabulary, then compiled into the tabular form the
//! device protocol expects. Assembly is pure data manipulation; no I/O
//! happens here.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::compiled::{CompiledMatrix, CompiledState};
use super::error::{DefinitionError, UnresolvedStateError};

/// Reserved event label reported by the controller when the current
/// state's timer expires. Always a legal transition key; never a legal
/// input label.
pub const TIMER_EVENT: &str = "Tup";

/// Declaration of a single state, built fluently before registration.
///
/// A spec carries no vocabulary knowledge of its own; every label is
/// checked against the owning matrix when it is registered with
/// [`StateMatrix::add_state`].
///
/// # Example
///
/// ```rust
/// use operant::matrix::StateSpec;
///
/// let spec = StateSpec::new("first_state")
///     .timer(0.9)
///     .on("Cin", "second_state")
///     .on("Tup", "second_state")
///     .output_on("CenterWater");
///
/// assert_eq!(spec.name(), "first_state");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    name: String,
    timer: f64,
    transitions: BTreeMap<String, String>,
    outputs_on: BTreeSet<String>,
    outputs_off: BTreeSet<String>,
}

impl StateSpec {
    /// Start a spec for the named state with no timer, no transitions,
    /// and no output actions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timer: 0.0,
            transitions: BTreeMap::new(),
            outputs_on: BTreeSet::new(),
            outputs_off: BTreeSet::new(),
        }
    }

    /// Set the state timer in seconds. Zero means no timer transition.
    pub fn timer(mut self, seconds: f64) -> Self {
        self.timer = seconds;
        self
    }

    /// Route `event` to `target`. Declaring the same event twice keeps
    /// the latest target.
    pub fn on(mut self, event: impl Into<String>, target: impl Into<String>) -> Self {
        self.transitions.insert(event.into(), target.into());
        self
    }

    /// Assert an output channel on entry to this state.
    pub fn output_on(mut self, label: impl Into<String>) -> Self {
        self.outputs_on.insert(label.into());
        self
    }

    /// Deassert an output channel on entry to this state.
    pub fn output_off(mut self, label: impl Into<String>) -> Self {
        self.outputs_off.insert(label.into());
        self
    }

    /// The state's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Declarative finite automaton for one trial.
///
/// States are kept in insertion order, which defines the compiled index
/// order. The designated ready state is implicit: it is never declared
/// with `add_state`, always compiles to the last index, and has no
/// outgoing transitions — entering it ends the trial.
///
/// # Example
///
/// ```rust
/// use operant::matrix::{StateMatrix, StateSpec};
///
/// let mut sm = StateMatrix::new(
///     ["Cin", "Lin"],
///     ["CenterWater"],
///     "ready_next_trial",
/// )?;
///
/// sm.add_state(
///     StateSpec::new("first_state")
///         .timer(0.9)
///         .on("Cin", "second_state")
///         .output_on("CenterWater"),
/// )?;
/// sm.add_state(
///     StateSpec::new("second_state")
///         .timer(2.1)
///         .on("Lin", "first_state")
///         .on("Tup", "ready_next_trial")
///         .output_off("CenterWater"),
/// )?;
///
/// let table = sm.compile().unwrap();
/// assert_eq!(table.num_states(), 3); // two declared states plus ready
/// assert_eq!(table.ready_index(), 2);
/// # Ok::<(), operant::matrix::DefinitionError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMatrix {
    inputs: Vec<String>,
    outputs: Vec<String>,
    ready_state: String,
    states: Vec<StateSpec>,
}

impl StateMatrix {
    /// Create an empty matrix over the given vocabulary.
    ///
    /// Fails if a label repeats within the inputs or within the outputs,
    /// if an input (or the ready state) collides with the reserved
    /// [`TIMER_EVENT`] label, or if more than 32 outputs are declared
    /// (the compiled table carries a 32-bit output mask per state).
    pub fn new<I, II, O, OI>(
        inputs: I,
        outputs: O,
        ready_state: impl Into<String>,
    ) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = II>,
        II: Into<String>,
        O: IntoIterator<Item = OI>,
        OI: Into<String>,
    {
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        let outputs: Vec<String> = outputs.into_iter().map(Into::into).collect();
        let ready_state = ready_state.into();

        for label in &inputs {
            if label == TIMER_EVENT {
                return Err(DefinitionError::ReservedName {
                    name: label.clone(),
                });
            }
        }
        if ready_state == TIMER_EVENT {
            return Err(DefinitionError::ReservedName { name: ready_state });
        }
        if let Some(label) = first_duplicate(&inputs).or_else(|| first_duplicate(&outputs)) {
            return Err(DefinitionError::DuplicateLabel { label });
        }
        if outputs.len() > 32 {
            return Err(DefinitionError::TooManyOutputs {
                count: outputs.len(),
            });
        }

        Ok(Self {
            inputs,
            outputs,
            ready_state,
            states: Vec::new(),
        })
    }

    /// Register a state.
    ///
    /// Checks, eagerly: the name is unique and not the ready state, the
    /// timer is finite and non-negative, every transition key is a
    /// declared input or [`TIMER_EVENT`], and every output label is in
    /// the output vocabulary. Transition *targets* may reference states
    /// that have not been added yet; those are resolved by [`compile`].
    ///
    /// [`compile`]: StateMatrix::compile
    pub fn add_state(&mut self, spec: StateSpec) -> Result<(), DefinitionError> {
        if spec.name == self.ready_state || spec.name == TIMER_EVENT {
            return Err(DefinitionError::ReservedName { name: spec.name });
        }
        if self.states.iter().any(|s| s.name == spec.name) {
            return Err(DefinitionError::DuplicateState { name: spec.name });
        }
        if !spec.timer.is_finite() || spec.timer < 0.0 {
            return Err(DefinitionError::InvalidTimer {
                state: spec.name,
                timer: spec.timer,
            });
        }
        for event in spec.transitions.keys() {
            if event != TIMER_EVENT && !self.inputs.iter().any(|i| i == event) {
                return Err(DefinitionError::UnknownEvent {
                    state: spec.name.clone(),
                    label: event.clone(),
                });
            }
        }
        for label in spec.outputs_on.iter().chain(spec.outputs_off.iter()) {
            if !self.outputs.iter().any(|o| o == label) {
                return Err(DefinitionError::UnknownOutput {
                    state: spec.name.clone(),
                    label: label.clone(),
                });
            }
        }

        self.states.push(spec);
        Ok(())
    }

    /// Compile the matrix into its fixed tabular form.
    ///
    /// Two passes: first every state name is mapped to a stable index in
    /// insertion order (the ready state takes the final index), then all
    /// transition targets are resolved against that map. Compilation is
    /// pure and deterministic — compiling the same matrix twice yields
    /// identical tables.
    pub fn compile(&self) -> Result<CompiledMatrix, UnresolvedStateError> {
        let ready_index = self.states.len();
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.states.len() + 1);
        for (i, state) in self.states.iter().enumerate() {
            index.insert(state.name.as_str(), i);
        }
        index.insert(self.ready_state.as_str(), ready_index);

        let mut columns: Vec<String> = self.inputs.clone();
        columns.push(TIMER_EVENT.to_string());

        let mut states = Vec::with_capacity(self.states.len() + 1);
        for (i, state) in self.states.iter().enumerate() {
            let mut next = vec![i; columns.len()];
            for (event, target) in &state.transitions {
                let Some(col) = columns.iter().position(|c| c == event) else {
                    // Keys are validated at add_state; an unmatched key
                    // here is a bug, not a user error.
                    debug_assert!(false, "transition key '{event}' escaped validation");
                    continue;
                };
                let resolved =
                    *index
                        .get(target.as_str())
                        .ok_or_else(|| UnresolvedStateError {
                            state: state.name.clone(),
                            target: target.clone(),
                        })?;
                next[col] = resolved;
            }
            states.push(CompiledState::new(
                state.name.clone(),
                state.timer,
                next,
                self.output_mask(&state.outputs_on),
                self.output_mask(&state.outputs_off),
            ));
        }
        // Terminal row: the ready state holds itself on every column.
        states.push(CompiledState::new(
            self.ready_state.clone(),
            0.0,
            vec![ready_index; columns.len()],
            0,
            0,
        ));

        Ok(CompiledMatrix::new(
            columns,
            self.outputs.clone(),
            states,
            ready_index,
        ))
    }

    fn output_mask(&self, labels: &BTreeSet<String>) -> u32 {
        let mut mask = 0u32;
        for label in labels {
            if let Some(bit) = self.outputs.iter().position(|o| o == label) {
                mask |= 1 << bit;
            }
        }
        mask
    }

    /// Declared input labels, in column order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Declared output labels, in bitmask order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Name of the designated terminal state.
    pub fn ready_state(&self) -> &str {
        &self.ready_state
    }

    /// Number of declared states, not counting the implicit ready state.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }
}

fn first_duplicate(labels: &[String]) -> Option<String> {
    let mut seen = BTreeSet::new();
    labels
        .iter()
        .find(|label| !seen.insert(label.as_str()))
        .cloned()
}
