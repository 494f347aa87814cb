//! Operant: trial-organized behavioral experiment control.
//!
//! An experiment is a sequence of trials, each described by a
//! declarative [`StateMatrix`](matrix::StateMatrix) — named states with
//! timers, input-triggered transitions, and output entry actions. The
//! [`Dispatcher`](dispatch::Dispatcher) compiles a matrix onto a
//! [`DeviceChannel`](device::DeviceChannel) (hardware link or the
//! in-process simulator), polls it at a fixed interval, decodes every
//! event into an append-only [`EventLog`](events::EventLog), and
//! notifies the host when it is time to prepare the next trial.
//!
//! # Core Concepts
//!
//! - **State matrix**: the automaton for one trial, compiled to a
//!   fixed table. Pure data, checked eagerly against its vocabulary.
//! - **Trial**: one execution of a matrix from its start state to the
//!   designated ready state.
//! - **Dispatcher**: the polling loop that sequences trials and emits
//!   `PrepareNextTrial` / `TimerTic` notifications.
//! - **Event log**: durable, time-ordered record of everything the
//!   device reported, exposed read-only.
//!
//! # Example
//!
//! ```rust
//! use operant::matrix::{StateMatrix, StateSpec};
//!
//! let mut sm = StateMatrix::new(
//!     ["Cin", "Lin"],
//!     ["CenterWater"],
//!     "ready_next_trial",
//! )?;
//! sm.add_state(
//!     StateSpec::new("first_state")
//!         .timer(0.9)
//!         .on("Cin", "second_state")
//!         .on("Tup", "second_state")
//!         .output_on("CenterWater"),
//! )?;
//! sm.add_state(
//!     StateSpec::new("second_state")
//!         .timer(2.1)
//!         .on("Lin", "first_state")
//!         .on("Tup", "ready_next_trial")
//!         .output_off("CenterWater"),
//! )?;
//!
//! let table = sm.compile().unwrap();
//! assert_eq!(table.num_states(), 3);
//! # Ok::<(), operant::matrix::DefinitionError>(())
//! ```
//!
//! Driving trials (the dispatcher needs a Tokio runtime):
//!
//! ```no_run
//! use std::time::Duration;
//! use operant::config::{RigConfig, ServerType};
//! use operant::dispatch::{Dispatcher, Notification};
//! use operant::matrix::{StateMatrix, StateSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RigConfig {
//!     inputs: vec!["Cin".into()],
//!     outputs: vec![],
//!     server_type: ServerType::Simulator,
//!     poll_interval: Duration::from_millis(300),
//! };
//! let (dispatcher, mut notifications) = Dispatcher::new(config)?;
//!
//! let mut sm = StateMatrix::new(["Cin"], Vec::<String>::new(), "ready_next_trial")?;
//! sm.add_state(StateSpec::new("wait").timer(1.0).on("Tup", "ready_next_trial"))?;
//! dispatcher.set_state_matrix(sm).await?;
//! dispatcher.ready_to_start_trial().await?;
//!
//! while let Some(notification) = notifications.recv().await {
//!     if let Notification::PrepareNextTrial { next_trial, .. } = notification {
//!         if next_trial > 10 {
//!             break;
//!         }
//!         dispatcher.ready_to_start_trial().await?;
//!     }
//! }
//! dispatcher.die().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod dispatch;
pub mod events;
pub mod matrix;

// Re-export commonly used types
pub use config::{RigConfig, ServerType};
pub use dispatch::{DispatchError, DispatchPhase, Dispatcher, Notification, Notifications};
pub use events::{EventLog, EventRecord};
pub use matrix::{DefinitionError, StateMatrix, StateSpec, UnresolvedStateError, TIMER_EVENT};
