//! The device channel boundary.
//!
//! A `DeviceChannel` is the transport to whatever executes state
//! matrices in real time — a hardware link or the in-process simulator.
//! The dispatcher owns its channel exclusively; nothing else issues
//! commands to it. Concrete hardware drivers live outside this crate
//! and plug in by implementing the trait.

mod dummy;
mod error;
mod sim;

pub use dummy::DummyDevice;
pub use error::DeviceError;
pub use sim::{SimulatedDevice, SimulatedDeviceHandle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{RigConfig, ServerType};

/// An event as reported by the controller: device-clock seconds since
/// the trial clock started, plus the input or timer-expiry label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub timestamp: f64,
    pub label: String,
}

/// Transport to the state machine controller.
///
/// The wire protocol is fixed: a bincode-encoded compiled table goes up
/// with `upload`, `start` begins executing it from state zero, `poll`
/// drains every event that occurred since the previous successful poll
/// (in order), and `close` releases the link. Events not drained by a
/// successful `poll` stay queued — the dispatcher relies on that to
/// retry after a transport failure without losing anything.
#[async_trait]
pub trait DeviceChannel: Send {
    /// Upload a compiled state table payload.
    async fn upload(&mut self, table: &[u8]) -> Result<(), DeviceError>;

    /// Begin executing the uploaded table from state zero.
    async fn start(&mut self) -> Result<(), DeviceError>;

    /// Drain events that occurred since the last successful poll.
    async fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError>;

    /// Release the link. Safe to call more than once.
    async fn close(&mut self) -> Result<(), DeviceError>;

    /// Which implementation this channel is.
    fn server_type(&self) -> ServerType;
}

/// Connect the channel implementation the configuration selects.
pub fn connect(config: &RigConfig) -> Box<dyn DeviceChannel> {
    match config.server_type {
        ServerType::Simulator => Box::new(SimulatedDevice::new()),
        ServerType::Dummy => Box::new(DummyDevice::new()),
    }
}
