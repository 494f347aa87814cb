//! No-op device channel for wiring tests and dry runs.

use async_trait::async_trait;
use tracing::debug;

use super::{DeviceChannel, DeviceError, DeviceEvent};
use crate::config::ServerType;

/// Accepts every command and never reports an event.
#[derive(Debug, Default)]
pub struct DummyDevice {
    uploaded: bool,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceChannel for DummyDevice {
    async fn upload(&mut self, table: &[u8]) -> Result<(), DeviceError> {
        debug!(bytes = table.len(), "dummy server swallowed a table");
        self.uploaded = true;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), DeviceError> {
        if !self.uploaded {
            return Err(DeviceError::NoTable);
        }
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError> {
        Ok(Vec::new())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn server_type(&self) -> ServerType {
        ServerType::Dummy
    }
}
