// Device adapter port - one raw reading per call, no retries
use async_trait::async_trait;
use std::io;
use thiserror::Error;

/// Failure talking to the physical sensor over its serial link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("checksum mismatch (expected {expected:#06x}, got {actual:#06x})")]
    Checksum { expected: u16, actual: u16 },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("device answered with exception code {0:#04x}")]
    DeviceException(u8),
    #[error("serial I/O error: {0}")]
    Io(io::Error),
    #[error("serial worker failed: {0}")]
    Worker(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            _ => TransportError::Io(err),
        }
    }
}

#[async_trait]
pub trait SensorAdapter: Send {
    type Reading: Send;

    /// Take a single raw reading from the device.
    async fn read(&mut self) -> Result<Self::Reading, TransportError>;

    /// Bring the device out of its low-power state.
    async fn wake(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Return the device to its low-power state.
    async fn sleep(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
