// Serial link - Runs blocking port I/O on the blocking pool, one exchange at a time
use crate::application::sensor_adapter::TransportError;
use anyhow::Context;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BAUD_RATE: u32 = 9600;

/// Open a 9600 8N1 port with the given read timeout.
pub fn open_port(path: &str, timeout: Duration) -> anyhow::Result<Box<dyn serialport::SerialPort>> {
    serialport::new(path, BAUD_RATE)
        .timeout(timeout)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .open()
        .with_context(|| format!("Failed to open serial device {}", path))
}

/// A byte stream to a device that can drop input it has not read yet.
pub trait DevicePort: Read + Write + Send + 'static {
    fn discard_input(&mut self) -> io::Result<()>;
}

impl DevicePort for Box<dyn serialport::SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

pub struct SerialLink<T> {
    port: Arc<Mutex<T>>,
}

impl<T: DevicePort> SerialLink<T> {
    pub fn new(port: T) -> Self {
        Self {
            port: Arc::new(Mutex::new(port)),
        }
    }

    /// Run `exchange` against the port on the blocking pool.
    ///
    /// Input left over from an earlier exchange, such as the tail of a reply that
    /// arrived after its read timed out, is discarded first.
    pub async fn exchange<F, R>(&self, exchange: F) -> Result<R, TransportError>
    where
        F: FnOnce(&mut T) -> Result<R, TransportError> + Send + 'static,
        R: Send + 'static,
    {
        let port = self.port.clone();
        tokio::task::spawn_blocking(move || {
            let mut port = port
                .lock()
                .map_err(|_| TransportError::Worker("serial port lock poisoned".to_string()))?;
            port.discard_input()?;
            exchange(&mut port)
        })
        .await
        .map_err(|err| TransportError::Worker(err.to_string()))?
    }

    #[cfg(test)]
    pub fn with_port<R>(&self, inspect: impl FnOnce(&T) -> R) -> R {
        inspect(&self.port.lock().unwrap())
    }
}
