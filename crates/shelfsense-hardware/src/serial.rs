//! Real serial port backend.
//!
//! `serialport` is a blocking API, so every call runs on the Tokio blocking
//! pool. The port sits behind a std mutex only so the blocking closure can
//! own a handle to it; exclusive access per exchange is the caller's job.

use crate::{
    HardwareError, Result,
    devices::AnyLink,
    traits::{LinkOpener, SerialLink},
    types::LinkSettings,
};
use serialport::SerialPort;
use std::{
    io::ErrorKind,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, trace};

/// A unit link over an OS serial device.
pub struct SerialPortLink {
    path: String,
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SerialPortLink {
    /// Open `path` with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::OpenFailed`] if the OS refuses the device.
    pub async fn open(path: &str, settings: LinkSettings) -> Result<Self> {
        let owned = path.to_string();
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&owned, settings.baud_rate)
                .timeout(settings.read_timeout)
                .open()
                .map_err(|e| HardwareError::open_failed(&owned, e.to_string()))
        })
        .await
        .map_err(|e| HardwareError::open_failed(path, e.to_string()))??;

        debug!(path, baud = settings.baud_rate, "serial port opened");
        Ok(Self {
            path: path.to_string(),
            port: Arc::new(Mutex::new(port)),
        })
    }

    async fn with_port<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> Result<T> + Send + 'static,
    {
        let port = Arc::clone(&self.port);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = port
                .lock()
                .map_err(|_| HardwareError::communication(&path, "port lock poisoned"))?;
            op(&mut **guard)
        })
        .await
        .map_err(|e| HardwareError::communication(&self.path, e.to_string()))?
    }
}

impl SerialLink for SerialPortLink {
    fn path(&self) -> &str {
        &self.path
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        trace!(path = %self.path, bytes = ?frame, "write");
        let frame = frame.to_vec();
        let path = self.path.clone();
        self.with_port(move |port| {
            port.write_all(&frame)
                .and_then(|_| port.flush())
                .map_err(|e| HardwareError::communication(&path, e.to_string()))
        })
        .await
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        let path = self.path.clone();
        let byte = self
            .with_port(move |port| {
                port.set_timeout(timeout)
                    .map_err(|e| HardwareError::communication(&path, e.to_string()))?;
                let mut buf = [0u8; 1];
                match port.read(&mut buf) {
                    Ok(0) => Ok(None),
                    Ok(_) => Ok(Some(buf[0])),
                    Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
                    Err(e) => Err(HardwareError::communication(&path, e.to_string())),
                }
            })
            .await?;
        trace!(path = %self.path, ?byte, "read");
        Ok(byte)
    }
}

/// Opens [`SerialPortLink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

impl LinkOpener for SerialPortOpener {
    async fn open(&self, path: &str, settings: LinkSettings) -> Result<AnyLink> {
        SerialPortLink::open(path, settings).await.map(AnyLink::Serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let result = SerialPortLink::open(
            "/dev/shelfsense-does-not-exist",
            LinkSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(HardwareError::OpenFailed { .. })));
    }
}
