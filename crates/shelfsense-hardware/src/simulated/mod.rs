//! Simulated backends for running the gateway without hardware.
//!
//! Selected with `backend = "simulated"` in the configuration (or
//! `--simulate`). Links run the emulated firmware in-process and the RFID
//! reader presents a fixed tag after a delay.

pub mod firmware;
pub mod rfid;

pub use firmware::{SimulatedFirmware, SimulatedUnit};
pub use rfid::SimulatedRfid;

use crate::{
    Result,
    devices::AnyLink,
    traits::{LinkOpener, SerialLink},
    types::LinkSettings,
};
use std::{collections::VecDeque, time::Duration};
use tracing::trace;

/// A serial link whose far end is [`SimulatedFirmware`].
#[derive(Debug)]
pub struct SimulatedLink {
    path: String,
    firmware: SimulatedFirmware,
    outbox: VecDeque<u8>,
}

impl SimulatedLink {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_firmware(path, SimulatedFirmware::new())
    }

    pub fn with_firmware(path: impl Into<String>, firmware: SimulatedFirmware) -> Self {
        Self {
            path: path.into(),
            firmware,
            outbox: VecDeque::new(),
        }
    }

    /// Queue bytes as if left over from before the gateway connected.
    pub fn with_stale_bytes(mut self, bytes: &[u8]) -> Self {
        self.outbox.extend(bytes);
        self
    }

    pub fn firmware(&self) -> &SimulatedFirmware {
        &self.firmware
    }
}

impl SerialLink for SimulatedLink {
    fn path(&self) -> &str {
        &self.path
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let reply = self.firmware.respond(frame);
        trace!(path = %self.path, written = ?frame, ?reply, "simulated exchange");
        self.outbox.extend(reply);
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        match self.outbox.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

/// Opens a fresh [`SimulatedLink`] for every path.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOpener {
    calibration_busy: Option<usize>,
}

impl SimulatedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busy bytes each simulated unit sends before acking a calibration.
    pub fn with_calibration_busy(mut self, count: usize) -> Self {
        self.calibration_busy = Some(count);
        self
    }
}

impl LinkOpener for SimulatedOpener {
    async fn open(&self, path: &str, _settings: LinkSettings) -> Result<AnyLink> {
        let mut firmware = SimulatedFirmware::new();
        if let Some(count) = self.calibration_busy {
            firmware = firmware.with_calibration_busy(count);
        }
        Ok(AnyLink::Simulated(SimulatedLink::with_firmware(path, firmware)))
    }
}
