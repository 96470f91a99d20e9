//! In-process emulation of the container unit firmware.
//!
//! [`SimulatedFirmware`] consumes the raw bytes the gateway writes and
//! produces the bytes a unit would answer with. It backs the simulated
//! serial backend and can also drive a [`MockLink`](crate::mock::MockLink)
//! so tests get realistic answers while still recording traffic.

use bytes::BytesMut;
use shelfsense_core::{
    UnitId, UnitName,
    constants::{RESP_ACK, RESP_BUSY, RESP_UNKNOWN_COMMAND},
};
use shelfsense_protocol::{Command, CommandCodec, InboundFrame, ProgressFrame};
use std::collections::HashMap;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

/// Firmware-side state of one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedUnit {
    pub name: Option<UnitName>,
    pub weight: u8,
    pub target: u8,
    pub progress: u8,
    pub lock_open: bool,
    pub calibrated: bool,
}

/// Emulated firmware for every unit on one link.
#[derive(Debug)]
pub struct SimulatedFirmware {
    inbox: BytesMut,
    codec: CommandCodec,
    units: HashMap<UnitId, SimulatedUnit>,
    calibration_busy: usize,
}

impl Default for SimulatedFirmware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFirmware {
    /// Busy bytes sent before the calibration ack unless configured otherwise.
    pub const DEFAULT_CALIBRATION_BUSY: usize = 2;

    pub fn new() -> Self {
        Self {
            inbox: BytesMut::new(),
            codec: CommandCodec::new(),
            units: HashMap::new(),
            calibration_busy: Self::DEFAULT_CALIBRATION_BUSY,
        }
    }

    /// Set how many busy bytes precede the calibration ack.
    pub fn with_calibration_busy(mut self, count: usize) -> Self {
        self.calibration_busy = count;
        self
    }

    /// State of `unit`, if the firmware has seen it.
    pub fn unit(&self, unit: UnitId) -> Option<&SimulatedUnit> {
        self.units.get(&unit)
    }

    /// Feed bytes written by the gateway and collect the reply bytes.
    ///
    /// Incomplete frames stay buffered until the rest arrives.
    pub fn respond(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.inbox.extend_from_slice(bytes);
        let mut reply = Vec::new();
        loop {
            match self.codec.decode(&mut self.inbox) {
                Ok(Some(InboundFrame::Command(frame))) => match Command::try_from(&frame) {
                    Ok(command) => self.execute(command, &mut reply),
                    Err(e) => {
                        warn!(error = %e, "firmware rejected malformed frame");
                        reply.push(RESP_UNKNOWN_COMMAND);
                    }
                },
                Ok(Some(InboundFrame::Unknown { opcode, .. })) => {
                    debug!(opcode, "firmware: unknown opcode");
                    reply.push(RESP_UNKNOWN_COMMAND);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "firmware dropped unreadable input");
                    self.inbox.clear();
                    reply.push(RESP_UNKNOWN_COMMAND);
                    break;
                }
            }
        }
        reply
    }

    fn execute(&mut self, command: Command, reply: &mut Vec<u8>) {
        let unit = command.unit();
        match command {
            Command::Sync { .. } => return,
            Command::InitUnit { name, weight, .. } => {
                let state = self.units.entry(unit).or_default();
                state.name = Some(name);
                state.weight = weight;
            }
            Command::Calibrate { .. } => {
                self.units.entry(unit).or_default().calibrated = true;
                reply.extend(std::iter::repeat_n(RESP_BUSY, self.calibration_busy));
            }
            Command::TakeOut { amount, .. } | Command::PutIn { amount, .. } => {
                let state = self.units.entry(unit).or_default();
                state.target = amount;
                state.progress = 0;
            }
            Command::OpenLock { .. } => self.units.entry(unit).or_default().lock_open = true,
            Command::CloseLock { .. } => self.units.entry(unit).or_default().lock_open = false,
            Command::DenySignal { .. } => {}
            Command::QueryProgress { .. } => {
                let state = self.units.entry(unit).or_default();
                if state.lock_open && state.progress < state.target {
                    state.progress += 1;
                }
                reply.extend_from_slice(&ProgressFrame::new(unit, state.progress).encode());
                return;
            }
        }
        reply.push(RESP_ACK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(command: Command) -> Vec<u8> {
        command.to_frame().as_bytes().to_vec()
    }

    #[test]
    fn test_sync_is_silent() {
        let mut firmware = SimulatedFirmware::new();
        assert!(firmware.respond(&[0x00, 0x00]).is_empty());
    }

    #[test]
    fn test_init_unit_acks_and_stores() {
        let mut firmware = SimulatedFirmware::new();
        let unit = UnitId::new(3);
        let reply = firmware.respond(&bytes(Command::InitUnit {
            unit,
            name: UnitName::new("Cameras").unwrap(),
            weight: 40,
        }));
        assert_eq!(reply, vec![RESP_ACK]);
        let state = firmware.unit(unit).unwrap();
        assert_eq!(state.name.as_ref().unwrap().as_str(), "Cameras");
        assert_eq!(state.weight, 40);
    }

    #[test]
    fn test_calibrate_sends_busy_then_ack() {
        let mut firmware = SimulatedFirmware::new().with_calibration_busy(3);
        let reply = firmware.respond(&[0x11, 0x05]);
        assert_eq!(reply, vec![0xA2, 0xA2, 0xA2, 0xAA]);
    }

    #[test]
    fn test_progress_only_advances_while_open() {
        let mut firmware = SimulatedFirmware::new();
        let unit = UnitId::new(7);
        firmware.respond(&bytes(Command::PutIn { unit, amount: 2 }));

        assert_eq!(firmware.respond(&[0x17, 7]), vec![0xA3, 7, 0]);

        firmware.respond(&[0x15, 7]);
        assert_eq!(firmware.respond(&[0x17, 7]), vec![0xA3, 7, 1]);
        assert_eq!(firmware.respond(&[0x17, 7]), vec![0xA3, 7, 2]);
        assert_eq!(firmware.respond(&[0x17, 7]), vec![0xA3, 7, 2]);
    }

    #[test]
    fn test_split_frame_is_buffered() {
        let mut firmware = SimulatedFirmware::new();
        assert!(firmware.respond(&[0x13]).is_empty());
        assert_eq!(firmware.respond(&[0x02, 0x01]), vec![RESP_ACK]);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut firmware = SimulatedFirmware::new();
        assert_eq!(firmware.respond(&[0x42, 0x01]), vec![0x55]);
    }
}
