//! Typed commands and their frame encoding.
//!
//! [`Command`] is what the rest of the gateway speaks; [`CommandFrame`] is
//! what goes on the wire. Converting one into the other is infallible because
//! every variant carries exactly the payload its opcode requires.

use crate::{frame::CommandFrame, opcode::Opcode};
use shelfsense_core::{Error, Result, UnitId, UnitName, constants::UNIT_NAME_LEN};

/// A command addressed to one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync { unit: UnitId },
    InitUnit { unit: UnitId, name: UnitName, weight: u8 },
    Calibrate { unit: UnitId },
    TakeOut { unit: UnitId, amount: u8 },
    PutIn { unit: UnitId, amount: u8 },
    OpenLock { unit: UnitId },
    DenySignal { unit: UnitId },
    QueryProgress { unit: UnitId },
    CloseLock { unit: UnitId },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Sync { .. } => Opcode::Sync,
            Command::InitUnit { .. } => Opcode::InitUnit,
            Command::Calibrate { .. } => Opcode::Calibrate,
            Command::TakeOut { .. } => Opcode::TakeOut,
            Command::PutIn { .. } => Opcode::PutIn,
            Command::OpenLock { .. } => Opcode::OpenLock,
            Command::DenySignal { .. } => Opcode::DenySignal,
            Command::QueryProgress { .. } => Opcode::QueryProgress,
            Command::CloseLock { .. } => Opcode::CloseLock,
        }
    }

    pub fn unit(&self) -> UnitId {
        match self {
            Command::Sync { unit }
            | Command::InitUnit { unit, .. }
            | Command::Calibrate { unit }
            | Command::TakeOut { unit, .. }
            | Command::PutIn { unit, .. }
            | Command::OpenLock { unit }
            | Command::DenySignal { unit }
            | Command::QueryProgress { unit }
            | Command::CloseLock { unit } => *unit,
        }
    }

    /// Payload bytes following the unit id.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::InitUnit { name, weight, .. } => {
                let mut payload = Vec::with_capacity(UNIT_NAME_LEN + 1);
                payload.extend_from_slice(&name.padded());
                payload.push(*weight);
                payload
            }
            Command::TakeOut { amount, .. } | Command::PutIn { amount, .. } => vec![*amount],
            _ => Vec::new(),
        }
    }

    /// Encode into a wire frame.
    pub fn to_frame(&self) -> CommandFrame {
        // Payload layouts above always match Opcode::payload_len.
        CommandFrame::assemble(self.opcode(), self.unit(), &self.payload())
    }
}

impl From<&Command> for CommandFrame {
    fn from(command: &Command) -> Self {
        command.to_frame()
    }
}

impl TryFrom<&CommandFrame> for Command {
    type Error = Error;

    /// Recover the typed command from a decoded frame.
    ///
    /// # Errors
    /// Returns `Error::InvalidUnitName` if an `InitUnit` name field is not
    /// valid padded ASCII.
    fn try_from(frame: &CommandFrame) -> Result<Self> {
        let unit = frame.unit();
        let payload = frame.payload();
        Ok(match frame.opcode() {
            Opcode::Sync => Command::Sync { unit },
            Opcode::InitUnit => Command::InitUnit {
                unit,
                name: UnitName::from_padded(&payload[..UNIT_NAME_LEN])?,
                weight: payload[UNIT_NAME_LEN],
            },
            Opcode::Calibrate => Command::Calibrate { unit },
            Opcode::TakeOut => Command::TakeOut {
                unit,
                amount: payload[0],
            },
            Opcode::PutIn => Command::PutIn {
                unit,
                amount: payload[0],
            },
            Opcode::OpenLock => Command::OpenLock { unit },
            Opcode::DenySignal => Command::DenySignal { unit },
            Opcode::QueryProgress => Command::QueryProgress { unit },
            Opcode::CloseLock => Command::CloseLock { unit },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: u8) -> UnitId {
        UnitId::new(id)
    }

    #[test]
    fn test_init_unit_frame() {
        let command = Command::InitUnit {
            unit: unit(3),
            name: UnitName::new("Cameras shelf").unwrap(),
            weight: 100,
        };
        let frame = command.to_frame();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), 19);
        assert_eq!(&bytes[..2], &[0x10, 0x03]);
        assert_eq!(&bytes[2..15], b"Cameras shelf");
        assert_eq!(&bytes[15..18], &[0, 0, 0]);
        assert_eq!(bytes[18], 100);
    }

    #[test]
    fn test_directive_frames() {
        assert_eq!(
            Command::TakeOut { unit: unit(7), amount: 3 }.to_frame().as_bytes(),
            &[0x12, 0x07, 0x03]
        );
        assert_eq!(
            Command::PutIn { unit: unit(2), amount: 255 }.to_frame().as_bytes(),
            &[0x13, 0x02, 0xFF]
        );
    }

    #[test]
    fn test_unit_only_frames() {
        assert_eq!(Command::Sync { unit: unit(0) }.to_frame().as_bytes(), &[0x00, 0x00]);
        assert_eq!(Command::Calibrate { unit: unit(5) }.to_frame().as_bytes(), &[0x11, 0x05]);
        assert_eq!(Command::OpenLock { unit: unit(5) }.to_frame().as_bytes(), &[0x15, 0x05]);
        assert_eq!(Command::DenySignal { unit: unit(5) }.to_frame().as_bytes(), &[0x16, 0x05]);
        assert_eq!(
            Command::QueryProgress { unit: unit(5) }.to_frame().as_bytes(),
            &[0x17, 0x05]
        );
        assert_eq!(Command::CloseLock { unit: unit(5) }.to_frame().as_bytes(), &[0x18, 0x05]);
    }

    #[test]
    fn test_deny_signal_carries_plain_unit_byte() {
        // Unit 0 shares the broadcast address; the frame keeps its two-byte shape.
        assert_eq!(Command::DenySignal { unit: unit(0) }.to_frame().as_bytes(), &[0x16, 0x00]);
        let decoded = Command::try_from(&CommandFrame::decode(&[0x16, 0x00]).unwrap()).unwrap();
        assert_eq!(decoded, Command::DenySignal { unit: unit(0) });
    }

    #[test]
    fn test_frame_back_to_command() {
        let command = Command::InitUnit {
            unit: unit(9),
            name: UnitName::new("Bin").unwrap(),
            weight: 12,
        };
        let frame = command.to_frame();
        let decoded = Command::try_from(&CommandFrame::decode(frame.as_bytes()).unwrap()).unwrap();
        assert_eq!(decoded, command);
    }
}
