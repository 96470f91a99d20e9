use crate::opcode::Opcode;
use bytes::{BufMut, Bytes, BytesMut};
use shelfsense_core::{Error, Result, UnitId, constants::FRAME_HEADER_LEN};
use std::fmt;

/// A command frame as it travels gateway → unit.
///
/// # Wire Format
/// ```text
/// [OPCODE][UNIT_ID][PAYLOAD ...]
/// ```
/// The payload length is fixed by the opcode (see [`Opcode::payload_len`]),
/// so frames need no delimiter or length prefix.
///
/// # Example
/// ```
/// use shelfsense_core::UnitId;
/// use shelfsense_protocol::{CommandFrame, Opcode};
///
/// let frame = CommandFrame::encode(Opcode::PutIn, UnitId::new(7), &[3]).unwrap();
/// assert_eq!(frame.as_bytes(), &[0x13, 0x07, 0x03]);
///
/// let decoded = CommandFrame::decode(frame.as_bytes()).unwrap();
/// assert_eq!(decoded.unit(), UnitId::new(7));
/// assert_eq!(decoded.payload(), &[3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: Opcode,
    unit: UnitId,
    /// Full encoded frame, header included.
    data: Bytes,
}

impl CommandFrame {
    /// Build a frame `[opcode, unit, payload...]`.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the payload length does not match the
    /// layout fixed for `opcode`.
    pub fn encode(opcode: Opcode, unit: UnitId, payload: &[u8]) -> Result<Self> {
        if payload.len() != opcode.payload_len() {
            return Err(Error::InvalidFrame(format!(
                "{} expects {} payload bytes, got {}",
                opcode.name(),
                opcode.payload_len(),
                payload.len()
            )));
        }

        Ok(Self::assemble(opcode, unit, payload))
    }

    /// Build a frame whose payload length is already known to be correct.
    pub(crate) fn assemble(opcode: Opcode, unit: UnitId, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        buf.put_u8(opcode.as_u8());
        buf.put_u8(unit.as_u8());
        buf.put_slice(payload);

        CommandFrame {
            opcode,
            unit,
            data: buf.freeze(),
        }
    }

    /// Decode exactly one frame from `bytes`.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the opcode is unknown or the length
    /// does not match the opcode's layout.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&op_byte, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::InvalidFrame("empty frame".to_string()))?;
        let opcode = Opcode::parse(op_byte)?;

        if bytes.len() != opcode.frame_len() {
            return Err(Error::InvalidFrame(format!(
                "{} frame must be {} bytes, got {}",
                opcode.name(),
                opcode.frame_len(),
                bytes.len()
            )));
        }

        Ok(CommandFrame {
            opcode,
            unit: UnitId::new(rest[0]),
            data: Bytes::copy_from_slice(bytes),
        })
    }

    /// The frame's opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The addressed unit.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Payload bytes following the unit id.
    pub fn payload(&self) -> &[u8] {
        &self.data[FRAME_HEADER_LEN..]
    }

    /// The full encoded frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame and return its encoded bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Frame size in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} unit={} [", self.opcode, self.unit)?;
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, "]")
    }
}
