//! Unit → gateway responses.
//!
//! Units answer with either a single status byte ([`AckOutcome`]) or, for
//! `QueryProgress`, a three-byte [`ProgressFrame`]. Older firmware may also
//! push unsolicited `0xA0`/`0xA1` notifications, classified here as
//! [`ResponseTag::LegacyRfidOpen`] and [`ResponseTag::LegacyUnitClosed`] so
//! the channel can recognise and discard them.

use shelfsense_core::{Error, Result, UnitId, constants::*};

/// Result of decoding one ack byte (or its absence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// `0xAA`, command accepted.
    Success,
    /// `0xA2`, keep reading until a final byte arrives.
    Busy,
    /// Any other byte.
    Mismatch(u8),
    /// Bounded read returned nothing.
    Timeout,
}

impl AckOutcome {
    /// Classify the result of one bounded single-byte read.
    ///
    /// ```
    /// use shelfsense_protocol::AckOutcome;
    ///
    /// assert_eq!(AckOutcome::from_read(Some(0xAA)), AckOutcome::Success);
    /// assert_eq!(AckOutcome::from_read(Some(0xA2)), AckOutcome::Busy);
    /// assert_eq!(AckOutcome::from_read(Some(0x55)), AckOutcome::Mismatch(0x55));
    /// assert_eq!(AckOutcome::from_read(None), AckOutcome::Timeout);
    /// ```
    #[must_use]
    pub fn from_read(byte: Option<u8>) -> Self {
        match byte {
            Some(RESP_ACK) => AckOutcome::Success,
            Some(RESP_BUSY) => AckOutcome::Busy,
            Some(other) => AckOutcome::Mismatch(other),
            None => AckOutcome::Timeout,
        }
    }

    /// Returns `true` if no final answer has been seen yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, AckOutcome::Busy)
    }

    /// Convert a final outcome into a `Result` for `opcode`.
    ///
    /// `Busy` is not final; callers must keep reading before converting, and
    /// a leftover `Busy` is reported as a protocol error on `0xA2`.
    ///
    /// # Errors
    /// `Mismatch(b)` becomes `Error::Protocol { opcode, byte: b }`, `Timeout`
    /// becomes `Error::Timeout` with the given budget.
    pub fn into_result(self, opcode: u8, operation: &str, budget: std::time::Duration) -> Result<()> {
        match self {
            AckOutcome::Success => Ok(()),
            AckOutcome::Busy => Err(Error::Protocol {
                opcode,
                byte: RESP_BUSY,
            }),
            AckOutcome::Mismatch(byte) => Err(Error::Protocol { opcode, byte }),
            AckOutcome::Timeout => Err(Error::timeout(operation, budget)),
        }
    }
}

/// First byte of a unit response, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTag {
    Ack,
    Busy,
    Progress,
    /// Unsolicited RFID-open notification from older firmware.
    LegacyRfidOpen,
    /// Unsolicited unit-closed notification from older firmware.
    LegacyUnitClosed,
    /// Firmware did not recognise the opcode it was sent.
    UnknownCommand,
    Other(u8),
}

impl ResponseTag {
    pub fn classify(byte: u8) -> Self {
        match byte {
            RESP_ACK => ResponseTag::Ack,
            RESP_BUSY => ResponseTag::Busy,
            RESP_PROGRESS => ResponseTag::Progress,
            RESP_LEGACY_RFID_OPEN => ResponseTag::LegacyRfidOpen,
            RESP_LEGACY_UNIT_CLOSED => ResponseTag::LegacyUnitClosed,
            RESP_UNKNOWN_COMMAND => ResponseTag::UnknownCommand,
            other => ResponseTag::Other(other),
        }
    }

    /// Returns `true` for notifications the gateway recognises but ignores.
    #[inline]
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            ResponseTag::LegacyRfidOpen | ResponseTag::LegacyUnitClosed
        )
    }
}

/// Progress answer `[0xA3, unit, amount]` to `QueryProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressFrame {
    pub unit: UnitId,
    pub amount: u8,
}

impl ProgressFrame {
    pub fn new(unit: UnitId, amount: u8) -> Self {
        Self { unit, amount }
    }

    /// Decode a complete progress frame.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` on wrong length or header byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [RESP_PROGRESS, unit, amount] => Ok(Self::new(UnitId::new(*unit), *amount)),
            [header, _, _] => Err(Error::InvalidFrame(format!(
                "progress frame header 0x{header:02X}, expected 0x{RESP_PROGRESS:02X}"
            ))),
            _ => Err(Error::InvalidFrame(format!(
                "progress frame must be {PROGRESS_FRAME_LEN} bytes, got {}",
                bytes.len()
            ))),
        }
    }

    pub fn encode(&self) -> [u8; PROGRESS_FRAME_LEN] {
        [RESP_PROGRESS, self.unit.as_u8(), self.amount]
    }

    /// Returns `true` if this frame reports on `unit`.
    #[inline]
    pub fn is_for(&self, unit: UnitId) -> bool {
        self.unit == unit
    }
}
