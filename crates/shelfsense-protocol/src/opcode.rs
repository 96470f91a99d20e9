//! Opcode definitions for the container unit protocol.
//!
//! Every command frame starts with a single opcode byte, followed by the
//! target unit id and a payload whose length is fixed per opcode:
//!
//! ```text
//! [OPCODE][UNIT_ID][PAYLOAD ...]
//!  ^^^^^^
//!  opcode position
//! ```
//!
//! # Command Categories
//!
//! ## Link Management
//! - `Sync` (0x00): bring-up synchronisation, never acknowledged
//!
//! ## Unit Setup
//! - `InitUnit` (0x10): program name and weight capacity
//! - `Calibrate` (0x11): physical calibration cycle, acked after busy bytes
//!
//! ## Workflow
//! - `TakeOut` (0x12) / `PutIn` (0x13): arm a directive with a target amount
//! - `OpenLock` (0x15) / `CloseLock` (0x18): drive the electromechanical lock
//! - `DenySignal` (0x16): audible/visual reject of a credential
//! - `QueryProgress` (0x17): ask for the amount moved so far
//!
//! # Usage
//!
//! ```
//! use shelfsense_protocol::Opcode;
//!
//! let op = Opcode::try_from(0x13).unwrap();
//! assert_eq!(op, Opcode::PutIn);
//! assert_eq!(op.payload_len(), 1);
//! assert!(Opcode::try_from(0x14).is_err());
//! ```

use serde::{Deserialize, Serialize};
use shelfsense_core::{Error, Result, constants::*};
use std::fmt;

/// Command opcodes understood by the unit firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Sync,          // 0x00
    InitUnit,      // 0x10
    Calibrate,     // 0x11
    TakeOut,       // 0x12
    PutIn,         // 0x13
    OpenLock,      // 0x15
    DenySignal,    // 0x16
    QueryProgress, // 0x17
    CloseLock,     // 0x18
}

impl Opcode {
    /// All opcodes in wire order.
    pub const ALL: [Opcode; 9] = [
        Opcode::Sync,
        Opcode::InitUnit,
        Opcode::Calibrate,
        Opcode::TakeOut,
        Opcode::PutIn,
        Opcode::OpenLock,
        Opcode::DenySignal,
        Opcode::QueryProgress,
        Opcode::CloseLock,
    ];

    /// Parse an opcode from its wire byte.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` for bytes that are not a known opcode.
    pub fn parse(byte: u8) -> Result<Self> {
        match byte {
            OP_SYNC => Ok(Opcode::Sync),
            OP_INIT_UNIT => Ok(Opcode::InitUnit),
            OP_CALIBRATE => Ok(Opcode::Calibrate),
            OP_TAKE_OUT => Ok(Opcode::TakeOut),
            OP_PUT_IN => Ok(Opcode::PutIn),
            OP_OPEN_LOCK => Ok(Opcode::OpenLock),
            OP_DENY_SIGNAL => Ok(Opcode::DenySignal),
            OP_QUERY_PROGRESS => Ok(Opcode::QueryProgress),
            OP_CLOSE_LOCK => Ok(Opcode::CloseLock),
            other => Err(Error::InvalidFrame(format!(
                "unknown opcode 0x{other:02X}"
            ))),
        }
    }

    /// The wire byte of this opcode.
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::Sync => OP_SYNC,
            Opcode::InitUnit => OP_INIT_UNIT,
            Opcode::Calibrate => OP_CALIBRATE,
            Opcode::TakeOut => OP_TAKE_OUT,
            Opcode::PutIn => OP_PUT_IN,
            Opcode::OpenLock => OP_OPEN_LOCK,
            Opcode::DenySignal => OP_DENY_SIGNAL,
            Opcode::QueryProgress => OP_QUERY_PROGRESS,
            Opcode::CloseLock => OP_CLOSE_LOCK,
        }
    }

    /// Number of payload bytes following the unit id.
    ///
    /// ```
    /// use shelfsense_protocol::Opcode;
    ///
    /// assert_eq!(Opcode::InitUnit.payload_len(), 17); // name + weight
    /// assert_eq!(Opcode::TakeOut.payload_len(), 1);   // amount
    /// assert_eq!(Opcode::CloseLock.payload_len(), 0);
    /// ```
    #[inline]
    pub fn payload_len(&self) -> usize {
        match self {
            Opcode::InitUnit => UNIT_NAME_LEN + 1,
            Opcode::TakeOut | Opcode::PutIn => 1,
            _ => 0,
        }
    }

    /// Total length of a frame carrying this opcode.
    #[inline]
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload_len()
    }

    /// Returns `true` if the unit answers this opcode with a single-byte ack.
    ///
    /// `Sync` gets no structured answer and `QueryProgress` gets a progress
    /// frame (or nothing) instead.
    #[inline]
    pub fn expects_ack(&self) -> bool {
        !matches!(self, Opcode::Sync | Opcode::QueryProgress)
    }

    /// Returns `true` if the ack may legitimately be preceded by busy bytes.
    #[inline]
    pub fn allows_busy(&self) -> bool {
        matches!(self, Opcode::Calibrate)
    }

    /// Human-readable name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Sync => "Sync",
            Opcode::InitUnit => "InitUnit",
            Opcode::Calibrate => "Calibrate",
            Opcode::TakeOut => "TakeOutDirective",
            Opcode::PutIn => "PutInDirective",
            Opcode::OpenLock => "OpenLock",
            Opcode::DenySignal => "DenySignal",
            Opcode::QueryProgress => "QueryProgress",
            Opcode::CloseLock => "CloseLock",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Opcode::parse(byte)
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op.as_u8()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x00, Opcode::Sync)]
    #[case(0x10, Opcode::InitUnit)]
    #[case(0x11, Opcode::Calibrate)]
    #[case(0x12, Opcode::TakeOut)]
    #[case(0x13, Opcode::PutIn)]
    #[case(0x15, Opcode::OpenLock)]
    #[case(0x16, Opcode::DenySignal)]
    #[case(0x17, Opcode::QueryProgress)]
    #[case(0x18, Opcode::CloseLock)]
    fn test_opcode_byte_roundtrip(#[case] byte: u8, #[case] expected: Opcode) {
        assert_eq!(Opcode::parse(byte).unwrap(), expected);
        assert_eq!(expected.as_u8(), byte);
    }

    #[rstest]
    #[case(0x14)]
    #[case(0x19)]
    #[case(0xAA)]
    #[case(0xFF)]
    fn test_unknown_opcode(#[case] byte: u8) {
        assert!(matches!(Opcode::parse(byte), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_ack_expectations() {
        assert!(!Opcode::Sync.expects_ack());
        assert!(!Opcode::QueryProgress.expects_ack());
        assert!(Opcode::Calibrate.expects_ack());
        assert!(Opcode::Calibrate.allows_busy());
        assert!(!Opcode::OpenLock.allows_busy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::PutIn.to_string(), "PutInDirective(0x13)");
    }
}
