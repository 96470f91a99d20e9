use thiserror::Error;

use crate::types::UnitId;

#[derive(Error, Debug)]
pub enum Error {
    // Link errors
    #[error("Connection error on {path}: {message}")]
    Connection { path: String, message: String },

    // Protocol errors
    #[error("Protocol error: unexpected byte 0x{byte:02X} in response to opcode 0x{opcode:02X}")]
    Protocol { opcode: u8, byte: u8 },

    #[error("Timeout: no response to {operation} within {budget_ms}ms")]
    Timeout { operation: String, budget_ms: u64 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // Control plane errors
    #[error("Gateway identity rejected by control plane: {message}")]
    Authorization { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Validation errors
    #[error("Invalid unit name: {0}")]
    InvalidUnitName(String),

    #[error("Invalid tag identifier: {0}")]
    InvalidTag(String),

    #[error("Unit {0} is not registered")]
    UnknownUnit(UnitId),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a connection error for a serial path.
    pub fn connection(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error for an operation and its budget.
    pub fn timeout(operation: impl Into<String>, budget: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            budget_ms: budget.as_millis() as u64,
        }
    }

    /// Returns `true` for errors raised by the unit itself (bad ack or silence),
    /// as opposed to link or local failures.
    #[must_use]
    pub fn is_unit_fault(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
