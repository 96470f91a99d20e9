//! Error types for hardware operations.
//!
//! These cover device-level failures of serial links and RFID readers. The
//! gateway sees them as [`shelfsense_core::Error::Connection`] through the
//! `From` conversion below.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error on {device}: {message}")]
    CommunicationError { device: String, message: String },

    /// Device could not be opened.
    #[error("Failed to open {device}: {message}")]
    OpenFailed { device: String, message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommunicationError {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new open failure.
    pub fn open_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            device: device.into(),
            message: message.into(),
        }
    }
}

impl From<HardwareError> for shelfsense_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Disconnected { device } => {
                shelfsense_core::Error::connection(device, "disconnected")
            }
            HardwareError::CommunicationError { device, message }
            | HardwareError::OpenFailed { device, message } => {
                shelfsense_core::Error::connection(device, message)
            }
            HardwareError::Io(e) => shelfsense_core::Error::Io(e),
        }
    }
}
