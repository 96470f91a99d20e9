use shelfsense_core::Error;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors of the control-plane connection.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Connection was closed before an expected reply
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Gateway-level failure, including a rejected identity
    #[error(transparent)]
    Gateway(#[from] Error),
}

impl ControlPlaneError {
    /// Returns `true` if the control plane refused the gateway identity.
    pub fn is_identity_rejected(&self) -> bool {
        matches!(self, Self::Gateway(Error::Authorization { .. }))
    }
}

impl From<LinesCodecError> for ControlPlaneError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::Io(e) => Self::Io(e),
            LinesCodecError::MaxLineLengthExceeded => Self::Codec("line too long".to_string()),
        }
    }
}

impl From<ControlPlaneError> for Error {
    fn from(e: ControlPlaneError) -> Self {
        match e {
            ControlPlaneError::Gateway(e) => e,
            ControlPlaneError::Io(e) => Error::Io(e),
            other => Error::connection("control plane", other.to_string()),
        }
    }
}
