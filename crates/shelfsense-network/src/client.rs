//! Control-plane connection and identity handshake.
//!
//! ```text
//! Gateway ──> Session ──(TCP, JSON lines)──> Control plane
//!                │
//!                └─> RemoteAuthorizer (check_authorization)
//! ```
//!
//! [`ControlPlane::connect`] opens the TCP stream, [`ControlPlane::authenticate`]
//! presents the gateway identity and waits for the verdict, and
//! [`ControlPlane::into_session`] hands the connection over to the request
//! loop.
//!
//! A rejected identity is returned as [`Error::Authorization`]; the process is
//! expected to exit on it.

use crate::error::ControlPlaneError;
use crate::messages::{Envelope, Operation};
use crate::session::{RemoteAuthorizer, Session};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use shelfsense_core::Error;
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

/// Longest line accepted from the control plane.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Request id reserved for the identity handshake.
const AUTH_REQUEST_ID: u64 = 0;

/// Control-plane connection settings.
///
/// # Example
///
/// ```
/// use shelfsense_network::ControlPlaneConfig;
/// use std::time::Duration;
///
/// let config = ControlPlaneConfig {
///     address: "10.0.0.5:3000".to_string(),
///     ..ControlPlaneConfig::default()
/// };
/// assert_eq!(config.connect_timeout, Duration::from_millis(3000));
/// ```
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    /// `host:port` of the control plane.
    pub address: String,

    /// Bound on the TCP connect.
    pub connect_timeout: Duration,

    /// Bound on each request the gateway sends (handshake, authorization checks).
    pub request_timeout: Duration,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            connect_timeout: Duration::from_millis(3000),
            request_timeout: Duration::from_millis(5000),
        }
    }
}

/// Identity the gateway presents to the control plane.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub host: String,
    pub password: String,
}

impl Identity {
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An open control-plane connection, before the request loop starts.
pub struct ControlPlane {
    framed: Framed<TcpStream, LinesCodec>,
    config: ControlPlaneConfig,
}

impl ControlPlane {
    /// Connect to the control plane.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::ConnectionTimeout`] if the connect does
    /// not complete within `connect_timeout`, or the I/O error otherwise.
    pub async fn connect(config: &ControlPlaneConfig) -> Result<Self, ControlPlaneError> {
        info!(address = %config.address, "connecting to control plane");

        let stream = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.address.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(address = %config.address, error = %e, "control plane connect failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    address = %config.address,
                    timeout_ms = config.connect_timeout.as_millis() as u64,
                    "control plane connect timed out"
                );
                return Err(ControlPlaneError::ConnectionTimeout(
                    config.connect_timeout.as_millis() as u64,
                ));
            }
        };

        // Progress events are small and latency matters more than batching.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }

        debug!(address = %config.address, "control plane connected");
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            config: config.clone(),
        })
    }

    /// Present the gateway identity and wait for the verdict.
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] (wrapped) if the control plane answers
    ///   anything but `true`
    /// - [`Error::Timeout`] (wrapped) if no answer arrives within
    ///   `request_timeout`
    /// - [`ControlPlaneError::ConnectionLost`] if the peer hangs up first
    pub async fn authenticate(&mut self, identity: &Identity) -> Result<(), ControlPlaneError> {
        let request = Envelope::Request {
            id: AUTH_REQUEST_ID,
            op: Operation::Auth {
                host: identity.host.clone(),
                pass: identity.password.clone(),
            },
        };
        self.framed.send(serde_json::to_string(&request)?).await?;
        debug!(host = %identity.host, "identity sent");

        let budget = self.config.request_timeout;
        let verdict = tokio::time::timeout(budget, self.await_auth_response())
            .await
            .map_err(|_| Error::timeout("auth", budget))??;

        if verdict == Value::Bool(true) {
            info!(host = %identity.host, "gateway identity accepted");
            Ok(())
        } else {
            error!(host = %identity.host, verdict = %verdict, "gateway identity rejected");
            Err(Error::Authorization {
                message: format!("control plane answered {verdict} for host {}", identity.host),
            }
            .into())
        }
    }

    async fn await_auth_response(&mut self) -> Result<Value, ControlPlaneError> {
        while let Some(line) = self.framed.next().await {
            let line = line?;
            match serde_json::from_str::<Envelope>(&line) {
                Ok(Envelope::Response { id, result }) if id == AUTH_REQUEST_ID => return Ok(result),
                Ok(other) => warn!(?other, "ignoring message received before identity verdict"),
                Err(e) => warn!(error = %e, "ignoring malformed line received before identity verdict"),
            }
        }
        Err(ControlPlaneError::ConnectionLost(
            "control plane closed the connection during the handshake".to_string(),
        ))
    }

    /// Hand the connection to the request loop.
    ///
    /// The returned authorizer sends `check_authorization` requests over
    /// this connection once the session runs.
    pub fn into_session(self) -> (Session, RemoteAuthorizer) {
        Session::new(self.framed, self.config.request_timeout)
    }
}

impl fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlane")
            .field("address", &self.config.address)
            .finish_non_exhaustive()
    }
}
