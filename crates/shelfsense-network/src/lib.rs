//! Control-plane adapter for the ShelfSense gateway.
//!
//! The gateway connects out to the control plane over TCP and exchanges
//! newline-delimited JSON envelopes (see [`messages`]):
//!
//! - **ControlPlane**: connect with timeout and present the gateway identity
//! - **Session**: serve inbound operations, forward progress events
//! - **RemoteAuthorizer**: `check_authorization` round trips for the RFID gate
//!
//! # Example
//!
//! ```no_run
//! use shelfsense_network::{ControlPlane, ControlPlaneConfig, Identity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut control_plane = ControlPlane::connect(&ControlPlaneConfig::default()).await?;
//! control_plane.authenticate(&Identity::new("shelf-01", "secret")).await?;
//! let (session, authorizer) = control_plane.into_session();
//! // Build the gateway with `authorizer`, then `session.run(gateway, events)`.
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod messages;
mod session;

pub use client::{ControlPlane, ControlPlaneConfig, Identity, MAX_LINE_LENGTH};
pub use error::ControlPlaneError;
pub use messages::{Envelope, InitUnitsResult, Operation, WorkflowResult};
pub use session::{RemoteAuthorizer, Session, SessionEnd};
