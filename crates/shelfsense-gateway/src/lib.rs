//! ShelfSense gateway core.
//!
//! This crate drives container units over their serial links:
//!
//! - [`LinkRegistry`]: one link per serial path, bring-up on first use
//! - [`channel`]: serialized command/ack and progress exchanges
//! - [`RfidGate`]: credential retry loop in front of put-ins
//! - [`Orchestrator`]: put-in, take-out and calibration workflows
//! - [`Gateway`]: the service object the control-plane adapter calls
//!
//! Data flows adapter → orchestrator → channel → codec → link; progress
//! flows back as [`ProgressEvent`]s on an mpsc channel.

pub mod channel;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod rfid_gate;
pub mod service;
pub mod state_machine;
pub mod timing;

pub use error::{WorkflowError, WorkflowStep};
pub use orchestrator::{Orchestrator, ProgressEvent, WorkflowKind, WorkflowReport};
pub use registry::{Link, LinkRegistry, LinkState, bring_up};
pub use rfid_gate::{Authorizer, RfidGate};
pub use service::{Gateway, GatewayBuilder, InitReport, UnitInitResult};
pub use state_machine::{StateTransition, WorkflowMachine, WorkflowState};
pub use timing::Timing;
