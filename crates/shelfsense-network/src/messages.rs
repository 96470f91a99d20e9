//! Control-plane wire messages.
//!
//! One JSON envelope per line, tagged by `"type"`:
//!
//! ```text
//! {"type":"request","id":3,"op":{"name":"take_out","args":[{"container_id":7,"amount":3}]}}
//! {"type":"response","id":3,"result":{"success":true,"completed":[7],"error":null}}
//! {"type":"event","name":"take_out_progress","container_id":7,"amount":1}
//! ```
//!
//! Orders travel as arrays of `{container_id, amount}` so their order
//! survives any JSON implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shelfsense_core::{OrderLine, TagId, UnitId, UnitSpec};
use shelfsense_gateway::{InitReport, ProgressEvent, UnitInitResult, WorkflowError, WorkflowReport};

/// One line on the control-plane connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Request {
        id: u64,
        op: Operation,
    },
    Response {
        id: u64,
        result: Value,
    },
    Event {
        name: String,
        container_id: Option<UnitId>,
        amount: u8,
    },
}

/// Named operations, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum Operation {
    // Control plane → gateway
    InitUnits(Vec<UnitSpec>),
    CalibrateContainer { container_id: UnitId },
    PutIn(Vec<OrderLine>),
    TakeOut(Vec<OrderLine>),
    Abort,

    // Gateway → control plane
    Auth { host: String, pass: String },
    CheckAuthorization { tag: TagId },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::InitUnits(_) => "init_units",
            Operation::CalibrateContainer { .. } => "calibrate_container",
            Operation::PutIn(_) => "put_in",
            Operation::TakeOut(_) => "take_out",
            Operation::Abort => "abort",
            Operation::Auth { .. } => "auth",
            Operation::CheckAuthorization { .. } => "check_authorization",
        }
    }
}

impl Envelope {
    /// Event envelope for a progress event, or `None` for kinds without one.
    pub fn from_progress(event: &ProgressEvent) -> Option<Self> {
        event.kind.event_name().map(|name| Envelope::Event {
            name: name.to_string(),
            container_id: event.container,
            amount: event.amount,
        })
    }
}

/// Result of `init_units`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitUnitsResult {
    pub success: bool,
    pub units: Vec<UnitInitResult>,
}

impl From<InitReport> for InitUnitsResult {
    fn from(report: InitReport) -> Self {
        Self {
            success: report.all_ok(),
            units: report.units,
        }
    }
}

/// Result of `put_in` / `take_out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub completed: Vec<UnitId>,
    pub error: Option<String>,
}

impl From<std::result::Result<WorkflowReport, WorkflowError>> for WorkflowResult {
    fn from(result: std::result::Result<WorkflowReport, WorkflowError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                completed: report.completed,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                completed: e.completed,
            },
        }
    }
}
