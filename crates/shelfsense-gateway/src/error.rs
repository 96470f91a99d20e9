use serde::Serialize;
use shelfsense_core::{Error, UnitId};
use std::fmt;
use thiserror::Error;

use crate::orchestrator::WorkflowKind;

/// Step of a workflow at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Resolving the order's containers to registered links.
    Validate,
    Authorization,
    Directive,
    OpenLock,
    Poll,
    CloseLock,
    Calibrate,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::Validate => "validation",
            WorkflowStep::Authorization => "authorization",
            WorkflowStep::Directive => "directive",
            WorkflowStep::OpenLock => "open lock",
            WorkflowStep::Poll => "progress poll",
            WorkflowStep::CloseLock => "close lock",
            WorkflowStep::Calibrate => "calibration",
        };
        f.write_str(name)
    }
}

/// A failed put-in, take-out or calibration, with enough context to report
/// partial progress.
///
/// Items listed in `completed` reached their target and had their lock
/// closed. The item that failed may have its lock left open.
#[derive(Error, Debug)]
#[error("{kind} failed at {step}{}: {source}", location(.container, .item_index))]
pub struct WorkflowError {
    pub kind: WorkflowKind,
    pub step: WorkflowStep,
    pub container: Option<UnitId>,
    pub item_index: Option<usize>,
    pub completed: Vec<UnitId>,
    pub source: Error,
}

fn location(container: &Option<UnitId>, item_index: &Option<usize>) -> String {
    match (container, item_index) {
        (Some(unit), Some(index)) => format!(" on container {unit} (item {index})"),
        (Some(unit), None) => format!(" on container {unit}"),
        (None, Some(index)) => format!(" (item {index})"),
        (None, None) => String::new(),
    }
}

impl WorkflowError {
    /// Returns `true` if the workflow stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, Error::Cancelled)
    }
}
