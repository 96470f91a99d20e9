//! Workflow orchestrator: put-in, take-out and calibration.
//!
//! # Put-in / take-out
//!
//! ```text
//! (put-in only) RFID gate ──> start sentinel (None, 0)
//!   for each (container, target) in order:
//!     directive ──> OpenLock ──> poll until amount == target ──> settle ──> CloseLock
//! finish sentinel (None, last amount)
//! ```
//!
//! Each command is one locked exchange on the container's link; the poll
//! loop sleeps without the lock. Every sleep, poll and tag read is a
//! cancellation point.
//!
//! Any error aborts the whole order. Completed items are reported in the
//! [`WorkflowError`]; the failing item's lock is not closed automatically.

use crate::channel;
use crate::error::{WorkflowError, WorkflowStep};
use crate::registry::{Link, LinkRegistry};
use crate::rfid_gate::{Authorizer, RfidGate};
use crate::state_machine::{WorkflowMachine, WorkflowState};
use crate::timing::{Timing, sleep_or_cancel};
use serde::Serialize;
use shelfsense_core::{Error, OrderLine, Result, UnitId};
use shelfsense_protocol::Command;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Kind of operation a workflow performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    PutIn,
    TakeOut,
    Calibrate,
}

impl WorkflowKind {
    /// Name of the progress event this kind emits, if any.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            WorkflowKind::PutIn => Some("put_in_progress"),
            WorkflowKind::TakeOut => Some("take_out_progress"),
            WorkflowKind::Calibrate => None,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowKind::PutIn => "put_in",
            WorkflowKind::TakeOut => "take_out",
            WorkflowKind::Calibrate => "calibrate",
        })
    }
}

/// Progress of a put-in or take-out.
///
/// `container == None` marks a sentinel: amount 0 when the workflow
/// unlocked, the last observed amount when it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub kind: WorkflowKind,
    pub container: Option<UnitId>,
    pub amount: u8,
}

impl ProgressEvent {
    pub fn started(kind: WorkflowKind) -> Self {
        Self {
            kind,
            container: None,
            amount: 0,
        }
    }

    pub fn finished(kind: WorkflowKind, amount: u8) -> Self {
        Self {
            kind,
            container: None,
            amount,
        }
    }

    pub fn item(kind: WorkflowKind, container: UnitId, amount: u8) -> Self {
        Self {
            kind,
            container: Some(container),
            amount,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.container.is_none()
    }
}

/// Outcome of a completed put-in or take-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    pub kind: WorkflowKind,
    /// Containers in the order they were completed.
    pub completed: Vec<UnitId>,
    /// Amount observed on the last item, as sent in the finish sentinel.
    pub final_amount: u8,
}

/// Tracks one workflow's state so failures carry full context.
struct Tracker {
    kind: WorkflowKind,
    machine: WorkflowMachine,
    completed: Vec<UnitId>,
}

impl Tracker {
    fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            machine: WorkflowMachine::new(),
            completed: Vec::new(),
        }
    }

    fn fail(
        &mut self,
        step: WorkflowStep,
        container: Option<UnitId>,
        item_index: Option<usize>,
        source: Error,
    ) -> WorkflowError {
        self.machine.fail();
        let failure = WorkflowError {
            kind: self.kind,
            step,
            container,
            item_index,
            completed: self.completed.clone(),
            source,
        };
        if failure.is_cancelled() {
            warn!(%failure, "workflow cancelled");
        } else {
            error!(%failure, completed = ?failure.completed, "workflow failed");
        }
        failure
    }

    fn enter(
        &mut self,
        state: WorkflowState,
        step: WorkflowStep,
        container: Option<UnitId>,
    ) -> std::result::Result<(), WorkflowError> {
        match self.machine.transition_to(state) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(step, container, state.item_index(), e)),
        }
    }
}

/// Sequences workflows over the registry's links.
#[derive(Debug)]
pub struct Orchestrator<A> {
    registry: Arc<LinkRegistry>,
    gate: RfidGate<A>,
    events: mpsc::Sender<ProgressEvent>,
}

impl<A: Authorizer> Orchestrator<A> {
    pub fn new(
        registry: Arc<LinkRegistry>,
        gate: RfidGate<A>,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            registry,
            gate,
            events,
        }
    }

    pub fn gate(&self) -> &RfidGate<A> {
        &self.gate
    }

    fn timing(&self) -> &Timing {
        self.registry.timing()
    }

    /// Run a put-in order, gated by an authorized RFID credential.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowError`] naming the step, container and item that
    /// failed, plus the containers already completed.
    pub async fn put_in(
        &self,
        order: &[OrderLine],
        cancel: &CancellationToken,
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        self.run(WorkflowKind::PutIn, order, cancel).await
    }

    /// Run a take-out order. No RFID gate: access was decided upstream.
    ///
    /// # Errors
    ///
    /// See [`put_in`](Self::put_in).
    pub async fn take_out(
        &self,
        order: &[OrderLine],
        cancel: &CancellationToken,
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        self.run(WorkflowKind::TakeOut, order, cancel).await
    }

    /// Calibrate `unit`, then close its lock.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowError`] at `Calibrate` or `CloseLock`.
    pub async fn calibrate(
        &self,
        unit: UnitId,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), WorkflowError> {
        let mut tracker = Tracker::new(WorkflowKind::Calibrate);
        let timing = self.timing();
        let link = self
            .registry
            .lookup(unit)
            .await
            .map_err(|e| tracker.fail(WorkflowStep::Validate, Some(unit), None, e))?;

        info!(%unit, "calibrating");
        channel::send_command(&link, &Command::Calibrate { unit }, timing)
            .await
            .map_err(|e| tracker.fail(WorkflowStep::Calibrate, Some(unit), None, e))?;

        let close = async {
            sleep_or_cancel(timing.close_settle, cancel).await?;
            channel::send_command(&link, &Command::CloseLock { unit }, timing).await
        };
        close
            .await
            .map_err(|e| tracker.fail(WorkflowStep::CloseLock, Some(unit), None, e))?;

        info!(%unit, "calibration complete");
        Ok(())
    }

    async fn run(
        &self,
        kind: WorkflowKind,
        order: &[OrderLine],
        cancel: &CancellationToken,
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        let mut tracker = Tracker::new(kind);
        let timing = self.timing();
        info!(%kind, items = order.len(), "workflow started");

        // Resolve every container before touching any hardware.
        let mut links = Vec::with_capacity(order.len());
        for (index, line) in order.iter().enumerate() {
            let link = self.registry.lookup(line.container_id).await.map_err(|e| {
                tracker.fail(WorkflowStep::Validate, Some(line.container_id), Some(index), e)
            })?;
            links.push(link);
        }

        if kind == WorkflowKind::PutIn
            && let (Some(first), Some(link)) = (order.first(), links.first())
        {
            self.gate
                .authorize(link, first.container_id, timing, cancel)
                .await
                .map_err(|e| {
                    tracker.fail(WorkflowStep::Authorization, Some(first.container_id), None, e)
                })?;
        }

        tracker.enter(WorkflowState::Unlocked, WorkflowStep::Authorization, None)?;
        self.emit(ProgressEvent::started(kind)).await;

        let mut last_amount = 0u8;
        for (index, (line, link)) in order.iter().zip(&links).enumerate() {
            let unit = line.container_id;
            tracker.enter(WorkflowState::PollingItem(index), WorkflowStep::Directive, Some(unit))?;
            last_amount = self
                .run_item(kind, line, link, cancel)
                .await
                .map_err(|(step, e)| tracker.fail(step, Some(unit), Some(index), e))?;
            tracker.enter(WorkflowState::ItemClosed(index), WorkflowStep::CloseLock, Some(unit))?;
            tracker.completed.push(unit);
        }

        tracker.enter(WorkflowState::Finished, WorkflowStep::CloseLock, None)?;
        self.emit(ProgressEvent::finished(kind, last_amount)).await;
        info!(%kind, completed = ?tracker.completed, final_amount = last_amount, "workflow finished");

        Ok(WorkflowReport {
            kind,
            completed: tracker.completed,
            final_amount: last_amount,
        })
    }

    /// Directive, open, poll, settle and close for one item.
    async fn run_item(
        &self,
        kind: WorkflowKind,
        line: &OrderLine,
        link: &Link,
        cancel: &CancellationToken,
    ) -> std::result::Result<u8, (WorkflowStep, Error)> {
        let timing = self.timing();
        let unit = line.container_id;
        let directive = match kind {
            WorkflowKind::PutIn => Command::PutIn {
                unit,
                amount: line.amount,
            },
            _ => Command::TakeOut {
                unit,
                amount: line.amount,
            },
        };

        debug!(%unit, target = line.amount, "arming item");
        channel::send_command(link, &directive, timing)
            .await
            .map_err(|e| (WorkflowStep::Directive, e))?;
        channel::send_command(link, &Command::OpenLock { unit }, timing)
            .await
            .map_err(|e| (WorkflowStep::OpenLock, e))?;

        let amount = self
            .poll_item(kind, line, link, cancel)
            .await
            .map_err(|e| (WorkflowStep::Poll, e))?;

        sleep_or_cancel(timing.close_settle, cancel)
            .await
            .map_err(|e| (WorkflowStep::CloseLock, e))?;
        channel::send_command(link, &Command::CloseLock { unit }, timing)
            .await
            .map_err(|e| (WorkflowStep::CloseLock, e))?;

        debug!(%unit, amount, "item closed");
        Ok(amount)
    }

    /// Poll until the observed amount equals the target.
    async fn poll_item(
        &self,
        kind: WorkflowKind,
        line: &OrderLine,
        link: &Link,
        cancel: &CancellationToken,
    ) -> Result<u8> {
        let timing = self.timing();
        let unit = line.container_id;
        let deadline = Instant::now() + timing.poll_budget;
        let mut last = 0u8;

        loop {
            sleep_or_cancel(timing.poll_interval, cancel).await?;

            match channel::query_progress(link, unit, timing).await? {
                Some(frame) if frame.is_for(unit) => {
                    if frame.amount != last {
                        last = frame.amount;
                        self.emit(ProgressEvent::item(kind, unit, last)).await;
                    }
                }
                Some(frame) => {
                    debug!(expected = %unit, got = %frame.unit, "progress for another unit ignored");
                }
                None => {}
            }

            if last == line.amount {
                return Ok(last);
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(
                    format!("progress of container {unit}"),
                    timing.poll_budget,
                ));
            }
        }
    }

    async fn emit(&self, event: ProgressEvent) {
        debug!(kind = %event.kind, container = ?event.container, amount = event.amount, "progress");
        if self.events.send(event).await.is_err() {
            warn!(kind = %event.kind, "progress receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let started = ProgressEvent::started(WorkflowKind::TakeOut);
        assert!(started.is_sentinel());
        assert_eq!(started.amount, 0);

        let finished = ProgressEvent::finished(WorkflowKind::TakeOut, 4);
        assert_eq!(finished.container, None);
        assert_eq!(finished.amount, 4);

        assert!(!ProgressEvent::item(WorkflowKind::PutIn, UnitId::new(2), 1).is_sentinel());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(WorkflowKind::PutIn.event_name(), Some("put_in_progress"));
        assert_eq!(WorkflowKind::TakeOut.event_name(), Some("take_out_progress"));
        assert_eq!(WorkflowKind::Calibrate.event_name(), None);
        assert_eq!(WorkflowKind::TakeOut.to_string(), "take_out");
    }
}
