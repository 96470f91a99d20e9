//! The gateway service object.
//!
//! [`Gateway`] owns the link registry, the orchestrator (with its RFID
//! gate) and the cancellation tokens. The control-plane adapter holds it in
//! an `Arc` and calls one method per inbound operation, each from its own
//! task.
//!
//! # Cancellation
//!
//! ```text
//! shutdown ──> abort (replaced by abort_workflows) ──> each workflow
//! ```
//!
//! `abort_workflows` cancels every workflow running at that moment and
//! installs a fresh token, so later workflows run normally. `shutdown`
//! cancels the root, which stops current and future workflows for good.

use crate::channel;
use crate::error::WorkflowError;
use crate::orchestrator::{Orchestrator, ProgressEvent, WorkflowReport};
use crate::registry::LinkRegistry;
use crate::rfid_gate::{Authorizer, RfidGate};
use crate::timing::Timing;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shelfsense_core::{OrderLine, Result, UnitId, UnitSpec};
use shelfsense_hardware::{AnyLinkOpener, AnyRfidReader, LinkSettings};
use shelfsense_protocol::Command;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default capacity of the progress event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Result of registering one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInitResult {
    pub id: UnitId,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-unit results of an `init_units` batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub units: Vec<UnitInitResult>,
}

impl InitReport {
    /// Returns `true` if every unit registered.
    pub fn all_ok(&self) -> bool {
        self.units.iter().all(|unit| unit.success)
    }

    /// Units that failed to register.
    pub fn failed(&self) -> impl Iterator<Item = &UnitInitResult> {
        self.units.iter().filter(|unit| !unit.success)
    }
}

/// Builder for [`Gateway`].
///
/// # Examples
///
/// ```
/// use shelfsense_core::TagId;
/// use shelfsense_gateway::{Authorizer, GatewayBuilder, Timing};
/// use shelfsense_hardware::{AnyLinkOpener, AnyRfidReader, LinkBackend};
/// use shelfsense_hardware::simulated::SimulatedRfid;
/// use std::time::Duration;
///
/// struct AllowAll;
///
/// impl Authorizer for AllowAll {
///     async fn is_authorized(&self, _tag: &TagId) -> shelfsense_core::Result<bool> {
///         Ok(true)
///     }
/// }
///
/// let reader = SimulatedRfid::new(TagId::from_hex("699F0464").unwrap(), Duration::from_secs(1));
/// let (gateway, _events) = GatewayBuilder::new(
///     AnyLinkOpener::for_backend(LinkBackend::Simulated),
///     AnyRfidReader::Simulated(reader),
///     AllowAll,
/// )
/// .timing(Timing::default())
/// .build();
/// assert!(!gateway.is_shut_down());
/// ```
#[derive(Debug)]
pub struct GatewayBuilder<A> {
    opener: AnyLinkOpener,
    reader: AnyRfidReader,
    authorizer: A,
    settings: LinkSettings,
    timing: Timing,
    event_capacity: usize,
}

impl<A: Authorizer> GatewayBuilder<A> {
    pub fn new(opener: AnyLinkOpener, reader: AnyRfidReader, authorizer: A) -> Self {
        Self {
            opener,
            reader,
            authorizer,
            settings: LinkSettings::default(),
            timing: Timing::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn settings(mut self, settings: LinkSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Build the gateway and the receiving end of its progress events.
    pub fn build(self) -> (Gateway<A>, mpsc::Receiver<ProgressEvent>) {
        let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
        let registry = Arc::new(LinkRegistry::new(self.opener, self.settings, self.timing));
        let gate = RfidGate::new(self.reader, self.authorizer);
        let shutdown = CancellationToken::new();
        let abort = shutdown.child_token();

        let gateway = Gateway {
            orchestrator: Orchestrator::new(Arc::clone(&registry), gate, events_tx),
            registry,
            shutdown,
            abort: Mutex::new(abort),
        };
        (gateway, events_rx)
    }
}

/// Gateway service: one method per control-plane operation.
#[derive(Debug)]
pub struct Gateway<A> {
    registry: Arc<LinkRegistry>,
    orchestrator: Orchestrator<A>,
    shutdown: CancellationToken,
    abort: Mutex<CancellationToken>,
}

impl<A: Authorizer> Gateway<A> {
    pub fn builder(opener: AnyLinkOpener, reader: AnyRfidReader, authorizer: A) -> GatewayBuilder<A> {
        GatewayBuilder::new(opener, reader, authorizer)
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn authorizer(&self) -> &A {
        self.orchestrator.gate().authorizer()
    }

    /// Register units and program their names, concurrently.
    ///
    /// A failure is reported for its unit only; the rest of the batch
    /// proceeds.
    pub async fn init_units(&self, specs: &[UnitSpec]) -> InitReport {
        let results = join_all(specs.iter().map(|spec| self.init_unit(spec))).await;
        let units = specs
            .iter()
            .zip(results)
            .map(|(spec, result)| match result {
                Ok(()) => UnitInitResult {
                    id: spec.id,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    warn!(unit = %spec.id, path = %spec.serial_path, error = %e, "unit init failed");
                    UnitInitResult {
                        id: spec.id,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();
        let report = InitReport { units };
        info!(
            total = report.units.len(),
            failed = report.failed().count(),
            "init batch complete"
        );
        report
    }

    async fn init_unit(&self, spec: &UnitSpec) -> Result<()> {
        let link = self.registry.register_unit(spec).await?;
        let command = Command::InitUnit {
            unit: spec.id,
            name: spec.name.clone(),
            weight: spec.weight,
        };
        channel::send_command(&link, &command, self.registry.timing()).await?;
        info!(unit = %spec.id, name = %spec.name, path = %spec.serial_path, "unit initialised");
        Ok(())
    }

    /// Calibrate one unit.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::calibrate`].
    pub async fn calibrate(&self, unit: UnitId) -> std::result::Result<(), WorkflowError> {
        let cancel = self.workflow_token();
        self.orchestrator.calibrate(unit, &cancel).await
    }

    /// Run a put-in order.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::put_in`].
    pub async fn put_in(
        &self,
        order: &[OrderLine],
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        let cancel = self.workflow_token();
        self.orchestrator.put_in(order, &cancel).await
    }

    /// Run a take-out order.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::take_out`].
    pub async fn take_out(
        &self,
        order: &[OrderLine],
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        let cancel = self.workflow_token();
        self.orchestrator.take_out(order, &cancel).await
    }

    /// Cancel every workflow running now. Later workflows are unaffected.
    pub fn abort_workflows(&self) {
        let mut abort = self.abort.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!("aborting running workflows");
        abort.cancel();
        *abort = self.shutdown.child_token();
    }

    /// Cancel all current and future workflows.
    pub fn shutdown(&self) {
        info!("gateway shutting down");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled on [`shutdown`](Self::shutdown).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Snapshot of the registered units, ordered by id.
    pub async fn units(&self) -> Vec<UnitSpec> {
        self.registry.units().await
    }

    fn workflow_token(&self) -> CancellationToken {
        self.abort
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .child_token()
    }
}
