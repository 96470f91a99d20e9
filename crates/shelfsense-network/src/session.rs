//! The request loop of an authenticated control-plane connection.
//!
//! Three tasks share the connection:
//!
//! - the **reader** (the `run` future itself) decodes inbound lines, spawns
//!   one task per inbound request and resolves answers to requests the
//!   gateway sent
//! - the **writer** owns the sink; every outbound envelope goes through its
//!   channel so lines never interleave
//! - the **forwarder** turns gateway progress events into event envelopes
//!
//! When the connection drops, every running workflow is aborted and pending
//! authorization checks fail.

use crate::messages::{Envelope, InitUnitsResult, Operation, WorkflowResult};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use shelfsense_core::{Error, Result, TagId};
use shelfsense_gateway::{Authorizer, Gateway, ProgressEvent, WorkflowError, WorkflowReport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::error::ControlPlaneError;

/// Outbound envelopes queued ahead of the writer.
const OUTBOUND_CAPACITY: usize = 256;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The gateway was shut down.
    Shutdown,
    /// The control plane closed the connection.
    ClosedByPeer,
}

/// Requests sent by the gateway that still wait for an answer.
#[derive(Debug, Default)]
struct PendingRequests {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl PendingRequests {
    /// Allocate an id and a waiter for it. Id 0 belongs to the handshake.
    fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Deliver an answer. Returns `false` if nobody waits for `id`.
    fn resolve(&self, id: u64, result: Value) -> bool {
        match self.lock().remove(&id) {
            Some(waiter) => waiter.send(result).is_ok(),
            None => false,
        }
    }

    fn forget(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Drop every waiter. Returns how many were waiting.
    fn clear(&self) -> usize {
        let mut waiters = self.lock();
        let count = waiters.len();
        waiters.clear();
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Asks the control plane whether a tag may open a container.
///
/// Requests are queued until the session runs; each waits at most the
/// configured request timeout for its answer.
#[derive(Debug, Clone)]
pub struct RemoteAuthorizer {
    outbound: mpsc::Sender<Envelope>,
    pending: Arc<PendingRequests>,
    timeout: Duration,
}

impl Authorizer for RemoteAuthorizer {
    async fn is_authorized(&self, tag: &TagId) -> Result<bool> {
        let (id, answer) = self.pending.register();
        let request = Envelope::Request {
            id,
            op: Operation::CheckAuthorization { tag: tag.clone() },
        };
        if self.outbound.send(request).await.is_err() {
            self.pending.forget(id);
            return Err(Error::connection("control plane", "session is not running"));
        }
        debug!(id, %tag, "authorization requested");

        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(Value::Bool(allowed))) => {
                debug!(id, %tag, allowed, "authorization answered");
                Ok(allowed)
            }
            Ok(Ok(other)) => {
                warn!(id, %tag, result = %other, "non-boolean authorization answer, treating as denied");
                Ok(false)
            }
            Ok(Err(_)) => Err(Error::connection(
                "control plane",
                "session ended before the authorization answer",
            )),
            Err(_) => {
                self.pending.forget(id);
                Err(Error::timeout("check_authorization", self.timeout))
            }
        }
    }
}

/// An authenticated connection, ready to serve requests.
#[derive(Debug)]
pub struct Session {
    framed: Framed<TcpStream, LinesCodec>,
    outbound_tx: mpsc::Sender<Envelope>,
    outbound_rx: mpsc::Receiver<Envelope>,
    pending: Arc<PendingRequests>,
}

impl Session {
    pub(crate) fn new(
        framed: Framed<TcpStream, LinesCodec>,
        request_timeout: Duration,
    ) -> (Self, RemoteAuthorizer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let pending = Arc::new(PendingRequests::default());
        let authorizer = RemoteAuthorizer {
            outbound: outbound_tx.clone(),
            pending: Arc::clone(&pending),
            timeout: request_timeout,
        };
        let session = Self {
            framed,
            outbound_tx,
            outbound_rx,
            pending,
        };
        (session, authorizer)
    }

    /// Serve requests until the connection closes or the gateway shuts down.
    ///
    /// `events` is the receiver returned by the gateway builder; its events
    /// are forwarded to the control plane for as long as the session runs.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::Io`] if reading from the connection fails.
    pub async fn run<A: Authorizer>(
        self,
        gateway: Arc<Gateway<A>>,
        mut events: mpsc::Receiver<ProgressEvent>,
    ) -> std::result::Result<SessionEnd, ControlPlaneError> {
        let Session {
            framed,
            outbound_tx,
            mut outbound_rx,
            pending,
        } = self;
        let (mut sink, mut stream) = framed.split();

        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let line = match serde_json::to_string(&envelope) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "failed to encode outbound envelope");
                        continue;
                    }
                };
                if let Err(e) = sink.send(line).await {
                    warn!(error = %e, "control plane write failed");
                    break;
                }
            }
        });

        let forward_tx = outbound_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(envelope) = Envelope::from_progress(&event)
                    && forward_tx.send(envelope).await.is_err()
                {
                    break;
                }
            }
        });

        info!("control plane session started");
        let shutdown = gateway.shutdown_token();
        let outcome = loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break Ok(SessionEnd::Shutdown),
                line = stream.next() => line,
            };
            match line {
                Some(Ok(line)) => dispatch(&line, &gateway, &outbound_tx, &pending),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("discarding over-long control plane line");
                }
                Some(Err(LinesCodecError::Io(e))) => break Err(ControlPlaneError::Io(e)),
                None => break Ok(SessionEnd::ClosedByPeer),
            }
        };

        gateway.abort_workflows();
        let abandoned = pending.clear();
        forwarder.abort();
        writer.abort();
        info!(?outcome, abandoned, "control plane session ended");
        outcome
    }
}

fn dispatch<A: Authorizer>(
    line: &str,
    gateway: &Arc<Gateway<A>>,
    outbound: &mpsc::Sender<Envelope>,
    pending: &PendingRequests,
) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "discarding malformed control plane line");
            return;
        }
    };
    let request_id = match value.get("type").and_then(Value::as_str) {
        Some("request") => value.get("id").and_then(Value::as_u64),
        _ => None,
    };

    match serde_json::from_value::<Envelope>(value) {
        Ok(Envelope::Request { id, op }) => {
            debug!(id, op = op.name(), "request received");
            let gateway = Arc::clone(gateway);
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let name = op.name();
                let result = execute(&gateway, op).await;
                debug!(id, op = name, "request finished");
                if outbound.send(Envelope::Response { id, result }).await.is_err() {
                    debug!(id, op = name, "session closed before the response was sent");
                }
            });
        }
        Ok(Envelope::Response { id, result }) => {
            if !pending.resolve(id, result) {
                warn!(id, "response to an unknown request");
            }
        }
        Ok(Envelope::Event { name, .. }) => {
            warn!(%name, "ignoring event sent by the control plane");
        }
        Err(e) => match request_id {
            Some(id) => {
                warn!(id, error = %e, "rejecting unsupported request");
                let outbound = outbound.clone();
                let result = rejection(&format!("unsupported request: {e}"));
                tokio::spawn(async move {
                    let _ = outbound.send(Envelope::Response { id, result }).await;
                });
            }
            None => warn!(error = %e, "discarding unrecognised control plane message"),
        },
    }
}

async fn execute<A: Authorizer>(gateway: &Gateway<A>, op: Operation) -> Value {
    match op {
        Operation::InitUnits(specs) => {
            to_result(&InitUnitsResult::from(gateway.init_units(&specs).await))
        }
        Operation::CalibrateContainer { container_id } => {
            Value::Bool(gateway.calibrate(container_id).await.is_ok())
        }
        Operation::PutIn(order) => workflow_result(gateway.put_in(&order).await),
        Operation::TakeOut(order) => workflow_result(gateway.take_out(&order).await),
        Operation::Abort => {
            gateway.abort_workflows();
            Value::Bool(true)
        }
        op @ (Operation::Auth { .. } | Operation::CheckAuthorization { .. }) => {
            warn!(op = op.name(), "operation is only sent by the gateway");
            rejection("operation is only sent by the gateway")
        }
    }
}

fn workflow_result(result: std::result::Result<WorkflowReport, WorkflowError>) -> Value {
    to_result(&WorkflowResult::from(result))
}

fn to_result<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| rejection(&e.to_string()))
}

fn rejection(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_ids_skip_handshake_id() {
        let pending = PendingRequests::default();
        let (first, _rx1) = pending.register();
        let (second, _rx2) = pending.register();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn test_pending_resolve_delivers_answer() {
        let pending = PendingRequests::default();
        let (id, rx) = pending.register();
        assert!(pending.resolve(id, Value::Bool(true)));
        assert_eq!(rx.await.unwrap(), Value::Bool(true));
        assert!(!pending.resolve(id, Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_clear_fails_waiters() {
        let pending = PendingRequests::default();
        let (_, rx) = pending.register();
        assert_eq!(pending.clear(), 1);
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_rejection_shape() {
        assert_eq!(
            rejection("nope"),
            json!({"success": false, "error": "nope"})
        );
    }
}
