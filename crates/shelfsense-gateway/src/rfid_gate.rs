//! RFID gate: the credential retry loop in front of every put-in.
//!
//! The gate reads a tag, asks the [`Authorizer`] about it and either returns
//! the accepted tag or signals the rejection on the unit and tries again.
//! The loop is bounded by [`Timing::authorization_budget`] and by the
//! workflow's cancellation token.

use crate::channel;
use crate::registry::Link;
use crate::timing::{Timing, sleep_or_cancel};
use shelfsense_core::{Error, Result, TagId, UnitId};
use shelfsense_hardware::{AnyRfidReader, RfidReader};
use shelfsense_protocol::Command;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decides whether a credential may open a unit.
///
/// The gateway asks the control plane; tests script the answers.
pub trait Authorizer: Send + Sync + 'static {
    /// Returns `Ok(true)` if `tag` is allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision could not be obtained.
    fn is_authorized(&self, tag: &TagId) -> impl Future<Output = Result<bool>> + Send;
}

impl<A: Authorizer> Authorizer for Arc<A> {
    fn is_authorized(&self, tag: &TagId) -> impl Future<Output = Result<bool>> + Send {
        (**self).is_authorized(tag)
    }
}

/// The shared RFID reader plus the authorization policy.
///
/// There is one physical reader, so concurrent put-ins take turns: the
/// reader is held for a whole authorization loop.
#[derive(Debug)]
pub struct RfidGate<A> {
    reader: Mutex<AnyRfidReader>,
    authorizer: A,
}

impl<A: Authorizer> RfidGate<A> {
    pub fn new(reader: AnyRfidReader, authorizer: A) -> Self {
        Self {
            reader: Mutex::new(reader),
            authorizer,
        }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Wait for an authorized credential.
    ///
    /// Each denied tag triggers one `DenySignal` to `deny_unit` on `link`,
    /// followed by the deny-retry pause.
    ///
    /// # Errors
    ///
    /// - `Error::Cancelled` if `cancel` fires
    /// - `Error::Timeout` once the authorization budget is spent
    /// - any reader, authorizer or `DenySignal` error
    pub async fn authorize(
        &self,
        link: &Link,
        deny_unit: UnitId,
        timing: &Timing,
        cancel: &CancellationToken,
    ) -> Result<TagId> {
        let budget = timing.authorization_budget;
        let deadline = Instant::now() + budget;
        let expired = || Error::timeout("RFID authorization", budget);

        let mut reader = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = sleep_until(deadline) => return Err(expired()),
            reader = self.reader.lock() => reader,
        };

        let mut denials = 0u32;
        loop {
            debug!(unit = %deny_unit, "waiting for credential");
            let read = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep_until(deadline) => return Err(expired()),
                read = reader.read_tag() => read?,
            };
            debug!(tag = %read.tag, read_at = %read.timestamp, "credential presented");

            let granted = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep_until(deadline) => return Err(expired()),
                granted = self.authorizer.is_authorized(&read.tag) => granted?,
            };

            if granted {
                info!(tag = %read.tag, denials, "credential accepted");
                return Ok(read.tag);
            }

            denials += 1;
            warn!(tag = %read.tag, denials, "credential denied");
            channel::send_command(link, &Command::DenySignal { unit: deny_unit }, timing).await?;
            sleep_or_cancel(timing.deny_retry, cancel).await?;
        }
    }
}
