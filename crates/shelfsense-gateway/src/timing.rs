//! Delays and time budgets used by bring-up and the workflows.

use shelfsense_core::{Error, Result, constants::*};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Every delay and budget the gateway waits on.
///
/// Defaults match the unit firmware's expectations. Tests shrink them, and
/// the binary fills them from the `[timing]` configuration section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause after the first bring-up sync.
    pub settle: Duration,
    /// Per-read timeout while flushing stale bytes.
    pub flush_read_timeout: Duration,
    /// Number of fast flush reads at bring-up.
    pub flush_reads: u32,
    /// Per-read timeout in normal operation.
    pub read_timeout: Duration,
    /// Maximum bytes discarded by the final bring-up drain.
    pub drain_limit: u32,
    /// Maximum wait for a final ack once the unit reported busy.
    pub ack_budget: Duration,
    /// Maximum wait for the calibration ack.
    pub calibration_budget: Duration,
    /// Pause between progress queries.
    pub poll_interval: Duration,
    /// Maximum time one item may spend polling for progress.
    pub poll_budget: Duration,
    /// Pause between reaching the target and closing the lock.
    pub close_settle: Duration,
    /// Pause after a denied credential.
    pub deny_retry: Duration,
    /// Maximum time the RFID gate waits for an authorized credential.
    pub authorization_budget: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            flush_read_timeout: Duration::from_millis(DEFAULT_FLUSH_READ_TIMEOUT_MS),
            flush_reads: DEFAULT_FLUSH_READS,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            drain_limit: DEFAULT_DRAIN_LIMIT,
            ack_budget: Duration::from_millis(DEFAULT_ACK_BUDGET_MS),
            calibration_budget: Duration::from_millis(DEFAULT_CALIBRATION_BUDGET_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_budget: Duration::from_millis(DEFAULT_POLL_BUDGET_MS),
            close_settle: Duration::from_millis(DEFAULT_CLOSE_SETTLE_MS),
            deny_retry: Duration::from_millis(DEFAULT_DENY_RETRY_MS),
            authorization_budget: Duration::from_millis(DEFAULT_AUTHORIZATION_BUDGET_MS),
        }
    }
}

impl Timing {
    /// Upper bound on how long one bring-up can take.
    pub fn bring_up_bound(&self) -> Duration {
        self.settle
            + self.flush_read_timeout * self.flush_reads
            + self.read_timeout * (self.drain_limit + 1)
    }

    /// Ack budget for a command, longer for commands that report busy.
    pub fn ack_budget_for(&self, allows_busy: bool) -> Duration {
        if allows_busy {
            self.calibration_budget
        } else {
            self.ack_budget
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// # Errors
///
/// Returns `Error::Cancelled` if the token was cancelled before the sleep
/// finished.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
