//! Wire-level constants for the container unit protocol.
//!
//! Every unit on a serial link speaks the same single-byte-opcode protocol.
//! Command frames travel gateway → unit, single-byte acknowledgements and
//! short response frames travel unit → gateway.
//!
//! # Frame Structure
//!
//! ```text
//! [OPCODE][UNIT_ID][PAYLOAD ...]
//! ```
//!
//! | Opcode | Name | Payload after unit id |
//! |--------|------|-----------------------|
//! | `0x00` | Sync | none |
//! | `0x10` | InitUnit | name (16 bytes, null padded), weight (1 byte) |
//! | `0x11` | Calibrate | none |
//! | `0x12` | TakeOutDirective | amount (1 byte) |
//! | `0x13` | PutInDirective | amount (1 byte) |
//! | `0x15` | OpenLock | none |
//! | `0x16` | DenySignal | none |
//! | `0x17` | QueryProgress | none |
//! | `0x18` | CloseLock | none |
//!
//! # Responses
//!
//! | Byte | Meaning |
//! |------|---------|
//! | `0xAA` | Ack, command accepted |
//! | `0xA2` | Busy, final ack follows later |
//! | `0xA3` | Progress frame header, followed by unit id and amount |
//! | `0xA0` | Legacy RFID-open notification (not consumed) |
//! | `0xA1` | Legacy unit-closed notification (not consumed) |
//! | `0x55` | Firmware rejected an unknown opcode |

// ============================================================================
// Command Opcodes
// ============================================================================

/// Link synchronisation, only used during bring-up.
pub const OP_SYNC: u8 = 0x00;

/// Register a unit's name and capacity.
pub const OP_INIT_UNIT: u8 = 0x10;

/// Run the physical calibration cycle.
pub const OP_CALIBRATE: u8 = 0x11;

/// Arm a take-out of the given amount.
pub const OP_TAKE_OUT: u8 = 0x12;

/// Arm a put-in of the given amount.
pub const OP_PUT_IN: u8 = 0x13;

/// Open the electromechanical lock.
pub const OP_OPEN_LOCK: u8 = 0x15;

/// Signal a rejected credential (audible/visual).
pub const OP_DENY_SIGNAL: u8 = 0x16;

/// Ask for the amount moved so far.
pub const OP_QUERY_PROGRESS: u8 = 0x17;

/// Close the electromechanical lock.
pub const OP_CLOSE_LOCK: u8 = 0x18;

// ============================================================================
// Response Bytes
// ============================================================================

/// Command accepted.
pub const RESP_ACK: u8 = 0xAA;

/// Unit is busy; keep reading for the final ack.
pub const RESP_BUSY: u8 = 0xA2;

/// Header byte of a `[0xA3, unit, amount]` progress frame.
pub const RESP_PROGRESS: u8 = 0xA3;

/// Legacy unsolicited RFID-open notification.
pub const RESP_LEGACY_RFID_OPEN: u8 = 0xA0;

/// Legacy unsolicited unit-closed notification.
pub const RESP_LEGACY_UNIT_CLOSED: u8 = 0xA1;

/// Firmware answer to an opcode it does not know.
pub const RESP_UNKNOWN_COMMAND: u8 = 0x55;

// ============================================================================
// Field Sizes
// ============================================================================

/// Fixed width of the unit name field in an `InitUnit` frame.
pub const UNIT_NAME_LEN: usize = 16;

/// Length of a progress response frame.
pub const PROGRESS_FRAME_LEN: usize = 3;

/// Length of the frame header (opcode + unit id).
pub const FRAME_HEADER_LEN: usize = 2;

/// Unit id used when a frame addresses the whole link (bring-up sync).
pub const BROADCAST_UNIT_ID: u8 = 0x00;

// ============================================================================
// Link Defaults
// ============================================================================

/// Default serial baud rate of the unit firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default per-read timeout during normal operation (milliseconds).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Settle period after the first bring-up sync (milliseconds).
pub const DEFAULT_SETTLE_MS: u64 = 1000;

/// Per-read timeout used while flushing stale bytes at bring-up (milliseconds).
pub const DEFAULT_FLUSH_READ_TIMEOUT_MS: u64 = 1;

/// Number of fast reads performed while flushing at bring-up.
pub const DEFAULT_FLUSH_READS: u32 = 100;

/// Upper bound on bytes discarded by the final bring-up drain.
pub const DEFAULT_DRAIN_LIMIT: u32 = 256;

// ============================================================================
// Workflow Defaults
// ============================================================================

/// Maximum wait for a final ack after busy bytes (milliseconds).
pub const DEFAULT_ACK_BUDGET_MS: u64 = 10_000;

/// Maximum wait for the calibration ack (milliseconds).
pub const DEFAULT_CALIBRATION_BUDGET_MS: u64 = 60_000;

/// Interval between progress queries (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Maximum time one item may spend in the progress poll loop (milliseconds).
pub const DEFAULT_POLL_BUDGET_MS: u64 = 300_000;

/// Delay between reaching the target amount and closing the lock (milliseconds).
pub const DEFAULT_CLOSE_SETTLE_MS: u64 = 1000;

/// Delay after a denied credential before reading the next tag (milliseconds).
pub const DEFAULT_DENY_RETRY_MS: u64 = 1000;

/// Maximum time the RFID gate waits for an authorized credential (milliseconds).
pub const DEFAULT_AUTHORIZATION_BUDGET_MS: u64 = 120_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_are_distinct() {
        let opcodes = [
            OP_SYNC,
            OP_INIT_UNIT,
            OP_CALIBRATE,
            OP_TAKE_OUT,
            OP_PUT_IN,
            OP_OPEN_LOCK,
            OP_DENY_SIGNAL,
            OP_QUERY_PROGRESS,
            OP_CLOSE_LOCK,
        ];
        let mut sorted = opcodes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), opcodes.len());
    }

    #[test]
    fn test_read_timeout_shorter_than_ack_budget() {
        assert!(DEFAULT_READ_TIMEOUT_MS < DEFAULT_ACK_BUDGET_MS);
        assert!(DEFAULT_ACK_BUDGET_MS <= DEFAULT_CALIBRATION_BUDGET_MS);
    }
}
