//! Command channel: one serialized write/read exchange per call.
//!
//! Every function here takes the link's port lock, performs exactly one
//! exchange and releases the lock on return, whatever the outcome. Nothing
//! holds the lock across a sleep, so a long poll loop on one unit never
//! starves other units on the same link.

use crate::registry::{Link, LinkState};
use crate::timing::Timing;
use shelfsense_core::{Error, Result, UnitId};
use shelfsense_hardware::{AnyLink, SerialLink};
use shelfsense_protocol::{AckOutcome, Command, ProgressFrame, ResponseTag};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Send `command` and wait for its ack.
///
/// The first byte must arrive within the per-read timeout. A busy byte
/// extends the wait until a final byte arrives or the ack budget for the
/// opcode runs out (the calibration budget for opcodes that report busy).
///
/// Returns the final outcome: `Success`, `Mismatch` or `Timeout`.
///
/// # Errors
///
/// Returns `Error::Connection` for I/O failures or an unsynced link.
pub async fn exchange(link: &Link, command: &Command, timing: &Timing) -> Result<AckOutcome> {
    exchange_within(link, command, timing)
        .await
        .map(|(outcome, _)| outcome)
}

/// Send `command` and require a successful ack.
///
/// # Errors
///
/// `Error::Protocol` carrying the received byte on a mismatch,
/// `Error::Timeout` when no final ack arrived in time, `Error::Connection`
/// for I/O failures.
pub async fn send_command(link: &Link, command: &Command, timing: &Timing) -> Result<()> {
    let opcode = command.opcode();
    let (outcome, waited) = exchange_within(link, command, timing).await?;
    let operation = format!("{opcode} for unit {}", command.unit());
    outcome.into_result(opcode.as_u8(), &operation, waited)
}

/// Exchange plus the budget that bounded the final read.
async fn exchange_within(
    link: &Link,
    command: &Command,
    timing: &Timing,
) -> Result<(AckOutcome, Duration)> {
    ensure_synced(link)?;
    let frame = command.to_frame();
    let budget = timing.ack_budget_for(command.opcode().allows_busy());

    let mut port = link.acquire().await;
    trace!(path = link.path(), %frame, "send");
    port.write_frame(frame.as_bytes()).await?;

    let first = AckOutcome::from_read(port.read_byte(timing.read_timeout).await?);
    if !first.is_pending() {
        return Ok((first, timing.read_timeout));
    }

    debug!(path = link.path(), opcode = %command.opcode(), "unit busy, waiting for final ack");
    let deadline = Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok((AckOutcome::Timeout, budget));
        }
        match AckOutcome::from_read(port.read_byte(remaining.min(timing.read_timeout)).await?) {
            AckOutcome::Busy | AckOutcome::Timeout => continue,
            outcome => return Ok((outcome, budget)),
        }
    }
}

/// Ask `unit` for its progress.
///
/// Returns `Ok(None)` when the unit has nothing to report yet, including a
/// silent read, a truncated frame or a legacy notification. Whatever is left
/// of a truncated frame or notification is drained before the lock is
/// released.
///
/// # Errors
///
/// `Error::Protocol` if the unit answers with an unexpected first byte,
/// `Error::Connection` for I/O failures.
pub async fn query_progress(
    link: &Link,
    unit: UnitId,
    timing: &Timing,
) -> Result<Option<ProgressFrame>> {
    ensure_synced(link)?;
    let command = Command::QueryProgress { unit };
    let frame = command.to_frame();

    let mut port = link.acquire().await;
    trace!(path = link.path(), %frame, "send");
    port.write_frame(frame.as_bytes()).await?;

    let Some(first) = port.read_byte(timing.read_timeout).await? else {
        return Ok(None);
    };

    match ResponseTag::classify(first) {
        ResponseTag::Progress => {
            let Some(unit_byte) = port.read_byte(timing.read_timeout).await? else {
                let dropped = drain(&mut port, timing).await?;
                warn!(path = link.path(), %unit, dropped, "progress frame truncated after header");
                return Ok(None);
            };
            let Some(amount) = port.read_byte(timing.read_timeout).await? else {
                let dropped = drain(&mut port, timing).await?;
                warn!(path = link.path(), %unit, dropped, "progress frame truncated after unit id");
                return Ok(None);
            };
            let progress = ProgressFrame::decode(&[first, unit_byte, amount])?;
            trace!(path = link.path(), unit = %progress.unit, amount = progress.amount, "progress");
            Ok(Some(progress))
        }
        tag if tag.is_legacy() => {
            let dropped = drain(&mut port, timing).await?;
            warn!(path = link.path(), byte = first, ?tag, dropped, "legacy notification ignored");
            Ok(None)
        }
        _ => Err(Error::Protocol {
            opcode: command.opcode().as_u8(),
            byte: first,
        }),
    }
}

/// Discard bytes left on the bus, at most `drain_limit` of them.
///
/// A late tail would otherwise be read as the first byte of the next exchange.
async fn drain(port: &mut AnyLink, timing: &Timing) -> Result<u32> {
    let mut dropped = 0u32;
    while dropped < timing.drain_limit
        && port.read_byte(timing.flush_read_timeout).await?.is_some()
    {
        dropped += 1;
    }
    Ok(dropped)
}

fn ensure_synced(link: &Link) -> Result<()> {
    match link.state() {
        LinkState::Synced => Ok(()),
        LinkState::Unsynced => Err(Error::connection(
            link.path(),
            "link has not completed bring-up",
        )),
    }
}
