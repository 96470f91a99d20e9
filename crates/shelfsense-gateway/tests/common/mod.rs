//! Common test utilities for gateway integration tests.

#![allow(dead_code)]

use shelfsense_core::{Result, TagId, UnitId, UnitName, UnitSpec};
use shelfsense_gateway::{Authorizer, Gateway, ProgressEvent, Timing};
use shelfsense_hardware::mock::{MockOpener, MockRfid, MockRfidHandle};
use shelfsense_hardware::{AnyLinkOpener, AnyRfidReader};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Answers authorization requests from a fixed script, then denies.
#[derive(Debug, Default)]
pub struct ScriptedAuthorizer {
    answers: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

impl ScriptedAuthorizer {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Authorizer for ScriptedAuthorizer {
    async fn is_authorized(&self, _tag: &TagId) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }
}

/// Timing shrunk so paused-clock tests advance quickly.
pub fn fast_timing() -> Timing {
    Timing {
        settle: Duration::from_millis(10),
        flush_read_timeout: Duration::from_millis(1),
        flush_reads: 2,
        read_timeout: Duration::from_millis(50),
        drain_limit: 8,
        ack_budget: Duration::from_millis(500),
        calibration_budget: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        poll_budget: Duration::from_secs(5),
        close_settle: Duration::from_millis(10),
        deny_retry: Duration::from_millis(20),
        authorization_budget: Duration::from_secs(5),
    }
}

pub fn spec(id: u8, path: &str) -> UnitSpec {
    UnitSpec {
        id: UnitId::new(id),
        name: UnitName::new(&format!("Bin {id}")).unwrap(),
        weight: 20,
        serial_path: path.to_string(),
    }
}

pub fn tag() -> TagId {
    TagId::from_hex("699F0464").unwrap()
}

/// A gateway wired to mock hardware.
pub struct Harness {
    pub gateway: Arc<Gateway<ScriptedAuthorizer>>,
    pub events: mpsc::Receiver<ProgressEvent>,
    pub opener: MockOpener,
    pub rfid: MockRfidHandle,
}

impl Harness {
    pub fn new(answers: &[bool]) -> Self {
        let opener = MockOpener::new();
        let (reader, rfid) = MockRfid::new();
        let (gateway, events) = Gateway::builder(
            AnyLinkOpener::Mock(opener.clone()),
            AnyRfidReader::Mock(reader),
            ScriptedAuthorizer::new(answers),
        )
        .timing(fast_timing())
        .build();

        Self {
            gateway: Arc::new(gateway),
            events,
            opener,
            rfid,
        }
    }

    /// Every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

/// `(container, amount)` pairs of a list of events.
pub fn pairs(events: &[ProgressEvent]) -> Vec<(Option<u8>, u8)> {
    events
        .iter()
        .map(|event| (event.container.map(|unit| unit.as_u8()), event.amount))
        .collect()
}

/// Frames whose opcode belongs to a put-in or take-out item, as `(opcode, unit)`.
pub fn item_traffic(written: &[Vec<u8>]) -> Vec<(u8, u8)> {
    written
        .iter()
        .filter(|frame| matches!(frame[0], 0x12 | 0x13 | 0x15 | 0x17 | 0x18))
        .map(|frame| (frame[0], frame[1]))
        .collect()
}
