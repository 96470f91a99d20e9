//! Scripted mock serial link for tests.
//!
//! A [`MockLink`] answers each written frame through a responder closure and
//! records everything that was written. The paired [`MockLinkHandle`] lets a
//! test inspect traffic and inject faults while the link itself is owned by
//! the code under test.

use crate::{
    HardwareError, Result,
    devices::AnyLink,
    simulated::SimulatedFirmware,
    traits::{LinkOpener, SerialLink},
    types::LinkSettings,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

/// Produces the reply bytes for one written frame.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

struct MockState {
    responder: Responder,
    written: Vec<Vec<u8>>,
    pending: VecDeque<u8>,
    latency: Duration,
    fail_writes: bool,
    overlapping_writes: usize,
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("written", &self.written)
            .field("pending", &self.pending)
            .field("latency", &self.latency)
            .field("fail_writes", &self.fail_writes)
            .field("overlapping_writes", &self.overlapping_writes)
            .finish_non_exhaustive()
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread poisons the lock; the data is still usable.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock serial link.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shelfsense_hardware::mock::MockLink;
/// use shelfsense_hardware::traits::SerialLink;
///
/// #[tokio::main]
/// async fn main() -> shelfsense_hardware::Result<()> {
///     let (mut link, handle) = MockLink::new("/dev/ttyMOCK0", |_frame: &[u8]| vec![0xAA]);
///
///     link.write_frame(&[0x15, 0x07]).await?;
///     assert_eq!(link.read_byte(Duration::from_millis(10)).await?, Some(0xAA));
///     assert_eq!(handle.written(), vec![vec![0x15, 0x07]]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockLink {
    path: String,
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// Create a link answering through `responder`.
    pub fn new<F>(path: impl Into<String>, responder: F) -> (Self, MockLinkHandle)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(MockState {
            responder: Box::new(responder),
            written: Vec::new(),
            pending: VecDeque::new(),
            latency: Duration::ZERO,
            fail_writes: false,
            overlapping_writes: 0,
        }));
        let link = Self {
            path: path.into(),
            state: Arc::clone(&state),
        };
        (link, MockLinkHandle { state })
    }

    /// Create a link answered by emulated unit firmware.
    pub fn with_firmware(
        path: impl Into<String>,
        mut firmware: SimulatedFirmware,
    ) -> (Self, MockLinkHandle) {
        Self::new(path, move |frame: &[u8]| firmware.respond(frame))
    }

    /// Create a link that never answers.
    pub fn silent(path: impl Into<String>) -> (Self, MockLinkHandle) {
        Self::new(path, |_: &[u8]| Vec::new())
    }
}

impl SerialLink for MockLink {
    fn path(&self) -> &str {
        &self.path
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(HardwareError::communication(&self.path, "write failed"));
        }
        if !state.pending.is_empty() {
            state.overlapping_writes += 1;
        }
        state.written.push(frame.to_vec());
        let reply = (state.responder)(frame);
        state.pending.extend(reply);
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        let (byte, latency) = {
            let mut state = lock(&self.state);
            (state.pending.pop_front(), state.latency)
        };
        match byte {
            Some(byte) => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Ok(Some(byte))
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

/// Test-side view of a [`MockLink`].
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLinkHandle {
    /// Every frame written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Written frames whose first byte is `opcode`.
    pub fn written_with_opcode(&self, opcode: u8) -> Vec<Vec<u8>> {
        lock(&self.state)
            .written
            .iter()
            .filter(|frame| frame.first() == Some(&opcode))
            .cloned()
            .collect()
    }

    /// Queue bytes to be read before any reply.
    pub fn push_bytes(&self, bytes: &[u8]) {
        lock(&self.state).pending.extend(bytes);
    }

    /// Delay applied before each byte is delivered.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Replace the responder.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        lock(&self.state).responder = Box::new(responder);
    }

    /// Number of writes issued while a previous reply was still unread.
    ///
    /// A non-zero count means two exchanges interleaved on the link.
    pub fn overlapping_writes(&self) -> usize {
        lock(&self.state).overlapping_writes
    }

    /// Bytes queued but not yet read.
    pub fn pending_len(&self) -> usize {
        lock(&self.state).pending.len()
    }
}

/// Opens prepared [`MockLink`]s and counts opens per path.
///
/// Paths that were never prepared fail to open, as a missing device would.
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    links: Arc<Mutex<HashMap<String, MockLink>>>,
    opens: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link for `path` answered by `responder`.
    pub fn prepare<F>(&self, path: &str, responder: F) -> MockLinkHandle
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let (link, handle) = MockLink::new(path, responder);
        self.insert(link);
        handle
    }

    /// Register a firmware-backed link for `path`.
    pub fn prepare_firmware(&self, path: &str, firmware: SimulatedFirmware) -> MockLinkHandle {
        let (link, handle) = MockLink::with_firmware(path, firmware);
        self.insert(link);
        handle
    }

    fn insert(&self, link: MockLink) {
        self.links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(link.path.clone(), link);
    }

    /// How many times `path` was opened.
    pub fn open_count(&self, path: &str) -> usize {
        self.opens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl LinkOpener for MockOpener {
    async fn open(&self, path: &str, _settings: LinkSettings) -> Result<AnyLink> {
        *self
            .opens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(path.to_string())
            .or_default() += 1;

        self.links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
            .map(AnyLink::Mock)
            .ok_or_else(|| HardwareError::open_failed(path, "No such file or directory"))
    }
}
