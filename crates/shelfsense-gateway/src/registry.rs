//! Link registry and bring-up sequencer.
//!
//! One [`Link`] exists per physical serial path, no matter how many units
//! it hosts. The first unit that names a path opens it and runs
//! [`bring_up`]; every later registration on the same path reuses the link.
//! Concurrent registrations for one path share a single `OnceCell`, so the
//! device is opened exactly once even when `init_units` races.
//!
//! ```text
//! UnitId ──(RwLock table)──> Arc<Link> ──(Mutex)──> AnyLink
//! ```

use crate::timing::Timing;
use shelfsense_core::{Error, Result, UnitId, UnitSpec, constants::BROADCAST_UNIT_ID};
use shelfsense_hardware::{AnyLink, AnyLinkOpener, LinkOpener, LinkSettings, SerialLink};
use shelfsense_protocol::Command;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, MutexGuard, OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Bring-up state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unsynced,
    Synced,
}

/// One open serial connection, possibly shared by several units.
///
/// The port sits behind an async mutex; holding the guard is holding the
/// bus. Callers keep it for exactly one write/read exchange.
#[derive(Debug)]
pub struct Link {
    path: String,
    settings: LinkSettings,
    synced: AtomicBool,
    port: Mutex<AnyLink>,
}

impl Link {
    /// Wrap an opened port. The link starts `Unsynced`.
    pub fn new(port: AnyLink, settings: LinkSettings) -> Self {
        Self {
            path: port.path().to_string(),
            settings,
            synced: AtomicBool::new(false),
            port: Mutex::new(port),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> LinkSettings {
        self.settings
    }

    pub fn state(&self) -> LinkState {
        if self.synced.load(Ordering::Acquire) {
            LinkState::Synced
        } else {
            LinkState::Unsynced
        }
    }

    /// Exclusive access to the port for one exchange.
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, AnyLink> {
        self.port.lock().await
    }

    /// Run [`bring_up`] on this link and mark it `Synced` on success.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error; the link stays `Unsynced`.
    pub async fn bring_up(&self, timing: &Timing) -> Result<usize> {
        let mut port = self.port.lock().await;
        let discarded = bring_up(&mut *port, timing).await?;
        self.synced.store(true, Ordering::Release);
        Ok(discarded)
    }
}

/// Synchronise a freshly opened link and discard stale input.
///
/// Sends `Sync`, waits `settle`, performs `flush_reads` fast reads, sends
/// `Sync` again, then drains at the normal read timeout until a read comes
/// back empty or `drain_limit` bytes were dropped. Total time is bounded by
/// [`Timing::bring_up_bound`].
///
/// Returns the number of bytes discarded.
///
/// # Errors
///
/// Returns `Error::Connection` if a write or read fails.
pub async fn bring_up<L: SerialLink>(port: &mut L, timing: &Timing) -> Result<usize> {
    let sync = Command::Sync {
        unit: UnitId::new(BROADCAST_UNIT_ID),
    }
    .to_frame();
    let mut discarded = 0usize;

    debug!(path = port.path(), "bring-up: first sync");
    port.write_frame(sync.as_bytes()).await?;
    tokio::time::sleep(timing.settle).await;

    for _ in 0..timing.flush_reads {
        if port.read_byte(timing.flush_read_timeout).await?.is_some() {
            discarded += 1;
        }
    }

    debug!(path = port.path(), discarded, "bring-up: second sync");
    port.write_frame(sync.as_bytes()).await?;

    for _ in 0..timing.drain_limit {
        match port.read_byte(timing.read_timeout).await? {
            Some(_) => discarded += 1,
            None => return Ok(discarded),
        }
    }

    warn!(
        path = port.path(),
        limit = timing.drain_limit,
        "bring-up drain hit its limit, link may still be noisy"
    );
    Ok(discarded)
}

#[derive(Debug)]
struct RegisteredUnit {
    spec: UnitSpec,
    link: Arc<Link>,
}

/// Maps unit ids to synced links and owns every open link.
#[derive(Debug)]
pub struct LinkRegistry {
    opener: AnyLinkOpener,
    settings: LinkSettings,
    timing: Timing,
    links: StdMutex<HashMap<String, Arc<OnceCell<Arc<Link>>>>>,
    units: RwLock<HashMap<UnitId, RegisteredUnit>>,
}

impl LinkRegistry {
    pub fn new(opener: AnyLinkOpener, settings: LinkSettings, timing: Timing) -> Self {
        Self {
            opener,
            settings,
            timing,
            links: StdMutex::new(HashMap::new()),
            units: RwLock::new(HashMap::new()),
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Register `spec.id` on `spec.serial_path`, opening and bringing up the
    /// link if the path is new.
    ///
    /// Registering a unit on a path that is already up only updates the
    /// unit table. Re-registering an id on a different path moves it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the path cannot be opened or bring-up
    /// fails. Other units are unaffected, and the next registration naming
    /// the path tries again.
    pub async fn register_unit(&self, spec: &UnitSpec) -> Result<Arc<Link>> {
        let cell = self.cell_for(&spec.serial_path);
        let link = cell
            .get_or_try_init(|| self.open_link(&spec.serial_path))
            .await?
            .clone();

        let previous = self.units.write().await.insert(
            spec.id,
            RegisteredUnit {
                spec: spec.clone(),
                link: Arc::clone(&link),
            },
        );
        match previous {
            Some(old) if old.spec.serial_path != spec.serial_path => {
                warn!(
                    unit = %spec.id,
                    from = %old.spec.serial_path,
                    to = %spec.serial_path,
                    "unit moved to another link"
                );
            }
            _ => debug!(unit = %spec.id, path = %spec.serial_path, "unit registered"),
        }
        Ok(link)
    }

    /// Resolve a unit id to its link.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownUnit` if the id was never registered.
    pub async fn lookup(&self, unit: UnitId) -> Result<Arc<Link>> {
        self.units
            .read()
            .await
            .get(&unit)
            .map(|registered| Arc::clone(&registered.link))
            .ok_or(Error::UnknownUnit(unit))
    }

    /// Registered units ordered by id.
    pub async fn units(&self) -> Vec<UnitSpec> {
        let mut specs: Vec<UnitSpec> = self
            .units
            .read()
            .await
            .values()
            .map(|registered| registered.spec.clone())
            .collect();
        specs.sort_by_key(|spec| spec.id);
        specs
    }

    /// Number of links that completed bring-up.
    pub fn link_count(&self) -> usize {
        self.links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    fn cell_for(&self, path: &str) -> Arc<OnceCell<Arc<Link>>> {
        let mut links = self
            .links
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(links.entry(path.to_string()).or_default())
    }

    async fn open_link(&self, path: &str) -> Result<Arc<Link>> {
        info!(path, baud = self.settings.baud_rate, "opening link");
        let port = self
            .opener
            .open(path, self.settings)
            .await
            .map_err(|e| Error::connection(path, e.to_string()))?;

        let link = Link::new(port, self.settings);
        let discarded = link.bring_up(&self.timing).await?;
        info!(path, discarded, "link synced");
        Ok(Arc::new(link))
    }
}
