//! Hardware capability trait definitions.
//!
//! These traits are the seam between the gateway and the physical world:
//! a [`SerialLink`] carries command frames to container units, an
//! [`RfidReader`] yields credential tags. Real, simulated and mock backends
//! implement them, selected by configuration rather than by inspecting the
//! host.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT).
//! They are therefore not object-safe; use the enum wrappers in
//! [`devices`](crate::devices) for dynamic dispatch.

#![allow(async_fn_in_trait)]

use crate::{
    devices::AnyLink,
    error::Result,
    types::{LinkSettings, TagRead},
};
use std::time::Duration;

/// Byte-oriented half-duplex serial link to one or more units.
///
/// The link does no locking of its own. Callers must hold exclusive access
/// for a whole write/read exchange.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use shelfsense_hardware::traits::SerialLink;
/// use shelfsense_hardware::error::Result;
///
/// async fn ping<L: SerialLink>(link: &mut L) -> Result<Option<u8>> {
///     link.write_frame(&[0x15, 0x07]).await?;
///     link.read_byte(Duration::from_millis(500)).await
/// }
/// ```
pub trait SerialLink: Send {
    /// Path of the underlying device, e.g. `/dev/ttyACM0` or `COM7`.
    fn path(&self) -> &str;

    /// Write one complete frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is gone or the write fails.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Read a single byte, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. That is a normal
    /// outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than the timeout.
    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>>;
}

/// Factory opening links by path.
pub trait LinkOpener: Send + Sync {
    /// Open the device at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened.
    async fn open(&self, path: &str, settings: LinkSettings) -> Result<AnyLink>;
}

/// RFID credential reader.
///
/// # Examples
///
/// ```no_run
/// use shelfsense_hardware::traits::RfidReader;
/// use shelfsense_hardware::error::Result;
///
/// async fn wait_for_tag<R: RfidReader>(reader: &mut R) -> Result<String> {
///     let read = reader.read_tag().await?;
///     Ok(read.tag.to_hex())
/// }
/// ```
pub trait RfidReader: Send {
    /// Wait until a tag is presented and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is disconnected.
    async fn read_tag(&mut self) -> Result<TagRead>;
}
