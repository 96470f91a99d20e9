//! Enum wrappers for hardware backend dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn SerialLink>` is not an option. These enums give concrete-type
//! dispatch instead; the gateway stores them and never sees the individual
//! backends.
//!
//! # Examples
//!
//! ```
//! use shelfsense_hardware::devices::AnyLink;
//! use shelfsense_hardware::simulated::SimulatedLink;
//! use shelfsense_hardware::traits::SerialLink;
//!
//! let link = AnyLink::Simulated(SimulatedLink::new("sim0"));
//! assert_eq!(link.path(), "sim0");
//! ```

use crate::mock::{MockLink, MockOpener, MockRfid};
use crate::serial::{SerialPortLink, SerialPortOpener};
use crate::simulated::{SimulatedLink, SimulatedOpener, SimulatedRfid};
use crate::traits::{LinkOpener, RfidReader, SerialLink};
use crate::types::{LinkBackend, LinkSettings, TagRead};
use crate::Result;
use std::time::Duration;

/// Enum wrapper for serial link dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLink {
    /// OS serial device.
    Serial(SerialPortLink),
    /// In-process firmware emulator.
    Simulated(SimulatedLink),
    /// Scripted link for tests.
    Mock(MockLink),
}

impl SerialLink for AnyLink {
    fn path(&self) -> &str {
        match self {
            Self::Serial(link) => link.path(),
            Self::Simulated(link) => link.path(),
            Self::Mock(link) => link.path(),
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        match self {
            Self::Serial(link) => link.write_frame(frame).await,
            Self::Simulated(link) => link.write_frame(frame).await,
            Self::Mock(link) => link.write_frame(frame).await,
        }
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        match self {
            Self::Serial(link) => link.read_byte(timeout).await,
            Self::Simulated(link) => link.read_byte(timeout).await,
            Self::Mock(link) => link.read_byte(timeout).await,
        }
    }
}

/// Enum wrapper for link factory dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyLinkOpener {
    Serial(SerialPortOpener),
    Simulated(SimulatedOpener),
    Mock(MockOpener),
}

impl AnyLinkOpener {
    /// Opener for the configured backend.
    pub fn for_backend(backend: LinkBackend) -> Self {
        match backend {
            LinkBackend::Serial => Self::Serial(SerialPortOpener),
            LinkBackend::Simulated => Self::Simulated(SimulatedOpener::new()),
        }
    }
}

impl LinkOpener for AnyLinkOpener {
    async fn open(&self, path: &str, settings: LinkSettings) -> Result<AnyLink> {
        match self {
            Self::Serial(opener) => opener.open(path, settings).await,
            Self::Simulated(opener) => opener.open(path, settings).await,
            Self::Mock(opener) => opener.open(path, settings).await,
        }
    }
}

/// Enum wrapper for RFID reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyRfidReader {
    /// Presents a configured tag after a delay.
    Simulated(SimulatedRfid),
    /// Scripted reader for tests.
    Mock(MockRfid),
    // TODO: add a PC/SC variant once a reader model is chosen for the units.
}

impl RfidReader for AnyRfidReader {
    async fn read_tag(&mut self) -> Result<TagRead> {
        match self {
            Self::Simulated(reader) => reader.read_tag().await,
            Self::Mock(reader) => reader.read_tag().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsense_core::TagId;

    #[tokio::test(start_paused = true)]
    async fn test_any_link_dispatches_to_mock() {
        let (link, handle) = MockLink::new("m0", |_: &[u8]| vec![0xAA]);
        let mut any = AnyLink::Mock(link);

        any.write_frame(&[0x18, 0x03]).await.unwrap();
        assert_eq!(
            any.read_byte(Duration::from_millis(1)).await.unwrap(),
            Some(0xAA)
        );
        assert_eq!(handle.written().len(), 1);
    }

    #[tokio::test]
    async fn test_opener_for_simulated_backend() {
        let opener = AnyLinkOpener::for_backend(LinkBackend::Simulated);
        let link = opener.open("sim9", LinkSettings::default()).await.unwrap();
        assert!(matches!(link, AnyLink::Simulated(_)));
    }

    #[tokio::test]
    async fn test_any_rfid_reader_mock() {
        let (reader, handle) = MockRfid::new();
        let mut any = AnyRfidReader::Mock(reader);
        let tag = TagId::from_hex("699F0464").unwrap();

        handle.present(tag.clone()).await.unwrap();
        assert_eq!(any.read_tag().await.unwrap().tag, tag);
    }
}
