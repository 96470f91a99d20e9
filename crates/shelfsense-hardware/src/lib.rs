//! Hardware capability layer for the ShelfSense gateway.
//!
//! This crate defines the two capabilities the gateway needs from the
//! physical world and provides interchangeable backends for each:
//!
//! | Capability | Real | Simulated | Mock (tests) |
//! |------------|------|-----------|--------------|
//! | [`SerialLink`] | [`SerialPortLink`](serial::SerialPortLink) | [`SimulatedLink`](simulated::SimulatedLink) | [`MockLink`](mock::MockLink) |
//! | [`RfidReader`] | | [`SimulatedRfid`](simulated::SimulatedRfid) | [`MockRfid`](mock::MockRfid) |
//!
//! Backends are chosen by configuration, never by sniffing the host.
//!
//! # Design
//!
//! - **Async-first**: all I/O uses native `async fn` in traits (Rust 1.90 +
//!   Edition 2024 RPITIT). Blocking serial calls run on the Tokio blocking
//!   pool.
//! - **Enum dispatch**: the traits are not object-safe, so [`AnyLink`],
//!   [`AnyLinkOpener`] and [`AnyRfidReader`] provide concrete dispatch.
//! - **No locking inside links**: the half-duplex discipline (one exchange
//!   at a time) is enforced by the gateway's command channel.
//!
//! ```no_run
//! use std::time::Duration;
//! use shelfsense_hardware::{AnyLinkOpener, LinkBackend, LinkSettings};
//! use shelfsense_hardware::traits::{LinkOpener, SerialLink};
//!
//! # async fn example() -> shelfsense_hardware::Result<()> {
//! let opener = AnyLinkOpener::for_backend(LinkBackend::Serial);
//! let mut link = opener.open("/dev/ttyACM0", LinkSettings::default()).await?;
//! link.write_frame(&[0x15, 0x07]).await?;
//! let ack = link.read_byte(Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod serial;
pub mod simulated;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyLink, AnyLinkOpener, AnyRfidReader};
pub use error::{HardwareError, Result};
pub use traits::{LinkOpener, RfidReader, SerialLink};
pub use types::{LinkBackend, LinkSettings, RfidBackend, TagRead};
