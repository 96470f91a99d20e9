//! Mock device implementations for testing.
//!
//! This module provides scripted devices that can be controlled
//! programmatically without requiring physical hardware.

pub mod link;
pub mod rfid;

// Re-export commonly used types
pub use link::{MockLink, MockLinkHandle, MockOpener, Responder};
pub use rfid::{MockRfid, MockRfidHandle};
