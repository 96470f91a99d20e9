//! Common types shared across hardware backends.

use serde::{Deserialize, Serialize};
use shelfsense_core::{
    TagId,
    constants::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS},
};
use std::time::Duration;

/// Parameters a link is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Serial baud rate.
    pub baud_rate: u32,

    /// Per-read timeout used when a caller does not pass its own.
    pub read_timeout: Duration,
}

impl LinkSettings {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// Which serial backend to open links with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkBackend {
    /// Real device through the OS serial port.
    #[default]
    Serial,
    /// In-process firmware emulator.
    Simulated,
}

/// Which RFID backend to read tags from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfidBackend {
    /// Presents a configured tag after a delay.
    #[default]
    Simulated,
}

/// One tag read from an RFID reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRead {
    /// Tag identifier.
    pub tag: TagId,

    /// When the tag was read.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TagRead {
    /// Create a tag read stamped with the current time.
    pub fn now(tag: TagId) -> Self {
        Self {
            tag,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LinkSettings::default();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(
            serde_json::to_string(&LinkBackend::Simulated).unwrap(),
            "\"simulated\""
        );
        let backend: LinkBackend = serde_json::from_str("\"serial\"").unwrap();
        assert_eq!(backend, LinkBackend::Serial);
    }

    #[test]
    fn test_tag_read_timestamp() {
        let tag = TagId::from_hex("699F0464").unwrap();
        let before = chrono::Utc::now();
        let read = TagRead::now(tag.clone());
        assert_eq!(read.tag, tag);
        assert!(read.timestamp >= before);
    }
}
