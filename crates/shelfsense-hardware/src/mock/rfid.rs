//! Mock RFID reader implementation for testing.
//!
//! This module provides a reader that can be controlled programmatically:
//! tags presented through the [`MockRfidHandle`] are returned by
//! `read_tag()` in order.

use crate::{HardwareError, Result, traits::RfidReader, types::TagRead};
use shelfsense_core::TagId;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::mpsc;

/// Mock RFID reader for testing.
///
/// # Examples
///
/// ```
/// use shelfsense_core::TagId;
/// use shelfsense_hardware::mock::MockRfid;
/// use shelfsense_hardware::traits::RfidReader;
///
/// #[tokio::main]
/// async fn main() -> shelfsense_hardware::Result<()> {
///     let (mut reader, handle) = MockRfid::new();
///
///     handle.present(TagId::from_hex("04ABCDEF").unwrap()).await?;
///
///     let read = reader.read_tag().await?;
///     assert_eq!(read.tag.to_hex(), "04ABCDEF");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRfid {
    /// Channel receiver for presented tags
    tag_rx: mpsc::Receiver<TagId>,

    /// Number of completed reads, shared with the handle
    reads: Arc<AtomicUsize>,
}

impl MockRfid {
    /// Create a new mock reader.
    ///
    /// Returns a tuple of (MockRfid, MockRfidHandle) where the handle
    /// is used to present tags.
    pub fn new() -> (Self, MockRfidHandle) {
        let (tag_tx, tag_rx) = mpsc::channel(32);
        let reads = Arc::new(AtomicUsize::new(0));

        let reader = Self {
            tag_rx,
            reads: Arc::clone(&reads),
        };
        let handle = MockRfidHandle { tag_tx, reads };

        (reader, handle)
    }
}

impl RfidReader for MockRfid {
    async fn read_tag(&mut self) -> Result<TagRead> {
        let tag = self
            .tag_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("RFID tag channel closed"))?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(TagRead::now(tag))
    }
}

/// Handle for controlling a mock RFID reader.
#[derive(Debug, Clone)]
pub struct MockRfidHandle {
    /// Channel sender for presented tags
    tag_tx: mpsc::Sender<TagId>,

    reads: Arc<AtomicUsize>,
}

impl MockRfidHandle {
    /// Present a tag to the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present(&self, tag: TagId) -> Result<()> {
        self.tag_tx
            .send(tag)
            .await
            .map_err(|_| HardwareError::disconnected("RFID tag channel closed"))
    }

    /// Present the same tag `count` times.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present_repeatedly(&self, tag: TagId, count: usize) -> Result<()> {
        for _ in 0..count {
            self.present(tag.clone()).await?;
        }
        Ok(())
    }

    /// Number of tags the reader has returned so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(hex: &str) -> TagId {
        TagId::from_hex(hex).unwrap()
    }

    #[tokio::test]
    async fn test_mock_rfid_present_and_read() {
        let (mut reader, handle) = MockRfid::new();

        tokio::spawn(async move {
            handle.present(tag("04ABCDEF")).await.unwrap();
        });

        let read = reader.read_tag().await.unwrap();
        assert_eq!(read.tag.to_hex(), "04ABCDEF");
    }

    #[tokio::test]
    async fn test_mock_rfid_reads_in_order() {
        let (mut reader, handle) = MockRfid::new();

        handle.present(tag("01020304")).await.unwrap();
        handle.present(tag("05060708")).await.unwrap();

        assert_eq!(reader.read_tag().await.unwrap().tag, tag("01020304"));
        assert_eq!(reader.read_tag().await.unwrap().tag, tag("05060708"));
        assert_eq!(handle.reads(), 2);
    }

    #[tokio::test]
    async fn test_mock_rfid_disconnected() {
        let (mut reader, handle) = MockRfid::new();
        drop(handle);

        assert!(matches!(
            reader.read_tag().await,
            Err(HardwareError::Disconnected { .. })
        ));
    }
}
