//! Simulated RFID reader.

use crate::{Result, traits::RfidReader, types::TagRead};
use shelfsense_core::TagId;
use std::time::Duration;
use tracing::debug;

/// Presents the same tag every time, after a fixed delay.
///
/// The delay stands in for the time a person takes to hold a credential to
/// the reader.
#[derive(Debug, Clone)]
pub struct SimulatedRfid {
    tag: TagId,
    present_after: Duration,
}

impl SimulatedRfid {
    pub fn new(tag: TagId, present_after: Duration) -> Self {
        Self { tag, present_after }
    }

    pub fn tag(&self) -> &TagId {
        &self.tag
    }
}

impl RfidReader for SimulatedRfid {
    async fn read_tag(&mut self) -> Result<TagRead> {
        tokio::time::sleep(self.present_after).await;
        debug!(tag = %self.tag, "simulated tag presented");
        Ok(TagRead::now(self.tag.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_presents_after_delay() {
        let tag = TagId::from_hex("699F0464").unwrap();
        let mut reader = SimulatedRfid::new(tag.clone(), Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        let read = reader.read_tag().await.unwrap();
        assert_eq!(read.tag, tag);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
