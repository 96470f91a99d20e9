//! TOML configuration of the gateway binary.
//!
//! ```toml
//! [identity]
//! host = "shelf-01"
//! password = "secret"
//!
//! [control_plane]
//! address = "10.0.0.5:3000"
//!
//! [serial]
//! backend = "simulated"
//!
//! [timing]
//! poll_interval_ms = 100
//! ```
//!
//! Every section and key is optional. Durations are in milliseconds.

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use shelfsense_core::{Error, Result, TagId, constants::*};
use shelfsense_gateway::Timing;
use shelfsense_hardware::simulated::SimulatedRfid;
use shelfsense_hardware::{AnyRfidReader, LinkBackend, LinkSettings, RfidBackend};
use shelfsense_network::{ControlPlaneConfig, Identity};
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub identity: IdentityConfig,
    pub control_plane: ControlPlaneSection,
    pub serial: SerialConfig,
    pub rfid: RfidConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub host: String,
    pub password: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            host: "shelfsense".to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneSection {
    pub address: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ControlPlaneSection {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            connect_timeout_ms: 3000,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub backend: LinkBackend,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            backend: LinkBackend::Serial,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RfidConfig {
    pub backend: RfidBackend,
    /// Tag the simulated reader presents, as hex.
    pub simulated_tag: String,
    pub present_after_ms: u64,
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            backend: RfidBackend::Simulated,
            simulated_tag: "699F0464".to_string(),
            present_after_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub settle_ms: u64,
    pub flush_read_timeout_ms: u64,
    pub flush_reads: u32,
    pub read_timeout_ms: u64,
    pub drain_limit: u32,
    pub ack_budget_ms: u64,
    pub calibration_budget_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_budget_ms: u64,
    pub close_settle_ms: u64,
    pub deny_retry_ms: u64,
    pub authorization_budget_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SETTLE_MS,
            flush_read_timeout_ms: DEFAULT_FLUSH_READ_TIMEOUT_MS,
            flush_reads: DEFAULT_FLUSH_READS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            drain_limit: DEFAULT_DRAIN_LIMIT,
            ack_budget_ms: DEFAULT_ACK_BUDGET_MS,
            calibration_budget_ms: DEFAULT_CALIBRATION_BUDGET_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_budget_ms: DEFAULT_POLL_BUDGET_MS,
            close_settle_ms: DEFAULT_CLOSE_SETTLE_MS,
            deny_retry_ms: DEFAULT_DENY_RETRY_MS,
            authorization_budget_ms: DEFAULT_AUTHORIZATION_BUDGET_MS,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        let budgets = [
            ("settle_ms", self.settle_ms),
            ("flush_read_timeout_ms", self.flush_read_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("ack_budget_ms", self.ack_budget_ms),
            ("calibration_budget_ms", self.calibration_budget_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("poll_budget_ms", self.poll_budget_ms),
            ("deny_retry_ms", self.deny_retry_ms),
            ("authorization_budget_ms", self.authorization_budget_ms),
        ];
        if let Some((key, _)) = budgets.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("timing.{key} must be greater than zero")));
        }
        if self.read_timeout_ms >= self.ack_budget_ms {
            return Err(Error::Config(format!(
                "timing.read_timeout_ms ({}) must be shorter than timing.ack_budget_ms ({})",
                self.read_timeout_ms, self.ack_budget_ms
            )));
        }
        if self.ack_budget_ms > self.calibration_budget_ms {
            return Err(Error::Config(format!(
                "timing.calibration_budget_ms ({}) must be at least timing.ack_budget_ms ({})",
                self.calibration_budget_ms, self.ack_budget_ms
            )));
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Load the configuration at `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is not valid TOML for this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "configuration loaded");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.simulate {
            self.serial.backend = LinkBackend::Simulated;
            self.rfid.backend = RfidBackend::Simulated;
        }
        if let Some(address) = &cli.control_plane {
            self.control_plane.address = address.clone();
        }
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.identity.host.trim().is_empty() {
            return Err(Error::Config("identity.host must not be empty".to_string()));
        }
        if self.control_plane.address.trim().is_empty() {
            return Err(Error::Config("control_plane.address must not be empty".to_string()));
        }
        if self.control_plane.connect_timeout_ms == 0 || self.control_plane.request_timeout_ms == 0 {
            return Err(Error::Config(
                "control_plane timeouts must be greater than zero".to_string(),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be greater than zero".to_string()));
        }
        self.simulated_tag()?;
        self.timing.validate()
    }

    fn simulated_tag(&self) -> Result<TagId> {
        TagId::from_hex(&self.rfid.simulated_tag)
            .map_err(|e| Error::Config(format!("rfid.simulated_tag: {e}")))
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.identity.host, &self.identity.password)
    }

    pub fn control_plane(&self) -> ControlPlaneConfig {
        ControlPlaneConfig {
            address: self.control_plane.address.clone(),
            connect_timeout: Duration::from_millis(self.control_plane.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.control_plane.request_timeout_ms),
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::new(
            self.serial.baud_rate,
            Duration::from_millis(self.timing.read_timeout_ms),
        )
    }

    pub fn timing(&self) -> Timing {
        let t = &self.timing;
        Timing {
            settle: Duration::from_millis(t.settle_ms),
            flush_read_timeout: Duration::from_millis(t.flush_read_timeout_ms),
            flush_reads: t.flush_reads,
            read_timeout: Duration::from_millis(t.read_timeout_ms),
            drain_limit: t.drain_limit,
            ack_budget: Duration::from_millis(t.ack_budget_ms),
            calibration_budget: Duration::from_millis(t.calibration_budget_ms),
            poll_interval: Duration::from_millis(t.poll_interval_ms),
            poll_budget: Duration::from_millis(t.poll_budget_ms),
            close_settle: Duration::from_millis(t.close_settle_ms),
            deny_retry: Duration::from_millis(t.deny_retry_ms),
            authorization_budget: Duration::from_millis(t.authorization_budget_ms),
        }
    }

    /// The RFID reader for the configured backend.
    pub fn rfid_reader(&self) -> Result<AnyRfidReader> {
        match self.rfid.backend {
            RfidBackend::Simulated => Ok(AnyRfidReader::Simulated(SimulatedRfid::new(
                self.simulated_tag()?,
                Duration::from_millis(self.rfid.present_after_ms),
            ))),
        }
    }
}
