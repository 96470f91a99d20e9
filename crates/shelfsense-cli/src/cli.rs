use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// ShelfSense gateway: drives container units for the control plane.
#[derive(Debug, Clone, Parser)]
#[command(name = "shelfsense", version)]
pub struct Cli {
    /// Configuration file. A missing file means all defaults.
    #[arg(short, long, value_name = "FILE", default_value = "shelfsense.toml")]
    pub config: PathBuf,

    /// Use the simulated serial and RFID backends.
    #[arg(long)]
    pub simulate: bool,

    /// Control-plane address, overriding the configuration.
    #[arg(long, value_name = "ADDR")]
    pub control_plane: Option<String>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,
}
