//! The `shelfsense` binary's building blocks: command line, configuration,
//! logging and the top-level run loop.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;

pub use cli::Cli;
pub use config::GatewayConfig;

/// Process exit codes.
pub mod exit {
    /// Clean shutdown.
    pub const OK: u8 = 0;
    /// Identity rejected or fatal runtime error.
    pub const FATAL: u8 = 1;
    /// Invalid configuration.
    pub const CONFIG: u8 = 2;
}
