//! Shared domain types, wire constants and the error taxonomy for the
//! ShelfSense gateway.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
