//! Byte-level codec for the container unit serial protocol.
//!
//! Commands are encoded as `[opcode, unit_id, payload...]` frames with a
//! payload layout fixed per opcode; units answer with single status bytes or
//! short progress frames.

pub mod codec;
pub mod command;
pub mod frame;
pub mod opcode;
pub mod response;

pub use codec::{CommandCodec, InboundFrame};
pub use command::Command;
pub use frame::CommandFrame;
pub use opcode::Opcode;
pub use response::{AckOutcome, ProgressFrame, ResponseTag};
