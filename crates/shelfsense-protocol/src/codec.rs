//! Tokio codec for the gateway → unit command stream.
//!
//! Frames have no delimiter: the opcode alone fixes the frame length, so the
//! decoder waits for the opcode byte, then for `Opcode::frame_len()` bytes.
//! This is how a unit sees its serial input, and it is what the simulated
//! firmware uses to split the gateway's writes back into commands.
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use shelfsense_protocol::{CommandCodec, InboundFrame, Opcode};
//!
//! let mut codec = CommandCodec::new();
//! let mut buf = BytesMut::from(&[0x13, 0x07][..]);
//! assert!(codec.decode(&mut buf).unwrap().is_none()); // amount still missing
//!
//! buf.extend_from_slice(&[0x03]);
//! match codec.decode(&mut buf).unwrap() {
//!     Some(InboundFrame::Command(frame)) => assert_eq!(frame.opcode(), Opcode::PutIn),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{CommandFrame, Opcode};
use shelfsense_core::{Error, Result, constants::FRAME_HEADER_LEN};

/// One decoded unit of the command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Command(CommandFrame),
    /// An opcode the firmware does not know. Only the two header bytes are
    /// consumed since the payload length cannot be known.
    Unknown { opcode: u8, unit: u8 },
}

/// Codec splitting a byte stream into [`InboundFrame`]s and writing
/// [`CommandFrame`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandCodec;

impl CommandCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for CommandCodec {
    type Item = InboundFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(&op_byte) = src.first() else {
            return Ok(None);
        };

        let Ok(opcode) = Opcode::parse(op_byte) else {
            if src.len() < FRAME_HEADER_LEN {
                return Ok(None);
            }
            let unit = src[1];
            src.advance(FRAME_HEADER_LEN);
            return Ok(Some(InboundFrame::Unknown {
                opcode: op_byte,
                unit,
            }));
        };

        let len = opcode.frame_len();
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let bytes = src.split_to(len);
        CommandFrame::decode(&bytes).map(|frame| Some(InboundFrame::Command(frame)))
    }
}

impl Encoder<CommandFrame> for CommandCodec {
    type Error = Error;

    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
