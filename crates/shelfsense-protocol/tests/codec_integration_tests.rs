//! Integration tests for the command codec over a realistic byte stream.

mod common;

use bytes::BytesMut;
use shelfsense_protocol::{CommandCodec, InboundFrame, Opcode};
use tokio_util::codec::Decoder;

fn opcodes(mut buf: BytesMut) -> Vec<(Opcode, u8)> {
    let mut codec = CommandCodec::new();
    let mut out = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        if let InboundFrame::Command(frame) = frame {
            out.push((frame.opcode(), frame.unit().as_u8()));
        }
    }
    out
}

#[test]
fn test_two_items_decode_in_order() {
    let mut stream = common::put_in_item_bytes(7, 3);
    stream.extend(common::put_in_item_bytes(2, 1));

    let decoded = opcodes(BytesMut::from(&stream[..]));
    assert_eq!(
        decoded,
        vec![
            (Opcode::PutIn, 7),
            (Opcode::OpenLock, 7),
            (Opcode::QueryProgress, 7),
            (Opcode::CloseLock, 7),
            (Opcode::PutIn, 2),
            (Opcode::OpenLock, 2),
            (Opcode::QueryProgress, 2),
            (Opcode::CloseLock, 2),
        ]
    );
}

#[test]
fn test_stream_fed_one_byte_at_a_time() {
    let stream = common::put_in_item_bytes(9, 200);
    let mut codec = CommandCodec::new();
    let mut buf = BytesMut::new();
    let mut decoded = Vec::new();

    for byte in stream {
        buf.extend_from_slice(&[byte]);
        while let Some(InboundFrame::Command(frame)) = codec.decode(&mut buf).unwrap() {
            decoded.push(frame);
        }
    }

    assert_eq!(decoded.len(), 4);
    assert_eq!(decoded[0].payload(), &[200]);
}

#[test]
fn test_bring_up_syncs_are_two_byte_frames() {
    let decoded = opcodes(BytesMut::from(&[0x00, 0x00, 0x00, 0x00][..]));
    assert_eq!(decoded, vec![(Opcode::Sync, 0), (Opcode::Sync, 0)]);
}
