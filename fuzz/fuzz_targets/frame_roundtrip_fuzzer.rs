//! Fuzz target for frame encode/decode agreement
//!
//! Builds frames from structured input so header names and values hit the
//! escape table (`\\`, `\r`, `\n`, `:`) and bodies carry embedded NULs.
//!
//! # Invariants
//!
//! - For commands that escape headers, decode(encode(frame)) returns every
//!   header unchanged and in order
//! - A caller-supplied `content-length` is replaced by the real body length
//! - Several frames in one buffer decode in order

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use roomline_proto::{Command, Frame, Packet, headers};

#[derive(Debug, Arbitrary)]
struct FrameInput {
    command: u8,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
struct Input {
    frames: Vec<FrameInput>,
}

/// Commands whose headers are escaped on the wire.
const ESCAPING: [Command; 7] = [
    Command::Send,
    Command::Subscribe,
    Command::Unsubscribe,
    Command::Disconnect,
    Command::Message,
    Command::Receipt,
    Command::Error,
];

fn build(input: FrameInput) -> Frame {
    let command = ESCAPING[usize::from(input.command) % ESCAPING.len()];
    Frame { command, headers: input.headers, body: Bytes::from(input.body) }
}

/// What the frame looks like after a trip over the wire.
fn expected(frame: &Frame) -> Frame {
    let mut kept: Vec<_> =
        frame.headers.iter().filter(|(n, _)| n != headers::CONTENT_LENGTH).cloned().collect();
    if !frame.body.is_empty() {
        kept.push((headers::CONTENT_LENGTH.to_string(), frame.body.len().to_string()));
    }
    Frame { command: frame.command, headers: kept, body: frame.body.clone() }
}

fuzz_target!(|input: Input| {
    let frames: Vec<Frame> = input.frames.into_iter().take(8).map(build).collect();
    if frames.is_empty() {
        return;
    }

    let mut wire = Vec::new();
    for frame in &frames {
        let Ok(encoded) = frame.encode() else {
            return;
        };
        wire.extend_from_slice(&encoded);
        // Heart-beat between frames
        wire.push(b'\n');
    }

    if wire.len() > Frame::MAX_FRAME_SIZE {
        return;
    }

    let Ok(decoded) = Packet::decode_all(&wire) else {
        panic!("encoded frames must decode");
    };

    let expected: Vec<Packet> = frames.iter().map(|f| Packet::Frame(expected(f))).collect();
    assert_eq!(decoded, expected);
});
