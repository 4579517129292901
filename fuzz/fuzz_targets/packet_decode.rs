//! Fuzz target for Packet::decode_all
//!
//! Feeds arbitrary WebSocket message bytes to the STOMP decoder to find:
//! - Parser panics on malformed heads
//! - Off-by-one reads around `content-length` and the NUL terminator
//! - Escape sequences that slip through `unescape`
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.
//!
//! # Invariants
//!
//! - Every decoded frame re-encodes, and the re-encoded bytes decode to a
//!   frame with the same command and body

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomline_proto::{Frame, Packet};

fuzz_target!(|data: &[u8]| {
    let Ok(packets) = Packet::decode_all(data) else {
        return;
    };

    for packet in packets {
        let Packet::Frame(frame) = packet else {
            continue;
        };

        // Re-encoding adds a content-length, which may push it over the cap
        let Ok(encoded) = frame.encode() else {
            continue;
        };

        let again = Frame::decode(&encoded).expect("re-encoded frame must decode");
        assert_eq!(again.command, frame.command);
        assert_eq!(again.body, frame.body);
    }
});
