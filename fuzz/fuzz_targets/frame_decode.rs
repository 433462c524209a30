//! Fuzz target for PlaintextFrame::decode
//!
//! This fuzzer tests frame decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Buffer over-reads on the identity length prefix
//! - Frames that decode but do not re-encode to the same bytes
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::PlaintextFrame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = PlaintextFrame::decode(data) {
        // Anything that decodes must re-encode byte for byte
        let encoded = frame.to_vec().expect("decoded identity fits the length prefix");
        assert_eq!(encoded, data);
    }
});
