//! Fuzz target for envelope parsing and opening
//!
//! # Strategy
//!
//! - Random bytes: arbitrary input opened under an arbitrary epoch key
//! - Bit flips: a valid envelope with one bit flipped
//! - Truncation: a valid envelope cut at an arbitrary point
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A modified envelope never opens
//! - An unmodified envelope always opens to the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_crypto::{EpochKey, build_nonce, open, seal};

#[derive(Debug, Clone, Arbitrary)]
enum EnvelopeAttack {
    RandomBytes { key: [u8; 32], bytes: Vec<u8> },
    BitFlip { key: [u8; 32], plaintext: Vec<u8>, counter: u64, bit: u16 },
    Truncate { key: [u8; 32], plaintext: Vec<u8>, keep: u16 },
}

fuzz_target!(|attack: EnvelopeAttack| {
    match attack {
        EnvelopeAttack::RandomBytes { key, bytes } => {
            let _ = open(&EpochKey::from_key(0, key, "alice"), &bytes);
        },

        EnvelopeAttack::BitFlip { key, mut plaintext, counter, bit } => {
            plaintext.push(0);
            let keys = EpochKey::from_key(0, key, "alice");
            let mut envelope = seal(&keys, build_nonce(counter, [0; 4]), &plaintext);
            assert_eq!(open(&keys, &envelope).as_deref(), Ok(plaintext.as_slice()));

            let position = usize::from(bit) % (envelope.len() * 8);
            envelope[position / 8] ^= 1 << (position % 8);
            assert!(open(&keys, &envelope).is_err(), "tampered envelope opened");
        },

        EnvelopeAttack::Truncate { key, mut plaintext, keep } => {
            plaintext.push(0);
            let keys = EpochKey::from_key(0, key, "alice");
            let envelope = seal(&keys, build_nonce(1, [0; 4]), &plaintext);

            let keep = usize::from(keep) % envelope.len();
            assert!(open(&keys, &envelope[..keep]).is_err(), "truncated envelope opened");
        },
    }
});
