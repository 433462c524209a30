//! Fuzz target for the full session pipeline
//!
//! Drives an established pair of sessions with an arbitrary interleaving of
//! sends, deliveries, tampering, replays, rekeys and clock jumps.
//!
//! # Invariants
//!
//! - NEVER panic
//! - Tampered or replayed envelopes never decrypt
//! - Rejected envelopes leave the receiver's sequence unchanged

#![no_main]

use std::{sync::OnceLock, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_core::{IdentityKeyPair, MessageType, SecureSession, SimEnv};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Send { from_alice: bool, kind: u8, payload: Vec<u8> },
    Deliver,
    DeliverTampered { bit: u16 },
    Replay,
    Rekey { alice: bool },
    Advance { secs: u16 },
}

fn identities() -> &'static (IdentityKeyPair, IdentityKeyPair) {
    static IDS: OnceLock<(IdentityKeyPair, IdentityKeyPair)> = OnceLock::new();
    IDS.get_or_init(|| {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        (
            IdentityKeyPair::generate(&mut rng).expect("keygen"),
            IdentityKeyPair::generate(&mut rng).expect("keygen"),
        )
    })
}

fn kind(byte: u8) -> MessageType {
    MessageType::ALL[usize::from(byte) % MessageType::ALL.len()]
}

fuzz_target!(|ops: Vec<Op>| {
    let (alice_id, bob_id) = identities();
    let env = SimEnv::new(1);
    let mut alice = SecureSession::with_identity("alice", alice_id.clone(), env.clone()).unwrap();
    let mut bob = SecureSession::with_identity("bob", bob_id.clone(), env.clone()).unwrap();

    let alice_offer = alice.initiate_exchange().unwrap();
    let bob_offer = bob.initiate_exchange().unwrap();
    alice
        .complete_exchange(
            "bob",
            &bob.export_public_identity().unwrap(),
            &bob_offer.public_key,
            &bob_offer.signature,
        )
        .unwrap();
    bob.complete_exchange(
        "alice",
        &alice.export_public_identity().unwrap(),
        &alice_offer.public_key,
        &alice_offer.signature,
    )
    .unwrap();

    // At most one envelope in flight: (to_bob, envelope)
    let mut pending: Option<(bool, Vec<u8>)> = None;
    let mut delivered: Option<(bool, Vec<u8>)> = None;

    for op in ops.into_iter().take(64) {
        match op {
            Op::Send { from_alice, kind: k, payload } => {
                let sender = if from_alice { &mut alice } else { &mut bob };
                let envelope = sender.encrypt(kind(k), &payload).unwrap();
                // Undelivered envelopes are dropped, later sends would gap anyway
                if pending.is_none() {
                    pending = Some((from_alice, envelope));
                }
            },
            Op::Deliver => {
                if let Some((to_bob, envelope)) = pending.take() {
                    let receiver = if to_bob { &mut bob } else { &mut alice };
                    let _ = receiver.decrypt(&envelope);
                    delivered = Some((to_bob, envelope));
                }
            },
            Op::DeliverTampered { bit } => {
                if let Some((to_bob, envelope)) = &pending {
                    let mut tampered = envelope.clone();
                    let position = usize::from(bit) % (tampered.len() * 8);
                    tampered[position / 8] ^= 1 << (position % 8);

                    let receiver = if *to_bob { &mut bob } else { &mut alice };
                    let before = receiver.peer_sequence();
                    assert!(receiver.decrypt(&tampered).is_err(), "tampered envelope accepted");
                    assert_eq!(receiver.peer_sequence(), before);
                }
            },
            Op::Replay => {
                if let Some((to_bob, envelope)) = &delivered {
                    let receiver = if *to_bob { &mut bob } else { &mut alice };
                    assert!(receiver.decrypt(envelope).is_err(), "replay accepted");
                }
            },
            Op::Rekey { alice: on_alice } => {
                let session = if on_alice { &mut alice } else { &mut bob };
                session.rekey().unwrap();
            },
            Op::Advance { secs } => env.advance(Duration::from_secs(u64::from(secs))),
        }
    }
});
