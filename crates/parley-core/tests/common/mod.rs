//! Shared fixtures for session integration tests.
//!
//! RSA-3072 generation dominates test time, so identities are generated once
//! per test binary from fixed seeds and cloned into every session.

#![allow(dead_code)]

use std::sync::OnceLock;

use parley_core::{IdentityKeyPair, SecureSession, SessionConfig, SimEnv};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::EnvFilter;

/// Route session logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Cached identity for one of a fixed set of seeds.
pub fn identity(seed: u64) -> IdentityKeyPair {
    static IDENTITIES: [OnceLock<IdentityKeyPair>; 3] =
        [OnceLock::new(), OnceLock::new(), OnceLock::new()];

    let slot = &IDENTITIES[usize::try_from(seed % 3).unwrap()];
    slot.get_or_init(|| IdentityKeyPair::generate(&mut ChaCha20Rng::seed_from_u64(seed)).unwrap())
        .clone()
}

pub fn alice_identity() -> IdentityKeyPair {
    identity(0)
}

pub fn bob_identity() -> IdentityKeyPair {
    identity(1)
}

pub fn eve_identity() -> IdentityKeyPair {
    identity(2)
}

/// Run both halves of the handshake between two fresh sessions.
pub fn handshake(a: &mut SecureSession<SimEnv>, b: &mut SecureSession<SimEnv>) {
    let a_offer = a.initiate_exchange().unwrap();
    let b_offer = b.initiate_exchange().unwrap();

    let b_name = b.local_name().to_string();
    let a_name = a.local_name().to_string();

    a.complete_exchange(
        &b_name,
        &b.export_public_identity().unwrap(),
        &b_offer.public_key,
        &b_offer.signature,
    )
    .unwrap();
    b.complete_exchange(
        &a_name,
        &a.export_public_identity().unwrap(),
        &a_offer.public_key,
        &a_offer.signature,
    )
    .unwrap();
}

/// Alice and Bob on independent environments, connected.
pub struct Pair {
    pub alice: SecureSession<SimEnv>,
    pub bob: SecureSession<SimEnv>,
    pub alice_env: SimEnv,
    pub bob_env: SimEnv,
}

impl Pair {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SessionConfig::default())
    }

    pub fn with_config(seed: u64, config: SessionConfig) -> Self {
        init_tracing();
        let alice_env = SimEnv::new(seed);
        let bob_env = SimEnv::new(seed.wrapping_add(1));

        let mut alice =
            SecureSession::with_config("alice", alice_identity(), alice_env.clone(), config.clone())
                .unwrap();
        let mut bob =
            SecureSession::with_config("bob", bob_identity(), bob_env.clone(), config).unwrap();

        handshake(&mut alice, &mut bob);

        Self { alice, bob, alice_env, bob_env }
    }
}
