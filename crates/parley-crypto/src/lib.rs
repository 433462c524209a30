//! Parley Cryptographic Primitives
//!
//! Cryptographic building blocks for the Parley session protocol. Functions
//! are pure where possible: randomness is always supplied by the caller, either
//! as an RNG handle (key generation, signing) or as raw bytes (nonce suffix).
//! This keeps every primitive reproducible under a seeded generator.
//!
//! # Key Lifecycle
//!
//! ```text
//! Identity Key (RSA-3072, long-term)
//!        │ signs (PSS, max salt)
//!        ▼
//! Ephemeral Key (P-384, per handshake) ──ECDH──> Shared Secret
//!                                                     │
//!                                                     ▼
//!                              HKDF("session") → Epoch 0 key
//!                                                     │
//!                         HKDF(salt = epoch n, "rekey") → Epoch n+1 key
//!                                                     │
//!                                  ┌──────────────────┴───────────────┐
//!                                  ▼                                  ▼
//!                         HKDF("aead") → AEAD key            HKDF("mac") → MAC key
//! ```
//!
//! # Security
//!
//! Authentication:
//! - Ephemeral public keys are signed by the long-term identity key, so a
//!   man-in-the-middle cannot substitute its own exchange key
//! - The long-term public key must be obtained authentically out of band
//!
//! Forward Secrecy:
//! - Session keys derive from ephemeral ECDH, never from identity keys
//! - Epoch keys are zeroized when dropped
//!
//! Integrity:
//! - The outer HMAC is verified in constant time before any AEAD work
//! - AEAD and MAC keys come from distinct HKDF labels

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod schedule;

pub use envelope::{
    Envelope, MAC_SIZE, MIN_ENVELOPE_SIZE, NONCE_RANDOM_SIZE, NONCE_SIZE, TAG_SIZE, build_nonce,
    open, seal,
};
pub use error::CryptoError;
pub use exchange::{EPHEMERAL_PUBLIC_KEY_SIZE, EphemeralKeyPair, EphemeralPublicKey, SharedSecret};
pub use identity::{IDENTITY_KEY_BITS, IdentityKeyPair, IdentityPublicKey};
pub use schedule::EpochKey;
