//! Parley Secure Session Engine
//!
//! Two-party secure messaging between identified peers. Each side holds a
//! long-term RSA identity, exchanges signed ephemeral P-384 keys, and then
//! exchanges encrypted envelopes with ordering, freshness and sender checks.
//!
//! # Architecture
//!
//! - [`SecureSession`]: handshake, encryption, decryption and rekeying for
//!   one peer
//! - [`SessionRegistry`]: established sessions keyed by peer identity
//! - [`Environment`]: time and randomness, so sessions run identically under
//!   real clocks ([`SystemEnv`]) and in simulation ([`SimEnv`])
//!
//! # Example
//!
//! ```no_run
//! use parley_core::{MessageType, SecureSession, SystemEnv};
//!
//! # fn main() -> Result<(), parley_core::SessionError> {
//! let mut alice = SecureSession::new("alice", SystemEnv::new())?;
//! let mut bob = SecureSession::new("bob", SystemEnv::new())?;
//!
//! let alice_offer = alice.initiate_exchange()?;
//! let bob_offer = bob.initiate_exchange()?;
//!
//! alice.complete_exchange(
//!     "bob",
//!     &bob.export_public_identity()?,
//!     &bob_offer.public_key,
//!     &bob_offer.signature,
//! )?;
//! bob.complete_exchange(
//!     "alice",
//!     &alice.export_public_identity()?,
//!     &alice_offer.public_key,
//!     &alice_offer.signature,
//! )?;
//!
//! let envelope = alice.encrypt(MessageType::Move, b"e2e4")?;
//! let message = bob.decrypt(&envelope)?;
//! assert_eq!(message.payload.as_ref(), b"e2e4");
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! The identity key passed to `complete_exchange` must come from a trusted
//! source. The session authenticates the ephemeral key against it, not the
//! other way round.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod registry;
pub mod session;

pub use config::{
    DEFAULT_MAX_CLOCK_SKEW, DEFAULT_MAX_EPOCH_LOOKAHEAD, DEFAULT_REKEY_INTERVAL,
    DEFAULT_REKEY_MESSAGE_LIMIT, SessionConfig,
};
pub use env::{EnvRng, Environment, SimEnv, SystemEnv};
pub use error::{ErrorClass, SessionError};
pub use parley_crypto::IdentityKeyPair;
pub use parley_proto::MessageType;
pub use registry::SessionRegistry;
pub use session::{EphemeralOffer, Message, SecureSession};
