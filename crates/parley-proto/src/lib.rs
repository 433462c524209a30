//! Parley wire format
//!
//! Defines the plaintext frame carried inside every encrypted envelope and
//! the closed set of message types. This crate knows nothing about
//! cryptography: it turns logical fields into bytes and back, and rejects
//! structurally invalid input.
//!
//! # Plaintext Frame
//!
//! ```text
//! ┌───────────────┬────────┬──────────────┬─────────┬──────────┬─────────┬─────────────┐
//! │ timestamp (8) │ id_len │ identity     │ version │ msg_type │ seq (4) │ payload     │
//! │ BE seconds    │ (1)    │ (id_len ≤64) │ (1)     │ (1)      │ BE      │ (variable)  │
//! └───────────────┴────────┴──────────────┴─────────┴──────────┴─────────┴─────────────┘
//! ```
//!
//! Semantic checks (version, sequence, freshness, sender) belong to the session
//! layer. Decoding only guarantees that every field is present and well formed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod message;

pub use errors::{FrameError, Result};
pub use frame::PlaintextFrame;
pub use message::MessageType;

/// Current protocol version carried in every frame.
pub const PROTOCOL_VERSION: u8 = 2;

/// Maximum length in bytes of a sender identity string.
pub const MAX_IDENTITY_LEN: usize = 64;
