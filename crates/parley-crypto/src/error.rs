//! Error types for cryptographic primitives

use thiserror::Error;

/// Errors from identity, exchange and envelope primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Envelope is shorter than the minimum wire size
    #[error("envelope too short: expected at least {expected} bytes, got {actual}")]
    EnvelopeTooShort {
        /// Minimum envelope size
        expected: usize,
        /// Actual envelope size
        actual: usize,
    },

    /// Outer HMAC did not verify
    #[error("envelope MAC mismatch")]
    MacMismatch,

    /// AEAD tag did not verify
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why decryption failed
        reason: String,
    },

    /// Signature over the ephemeral key did not verify
    #[error("invalid signature")]
    InvalidSignature,

    /// Identity public key could not be decoded
    #[error("invalid identity key: {reason}")]
    InvalidIdentityKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Identity public key is weaker than the protocol minimum
    #[error("identity key too small: {bits} bits, minimum {min}")]
    IdentityKeyTooSmall {
        /// Modulus size of the offered key
        bits: usize,
        /// Required minimum modulus size
        min: usize,
    },

    /// Ephemeral public key is not a valid curve point
    #[error("invalid ephemeral key")]
    InvalidEphemeralKey,

    /// Identity key generation failed
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// Underlying failure
        reason: String,
    },

    /// Signing with the identity key failed
    #[error("signing failed: {reason}")]
    Signing {
        /// Underlying failure
        reason: String,
    },
}
