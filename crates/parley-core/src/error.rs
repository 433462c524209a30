//! Error types for the session engine.
//!
//! Every failure surfaces as a [`SessionError`] value. Each variant carries a
//! stable numeric code and belongs to one [`ErrorClass`], so callers can
//! decide between dropping a single message and tearing the session down
//! without matching on every variant.

use std::fmt;

use parley_crypto::CryptoError;
use parley_proto::FrameError;
use thiserror::Error;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller-supplied input is out of range
    Validation,
    /// Peer could not be authenticated
    Authentication,
    /// Key agreement or key generation failed
    KeyExchange,
    /// Operation not permitted in the current session state
    State,
    /// Input could not be parsed
    MalformedInput,
    /// MAC or AEAD verification failed
    Integrity,
    /// Peer speaks another protocol version
    Version,
    /// Message out of order or replayed
    Ordering,
    /// Message timestamp outside the accepted window
    Staleness,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::KeyExchange => "key-exchange",
            Self::State => "state",
            Self::MalformedInput => "malformed-input",
            Self::Integrity => "integrity",
            Self::Version => "version",
            Self::Ordering => "ordering",
            Self::Staleness => "staleness",
        };
        f.write_str(name)
    }
}

/// Errors from session construction, handshake and message processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Identity string exceeds the protocol limit
    #[error("identity too long: {len} bytes (max {max})")]
    IdentityTooLong {
        /// Identity length in bytes
        len: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Session configuration is unusable
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it
        reason: String,
    },

    /// Peer's signature over its ephemeral key did not verify
    #[error("peer signature is invalid")]
    InvalidSignature,

    /// Peer identity key could not be decoded or is too weak
    #[error("invalid peer identity key: {reason}")]
    InvalidIdentityKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Authenticated frame names a sender other than the bound peer
    #[error("sender mismatch: expected {expected:?}, got {actual:?}")]
    SenderMismatch {
        /// Identity bound at handshake
        expected: String,
        /// Identity carried in the frame
        actual: String,
    },

    /// Key agreement or rekey failed
    #[error("key exchange failed: {reason}")]
    KeyExchange {
        /// Underlying failure
        reason: String,
    },

    /// Identity key pair could not be generated
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// Underlying failure
        reason: String,
    },

    /// No handshake has completed
    #[error("session not established")]
    NotEstablished,

    /// Local sequence or nonce counter would wrap
    #[error("sequence space exhausted, a new handshake is required")]
    SequenceExhausted,

    /// Registry has no session for the peer
    #[error("no session for peer {peer:?}")]
    UnknownPeer {
        /// Requested peer identity
        peer: String,
    },

    /// Envelope shorter than the minimum wire size
    #[error("envelope too short: expected at least {expected} bytes, got {actual}")]
    EnvelopeTooShort {
        /// Minimum envelope size
        expected: usize,
        /// Actual envelope size
        actual: usize,
    },

    /// Decrypted frame could not be parsed
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// Parse failure
        reason: String,
    },

    /// Outer HMAC did not verify under any known epoch key
    #[error("envelope MAC mismatch")]
    MacMismatch,

    /// AEAD tag did not verify
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Underlying failure
        reason: String,
    },

    /// Frame carries an unsupported protocol version
    #[error("unsupported protocol version: {version} (expected {expected})")]
    UnsupportedVersion {
        /// Version byte in the frame
        version: u8,
        /// Version this implementation speaks
        expected: u8,
    },

    /// Sequence number is not exactly one past the last accepted
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Next acceptable sequence number
        expected: u32,
        /// Sequence number in the frame
        actual: u32,
    },

    /// Frame timestamp too far from the local clock
    #[error("stale message: timestamp {timestamp}, local time {now}")]
    StaleMessage {
        /// Timestamp in the frame
        timestamp: u64,
        /// Local wall-clock seconds at receipt
        now: u64,
    },
}

impl SessionError {
    /// Stable numeric error code.
    ///
    /// The thousands digit identifies the [`ErrorClass`].
    pub fn code(&self) -> u16 {
        match self {
            Self::IdentityTooLong { .. } => 1001,
            Self::InvalidConfig { .. } => 1002,
            Self::InvalidSignature => 2001,
            Self::InvalidIdentityKey { .. } => 2002,
            Self::SenderMismatch { .. } => 2003,
            Self::KeyExchange { .. } => 3001,
            Self::KeyGeneration { .. } => 3002,
            Self::NotEstablished => 4001,
            Self::SequenceExhausted => 4002,
            Self::UnknownPeer { .. } => 4003,
            Self::EnvelopeTooShort { .. } => 5001,
            Self::MalformedFrame { .. } => 5002,
            Self::MacMismatch => 6001,
            Self::DecryptionFailed { .. } => 6002,
            Self::UnsupportedVersion { .. } => 7001,
            Self::SequenceMismatch { .. } => 8001,
            Self::StaleMessage { .. } => 9001,
        }
    }

    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::IdentityTooLong { .. } | Self::InvalidConfig { .. } => ErrorClass::Validation,
            Self::InvalidSignature
            | Self::InvalidIdentityKey { .. }
            | Self::SenderMismatch { .. } => ErrorClass::Authentication,
            Self::KeyExchange { .. } | Self::KeyGeneration { .. } => ErrorClass::KeyExchange,
            Self::NotEstablished | Self::SequenceExhausted | Self::UnknownPeer { .. } => {
                ErrorClass::State
            },
            Self::EnvelopeTooShort { .. } | Self::MalformedFrame { .. } => {
                ErrorClass::MalformedInput
            },
            Self::MacMismatch | Self::DecryptionFailed { .. } => ErrorClass::Integrity,
            Self::UnsupportedVersion { .. } => ErrorClass::Version,
            Self::SequenceMismatch { .. } => ErrorClass::Ordering,
            Self::StaleMessage { .. } => ErrorClass::Staleness,
        }
    }

    /// Returns true if the session cannot continue without a new handshake.
    ///
    /// Everything else rejects a single message and leaves the session
    /// usable.
    pub fn requires_handshake(&self) -> bool {
        matches!(self.class(), ErrorClass::KeyExchange | ErrorClass::State)
    }
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EnvelopeTooShort { expected, actual } => {
                Self::EnvelopeTooShort { expected, actual }
            },
            CryptoError::MacMismatch => Self::MacMismatch,
            CryptoError::DecryptionFailed { reason } => Self::DecryptionFailed { reason },
            CryptoError::InvalidSignature => Self::InvalidSignature,
            CryptoError::InvalidIdentityKey { reason } => Self::InvalidIdentityKey { reason },
            err @ CryptoError::IdentityKeyTooSmall { .. } => {
                Self::InvalidIdentityKey { reason: err.to_string() }
            },
            err @ (CryptoError::InvalidEphemeralKey | CryptoError::Signing { .. }) => {
                Self::KeyExchange { reason: err.to_string() }
            },
            CryptoError::KeyGeneration { reason } => Self::KeyGeneration { reason },
        }
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        Self::MalformedFrame { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_their_class() {
        let samples = [
            SessionError::IdentityTooLong { len: 65, max: 64 },
            SessionError::InvalidSignature,
            SessionError::KeyExchange { reason: "x".into() },
            SessionError::NotEstablished,
            SessionError::MalformedFrame { reason: "x".into() },
            SessionError::MacMismatch,
            SessionError::UnsupportedVersion { version: 1, expected: 2 },
            SessionError::SequenceMismatch { expected: 2, actual: 5 },
            SessionError::StaleMessage { timestamp: 0, now: 600 },
        ];

        let classes: Vec<_> = samples.iter().map(|e| (e.code() / 1000, e.class())).collect();

        assert_eq!(
            classes,
            vec![
                (1, ErrorClass::Validation),
                (2, ErrorClass::Authentication),
                (3, ErrorClass::KeyExchange),
                (4, ErrorClass::State),
                (5, ErrorClass::MalformedInput),
                (6, ErrorClass::Integrity),
                (7, ErrorClass::Version),
                (8, ErrorClass::Ordering),
                (9, ErrorClass::Staleness),
            ]
        );
    }

    #[test]
    fn only_state_and_key_exchange_require_handshake() {
        assert!(SessionError::NotEstablished.requires_handshake());
        assert!(SessionError::SequenceExhausted.requires_handshake());
        assert!(SessionError::KeyGeneration { reason: "x".into() }.requires_handshake());

        assert!(!SessionError::MacMismatch.requires_handshake());
        assert!(!SessionError::SequenceMismatch { expected: 1, actual: 1 }.requires_handshake());
        assert!(!SessionError::StaleMessage { timestamp: 0, now: 0 }.requires_handshake());
    }

    #[test]
    fn crypto_errors_keep_their_meaning() {
        assert_eq!(SessionError::from(CryptoError::MacMismatch), SessionError::MacMismatch);
        assert_eq!(
            SessionError::from(CryptoError::InvalidSignature).class(),
            ErrorClass::Authentication
        );
        assert_eq!(
            SessionError::from(CryptoError::IdentityKeyTooSmall { bits: 1024, min: 3072 }).code(),
            2002
        );
        assert_eq!(
            SessionError::from(CryptoError::InvalidEphemeralKey).class(),
            ErrorClass::KeyExchange
        );
        assert_eq!(
            SessionError::from(CryptoError::EnvelopeTooShort { expected: 61, actual: 3 }),
            SessionError::EnvelopeTooShort { expected: 61, actual: 3 }
        );
    }

    #[test]
    fn frame_errors_are_malformed_input() {
        let err = SessionError::from(FrameError::UnknownMessageType(9));

        assert_eq!(err.class(), ErrorClass::MalformedInput);
        assert_eq!(err.code(), 5002);
    }

    #[test]
    fn class_display_uses_kebab_case() {
        assert_eq!(ErrorClass::KeyExchange.to_string(), "key-exchange");
        assert_eq!(ErrorClass::MalformedInput.to_string(), "malformed-input");
    }
}
