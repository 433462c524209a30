//! Frame codec errors

use thiserror::Error;

/// Result alias for frame operations.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Structural errors in a plaintext frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer ended before a required field
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required to read the next field
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Identity longer than the one-byte length prefix allows by protocol
    #[error("identity too long: {len} bytes (max {max})")]
    IdentityTooLong {
        /// Identity length in bytes
        len: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Identity bytes are not UTF-8
    #[error("identity is not valid UTF-8")]
    InvalidIdentity,

    /// Message-type byte outside the known set
    #[error("unknown message type: {0:#04x}")]
    UnknownMessageType(u8),
}
