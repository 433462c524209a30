//! Session tuning parameters.

use std::time::Duration;

use crate::error::SessionError;

/// Messages sent under one epoch key before the sender moves to the next.
pub const DEFAULT_REKEY_MESSAGE_LIMIT: u32 = 100;

/// Age of an epoch key after which the next send rekeys first.
pub const DEFAULT_REKEY_INTERVAL: Duration = Duration::from_secs(3600);

/// Largest accepted difference between a frame's timestamp and local time.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Epochs the receiver derives ahead of its own when an envelope fails the
/// current key.
pub const DEFAULT_MAX_EPOCH_LOOKAHEAD: u32 = 4;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Messages per epoch key (must be non-zero)
    pub rekey_message_limit: u32,
    /// Maximum epoch key age, checked before every send
    pub rekey_interval: Duration,
    /// Freshness window applied in both directions
    pub max_clock_skew: Duration,
    /// How far ahead of its receive epoch the receiver searches (non-zero)
    pub max_epoch_lookahead: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rekey_message_limit: DEFAULT_REKEY_MESSAGE_LIMIT,
            rekey_interval: DEFAULT_REKEY_INTERVAL,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
            max_epoch_lookahead: DEFAULT_MAX_EPOCH_LOOKAHEAD,
        }
    }
}

impl SessionConfig {
    /// Check that the configuration can drive a session.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidConfig` if `rekey_message_limit` or
    ///   `max_epoch_lookahead` is zero
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.rekey_message_limit == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "rekey_message_limit must be at least 1".to_string(),
            });
        }
        if self.max_epoch_lookahead == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "max_epoch_lookahead must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
