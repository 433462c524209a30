//! Message type tags

use std::fmt;

use crate::errors::FrameError;

/// Logical message type carried in the frame's `msg_type` byte.
///
/// Closed set: handling code matches exhaustively, so adding a variant is a
/// compile-time change everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Game move
    Move = 1,
    /// Free-form chat text
    Chat = 2,
    /// Reserved for rekey signaling
    Rekey = 3,
}

impl MessageType {
    /// All known message types.
    pub const ALL: [Self; 3] = [Self::Move, Self::Chat, Self::Rekey];

    /// Wire byte for this type.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Move),
            2 => Some(Self::Chat),
            3 => Some(Self::Rekey),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(FrameError::UnknownMessageType(value))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Move => "MOVE",
            Self::Chat => "CHAT",
            Self::Rekey => "REKEY",
        };
        f.write_str(name)
    }
}
