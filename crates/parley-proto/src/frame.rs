//! Plaintext frame codec.
//!
//! A `PlaintextFrame` is the logical record that gets encrypted into an
//! envelope. Encoding is a straight big-endian field dump; decoding walks the
//! buffer field by field and checks the remaining length before every read.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    MAX_IDENTITY_LEN, PROTOCOL_VERSION,
    errors::{FrameError, Result},
    message::MessageType,
};

/// Bytes before the identity: timestamp (8) + identity length (1).
const PREFIX_SIZE: usize = 9;

/// Bytes after the identity, before the payload: version, type, sequence.
const TRAILER_SIZE: usize = 6;

/// Decoded plaintext frame.
///
/// `version` and `message_type` are kept raw so the session layer can apply
/// its own validation order (version first) to authenticated input.
///
/// # Invariants
///
/// - `sender.len()` MUST NOT exceed [`MAX_IDENTITY_LEN`]. Enforced by
///   [`PlaintextFrame::encode`] and [`PlaintextFrame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextFrame {
    /// Send time, seconds since the Unix epoch
    pub timestamp: u64,
    /// Sender identity string
    pub sender: String,
    /// Protocol version byte
    pub version: u8,
    /// Raw message-type byte
    pub message_type: u8,
    /// Per-sender sequence number
    pub sequence: u32,
    /// Application payload
    pub payload: Bytes,
}

impl PlaintextFrame {
    /// Build a frame for the current protocol version.
    #[must_use]
    pub fn new(
        timestamp: u64,
        sender: impl Into<String>,
        message_type: MessageType,
        sequence: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            timestamp,
            sender: sender.into(),
            version: PROTOCOL_VERSION,
            message_type: message_type.to_u8(),
            sequence,
            payload: payload.into(),
        }
    }

    /// Parsed message type. `None` if the byte is unrecognized.
    #[must_use]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type)
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PREFIX_SIZE + self.sender.len() + TRAILER_SIZE + self.payload.len()
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `FrameError::IdentityTooLong` if the sender exceeds
    ///   [`MAX_IDENTITY_LEN`] bytes. Nothing is written in that case.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let identity = self.sender.as_bytes();
        if identity.len() > MAX_IDENTITY_LEN {
            return Err(FrameError::IdentityTooLong {
                len: identity.len(),
                max: MAX_IDENTITY_LEN,
            });
        }

        dst.put_u64(self.timestamp);
        // INVARIANT: identity.len() <= 64 checked above, fits in u8
        dst.put_u8(identity.len() as u8);
        dst.put_slice(identity);
        dst.put_u8(self.version);
        dst.put_u8(self.message_type);
        dst.put_u32(self.sequence);
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a fresh vector.
    ///
    /// # Errors
    ///
    /// - `FrameError::IdentityTooLong` as for [`PlaintextFrame::encode`]
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode a frame. Everything after the sequence number is payload.
    ///
    /// # Errors
    ///
    /// - `FrameError::FrameTooShort` if a fixed field is truncated
    /// - `FrameError::IdentityTooLong` if the length prefix exceeds 64
    /// - `FrameError::InvalidIdentity` if the identity is not UTF-8
    ///
    /// # Security
    ///
    /// Length is checked before every read, so truncated or hostile input
    /// cannot cause a panic or an over-read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;

        ensure_remaining(buf, PREFIX_SIZE, bytes.len())?;
        let timestamp = buf.get_u64();
        let identity_len = usize::from(buf.get_u8());

        if identity_len > MAX_IDENTITY_LEN {
            return Err(FrameError::IdentityTooLong { len: identity_len, max: MAX_IDENTITY_LEN });
        }

        ensure_remaining(buf, identity_len + TRAILER_SIZE, bytes.len())?;
        let sender = std::str::from_utf8(&buf[..identity_len])
            .map_err(|_| FrameError::InvalidIdentity)?
            .to_owned();
        buf.advance(identity_len);

        let version = buf.get_u8();
        let message_type = buf.get_u8();
        let sequence = buf.get_u32();
        let payload = Bytes::copy_from_slice(buf);

        Ok(Self { timestamp, sender, version, message_type, sequence, payload })
    }
}

fn ensure_remaining(buf: &[u8], needed: usize, total: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(FrameError::FrameTooShort {
            expected: total - buf.remaining() + needed,
            actual: total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_wire_layout() {
        let frame = PlaintextFrame::new(0x0102_0304_0506_0708, "bob", MessageType::Move, 5, "e4");

        let bytes = frame.to_vec().unwrap();

        assert_eq!(
            hex::encode(&bytes),
            concat!(
                "0102030405060708", // timestamp
                "03",               // identity length
                "626f62",           // "bob"
                "02",               // version
                "01",               // MOVE
                "00000005",         // sequence
                "6534",             // "e4"
            )
        );
        assert_eq!(bytes.len(), frame.encoded_len());
    }

    #[test]
    fn decode_inverts_encode() {
        let frame = PlaintextFrame::new(1_700_000_000, "alice", MessageType::Chat, 42, "gg");

        let decoded = PlaintextFrame::decode(&frame.to_vec().unwrap()).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.kind(), Some(MessageType::Chat));
    }

    #[test]
    fn empty_payload_and_identity_are_allowed() {
        let frame = PlaintextFrame::new(0, "", MessageType::Rekey, 1, Bytes::new());

        let decoded = PlaintextFrame::decode(&frame.to_vec().unwrap()).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(frame.encoded_len(), PREFIX_SIZE + TRAILER_SIZE);
    }

    #[test]
    fn identity_of_64_bytes_is_accepted() {
        let sender = "a".repeat(MAX_IDENTITY_LEN);
        let frame = PlaintextFrame::new(0, sender, MessageType::Chat, 1, "x");

        assert!(frame.to_vec().is_ok());
    }

    #[test]
    fn identity_of_65_bytes_is_rejected_on_encode() {
        let sender = "a".repeat(MAX_IDENTITY_LEN + 1);
        let frame = PlaintextFrame::new(0, sender, MessageType::Chat, 1, "x");

        let mut out = Vec::new();
        let result = frame.encode(&mut out);

        assert_eq!(result, Err(FrameError::IdentityTooLong { len: 65, max: 64 }));
        assert!(out.is_empty(), "nothing may be written on failure");
    }

    #[test]
    fn oversized_length_prefix_is_rejected_on_decode() {
        let mut bytes = vec![0u8; 8];
        bytes.push(65);
        bytes.extend_from_slice(&[b'a'; 65]);
        bytes.extend_from_slice(&[2, 1, 0, 0, 0, 1]);

        assert_eq!(
            PlaintextFrame::decode(&bytes),
            Err(FrameError::IdentityTooLong { len: 65, max: 64 })
        );
    }

    #[test]
    fn truncated_prefix_is_rejected() {
        assert_eq!(
            PlaintextFrame::decode(&[0u8; 5]),
            Err(FrameError::FrameTooShort { expected: 9, actual: 5 })
        );
    }

    #[test]
    fn truncated_trailer_is_rejected() {
        let frame = PlaintextFrame::new(1, "eve", MessageType::Move, 1, Bytes::new());
        let bytes = frame.to_vec().unwrap();

        let result = PlaintextFrame::decode(&bytes[..bytes.len() - 1]);

        assert_eq!(
            result,
            Err(FrameError::FrameTooShort { expected: bytes.len(), actual: bytes.len() - 1 })
        );
    }

    #[test]
    fn non_utf8_identity_is_rejected() {
        let mut bytes = vec![0u8; 8];
        bytes.push(2);
        bytes.extend_from_slice(&[0xC3, 0x28]);
        bytes.extend_from_slice(&[2, 1, 0, 0, 0, 1]);

        assert_eq!(PlaintextFrame::decode(&bytes), Err(FrameError::InvalidIdentity));
    }

    #[test]
    fn unknown_type_decodes_but_has_no_kind() {
        let mut frame = PlaintextFrame::new(1, "bob", MessageType::Move, 1, "x");
        frame.message_type = 0x7F;

        let decoded = PlaintextFrame::decode(&frame.to_vec().unwrap()).unwrap();

        assert_eq!(decoded.message_type, 0x7F);
        assert_eq!(decoded.kind(), None);
    }
}
