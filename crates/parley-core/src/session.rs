//! Secure session state machine.
//!
//! A [`SecureSession`] owns one local identity and at most one established
//! channel to a single peer. All operations are synchronous and pure apart
//! from the [`Environment`] they read time and randomness from.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────────┐ initiate_exchange ┌─────────┐ complete_exchange ┌─────────────┐
//! │ Unconnected │──────────────────>│ Offered │──────────────────>│ Established │
//! └─────────────┘                   └─────────┘                   └─────────────┘
//!                                                                   │       ▲
//!                                                   encrypt/decrypt │       │ rekey
//!                                                                   └───────┘
//! ```
//!
//! A new handshake on an established session replaces the channel wholesale.
//!
//! # Key Epochs
//!
//! Each direction walks its own deterministic chain of epoch keys, bound to
//! the sending peer's identity. A session seals under its send chain and
//! opens under its receive chain, so the two peers never share an AEAD key
//! and one side's rekeys never strand the other side's messages in flight.
//!
//! A rekey needs no message of its own. When an envelope does not
//! authenticate under the receive epoch, the receiver derives up to
//! `max_epoch_lookahead` successors and adopts the first whose MAC key
//! matches.
//!
//! # Validation Order
//!
//! Decryption checks length, MAC, AEAD tag, frame structure, version,
//! sequence, freshness, sender and message type, in that order. Nothing is
//! mutated until every check has passed.

use std::fmt;

use bytes::Bytes;
use parley_crypto::{
    EphemeralKeyPair, EphemeralPublicKey, EpochKey, Envelope, IdentityKeyPair, IdentityPublicKey,
    NONCE_RANDOM_SIZE, build_nonce, seal,
};
use parley_proto::{MAX_IDENTITY_LEN, MessageType, PROTOCOL_VERSION, PlaintextFrame};

use crate::{
    config::SessionConfig,
    env::{EnvRng, Environment},
    error::SessionError,
};

/// Signed ephemeral key to hand to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralOffer {
    /// Uncompressed SEC1 P-384 point
    pub public_key: Vec<u8>,
    /// RSA-PSS signature over `public_key` by the local identity key
    pub signature: Vec<u8>,
}

/// Authenticated message delivered by [`SecureSession::decrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type
    pub kind: MessageType,
    /// Application payload
    pub payload: Bytes,
}

impl Message {
    /// Payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error if the payload is binary.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }
}

/// Why the sender moved to the next epoch.
#[derive(Debug, Clone, Copy)]
enum RekeyTrigger {
    MessageLimit,
    Interval,
    Manual,
    Peer,
}

impl RekeyTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::MessageLimit => "message limit",
            Self::Interval => "interval",
            Self::Manual => "manual",
            Self::Peer => "peer",
        }
    }
}

/// Established channel to one peer.
struct Channel<I> {
    /// Identity bound at handshake; every frame must carry it
    peer_name: String,
    exchange: EphemeralKeyPair,
    peer_ephemeral: EphemeralPublicKey,
    /// Local direction, sealed by this session
    send: EpochKey,
    /// Peer direction, opened by this session
    recv: EpochKey,
    established_at: I,
    /// When the send chain last advanced
    last_rekey: I,
    messages_since_rekey: u32,
    /// Last sequence number sent (0 before the first send)
    local_sequence: u32,
    /// Last sequence number accepted from the peer
    peer_sequence: u32,
    /// Last nonce counter used, strictly increasing for the channel lifetime
    nonce_counter: u64,
}

impl<I: Copy> Channel<I> {
    fn advance_send(&mut self, now: I) {
        let shared = self.exchange.agree(&self.peer_ephemeral);
        self.send = self.send.next(&shared);
        self.messages_since_rekey = 0;
        self.last_rekey = now;
    }

    /// Find the receive epoch that authenticates `envelope`.
    ///
    /// Returns `None` for the current receive epoch, or the later epoch the
    /// receiver should adopt once the frame passes every other check.
    fn match_epoch(
        &self,
        envelope: &Envelope<'_>,
        lookahead: u32,
    ) -> Result<Option<EpochKey>, SessionError> {
        if envelope.verify(&self.recv).is_ok() {
            return Ok(None);
        }

        let shared = self.exchange.agree(&self.peer_ephemeral);
        let mut candidate: Option<EpochKey> = None;
        for _ in 0..lookahead {
            let next = candidate.as_ref().unwrap_or(&self.recv).next(&shared);
            if envelope.verify(&next).is_ok() {
                return Ok(Some(next));
            }
            candidate = Some(next);
        }

        Err(SessionError::MacMismatch)
    }
}

/// Secure session with a single peer.
///
/// Generic over [`Environment`] so tests can drive time and randomness.
///
/// # Invariants
///
/// - A channel exists only after the peer's signature over its ephemeral key
///   verified against the supplied identity key
/// - Outgoing sequence numbers are 1, 2, 3, ... with no gaps
/// - Nonce counters never repeat within a channel
/// - A failed operation leaves all counters and keys unchanged
pub struct SecureSession<E: Environment> {
    env: E,
    config: SessionConfig,
    local_name: String,
    identity: IdentityKeyPair,
    /// Ephemeral key from the latest `initiate_exchange`, not yet used
    pending: Option<EphemeralKeyPair>,
    channel: Option<Channel<E::Instant>>,
}

impl<E: Environment> SecureSession<E> {
    /// Create a session with a freshly generated RSA-3072 identity.
    ///
    /// # Errors
    ///
    /// - `IdentityTooLong` if `local_name` exceeds 64 bytes. Checked before
    ///   any key material is generated.
    /// - `KeyGeneration` if identity generation fails
    pub fn new(local_name: impl Into<String>, env: E) -> Result<Self, SessionError> {
        let local_name = local_name.into();
        validate_identity(&local_name)?;

        let identity = IdentityKeyPair::generate(&mut EnvRng::new(&env))?;
        Self::with_config(local_name, identity, env, SessionConfig::default())
    }

    /// Create a session around an existing identity key pair.
    ///
    /// # Errors
    ///
    /// - `IdentityTooLong` if `local_name` exceeds 64 bytes
    pub fn with_identity(
        local_name: impl Into<String>,
        identity: IdentityKeyPair,
        env: E,
    ) -> Result<Self, SessionError> {
        Self::with_config(local_name, identity, env, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    ///
    /// # Errors
    ///
    /// - `IdentityTooLong` if `local_name` exceeds 64 bytes
    /// - `InvalidConfig` if `config` fails validation
    pub fn with_config(
        local_name: impl Into<String>,
        identity: IdentityKeyPair,
        env: E,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let local_name = local_name.into();
        validate_identity(&local_name)?;
        config.validate()?;

        Ok(Self { env, config, local_name, identity, pending: None, channel: None })
    }

    /// Local identity string.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Identity bound at handshake, if established.
    pub fn peer_name(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.peer_name.as_str())
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true once a handshake has completed.
    pub fn is_established(&self) -> bool {
        self.channel.is_some()
    }

    /// Epoch of the local send chain, if established. Starts at 0.
    pub fn key_epoch(&self) -> Option<u64> {
        self.channel.as_ref().map(|c| c.send.epoch())
    }

    /// Epoch of the peer's chain as last adopted by this receiver.
    pub fn peer_key_epoch(&self) -> Option<u64> {
        self.channel.as_ref().map(|c| c.recv.epoch())
    }

    /// Last sequence number sent.
    pub fn local_sequence(&self) -> Option<u32> {
        self.channel.as_ref().map(|c| c.local_sequence)
    }

    /// Last sequence number accepted from the peer.
    pub fn peer_sequence(&self) -> Option<u32> {
        self.channel.as_ref().map(|c| c.peer_sequence)
    }

    /// Messages sent under the current send epoch.
    pub fn messages_since_rekey(&self) -> Option<u32> {
        self.channel.as_ref().map(|c| c.messages_since_rekey)
    }

    /// Time since the handshake completed.
    pub fn session_age(&self) -> Option<std::time::Duration> {
        self.channel.as_ref().map(|c| self.env.now() - c.established_at)
    }

    /// Local identity public key.
    pub fn public_identity(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    /// Local identity public key as DER `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentityKey` if DER encoding fails
    pub fn export_public_identity(&self) -> Result<Vec<u8>, SessionError> {
        Ok(self.identity.public_key().to_der()?)
    }

    /// Generate an ephemeral P-384 key and sign it with the identity key.
    ///
    /// Replaces any earlier offer that has not been completed.
    ///
    /// # Errors
    ///
    /// - `KeyExchange` if signing fails
    pub fn initiate_exchange(&mut self) -> Result<EphemeralOffer, SessionError> {
        let mut rng = EnvRng::new(&self.env);
        let exchange = EphemeralKeyPair::generate(&mut rng);
        let public_key = exchange.public_bytes();
        let signature = self.identity.sign(&mut rng, &public_key)?;

        self.pending = Some(exchange);
        Ok(EphemeralOffer { public_key, signature })
    }

    /// Authenticate the peer's offer and establish the channel.
    ///
    /// `peer_name` is the identity the peer must put in every frame.
    ///
    /// # Errors
    ///
    /// - `IdentityTooLong` if `peer_name` exceeds 64 bytes
    /// - `KeyExchange` if `peer_name` equals the local identity
    /// - `InvalidIdentityKey` if the identity key is undecodable or too small
    /// - `InvalidSignature` if the signature does not verify
    /// - `KeyExchange` if the ephemeral key is invalid or
    ///   [`SecureSession::initiate_exchange`] was not called
    ///
    /// On error the session is unchanged, including any previous channel.
    pub fn complete_exchange(
        &mut self,
        peer_name: &str,
        peer_identity_key: &[u8],
        peer_ephemeral_key: &[u8],
        peer_signature: &[u8],
    ) -> Result<(), SessionError> {
        validate_identity(peer_name)?;
        if peer_name == self.local_name {
            return Err(SessionError::KeyExchange {
                reason: "peer identity must differ from the local identity".to_string(),
            });
        }

        let peer_identity = IdentityPublicKey::from_der(peer_identity_key)?;
        peer_identity.verify(peer_ephemeral_key, peer_signature)?;
        let peer_ephemeral = EphemeralPublicKey::from_bytes(peer_ephemeral_key)?;

        let Some(exchange) = self.pending.take() else {
            return Err(SessionError::KeyExchange {
                reason: "no local ephemeral key, call initiate_exchange first".to_string(),
            });
        };

        let shared = exchange.agree(&peer_ephemeral);
        let send = EpochKey::initial(&shared, &self.local_name);
        let recv = EpochKey::initial(&shared, peer_name);
        let now = self.env.now();

        self.channel = Some(Channel {
            peer_name: peer_name.to_string(),
            exchange,
            peer_ephemeral,
            send,
            recv,
            established_at: now,
            last_rekey: now,
            messages_since_rekey: 0,
            local_sequence: 0,
            peer_sequence: 0,
            nonce_counter: 0,
        });

        tracing::debug!(local = %self.local_name, peer = %peer_name, "handshake complete");
        Ok(())
    }

    /// Move the send chain to its next epoch immediately.
    ///
    /// The peer follows automatically when the next envelope arrives. The
    /// receive chain is untouched.
    ///
    /// # Errors
    ///
    /// - `KeyExchange` if no handshake has completed
    pub fn rekey(&mut self) -> Result<(), SessionError> {
        let now = self.env.now();
        let channel = self.channel.as_mut().ok_or_else(|| SessionError::KeyExchange {
            reason: "no peer ephemeral key on record".to_string(),
        })?;

        channel.advance_send(now);
        log_rekey(&self.local_name, channel.send.epoch(), RekeyTrigger::Manual);
        Ok(())
    }

    /// Frame, encrypt and authenticate one message.
    ///
    /// Rekeys first if the current epoch is due, and again after the send if
    /// it reached the message limit.
    ///
    /// # Errors
    ///
    /// - `NotEstablished` if no handshake has completed
    /// - `SequenceExhausted` if the sequence or nonce counter would wrap
    pub fn encrypt(&mut self, kind: MessageType, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        let now = self.env.now();
        let limit = self.config.rekey_message_limit;
        let interval = self.config.rekey_interval;
        let channel = self.channel.as_mut().ok_or(SessionError::NotEstablished)?;

        let sequence = channel.local_sequence.checked_add(1).ok_or(SessionError::SequenceExhausted)?;
        let counter = channel.nonce_counter.checked_add(1).ok_or(SessionError::SequenceExhausted)?;

        let frame = PlaintextFrame::new(
            self.env.wall_clock_secs(),
            self.local_name.as_str(),
            kind,
            sequence,
            Bytes::copy_from_slice(payload),
        );
        let plaintext = frame.to_vec()?;

        let trigger = if channel.messages_since_rekey >= limit {
            Some(RekeyTrigger::MessageLimit)
        } else if now - channel.last_rekey > interval {
            Some(RekeyTrigger::Interval)
        } else {
            None
        };
        if let Some(trigger) = trigger {
            channel.advance_send(now);
            log_rekey(&self.local_name, channel.send.epoch(), trigger);
        }

        let mut suffix = [0u8; NONCE_RANDOM_SIZE];
        self.env.random_bytes(&mut suffix);
        let envelope = seal(&channel.send, build_nonce(counter, suffix), &plaintext);

        channel.local_sequence = sequence;
        channel.nonce_counter = counter;
        channel.messages_since_rekey += 1;

        if channel.messages_since_rekey >= limit {
            channel.advance_send(now);
            log_rekey(&self.local_name, channel.send.epoch(), RekeyTrigger::MessageLimit);
        }

        Ok(envelope)
    }

    /// Authenticate, decrypt and validate one envelope from the peer.
    ///
    /// # Errors
    ///
    /// - `NotEstablished` if no handshake has completed
    /// - `EnvelopeTooShort`, `MalformedFrame` for structurally bad input
    /// - `MacMismatch`, `DecryptionFailed` for tampered input
    /// - `UnsupportedVersion` if the frame version is not 2
    /// - `SequenceMismatch` unless the sequence is exactly one past the last
    /// - `StaleMessage` if the timestamp is outside the skew window
    /// - `SenderMismatch` if the frame names anyone but the bound peer
    ///
    /// On error the session is unchanged.
    pub fn decrypt(&mut self, envelope: &[u8]) -> Result<Message, SessionError> {
        let result = self.open_envelope(envelope);
        if let Err(err) = &result {
            tracing::warn!(
                local = %self.local_name,
                code = err.code(),
                class = %err.class(),
                "rejected envelope: {err}"
            );
        }
        result
    }

    fn open_envelope(&mut self, bytes: &[u8]) -> Result<Message, SessionError> {
        let wall_clock = self.env.wall_clock_secs();
        let max_skew = self.config.max_clock_skew.as_secs();
        let lookahead = self.config.max_epoch_lookahead;
        let channel = self.channel.as_mut().ok_or(SessionError::NotEstablished)?;

        let envelope = Envelope::parse(bytes)?;
        let adopted = channel.match_epoch(&envelope, lookahead)?;
        let plaintext = envelope.decrypt(adopted.as_ref().unwrap_or(&channel.recv))?;
        let frame = PlaintextFrame::decode(&plaintext)?;

        if frame.version != PROTOCOL_VERSION {
            return Err(SessionError::UnsupportedVersion {
                version: frame.version,
                expected: PROTOCOL_VERSION,
            });
        }

        let expected = channel.peer_sequence.checked_add(1).ok_or(SessionError::SequenceExhausted)?;
        if frame.sequence != expected {
            return Err(SessionError::SequenceMismatch { expected, actual: frame.sequence });
        }

        if wall_clock.abs_diff(frame.timestamp) > max_skew {
            return Err(SessionError::StaleMessage { timestamp: frame.timestamp, now: wall_clock });
        }

        if frame.sender != channel.peer_name {
            return Err(SessionError::SenderMismatch {
                expected: channel.peer_name.clone(),
                actual: frame.sender,
            });
        }

        let kind = MessageType::try_from(frame.message_type)?;

        // All checks passed
        channel.peer_sequence = frame.sequence;
        if let Some(keys) = adopted {
            tracing::debug!(
                local = %self.local_name,
                from = channel.recv.epoch(),
                to = keys.epoch(),
                "adopted peer key epoch"
            );
            channel.recv = keys;
            log_rekey(&self.local_name, channel.recv.epoch(), RekeyTrigger::Peer);
        }

        Ok(Message { kind, payload: frame.payload })
    }
}

impl<E: Environment> fmt::Debug for SecureSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("local_name", &self.local_name)
            .field("peer_name", &self.peer_name())
            .field("key_epoch", &self.key_epoch())
            .field("peer_key_epoch", &self.peer_key_epoch())
            .field("local_sequence", &self.local_sequence())
            .field("peer_sequence", &self.peer_sequence())
            .finish_non_exhaustive()
    }
}

/// Reject identities that do not fit the frame's one-byte length prefix.
pub(crate) fn validate_identity(name: &str) -> Result<(), SessionError> {
    if name.len() > MAX_IDENTITY_LEN {
        return Err(SessionError::IdentityTooLong { len: name.len(), max: MAX_IDENTITY_LEN });
    }
    Ok(())
}

fn log_rekey(local_name: &str, epoch: u64, trigger: RekeyTrigger) {
    tracing::info!(local = %local_name, epoch, trigger = trigger.as_str(), "session rekeyed");
}
