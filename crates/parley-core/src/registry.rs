//! Registry of established sessions keyed by peer identity.
//!
//! A connection manager talking to several peers keeps one [`SecureSession`]
//! per peer here and routes envelopes by the identity bound at handshake.
//! Only established sessions are admitted, so every lookup yields a session
//! that can encrypt and decrypt.

use std::collections::HashMap;

use parley_proto::MessageType;

use crate::{
    env::Environment,
    error::SessionError,
    session::{Message, SecureSession},
};

/// Established sessions keyed by peer identity.
pub struct SessionRegistry<E: Environment> {
    /// Peer identity → session bound to that peer
    sessions: HashMap<String, SecureSession<E>>,
}

impl<E: Environment> Default for SessionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Environment> SessionRegistry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { sessions: HashMap::new() }
    }

    /// Register an established session under its peer identity.
    ///
    /// Returns the session previously registered for the same peer, if any.
    ///
    /// # Errors
    ///
    /// - `NotEstablished` if the session has not completed a handshake
    pub fn insert(
        &mut self,
        session: SecureSession<E>,
    ) -> Result<Option<SecureSession<E>>, SessionError> {
        let peer = session.peer_name().ok_or(SessionError::NotEstablished)?.to_string();

        tracing::debug!(peer = %peer, "session registered");
        Ok(self.sessions.insert(peer, session))
    }

    /// Session bound to `peer`.
    pub fn get(&self, peer: &str) -> Option<&SecureSession<E>> {
        self.sessions.get(peer)
    }

    /// Mutable session bound to `peer`.
    pub fn get_mut(&mut self, peer: &str) -> Option<&mut SecureSession<E>> {
        self.sessions.get_mut(peer)
    }

    /// Remove and return the session bound to `peer`.
    pub fn remove(&mut self, peer: &str) -> Option<SecureSession<E>> {
        let removed = self.sessions.remove(peer);
        if removed.is_some() {
            tracing::debug!(peer = %peer, "session removed");
        }
        removed
    }

    /// Returns true if a session is registered for `peer`.
    pub fn contains(&self, peer: &str) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Identities of all registered peers, in no particular order.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Encrypt a message for `peer`.
    ///
    /// # Errors
    ///
    /// - `UnknownPeer` if no session is registered for `peer`
    /// - Any error from [`SecureSession::encrypt`]
    pub fn encrypt_for(
        &mut self,
        peer: &str,
        kind: MessageType,
        payload: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        self.session_mut(peer)?.encrypt(kind, payload)
    }

    /// Decrypt an envelope received from `peer`.
    ///
    /// # Errors
    ///
    /// - `UnknownPeer` if no session is registered for `peer`
    /// - Any error from [`SecureSession::decrypt`]
    pub fn decrypt_from(&mut self, peer: &str, envelope: &[u8]) -> Result<Message, SessionError> {
        self.session_mut(peer)?.decrypt(envelope)
    }

    fn session_mut(&mut self, peer: &str) -> Result<&mut SecureSession<E>, SessionError> {
        self.sessions
            .get_mut(peer)
            .ok_or_else(|| SessionError::UnknownPeer { peer: peer.to_string() })
    }
}

impl<E: Environment> std::fmt::Debug for SessionRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("sessions", &self.sessions).finish()
    }
}
