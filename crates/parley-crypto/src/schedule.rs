//! Session key schedule using HKDF-SHA256
//!
//! Every session key belongs to an *epoch*. Epoch 0 comes straight from the
//! handshake shared secret; epoch `n + 1` is derived from the same shared
//! secret salted with the epoch `n` key. The chain is deterministic, so a
//! receiver can derive the sender's next epoch on demand.
//!
//! Each direction of a session walks its own chain. An epoch key is bound to
//! the identity of the peer that sends under it, and its AEAD and MAC
//! subkeys are expanded with that identity in the HKDF info:
//!
//! ```text
//! aead = HKDF-Expand(K(n), "parley/v2/aead" || sender)
//! mac  = HKDF-Expand(K(n), "parley/v2/mac"  || sender)
//! ```
//!
//! Alice's and Bob's messages therefore never share an AEAD key, even when
//! both chains sit at the same epoch and both nonce counters are equal.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::exchange::SharedSecret;

/// Label for the initial session key
const SESSION_LABEL: &[u8] = b"parley/v2/session";

/// Label for rekey derivations
const REKEY_LABEL: &[u8] = b"parley/v2/rekey";

/// Label for the AEAD subkey
const AEAD_LABEL: &[u8] = b"parley/v2/aead";

/// Label for the outer MAC subkey
const MAC_LABEL: &[u8] = b"parley/v2/mac";

/// Key material for one epoch of one sending direction.
pub struct EpochKey {
    /// Position in the rekey chain
    epoch: u64,
    /// Identity of the peer that seals under this key
    sender: String,
    /// 32-byte chain key for this epoch
    key: [u8; 32],
    /// ChaCha20-Poly1305 key
    aead_key: [u8; 32],
    /// HMAC-SHA256 key
    mac_key: [u8; 32],
}

impl EpochKey {
    /// Derive the epoch 0 key of `sender`'s direction from a fresh handshake.
    pub fn initial(shared: &SharedSecret, sender: &str) -> Self {
        let key = expand(None, shared.as_bytes(), &[SESSION_LABEL]);
        Self::from_key(0, key, sender)
    }

    /// Derive the next epoch of the same direction.
    ///
    /// The current key acts as HKDF salt, so the next key depends on the
    /// whole chain, not only on the shared secret.
    pub fn next(&self, shared: &SharedSecret) -> Self {
        let key = expand(Some(&self.key), shared.as_bytes(), &[REKEY_LABEL]);
        Self::from_key(self.epoch + 1, key, &self.sender)
    }

    /// Build an epoch from raw chain key material.
    pub fn from_key(epoch: u64, key: [u8; 32], sender: &str) -> Self {
        let aead_key = expand(None, &key, &[AEAD_LABEL, sender.as_bytes()]);
        let mac_key = expand(None, &key, &[MAC_LABEL, sender.as_bytes()]);
        Self { epoch, sender: sender.to_string(), key, aead_key, mac_key }
    }

    /// Position in the rekey chain (0 for the handshake key).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Identity of the sending peer this key belongs to.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Chain key for this epoch.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// AEAD subkey.
    pub fn aead_key(&self) -> &[u8; 32] {
        &self.aead_key
    }

    /// MAC subkey.
    pub fn mac_key(&self) -> &[u8; 32] {
        &self.mac_key
    }
}

impl Drop for EpochKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.aead_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl std::fmt::Debug for EpochKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochKey")
            .field("epoch", &self.epoch)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

fn expand(salt: Option<&[u8]>, ikm: &[u8], info: &[&[u8]]) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; 32];
    let Ok(()) = hkdf.expand_multi_info(info, &mut okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    okm
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::exchange::{EphemeralKeyPair, EphemeralPublicKey};

    fn shared_pair(seed: u64) -> (SharedSecret, SharedSecret) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let alice = EphemeralKeyPair::generate(&mut rng);
        let bob = EphemeralKeyPair::generate(&mut rng);

        let alice_peer = EphemeralPublicKey::from_bytes(&bob.public_bytes()).unwrap();
        let bob_peer = EphemeralPublicKey::from_bytes(&alice.public_bytes()).unwrap();

        (alice.agree(&alice_peer), bob.agree(&bob_peer))
    }

    #[test]
    fn peers_derive_same_initial_key() {
        let (alice, bob) = shared_pair(1);

        let alice_send = EpochKey::initial(&alice, "alice");
        let bob_receive = EpochKey::initial(&bob, "alice");

        assert_eq!(alice_send.key(), bob_receive.key());
        assert_eq!(alice_send.aead_key(), bob_receive.aead_key());
        assert_eq!(alice_send.epoch(), 0);
    }

    #[test]
    fn peers_walk_same_chain() {
        let (alice, bob) = shared_pair(2);

        let mut alice_key = EpochKey::initial(&alice, "alice");
        let mut bob_key = EpochKey::initial(&bob, "alice");

        for epoch in 1..=5 {
            alice_key = alice_key.next(&alice);
            bob_key = bob_key.next(&bob);

            assert_eq!(alice_key.epoch(), epoch);
            assert_eq!(alice_key.key(), bob_key.key());
            assert_eq!(alice_key.mac_key(), bob_key.mac_key());
            assert_eq!(alice_key.sender(), "alice");
        }
    }

    #[test]
    fn directions_never_share_subkeys() {
        let (shared, _) = shared_pair(4);

        let alice_send = EpochKey::initial(&shared, "alice");
        let bob_send = EpochKey::initial(&shared, "bob");

        assert_ne!(alice_send.aead_key(), bob_send.aead_key());
        assert_ne!(alice_send.mac_key(), bob_send.mac_key());

        let alice_next = alice_send.next(&shared);
        let bob_next = bob_send.next(&shared);
        assert_ne!(alice_next.aead_key(), bob_next.aead_key());
    }

    #[test]
    fn rekey_changes_every_key() {
        let (shared, _) = shared_pair(3);

        let current = EpochKey::initial(&shared, "alice");
        let next = current.next(&shared);

        assert_ne!(current.key(), next.key());
        assert_ne!(current.aead_key(), next.aead_key());
        assert_ne!(current.mac_key(), next.mac_key());
    }

    #[test]
    fn subkeys_are_independent() {
        let key = EpochKey::from_key(0, [0x42; 32], "alice");

        assert_ne!(key.aead_key(), key.mac_key());
        assert_ne!(key.aead_key(), key.key());
        assert_ne!(key.mac_key(), key.key());
    }

    #[test]
    fn from_key_is_deterministic() {
        let first = EpochKey::from_key(9, [0x11; 32], "bob");
        let second = EpochKey::from_key(9, [0x11; 32], "bob");

        assert_eq!(first.aead_key(), second.aead_key());
        assert_eq!(first.mac_key(), second.mac_key());
    }

    #[test]
    fn debug_output_hides_key_material() {
        let key = EpochKey::from_key(3, [0xAB; 32], "alice");

        let rendered = format!("{key:?}");

        assert!(rendered.contains("epoch: 3"));
        assert!(!rendered.contains("171"), "key bytes must not be printed");
    }
}
