//! Ephemeral key agreement on NIST P-384
//!
//! A fresh [`EphemeralKeyPair`] is generated for every handshake. Its public
//! half is serialized as an uncompressed SEC1 point, which is exactly the byte
//! string the identity key signs. The secret half is kept for the lifetime of
//! the session so rekeying can recompute the same shared secret without a
//! second signed round-trip.

use p384::{PublicKey, ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint};
use rand::{CryptoRng, RngCore};

use crate::error::CryptoError;

/// Size of an uncompressed SEC1 P-384 point (`0x04 || x || y`).
pub const EPHEMERAL_PUBLIC_KEY_SIZE: usize = 97;

/// Per-handshake ECDH key pair.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let secret = EphemeralSecret::random(rng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Public half as an uncompressed SEC1 point.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Diffie-Hellman with the peer's public key.
    ///
    /// Deterministic for a given pair of keys, so both peers (and every
    /// rekey) arrive at the same secret.
    pub fn agree(&self, peer: &EphemeralPublicKey) -> SharedSecret {
        SharedSecret(self.secret.diffie_hellman(&peer.key))
    }
}

/// Peer's ephemeral public key, validated as a point on P-384.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralPublicKey {
    key: PublicKey,
}

impl EphemeralPublicKey {
    /// Decode a SEC1 point.
    ///
    /// # Errors
    ///
    /// - `InvalidEphemeralKey` if the bytes are not a valid, non-identity point
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidEphemeralKey)?;
        Ok(Self { key })
    }

    /// Uncompressed SEC1 encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.key.to_encoded_point(false).as_bytes().to_vec()
    }
}

/// Raw ECDH output. Zeroized on drop.
pub struct SharedSecret(p384::ecdh::SharedSecret);

impl SharedSecret {
    /// Raw x-coordinate bytes, input keying material for HKDF.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.raw_secret_bytes().as_slice()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn public_bytes_are_uncompressed_point() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let pair = EphemeralKeyPair::generate(&mut rng);

        let bytes = pair.public_bytes();

        assert_eq!(bytes.len(), EPHEMERAL_PUBLIC_KEY_SIZE);
        assert_eq!(bytes[0], 0x04);
    }

    #[test]
    fn both_sides_agree() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let alice = EphemeralKeyPair::generate(&mut rng);
        let bob = EphemeralKeyPair::generate(&mut rng);

        let alice_view = EphemeralPublicKey::from_bytes(&bob.public_bytes()).unwrap();
        let bob_view = EphemeralPublicKey::from_bytes(&alice.public_bytes()).unwrap();

        assert_eq!(alice.agree(&alice_view).as_bytes(), bob.agree(&bob_view).as_bytes());
    }

    #[test]
    fn agreement_is_repeatable() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let alice = EphemeralKeyPair::generate(&mut rng);
        let bob = EphemeralKeyPair::generate(&mut rng);
        let peer = EphemeralPublicKey::from_bytes(&bob.public_bytes()).unwrap();

        let first = alice.agree(&peer);
        let second = alice.agree(&peer);

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.as_bytes().len(), 48);
    }

    #[test]
    fn different_peers_produce_different_secrets() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let alice = EphemeralKeyPair::generate(&mut rng);
        let bob = EphemeralPublicKey::from_bytes(
            &EphemeralKeyPair::generate(&mut rng).public_bytes(),
        )
        .unwrap();
        let carol = EphemeralPublicKey::from_bytes(
            &EphemeralKeyPair::generate(&mut rng).public_bytes(),
        )
        .unwrap();

        assert_ne!(alice.agree(&bob).as_bytes(), alice.agree(&carol).as_bytes());
    }

    #[test]
    fn invalid_point_is_rejected() {
        let mut bytes = vec![0x04];
        bytes.extend_from_slice(&[0xFF; 96]);

        assert_eq!(EphemeralPublicKey::from_bytes(&bytes), Err(CryptoError::InvalidEphemeralKey));
        assert_eq!(EphemeralPublicKey::from_bytes(&[]), Err(CryptoError::InvalidEphemeralKey));
    }

    #[test]
    fn decoded_key_reencodes_identically() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let pair = EphemeralKeyPair::generate(&mut rng);

        let decoded = EphemeralPublicKey::from_bytes(&pair.public_bytes()).unwrap();

        assert_eq!(decoded.to_bytes(), pair.public_bytes());
    }
}
