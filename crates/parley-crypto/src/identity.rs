//! Long-term identity keys (RSA-3072, PSS signatures)
//!
//! The identity key never encrypts anything. Its only job is to sign the
//! serialized ephemeral exchange key so the peer can bind that key to a
//! durable identity. Public halves travel as DER `SubjectPublicKeyInfo`.
//!
//! Signatures use RSASSA-PSS with SHA-256 and the maximum salt length the
//! modulus allows (`em_len - hash_len - 2`). The verifier recomputes the same
//! salt length from the signer's public key.

use rand::{CryptoRng, RngCore};
use rsa::{
    Pss, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePublicKey, EncodePublicKey},
    traits::PublicKeyParts,
};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Modulus size of generated identity keys, and the minimum accepted from a
/// peer.
pub const IDENTITY_KEY_BITS: usize = 3072;

/// SHA-256 output size used in the PSS salt computation.
const HASH_LEN: usize = 32;

/// Long-term signing key pair.
#[derive(Clone)]
pub struct IdentityKeyPair {
    private_key: RsaPrivateKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity key pair.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration` if the RNG cannot produce a valid modulus
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(rng, IDENTITY_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration { reason: e.to_string() })?;

        Ok(Self { private_key })
    }

    /// Public half of this identity.
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey { key: self.private_key.to_public_key() }
    }

    /// Sign `message` with RSA-PSS (SHA-256, maximum salt length).
    ///
    /// PSS is randomized: signing the same message twice yields different
    /// signatures, both valid.
    ///
    /// # Errors
    ///
    /// - `Signing` if the RSA operation fails
    pub fn sign<R: CryptoRng + RngCore>(
        &self,
        rng: &mut R,
        message: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let salt_len = max_salt_len(self.private_key.n().bits());
        let digest = Sha256::digest(message);

        self.private_key
            .sign_with_rng(rng, Pss::new_blinded_with_salt::<Sha256>(salt_len), &digest)
            .map_err(|e| CryptoError::Signing { reason: e.to_string() })
    }
}

/// Long-term public key of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPublicKey {
    key: RsaPublicKey,
}

impl IdentityPublicKey {
    /// Decode a DER `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentityKey` if the bytes are not an RSA public key
    /// - `IdentityKeyTooSmall` if the modulus is below [`IDENTITY_KEY_BITS`]
    pub fn from_der(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_der(bytes)
            .map_err(|e| CryptoError::InvalidIdentityKey { reason: e.to_string() })?;

        let bits = key.n().bits();
        if bits < IDENTITY_KEY_BITS {
            return Err(CryptoError::IdentityKeyTooSmall { bits, min: IDENTITY_KEY_BITS });
        }

        Ok(Self { key })
    }

    /// Encode as DER `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentityKey` if encoding fails
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        let document = self
            .key
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidIdentityKey { reason: e.to_string() })?;

        Ok(document.as_bytes().to_vec())
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.key.n().bits()
    }

    /// Verify a PSS signature produced by [`IdentityKeyPair::sign`].
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` on any verification failure
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let salt_len = max_salt_len(self.bits());
        let digest = Sha256::digest(message);

        self.key
            .verify(Pss::new_with_salt::<Sha256>(salt_len), &digest, signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

/// Largest PSS salt for a modulus of `modulus_bits`.
///
/// `em_len = ceil((mod_bits - 1) / 8)`, salt = `em_len - hash_len - 2`.
fn max_salt_len(modulus_bits: usize) -> usize {
    let em_len = modulus_bits.saturating_sub(1).div_ceil(8);
    em_len.saturating_sub(HASH_LEN + 2)
}
