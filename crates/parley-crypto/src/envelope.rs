//! Message envelopes: ChaCha20-Poly1305 inside an HMAC-SHA256 wrapper
//!
//! Wire layout:
//!
//! ```text
//! ┌────────────┬──────────┬─────────────────────┬────────────┐
//! │ nonce (12) │ tag (16) │ ciphertext (1..)    │ hmac (32)  │
//! └────────────┴──────────┴─────────────────────┴────────────┘
//! ```
//!
//! The HMAC covers `nonce || tag || ciphertext` and is checked in constant
//! time before the AEAD is touched. A forged envelope never reaches the
//! decryption path.
//!
//! All functions are pure - the random nonce suffix is provided by the caller.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::CryptoError, schedule::EpochKey};

type HmacSha256 = Hmac<Sha256>;

/// ChaCha20-Poly1305 nonce size
pub const NONCE_SIZE: usize = 12;

/// Size of the random suffix in the nonce
pub const NONCE_RANDOM_SIZE: usize = 4;

/// Poly1305 tag size
pub const TAG_SIZE: usize = 16;

/// HMAC-SHA256 output size
pub const MAC_SIZE: usize = 32;

/// Smallest valid envelope: nonce, tag, one ciphertext byte, MAC.
pub const MIN_ENVELOPE_SIZE: usize = NONCE_SIZE + TAG_SIZE + 1 + MAC_SIZE;

/// Build a 12-byte nonce.
///
/// Structure:
/// - bytes 0-7: send counter (big-endian, strictly increasing per send)
/// - bytes 8-11: random suffix (caller-provided)
///
/// The counter alone guarantees uniqueness under one key; the suffix makes
/// nonces unpredictable.
pub fn build_nonce(counter: u64, random_suffix: [u8; NONCE_RANDOM_SIZE]) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0..8].copy_from_slice(&counter.to_be_bytes());
    nonce[8..12].copy_from_slice(&random_suffix);
    nonce
}

/// Encrypt `plaintext` and wrap it in an authenticated envelope.
pub fn seal(keys: &EpochKey, nonce: [u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(keys.aead_key().into());

    let mut buffer = plaintext.to_vec();
    let Ok(tag) =
        cipher.encrypt_in_place_detached(Nonce::from_slice(&nonce), &[], buffer.as_mut_slice())
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut envelope = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len() + MAC_SIZE);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(tag.as_slice());
    envelope.extend_from_slice(&buffer);

    let mac = compute_mac(keys.mac_key(), &envelope);
    envelope.extend_from_slice(&mac);

    envelope
}

/// Verify and decrypt an envelope under a single epoch key.
///
/// # Errors
///
/// - `EnvelopeTooShort` if `bytes` is below [`MIN_ENVELOPE_SIZE`]
/// - `MacMismatch` if the outer HMAC fails
/// - `DecryptionFailed` if the AEAD tag fails
pub fn open(keys: &EpochKey, bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let envelope = Envelope::parse(bytes)?;
    envelope.verify(keys)?;
    envelope.decrypt(keys)
}

/// Borrowed view over the sections of a received envelope.
///
/// Parsing only checks length. Call [`Envelope::verify`] before
/// [`Envelope::decrypt`].
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    nonce: &'a [u8],
    tag: &'a [u8],
    ciphertext: &'a [u8],
    mac: &'a [u8],
    /// `nonce || tag || ciphertext`, the MAC input
    authenticated: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split raw bytes into envelope sections.
    ///
    /// # Errors
    ///
    /// - `EnvelopeTooShort` if `bytes` is below [`MIN_ENVELOPE_SIZE`]
    pub fn parse(bytes: &'a [u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(CryptoError::EnvelopeTooShort {
                expected: MIN_ENVELOPE_SIZE,
                actual: bytes.len(),
            });
        }

        let (authenticated, mac) = bytes.split_at(bytes.len() - MAC_SIZE);
        let (nonce, rest) = authenticated.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        debug_assert!(!ciphertext.is_empty());

        Ok(Self { nonce, tag, ciphertext, mac, authenticated })
    }

    /// Send counter carried in the first 8 nonce bytes.
    pub fn counter(&self) -> u64 {
        let mut counter = [0u8; 8];
        counter.copy_from_slice(&self.nonce[0..8]);
        u64::from_be_bytes(counter)
    }

    /// Ciphertext length (equals the plaintext length).
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }

    /// Check the outer HMAC in constant time.
    ///
    /// # Errors
    ///
    /// - `MacMismatch` if the MAC does not verify under `keys`
    pub fn verify(&self, keys: &EpochKey) -> Result<(), CryptoError> {
        let mut mac = new_mac(keys.mac_key());
        mac.update(self.authenticated);
        mac.verify_slice(self.mac).map_err(|_| CryptoError::MacMismatch)
    }

    /// Decrypt the ciphertext.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed` if the Poly1305 tag does not verify
    pub fn decrypt(&self, keys: &EpochKey) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new(keys.aead_key().into());

        let mut buffer = self.ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(self.nonce),
                &[],
                buffer.as_mut_slice(),
                Tag::from_slice(self.tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed {
                reason: "authentication failed".to_string(),
            })?;

        Ok(buffer)
    }
}

fn new_mac(key: &[u8; 32]) -> HmacSha256 {
    let Ok(mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac
}

fn compute_mac(key: &[u8; 32], data: &[u8]) -> [u8; MAC_SIZE] {
    let mut mac = new_mac(key);
    mac.update(data);

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
