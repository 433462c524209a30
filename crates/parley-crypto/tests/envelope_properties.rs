//! Property-based tests for envelope sealing
//!
//! These tests verify the fundamental invariants of the envelope layer:
//!
//! 1. **Round-trip**: open(seal(m)) == m for all messages
//! 2. **Tamper evidence**: any single bit flip is rejected
//! 3. **MAC first**: flips outside the tag never reach the AEAD
//! 4. **Epoch isolation**: an envelope only opens under its own epoch

use parley_crypto::{
    CryptoError, EpochKey, MAC_SIZE, NONCE_RANDOM_SIZE, NONCE_SIZE, TAG_SIZE, build_nonce, open,
    seal,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_seal_open_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 1..2048),
        key in any::<[u8; 32]>(),
        counter in any::<u64>(),
        suffix in any::<[u8; NONCE_RANDOM_SIZE]>(),
    ) {
        let keys = EpochKey::from_key(0, key, "alice");

        let envelope = seal(&keys, build_nonce(counter, suffix), &plaintext);

        prop_assert_eq!(envelope.len(), NONCE_SIZE + TAG_SIZE + plaintext.len() + MAC_SIZE);
        prop_assert_eq!(open(&keys, &envelope).unwrap(), plaintext);
    }

    #[test]
    fn prop_any_bit_flip_is_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key in any::<[u8; 32]>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let keys = EpochKey::from_key(0, key, "alice");
        let mut envelope = seal(&keys, build_nonce(1, [0; NONCE_RANDOM_SIZE]), &plaintext);

        let index = position.index(envelope.len());
        envelope[index] ^= 1 << bit;

        // The outer MAC covers every byte, so every flip is a MAC failure
        prop_assert_eq!(open(&keys, &envelope), Err(CryptoError::MacMismatch));
    }

    #[test]
    fn prop_hmac_flip_is_integrity_error(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        offset in 0usize..MAC_SIZE,
        bit in 0u8..8,
    ) {
        let keys = EpochKey::from_key(0, [0x5A; 32], "alice");
        let mut envelope = seal(&keys, build_nonce(9, [1, 2, 3, 4]), &plaintext);

        let index = envelope.len() - MAC_SIZE + offset;
        envelope[index] ^= 1 << bit;

        prop_assert_eq!(open(&keys, &envelope), Err(CryptoError::MacMismatch));
    }

    #[test]
    fn prop_other_epoch_cannot_open(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key_a in any::<[u8; 32]>(),
        key_b in any::<[u8; 32]>(),
    ) {
        prop_assume!(key_a != key_b);

        let sealed_under = EpochKey::from_key(0, key_a, "alice");
        let opened_with = EpochKey::from_key(1, key_b, "alice");

        let envelope = seal(&sealed_under, build_nonce(1, [0; NONCE_RANDOM_SIZE]), &plaintext);

        prop_assert_eq!(open(&opened_with, &envelope), Err(CryptoError::MacMismatch));
    }

    #[test]
    fn prop_short_input_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..61)) {
        let keys = EpochKey::from_key(0, [0; 32], "alice");

        let is_too_short = matches!(open(&keys, &bytes), Err(CryptoError::EnvelopeTooShort { .. }));
        prop_assert!(is_too_short);
    }
}
