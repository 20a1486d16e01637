//! AES-GCM (AES-128/192/256) and ChaCha20-Poly1305 AEAD ciphers.
//!
//! Both share a contract: `encrypt(plaintext, key) -> hex(nonce || ciphertext_with_tag)`,
//! `decrypt(hex_blob, key) -> plaintext`. Nonces are fresh CSPRNG draws per call,
//! never reused, and are prepended rather than derived.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead as _, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305 as ChachaImpl, Nonce as ChachaNonce};
use rand::Rng;

use crate::error::{Result, VaultError};

pub const AES_NONCE_SIZE: usize = 12;
pub const CHACHA_NONCE_SIZE: usize = 12;
pub const AES_KEY_SIZES: [usize; 3] = [16, 24, 32];
pub const CHACHA_KEY_SIZE: usize = 32;

/// AES-192 has no type alias in the `aes-gcm` crate (only 128/256 do);
/// build it from the generic `AesGcm` the other two aliases expand to.
type Aes192Gcm = AesGcm<Aes192, U12>;

fn random_nonce<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rng().fill(&mut buf);
    buf
}

/// AES-GCM, keyed by a 16/24/32-byte key (AES-128/192/256) — the key
/// length picks which concrete cipher (and thus key schedule) is used.
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
        if !AES_KEY_SIZES.contains(&key.len()) {
            return Err(VaultError::KeyLengthInvalid);
        }
        let nonce_bytes: [u8; AES_NONCE_SIZE] = random_nonce();
        let nonce = AesNonce::from_slice(&nonce_bytes);

        let ciphertext = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.encrypt(nonce, plaintext),
            24 => Aes192Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.encrypt(nonce, plaintext),
            32 => Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.encrypt(nonce, plaintext),
            _ => unreachable!("key length already checked against AES_KEY_SIZES"),
        }
        .map_err(|e| VaultError::CryptoFailure(format!("AES-GCM encrypt failed: {e}")))?;

        let mut blob = Vec::with_capacity(AES_NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(hex::encode(blob))
    }

    pub fn decrypt(hex_blob: &str, key: &[u8]) -> Result<Vec<u8>> {
        if !AES_KEY_SIZES.contains(&key.len()) {
            return Err(VaultError::KeyLengthInvalid);
        }
        let blob = hex::decode(hex_blob).map_err(|e| VaultError::CryptoFailure(e.to_string()))?;
        if blob.len() < AES_NONCE_SIZE {
            return Err(VaultError::CiphertextTruncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(AES_NONCE_SIZE);
        let nonce = AesNonce::from_slice(nonce_bytes);

        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.decrypt(nonce, ciphertext),
            24 => Aes192Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.decrypt(nonce, ciphertext),
            32 => Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?.decrypt(nonce, ciphertext),
            _ => unreachable!("key length already checked against AES_KEY_SIZES"),
        }
        .map_err(|_| VaultError::CryptoFailure("AES-GCM authentication failed".into()))
    }
}

/// ChaCha20-Poly1305 with the IETF 12-byte nonce (not the 24-byte XChaCha
/// variant — the spec's wire format is explicitly a 12-byte nonce).
pub struct ChaCha20Poly1305Cipher;

impl ChaCha20Poly1305Cipher {
    pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
        if key.len() != CHACHA_KEY_SIZE {
            return Err(VaultError::KeyLengthInvalid);
        }
        let cipher = ChachaImpl::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?;
        let nonce_bytes: [u8; CHACHA_NONCE_SIZE] = random_nonce();
        let nonce = ChachaNonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::CryptoFailure(format!("ChaCha20-Poly1305 encrypt failed: {e}")))?;

        let mut blob = Vec::with_capacity(CHACHA_NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(hex::encode(blob))
    }

    pub fn decrypt(hex_blob: &str, key: &[u8]) -> Result<Vec<u8>> {
        if key.len() != CHACHA_KEY_SIZE {
            return Err(VaultError::KeyLengthInvalid);
        }
        let blob = hex::decode(hex_blob).map_err(|e| VaultError::CryptoFailure(e.to_string()))?;
        if blob.len() < CHACHA_NONCE_SIZE {
            return Err(VaultError::CiphertextTruncated);
        }
        let cipher = ChachaImpl::new_from_slice(key).map_err(|_| VaultError::KeyLengthInvalid)?;
        let (nonce_bytes, ciphertext) = blob.split_at(CHACHA_NONCE_SIZE);
        let nonce = ChachaNonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::CryptoFailure("ChaCha20-Poly1305 authentication failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_gcm_roundtrip() {
        let key = [7u8; 32];
        let blob = AesGcmCipher::encrypt(b"hello vault", &key).unwrap();
        let plaintext = AesGcmCipher::decrypt(&blob, &key).unwrap();
        assert_eq!(plaintext, b"hello vault");
    }

    #[test]
    fn aes_gcm_rejects_bad_key_length() {
        let key = [7u8; 20];
        assert!(matches!(AesGcmCipher::encrypt(b"x", &key), Err(VaultError::KeyLengthInvalid)));
    }

    #[test]
    fn aes_128_gcm_roundtrip() {
        let key = [4u8; 16];
        let blob = AesGcmCipher::encrypt(b"aes-128 payload", &key).unwrap();
        assert_eq!(AesGcmCipher::decrypt(&blob, &key).unwrap(), b"aes-128 payload");
    }

    #[test]
    fn aes_192_gcm_roundtrip() {
        let key = [6u8; 24];
        let blob = AesGcmCipher::encrypt(b"aes-192 payload", &key).unwrap();
        assert_eq!(AesGcmCipher::decrypt(&blob, &key).unwrap(), b"aes-192 payload");
    }

    #[test]
    fn aes_gcm_rejects_cross_key_length_decrypt() {
        let key128 = [4u8; 16];
        let key256 = [4u8; 32];
        let blob = AesGcmCipher::encrypt(b"payload", &key128).unwrap();
        assert!(AesGcmCipher::decrypt(&blob, &key256).is_err());
    }

    #[test]
    fn aes_gcm_nonces_are_fresh_each_call() {
        let key = [1u8; 32];
        let a = AesGcmCipher::encrypt(b"same plaintext", &key).unwrap();
        let b = AesGcmCipher::encrypt(b"same plaintext", &key).unwrap();
        assert_ne!(a, b, "nonces must differ across calls even for identical plaintext");
    }

    #[test]
    fn aes_gcm_detects_tampering() {
        let key = [3u8; 32];
        let mut blob = hex::decode(AesGcmCipher::encrypt(b"payload", &key).unwrap()).unwrap();
        *blob.last_mut().unwrap() ^= 0xFF;
        assert!(AesGcmCipher::decrypt(&hex::encode(blob), &key).is_err());
    }

    #[test]
    fn aes_gcm_truncated_ciphertext() {
        let key = [3u8; 32];
        assert!(matches!(
            AesGcmCipher::decrypt(&hex::encode([0u8; 4]), &key),
            Err(VaultError::CiphertextTruncated)
        ));
    }

    #[test]
    fn chacha_roundtrip() {
        let key = [9u8; 32];
        let blob = ChaCha20Poly1305Cipher::encrypt(b"hello vault", &key).unwrap();
        let plaintext = ChaCha20Poly1305Cipher::decrypt(&blob, &key).unwrap();
        assert_eq!(plaintext, b"hello vault");
    }

    #[test]
    fn chacha_rejects_bad_key_length() {
        let key = [9u8; 16];
        assert!(matches!(ChaCha20Poly1305Cipher::encrypt(b"x", &key), Err(VaultError::KeyLengthInvalid)));
    }
}
