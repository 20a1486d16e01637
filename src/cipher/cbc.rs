//! AES-CBC with PKCS#7 padding.
//!
//! Unlike the AEAD modes this provides no authentication: tampering with the
//! ciphertext produces garbage plaintext (or a padding-validation failure)
//! rather than a detected forgery. Kept only because the spec's declarative
//! `EncryptionConfig.aes.mode` allows choosing it; key *wrapping* always uses
//! an AEAD regardless of this setting (see DESIGN.md).

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use aes::{Aes128, Aes192, Aes256};
use rand::Rng;

use crate::error::{Result, VaultError};

pub const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Pads `data` to a multiple of `BLOCK_SIZE` per PKCS#7 (RFC 5652 §6.3).
/// Always appends at least one byte, even for already-aligned input.
fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let padding_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + padding_len);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat_n(padding_len as u8, padding_len));
    padded
}

/// Validates and strips PKCS#7 padding. Rejects a length outside `[1, 16]`
/// and rejects inconsistent padding bytes, per the spec's explicit contract.
fn pkcs7_unpad(data: &[u8]) -> Result<Vec<u8>> {
    let padding_len = *data.last().ok_or(VaultError::InvalidPadding)? as usize;
    if padding_len == 0 || padding_len > BLOCK_SIZE || padding_len > data.len() {
        return Err(VaultError::InvalidPadding);
    }
    let (content, padding) = data.split_at(data.len() - padding_len);
    if !padding.iter().all(|&b| b as usize == padding_len) {
        return Err(VaultError::InvalidPadding);
    }
    Ok(content.to_vec())
}

fn random_iv() -> [u8; IV_SIZE] {
    let mut buf = [0u8; IV_SIZE];
    rand::rng().fill(&mut buf);
    buf
}

/// Encrypts `plaintext` under AES-CBC, returning `hex(iv || ciphertext)`.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
    let iv = random_iv();
    let padded = pkcs7_pad(plaintext);
    let ciphertext = cbc_encrypt(key, &iv, &padded)?;

    let mut blob = Vec::with_capacity(IV_SIZE + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(hex::encode(blob))
}

/// Decrypts `hex_blob` (`iv || ciphertext`) under AES-CBC and strips padding.
pub fn decrypt(hex_blob: &str, key: &[u8]) -> Result<Vec<u8>> {
    let blob = hex::decode(hex_blob).map_err(|e| VaultError::CryptoFailure(e.to_string()))?;
    if blob.len() < IV_SIZE {
        return Err(VaultError::CiphertextTruncated);
    }
    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    let padded = cbc_decrypt(key, iv, ciphertext)?;
    pkcs7_unpad(&padded)
}

/// Encrypts a block-aligned buffer. Padding is handled by our own PKCS#7
/// pass above, so the block-cipher layer itself uses `NoPadding`.
fn cbc_encrypt(key: &[u8], iv: &[u8], padded: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => {
            let enc = Aes128CbcEnc::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded))
        }
        24 => {
            let enc = Aes192CbcEnc::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded))
        }
        32 => {
            let enc = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded))
        }
        _ => Err(VaultError::KeyLengthInvalid),
    }
}

fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(VaultError::CiphertextTruncated);
    }
    let decrypted = match key.len() {
        16 => {
            let dec = Aes128CbcDec::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        }
        24 => {
            let dec = Aes192CbcDec::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        }
        32 => {
            let dec = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| VaultError::KeyLengthInvalid)?;
            dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        }
        _ => return Err(VaultError::KeyLengthInvalid),
    };
    decrypted.map_err(|_| VaultError::CryptoFailure("AES-CBC block decryption failed".into()))
}
