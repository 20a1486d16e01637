//! Passphrase key derivation and key-check tokens.
//!
//! Both KDFs produce a fixed [`crate::config::DERIVED_KEY_LEN`]-byte key
//! regardless of `kind`, so callers never need to branch on which one ran.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use scrypt::Params as ScryptParams;
use sha2::Sha256;

use crate::cipher;
use crate::config::{self, EncryptionConfig, KdfKind, KdfParams};
use crate::error::{Result, VaultError};

/// Length in bytes of a freshly generated salt.
pub const SALT_LEN: usize = 16;

/// Generates a fresh random salt, base64-encoded for storage in config.
pub fn generate_salt() -> String {
    let mut buf = [0u8; SALT_LEN];
    rand::rng().fill(&mut buf);
    BASE64.encode(buf)
}

/// Derives a [`config::DERIVED_KEY_LEN`]-byte key from `passphrase` and a
/// base64-encoded `salt`, using the KDF and cost parameters in `params`.
pub fn derive_key(passphrase: &str, salt_b64: &str, params: &KdfParams) -> Result<Vec<u8>> {
    let salt = BASE64
        .decode(salt_b64)
        .map_err(|e| VaultError::CryptoFailure(format!("invalid salt encoding: {e}")))?;

    let mut out = vec![0u8; config::DERIVED_KEY_LEN];
    match params.kind {
        KdfKind::Scrypt => {
            if params.scrypt_n == 0 || !params.scrypt_n.is_power_of_two() {
                return Err(VaultError::CryptoFailure("scrypt_n must be a power of two".into()));
            }
            let log_n = params.scrypt_n.trailing_zeros();
            let scrypt_params = ScryptParams::new(log_n as u8, params.scrypt_r, params.scrypt_p, out.len())
                .map_err(|e| VaultError::CryptoFailure(format!("invalid scrypt params: {e}")))?;
            scrypt::scrypt(passphrase.as_bytes(), &salt, &scrypt_params, &mut out)
                .map_err(|e| VaultError::CryptoFailure(format!("scrypt derivation failed: {e}")))?;
        }
        KdfKind::Pbkdf2 => {
            pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, params.pbkdf2_iters, &mut out);
        }
    }
    Ok(out)
}

/// AEAD-seals the constant key-check plaintext under `derived_key`, producing
/// a value that can be stored in config and later used to validate a
/// passphrase without touching the wrapped chunk-cipher key.
///
/// Always goes through [`cipher::wrap_key`] rather than `cipher::encrypt` —
/// the same "always AEAD regardless of chunk-cipher mode" reasoning that
/// applies to wrapping the real key applies here too: an AES-CBC vault's
/// key check must still be tamper-evident, which CBC alone cannot provide.
pub fn generate_key_check(config: &EncryptionConfig, derived_key: &[u8]) -> Result<String> {
    cipher::wrap_key(config, config::KEY_CHECK_PLAINTEXT, derived_key)
}

/// Verifies that `derived_key` unseals `key_check` back to the expected
/// constant plaintext. Any AEAD failure or plaintext mismatch is treated as
/// [`VaultError::PassphraseWrong`] — the caller never sees the underlying
/// decrypt error, since both signal the same thing to a user.
pub fn verify_key_check(config: &EncryptionConfig, key_check: &str, derived_key: &[u8]) -> Result<()> {
    let plaintext = cipher::unwrap_key(config, key_check, derived_key).map_err(|_| VaultError::PassphraseWrong)?;
    if plaintext == config::KEY_CHECK_PLAINTEXT {
        Ok(())
    } else {
        Err(VaultError::PassphraseWrong)
    }
}
