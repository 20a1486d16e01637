//! Key-material lifecycle: generation, passphrase wrap/unwrap, on-disk
//! persistence of `<root>/.sietch/keys/secret.key`.

use std::fs;
use std::path::Path;

use rand::Rng;

use crate::cipher;
use crate::config::{self, EncryptionConfig};
use crate::error::{Result, VaultError};
use crate::kdf;
use crate::secret::SecretBytes;

/// Generates fresh, random key material of the given length (16/24/32 bytes
/// for AES; 32 for ChaCha20-Poly1305 — the caller picks the length that
/// matches its chosen cipher).
pub fn generate_key_material(len: usize) -> SecretBytes {
    let mut buf = vec![0u8; len];
    rand::rng().fill(buf.as_mut_slice());
    SecretBytes::from_slice(&buf)
}

/// Writes `key_path`'s parent directory (`0700`) and the key file itself
/// (`0600`). If `passphrase` is `Some`, `raw_key` is wrapped under a
/// passphrase-derived key before being written; otherwise the raw bytes are
/// written directly.
pub fn save_key(
    key_path: &Path,
    raw_key: &[u8],
    config: &EncryptionConfig,
    passphrase: Option<&str>,
) -> Result<()> {
    let dir = key_path.parent().ok_or_else(|| VaultError::VaultConfigUnreadable("key path has no parent".into()))?;
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(config::perms::KEY_DIR))?;
    }

    let on_disk: Vec<u8> = match passphrase {
        Some(passphrase) if config.is_passphrase_protected() => {
            let (salt, kdf_params) = salt_and_params(config)?;
            let derived = kdf::derive_key(passphrase, salt, kdf_params)?;
            let wrapped = cipher::wrap_key(config, raw_key, &derived)?;
            wrapped.into_bytes()
        }
        _ => raw_key.to_vec(),
    };

    fs::write(key_path, &on_disk)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(key_path, fs::Permissions::from_mode(config::perms::KEY_FILE))?;
    }
    Ok(())
}

/// Reads and, if necessary, unwraps the key at `key_path`. Returns
/// [`VaultError::PassphraseRequired`] if the vault is passphrase-protected
/// but none was supplied, and [`VaultError::PassphraseWrong`] if the
/// key-check token rejects the supplied passphrase.
pub fn load_key(key_path: &Path, config: &EncryptionConfig, passphrase: Option<&str>) -> Result<SecretBytes> {
    let on_disk = fs::read(key_path).map_err(VaultError::InputUnreadable)?;

    if !config.is_passphrase_protected() {
        return Ok(SecretBytes::from_slice(&on_disk));
    }

    let passphrase = passphrase.ok_or(VaultError::PassphraseRequired)?;
    let (salt, kdf_params) = salt_and_params(config)?;
    let derived = kdf::derive_key(passphrase, salt, kdf_params)?;

    if let Some(key_check) = key_check(config) {
        kdf::verify_key_check(config, key_check, &derived)?;
    }

    let wrapped_hex = String::from_utf8(on_disk).map_err(|e| VaultError::CryptoFailure(e.to_string()))?;
    let raw = cipher::unwrap_key(config, &wrapped_hex, &derived)?;
    Ok(SecretBytes::from_slice(&raw))
}

/// Derives the key-check token for a freshly chosen passphrase, for storage
/// on the `EncryptionConfig` at vault-init time.
pub fn make_key_check(config: &EncryptionConfig, passphrase: &str, salt: &str, kdf_params: &config::KdfParams) -> Result<String> {
    let derived = kdf::derive_key(passphrase, salt, kdf_params)?;
    kdf::generate_key_check(config, &derived)
}

fn salt_and_params(config: &EncryptionConfig) -> Result<(&str, &config::KdfParams)> {
    match config {
        EncryptionConfig::Aes(c) => Ok((&c.salt, &c.kdf)),
        EncryptionConfig::Chacha20(c) => Ok((&c.salt, &c.kdf)),
        _ => Err(VaultError::UnsupportedAlgorithm("no KDF parameters for this cipher kind".into())),
    }
}

fn key_check(config: &EncryptionConfig) -> Option<&str> {
    match config {
        EncryptionConfig::Aes(c) => c.key_check.as_deref(),
        EncryptionConfig::Chacha20(c) => c.key_check.as_deref(),
        _ => None,
    }
}

/// Base64-encodes a freshly generated salt, kept here rather than in `kdf`
/// only for call-site symmetry with `generate_key_material`.
pub fn generate_salt() -> String {
    kdf::generate_salt()
}
