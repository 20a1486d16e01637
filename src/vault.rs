//! Ties configuration, key material, and on-disk layout together. The
//! pipeline and transaction manager both borrow paths from a `Vault`
//! handle rather than reconstructing them independently (spec §9's "shared
//! record passed through every layer").

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{self, EncryptionConfig, VaultConfig};
use crate::error::{Result, VaultError};
use crate::fs_util;
use crate::keyvault;
use crate::secret::SecretBytes;

/// An opened (or freshly initialized) vault: its root path, its immutable
/// configuration, and — for encrypted vaults — the raw chunk-cipher key.
pub struct Vault {
    root: PathBuf,
    config: VaultConfig,
    key: Option<SecretBytes>,
}

impl Vault {
    /// Creates a new vault at `root`: the `.sietch/{keys,chunks}`
    /// directories, fresh key material (if `config.encryption` calls for
    /// one), and the persisted `config.json`.
    pub fn init(root: &Path, mut config: VaultConfig, passphrase: Option<&str>) -> Result<Self> {
        fs_util::ensure_dir(&chunks_dir_for(root), config::perms::CHUNK_DIR)?;

        let key = match &mut config.encryption {
            EncryptionConfig::None => None,
            EncryptionConfig::Gpg(_) => return Err(VaultError::UnsupportedAlgorithm("gpg".into())),
            EncryptionConfig::Aes(aes_cfg) => {
                let raw = keyvault::generate_key_material(32);
                if let Some(passphrase) = passphrase {
                    aes_cfg.salt = keyvault::generate_salt();
                    aes_cfg.key_check =
                        Some(keyvault::make_key_check(&EncryptionConfig::Aes(aes_cfg.clone()), passphrase, &aes_cfg.salt, &aes_cfg.kdf)?);
                }
                Some(raw)
            }
            EncryptionConfig::Chacha20(chacha_cfg) => {
                let raw = keyvault::generate_key_material(32);
                if let Some(passphrase) = passphrase {
                    chacha_cfg.salt = keyvault::generate_salt();
                    chacha_cfg.key_check = Some(keyvault::make_key_check(
                        &EncryptionConfig::Chacha20(chacha_cfg.clone()),
                        passphrase,
                        &chacha_cfg.salt,
                        &chacha_cfg.kdf,
                    )?);
                }
                Some(raw)
            }
        };

        if let Some(ref raw) = key {
            keyvault::save_key(&secret_key_path_for(root), raw.expose_secret(), &config.encryption, passphrase)?;
        }

        let vault = Self { root: root.to_path_buf(), config, key };
        vault.persist_config()?;
        info!(root = %root.display(), "vault initialized");
        Ok(vault)
    }

    /// Opens an existing vault, loading its configuration and — for
    /// passphrase-protected vaults — verifying the passphrase via the
    /// key-check token before unwrapping the real key.
    pub fn open(root: &Path, passphrase: Option<&str>) -> Result<Self> {
        let config_bytes = fs::read(config_path_for(root)).map_err(|e| VaultError::VaultConfigUnreadable(e.to_string()))?;
        let config: VaultConfig =
            serde_json::from_slice(&config_bytes).map_err(|e| VaultError::VaultConfigUnreadable(e.to_string()))?;

        let key = if config.encryption.is_none() {
            None
        } else {
            Some(keyvault::load_key(&secret_key_path_for(root), &config.encryption, passphrase)?)
        };

        Ok(Self { root: root.to_path_buf(), config, key })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn key(&self) -> Option<&SecretBytes> {
        self.key.as_ref()
    }

    pub fn chunks_dir(&self) -> PathBuf {
        chunks_dir_for(&self.root)
    }

    pub fn dedup_index_path(&self) -> PathBuf {
        self.root.join(config::VAULT_DIR).join(config::DEDUP_INDEX_FILE)
    }

    fn persist_config(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.config).map_err(|e| VaultError::VaultConfigUnreadable(e.to_string()))?;
        fs_util::write_atomic(&config_path_for(&self.root), &bytes)
    }
}

fn chunks_dir_for(root: &Path) -> PathBuf {
    root.join(config::VAULT_DIR).join(config::CHUNKS_DIR)
}

fn secret_key_path_for(root: &Path) -> PathBuf {
    root.join(config::VAULT_DIR).join(config::KEYS_DIR).join(config::SECRET_KEY_FILE)
}

fn config_path_for(root: &Path) -> PathBuf {
    root.join(config::VAULT_DIR).join(config::CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AesConfig, AesMode, ChunkingConfig, CompressionAlgorithm, DedupConfig, KdfKind, KdfParams};
    use tempfile::tempdir;

    fn aes_config() -> VaultConfig {
        VaultConfig {
            chunking: ChunkingConfig::default(),
            compression: CompressionAlgorithm::None,
            encryption: EncryptionConfig::Aes(AesConfig {
                mode: AesMode::Gcm,
                kdf: KdfParams { kind: KdfKind::Pbkdf2, pbkdf2_iters: 10_000, scrypt_n: 1024, scrypt_r: 8, scrypt_p: 1 },
                salt: String::new(),
                key_check: None,
            }),
            dedup: DedupConfig::default(),
            max_decompression_size: config::DEFAULT_MAX_DECOMPRESSION_SIZE,
            journal_retention_secs: 0,
        }
    }

    #[test]
    fn init_then_open_unencrypted_vault() {
        let dir = tempdir().unwrap();
        let config = VaultConfig::default();
        Vault::init(dir.path(), config, None).unwrap();

        let vault = Vault::open(dir.path(), None).unwrap();
        assert!(vault.key().is_none());
        assert!(vault.chunks_dir().exists());
    }

    #[test]
    fn init_then_open_with_correct_passphrase() {
        let dir = tempdir().unwrap();
        Vault::init(dir.path(), aes_config(), Some("correct horse")).unwrap();

        let vault = Vault::open(dir.path(), Some("correct horse")).unwrap();
        assert!(vault.key().is_some());
    }

    #[test]
    fn open_with_wrong_passphrase_fails_before_touching_chunks() {
        let dir = tempdir().unwrap();
        Vault::init(dir.path(), aes_config(), Some("correct horse")).unwrap();

        let result = Vault::open(dir.path(), Some("wrong"));
        assert!(matches!(result, Err(VaultError::PassphraseWrong)));
    }

    #[test]
    fn open_missing_vault_fails_with_config_unreadable() {
        let dir = tempdir().unwrap();
        let result = Vault::open(dir.path(), None);
        assert!(matches!(result, Err(VaultError::VaultConfigUnreadable(_))));
    }
}
