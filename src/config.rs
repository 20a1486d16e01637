//! Vault configuration model and cryptographic/layout constants.
//!
//! [`VaultConfig`] is the declarative record threaded through every layer of
//! the vault: the chunk pipeline, the dedup index, and the cipher layer all
//! read from it, but none of them hold a back-pointer into it (see DESIGN.md
//! for the cyclic-reference note this avoids).

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Name of the vault metadata directory under the vault root.
pub const VAULT_DIR: &str = ".sietch";
/// Name of the transaction-journal directory under the vault root.
pub const TXN_DIR: &str = ".txn";
/// Directory (under `VAULT_DIR`) holding one file per dedup-unique chunk.
pub const CHUNKS_DIR: &str = "chunks";
/// Directory (under `VAULT_DIR`) holding key material.
pub const KEYS_DIR: &str = "keys";
/// Filename of the raw or wrapped encryption key.
pub const SECRET_KEY_FILE: &str = "secret.key";
/// Filename of the serialized dedup index.
pub const DEDUP_INDEX_FILE: &str = "dedup.index";
/// Filename of the serialized vault configuration.
pub const CONFIG_FILE: &str = "config.json";
/// Filename of a transaction's journal.
pub const JOURNAL_FILE: &str = "journal.json";

/// Default ceiling on decompressed output size (512 MiB); guards against
/// decompression bombs before the full output is ever materialized.
pub const DEFAULT_MAX_DECOMPRESSION_SIZE: u64 = 512 * 1024 * 1024;

/// Default scrypt cost parameters.
pub const DEFAULT_SCRYPT_N: u32 = 32_768;
pub const DEFAULT_SCRYPT_R: u32 = 8;
pub const DEFAULT_SCRYPT_P: u32 = 1;

/// Default PBKDF2-HMAC-SHA256 iteration count.
pub const DEFAULT_PBKDF2_ITERS: u32 = 200_000;

/// Length in bytes of every derived key, regardless of KDF.
pub const DERIVED_KEY_LEN: usize = 32;

/// Constant plaintext AEAD-sealed under a derived key to validate a passphrase
/// without ever attempting to unwrap the real secret.
pub const KEY_CHECK_PLAINTEXT: &[u8] = b"sietch-key-validation";

/// Permission bits applied to files/directories under the vault. The
/// values are always defined; only Unix targets actually apply them (via
/// `std::os::unix::fs::PermissionsExt`), matching how the rest of the
/// crate gates platform-specific permission calls behind `#[cfg(unix)]`.
pub mod perms {
    pub const KEY_FILE: u32 = 0o600;
    pub const KEY_DIR: u32 = 0o700;
    pub const CHUNK_FILE: u32 = 0o644;
    pub const CHUNK_DIR: u32 = 0o755;
}

/// Chunking strategy. Only `Fixed` is implemented; `Cdc` exists purely as a
/// recognized menu option so unknown-strategy detection has a concrete shape
/// to detect — selecting it is a hard [`crate::error::VaultError::UnsupportedAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Fixed,
    Cdc,
}

/// Declarative chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    pub chunk_size: u64,
    pub hash_algorithm: crate::hash::HashAlgorithm,
}

impl ChunkingConfig {
    /// Parses a chunk size given either as a plain byte count (`"4194304"`)
    /// or a human-readable size (`"4 MiB"`), as the recognized config option
    /// in spec.md §6 allows.
    pub fn parse_chunk_size(raw: &str) -> Result<u64> {
        raw.parse::<u64>()
            .or_else(|_| raw.parse::<ByteSize>().map(|b| b.as_u64()))
            .map_err(|_| VaultError::VaultConfigUnreadable(format!("invalid chunk_size: {raw}")))
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Fixed,
            chunk_size: 4 * 1024 * 1024,
            hash_algorithm: crate::hash::HashAlgorithm::Sha256,
        }
    }
}

/// KDF selection and parameters, shared by the AES and ChaCha encryption
/// variants since both wrap their key under the same derived secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KdfKind {
    Scrypt,
    Pbkdf2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub kind: KdfKind,
    #[serde(default = "default_scrypt_n")]
    pub scrypt_n: u32,
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,
    #[serde(default = "default_pbkdf2_iters")]
    pub pbkdf2_iters: u32,
}

fn default_scrypt_n() -> u32 {
    DEFAULT_SCRYPT_N
}
fn default_scrypt_r() -> u32 {
    DEFAULT_SCRYPT_R
}
fn default_scrypt_p() -> u32 {
    DEFAULT_SCRYPT_P
}
fn default_pbkdf2_iters() -> u32 {
    DEFAULT_PBKDF2_ITERS
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            kind: KdfKind::Scrypt,
            scrypt_n: DEFAULT_SCRYPT_N,
            scrypt_r: DEFAULT_SCRYPT_R,
            scrypt_p: DEFAULT_SCRYPT_P,
            pbkdf2_iters: DEFAULT_PBKDF2_ITERS,
        }
    }
}

/// AES sub-mode: authenticated GCM or unauthenticated CBC+PKCS#7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AesMode {
    Gcm,
    Cbc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AesConfig {
    pub mode: AesMode,
    pub kdf: KdfParams,
    /// Base64-encoded salt used to derive the key-wrapping / chunk-cipher key.
    pub salt: String,
    /// Base64 `nonce || AEAD_seal("sietch-key-validation", ...)`, present once
    /// the vault has been initialized with a passphrase.
    pub key_check: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChachaConfig {
    pub kdf: KdfParams,
    pub salt: String,
    pub key_check: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpgConfig {
    pub key_id: String,
    pub recipient: String,
    pub key_server: Option<String>,
}

/// Cipher selection. `Gpg` is modeled for completeness of the declarative
/// record but has no implementation in this crate (out of scope, §1);
/// selecting it at encrypt time is a hard `UnsupportedAlgorithm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncryptionConfig {
    None,
    Aes(AesConfig),
    Chacha20(ChachaConfig),
    Gpg(GpgConfig),
}

impl EncryptionConfig {
    /// A vault is passphrase-protected iff its on-disk key was actually
    /// wrapped at init time — signaled by the presence of a key-check
    /// token, not merely by the cipher `kind` (an AES/ChaCha20 vault may
    /// still hold an unwrapped raw key if no passphrase was supplied).
    pub fn is_passphrase_protected(&self) -> bool {
        match self {
            Self::Aes(c) => c.key_check.is_some(),
            Self::Chacha20(c) => c.key_check.is_some(),
            Self::None | Self::Gpg(_) => false,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Compression algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Gzip,
    Zstd,
    Lz4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub enabled: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The full, persisted vault configuration. Immutable once written at
/// `Vault::init` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub chunking: ChunkingConfig,
    pub compression: CompressionAlgorithm,
    pub encryption: EncryptionConfig,
    pub dedup: DedupConfig,
    #[serde(default = "default_max_decompression_size")]
    pub max_decompression_size: u64,
    /// Retention window, in seconds, for committed/rolled-back journals
    /// before `recover` purges them. `0` disables purging.
    #[serde(default)]
    pub journal_retention_secs: u64,
}

fn default_max_decompression_size() -> u64 {
    DEFAULT_MAX_DECOMPRESSION_SIZE
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            compression: CompressionAlgorithm::default(),
            encryption: EncryptionConfig::None,
            dedup: DedupConfig::default(),
            max_decompression_size: DEFAULT_MAX_DECOMPRESSION_SIZE,
            journal_retention_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_byte_count() {
        assert_eq!(ChunkingConfig::parse_chunk_size("4194304").unwrap(), 4_194_304);
    }

    #[test]
    fn parses_human_readable_size() {
        assert_eq!(ChunkingConfig::parse_chunk_size("4 MiB").unwrap(), 4 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage() {
        assert!(ChunkingConfig::parse_chunk_size("not a size").is_err());
    }

    #[test]
    fn vault_config_round_trips_through_json() {
        let config = VaultConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chunking.chunk_size, config.chunking.chunk_size);
    }
}
