//! Chunk pipeline: read → hash → compress → encrypt → dedup → persist.
//!
//! Synchronous, single producer/single worker (§5) — no channel or thread
//! pool machinery, a deliberate departure from the teacher's multi-threaded
//! worker split (see DESIGN.md).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::{debug, info};

use crate::cipher;
use crate::codec;
use crate::config::{ChunkingStrategy, EncryptionConfig};
use crate::dedup::DedupIndex;
use crate::error::{Result, VaultError};
use crate::hash;
use crate::vault::Vault;

/// The external result of ingesting one fixed-size window of a file.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRef {
    pub plaintext_hash: String,
    pub size: u64,
    pub index: u64,
    pub compressed: bool,
    pub encrypted_hash: Option<String>,
    pub encrypted_size: Option<u64>,
}

/// Aggregate counters a caller can surface as progress UI, per spec's
/// "observable side effects" note in §4.6.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestStats {
    pub total_chunks: u64,
    pub total_bytes: u64,
    pub deduped_chunks: u64,
}

/// Reads `path` in `vault.config().chunking.chunk_size`-byte windows,
/// compressing/encrypting/deduplicating each in turn, and returns the
/// ordered list of chunk references.
pub fn ingest(vault: &Vault, path: &Path, passphrase: Option<&str>) -> Result<(Vec<ChunkRef>, IngestStats)> {
    let chunking = &vault.config().chunking;
    if chunking.chunk_size == 0 {
        return Err(VaultError::InvalidChunkSize);
    }
    if chunking.strategy != ChunkingStrategy::Fixed {
        return Err(VaultError::UnsupportedAlgorithm("cdc".into()));
    }

    let encryption = &vault.config().encryption;
    if encryption.is_passphrase_protected() && passphrase.is_none() {
        return Err(VaultError::PassphraseRequired);
    }

    let mut file = File::open(path).map_err(VaultError::InputUnreadable)?;
    let chunks_dir = vault.chunks_dir();
    std::fs::create_dir_all(&chunks_dir)?;

    let mut index = DedupIndex::load(&vault.dedup_index_path())?;
    let mut refs = Vec::new();
    let mut stats = IngestStats::default();
    let mut buf = vec![0u8; chunking.chunk_size as usize];
    let mut chunk_index: u64 = 0;

    loop {
        let n = read_fill(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        let window = &buf[..n];

        let (chunk_ref, was_dedup) = process_one_chunk(vault, window, chunk_index, encryption, &mut index, &chunks_dir)
            .map_err(|e| VaultError::at_chunk(chunk_index, &hash::digest_hex(chunking.hash_algorithm, window), e))?;

        stats.total_chunks += 1;
        stats.total_bytes += chunk_ref.size;
        if was_dedup {
            stats.deduped_chunks += 1;
        }
        refs.push(chunk_ref);
        chunk_index += 1;
    }

    index.save(&vault.dedup_index_path())?;
    info!(chunks = stats.total_chunks, bytes = stats.total_bytes, "ingest complete");
    Ok((refs, stats))
}

fn process_one_chunk(
    vault: &Vault,
    window: &[u8],
    chunk_index: u64,
    encryption: &EncryptionConfig,
    index: &mut DedupIndex,
    chunks_dir: &Path,
) -> Result<(ChunkRef, bool)> {
    let chunking = &vault.config().chunking;
    let plaintext_hash = hash::digest_hex(chunking.hash_algorithm, window);

    let compressed = codec::compress(window, vault.config().compression)?;
    let is_compressed = vault.config().compression != crate::config::CompressionAlgorithm::None;

    let mut chunk_ref = ChunkRef {
        plaintext_hash: plaintext_hash.clone(),
        size: window.len() as u64,
        index: chunk_index,
        compressed: is_compressed,
        encrypted_hash: None,
        encrypted_size: None,
    };

    if encryption.is_none() {
        let address = &plaintext_hash;
        let was_dedup = index.process_chunk(address, &compressed, window.len() as u64, compressed.len() as u64, None, chunks_dir)?;
        return Ok((chunk_ref, was_dedup));
    }

    let key = vault.key().ok_or(VaultError::PassphraseRequired)?;
    let base64_payload = BASE64.encode(&compressed);
    let ciphertext_hex = cipher::encrypt(encryption, base64_payload.as_bytes(), key.expose_secret())?;
    let ciphertext_bytes = hex::decode(&ciphertext_hex).map_err(|e| VaultError::CryptoFailure(e.to_string()))?;
    let encrypted_hash = hash::digest_hex(chunking.hash_algorithm, &ciphertext_bytes);

    chunk_ref.encrypted_hash = Some(encrypted_hash.clone());
    chunk_ref.encrypted_size = Some(ciphertext_bytes.len() as u64);

    let was_dedup = index.process_chunk(
        &encrypted_hash,
        &ciphertext_bytes,
        window.len() as u64,
        compressed.len() as u64,
        Some(ciphertext_bytes.len() as u64),
        chunks_dir,
    )?;
    debug!(index = chunk_index, was_dedup, "chunk processed");

    Ok((chunk_ref, was_dedup))
}

/// Reads exactly `buf.len()` bytes, or fewer at EOF. Unlike `Read::read`,
/// which may return short reads that aren't EOF, this loops until the
/// buffer fills or the stream is exhausted.
fn read_fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Decrypts and reassembles a chunk previously produced by [`ingest`],
/// reversing compression and the base64 pre-binarization step.
pub fn recover_chunk(vault: &Vault, chunk_ref: &ChunkRef) -> Result<Vec<u8>> {
    let address = chunk_ref.encrypted_hash.as_ref().unwrap_or(&chunk_ref.plaintext_hash);
    let stored = std::fs::read(vault.chunks_dir().join(address)).map_err(VaultError::InputUnreadable)?;

    let compressed = if vault.config().encryption.is_none() {
        stored
    } else {
        let key = vault.key().ok_or(VaultError::PassphraseRequired)?;
        let ciphertext_hex = hex::encode(&stored);
        let base64_payload = cipher::decrypt(&vault.config().encryption, &ciphertext_hex, key.expose_secret())?;
        BASE64
            .decode(&base64_payload)
            .map_err(|e| VaultError::CryptoFailure(format!("invalid base64 payload: {e}")))?
    };

    codec::decompress(&compressed, vault.config().compression, vault.config().max_decompression_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn hello_world_chunks_into_three_refs_with_expected_hashes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut config = VaultConfig::default();
        config.chunking.chunk_size = 4;
        let vault = Vault::init(root, config, None).unwrap();

        let input = root.join("input.txt");
        fs::write(&input, b"hello world").unwrap();

        let (refs, stats) = ingest(&vault, &input, None).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(refs.iter().map(|r| r.size).collect::<Vec<_>>(), vec![4, 4, 3]);
        assert_eq!(refs.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(refs[0].plaintext_hash, hash::digest_hex(hash::HashAlgorithm::Sha256, b"hell"));
        assert_eq!(refs[1].plaintext_hash, hash::digest_hex(hash::HashAlgorithm::Sha256, b"o wo"));
        assert_eq!(refs[2].plaintext_hash, hash::digest_hex(hash::HashAlgorithm::Sha256, b"rld"));
    }

    #[test]
    fn second_ingest_pass_is_fully_deduplicated() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut config = VaultConfig::default();
        config.chunking.chunk_size = 4;
        let vault = Vault::init(root, config, None).unwrap();

        let input = root.join("input.txt");
        fs::write(&input, b"hello world").unwrap();

        ingest(&vault, &input, None).unwrap();
        let before = fs::read_dir(vault.chunks_dir()).unwrap().count();

        let (_refs, stats) = ingest(&vault, &input, None).unwrap();
        let after = fs::read_dir(vault.chunks_dir()).unwrap().count();

        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.deduped_chunks, 3, "every chunk on the second pass must be counted as a dedup hit");
        assert_eq!(before, after, "no new files should be written on a fully-deduped pass");
    }

    #[test]
    fn deduped_chunks_counts_zero_on_a_first_pass_with_no_repeats() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut config = VaultConfig::default();
        config.chunking.chunk_size = 4;
        let vault = Vault::init(root, config, None).unwrap();

        let input = root.join("input.txt");
        fs::write(&input, b"hello world").unwrap();

        let (_refs, stats) = ingest(&vault, &input, None).unwrap();
        assert_eq!(stats.deduped_chunks, 0);
    }

    #[test]
    fn ingest_round_trips_through_compression_and_encryption() {
        use crate::config::{AesConfig, AesMode, CompressionAlgorithm, KdfKind, KdfParams};

        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut config = VaultConfig::default();
        config.chunking.chunk_size = 1024;
        config.compression = CompressionAlgorithm::Zstd;
        config.encryption = EncryptionConfig::Aes(AesConfig {
            mode: AesMode::Gcm,
            kdf: KdfParams { kind: KdfKind::Pbkdf2, pbkdf2_iters: 10_000, scrypt_n: 1024, scrypt_r: 8, scrypt_p: 1 },
            salt: String::new(),
            key_check: None,
        });
        let vault = Vault::init(root, config, Some("correct horse")).unwrap();

        let input = root.join("input.txt");
        let content = b"the quick brown fox jumps over the lazy dog".repeat(8);
        fs::write(&input, &content).unwrap();

        let (refs, _stats) = ingest(&vault, &input, Some("correct horse")).unwrap();
        assert_eq!(refs.len(), 1);
        assert!(refs[0].encrypted_hash.is_some());

        let recovered = recover_chunk(&vault, &refs[0]).unwrap();
        assert_eq!(recovered, content);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = VaultConfig::default();
        config.chunking.chunk_size = 0;
        let vault = Vault::init(dir.path(), config, None).unwrap();
        let input = dir.path().join("x.txt");
        fs::write(&input, b"x").unwrap();
        assert!(matches!(ingest(&vault, &input, None), Err(VaultError::InvalidChunkSize)));
    }

    #[test]
    fn missing_input_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let config = VaultConfig::default();
        let vault = Vault::init(dir.path(), config, None).unwrap();
        let result = ingest(&vault, &dir.path().join("nope.txt"), None);
        assert!(matches!(result, Err(VaultError::InputUnreadable(_))));
    }
}
