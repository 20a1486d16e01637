//! In-memory deduplication index, keyed by storage address.
//!
//! Within one pipeline session the index has exactly one producer (§5), so
//! `process_chunk` is a plain method rather than anything lock-based; a
//! future concurrent producer would need to serialize access to this type,
//! not change its contract.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config;
use crate::error::{Result, VaultError};

/// One dedup-index entry: everything known about a stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupEntry {
    pub address: String,
    pub raw_size: u64,
    pub compressed_size: u64,
    pub encrypted_size: Option<u64>,
    pub reference_count: u64,
    pub first_seen_at: DateTime<Utc>,
}

/// Aggregate, read-only view of index health.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DedupStats {
    pub unique_addresses: u64,
    pub total_references: u64,
    pub bytes_saved: u64,
}

/// Maps storage address to the single artifact stored under it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DedupIndex {
    entries: HashMap<String, DedupEntry>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index from `path`; an absent file yields an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| VaultError::IndexPersistenceFailure(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(VaultError::IndexPersistenceFailure(e.to_string())),
        }
    }

    /// Atomically persists the index via write-to-temp + rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| VaultError::IndexPersistenceFailure(e.to_string()))?;
        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, &bytes).map_err(|e| VaultError::IndexPersistenceFailure(e.to_string()))?;
        fs::rename(&tmp_path, path).map_err(|e| VaultError::IndexPersistenceFailure(e.to_string()))?;
        debug!(entries = self.entries.len(), "dedup index persisted");
        Ok(())
    }

    /// Looks up or records `address`. If present, increments the reference
    /// count and returns `was_dedup = true` without touching `write_bytes`
    /// (the caller must skip the write). Otherwise writes `write_bytes` under
    /// `chunks_dir/address`, records a fresh entry, and returns `false`.
    pub fn process_chunk(
        &mut self,
        address: &str,
        write_bytes: &[u8],
        raw_size: u64,
        compressed_size: u64,
        encrypted_size: Option<u64>,
        chunks_dir: &Path,
    ) -> Result<bool> {
        if let Some(entry) = self.entries.get_mut(address) {
            entry.reference_count += 1;
            debug!(address, refs = entry.reference_count, "dedup hit");
            return Ok(true);
        }

        let chunk_path = chunks_dir.join(address);
        fs::write(&chunk_path, write_bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&chunk_path, fs::Permissions::from_mode(config::perms::CHUNK_FILE))?;
        }

        self.entries.insert(
            address.to_owned(),
            DedupEntry {
                address: address.to_owned(),
                raw_size,
                compressed_size,
                encrypted_size,
                reference_count: 1,
                first_seen_at: Utc::now(),
            },
        );
        info!(address, "new chunk stored");
        Ok(false)
    }

    pub fn stats(&self) -> DedupStats {
        let unique_addresses = self.entries.len() as u64;
        let total_references: u64 = self.entries.values().map(|e| e.reference_count).sum();
        let bytes_saved: u64 = self
            .entries
            .values()
            .map(|e| e.raw_size.saturating_mul(e.reference_count.saturating_sub(1)))
            .sum();
        DedupStats { unique_addresses, total_references, bytes_saved }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&DedupEntry> {
        self.entries.get(address)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or("dedup.index").to_owned();
    name.push_str(".tmp");
    path.with_file_name(name)
}
