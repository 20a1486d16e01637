//! Transaction manager: `begin`/`stage_*`/`commit`/`rollback` over a single
//! journal, with rename as the only visibility-changing primitive.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::JOURNAL_FILE;
use crate::error::{Result, VaultError};
use crate::fs_util;
use crate::hash::{self, HashAlgorithm};
use crate::txn::journal::{Journal, JournalEntry, Op, TxnState};

const STAGING_DIR: &str = "staging";
const TRASH_DIR: &str = "trash";

/// Owns one transaction's journal and the staging/trash directories under
/// `<root>/.txn/<id>/`.
pub struct Manager {
    root: PathBuf,
    txn_dir: PathBuf,
    journal: Journal,
}

impl Manager {
    /// Starts a new transaction: creates `<root>/.txn/<id>/{staging,trash}`
    /// and writes the initial `pending` journal.
    pub fn begin(root: &Path, metadata: HashMap<String, String>) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let txn_dir = root.join(".txn").join(&id);
        fs_util::ensure_dir(&txn_dir.join(STAGING_DIR), 0o755)?;
        fs_util::ensure_dir(&txn_dir.join(TRASH_DIR), 0o755)?;

        let journal = Journal::new(id, metadata);
        let manager = Self { root: root.to_path_buf(), txn_dir, journal };
        manager.persist()?;
        info!(id = %manager.journal.id, "transaction begun");
        Ok(manager)
    }

    /// Reopens an existing transaction directory from its journal, for use
    /// by `recover`.
    pub fn load(root: &Path, txn_dir: PathBuf) -> Result<Self> {
        let bytes = fs::read(txn_dir.join(JOURNAL_FILE))?;
        let journal: Journal =
            serde_json::from_slice(&bytes).map_err(|e| VaultError::TxnStateViolation(e.to_string()))?;
        Ok(Self { root: root.to_path_buf(), txn_dir, journal })
    }

    pub fn id(&self) -> &str {
        &self.journal.id
    }

    pub fn state(&self) -> TxnState {
        self.journal.state
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.journal.started_at
    }

    pub fn dir(&self) -> &Path {
        &self.txn_dir
    }

    /// Stages a new file's content. Fails with `TxnStageConflict` if another
    /// staged entry already targets `relative_path`.
    pub fn stage_create(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        self.require_pending()?;
        if self.journal.has_entry_for(relative_path) {
            return Err(VaultError::TxnStageConflict(relative_path.to_owned()));
        }

        let staging_rel = format!("{STAGING_DIR}/{}", Uuid::new_v4());
        fs::write(self.txn_dir.join(&staging_rel), bytes)?;
        let checksum = hash::digest_hex(HashAlgorithm::Sha256, bytes);

        self.journal.entries.push(JournalEntry {
            op: Op::Create,
            target_path: relative_path.to_owned(),
            staging_path: Some(staging_rel),
            backup_path: None,
            checksum,
        });
        self.persist()?;
        Ok(())
    }

    /// Stages replacement content for an existing target. The pre-existing
    /// file is moved aside only at `commit` time, not here.
    pub fn stage_replace(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        self.require_pending()?;
        if self.journal.has_entry_for(relative_path) {
            return Err(VaultError::TxnStageConflict(relative_path.to_owned()));
        }

        let staging_rel = format!("{STAGING_DIR}/{}", Uuid::new_v4());
        fs::write(self.txn_dir.join(&staging_rel), bytes)?;
        let checksum = hash::digest_hex(HashAlgorithm::Sha256, bytes);
        let backup_rel = format!("{TRASH_DIR}/{}", Uuid::new_v4());

        self.journal.entries.push(JournalEntry {
            op: Op::Replace,
            target_path: relative_path.to_owned(),
            staging_path: Some(staging_rel),
            backup_path: Some(backup_rel),
            checksum,
        });
        self.persist()?;
        Ok(())
    }

    /// Immediately moves an existing target into the txn's trash directory,
    /// so reads issued before `commit` already observe its absence. A
    /// missing target is a recorded no-op, not an error.
    pub fn stage_delete(&mut self, relative_path: &str) -> Result<()> {
        self.require_pending()?;
        if self.journal.has_entry_for(relative_path) {
            return Err(VaultError::TxnStageConflict(relative_path.to_owned()));
        }

        let target = self.root.join(relative_path);
        let backup_rel = format!("{TRASH_DIR}/{}", Uuid::new_v4());
        let checksum = if fs_util::exists(&target)? {
            let bytes = fs::read(&target)?;
            let checksum = hash::digest_hex(HashAlgorithm::Sha256, &bytes);
            fs::rename(&target, self.txn_dir.join(&backup_rel))?;
            checksum
        } else {
            String::from("absent")
        };

        self.journal.entries.push(JournalEntry {
            op: Op::Delete,
            target_path: relative_path.to_owned(),
            staging_path: None,
            backup_path: Some(backup_rel),
            checksum,
        });
        self.persist()?;
        Ok(())
    }

    /// Applies every staged entry, in order, making its target visible by
    /// rename. Before a `create`/`replace` entry's staging file is renamed
    /// into place its contents are re-hashed against the checksum recorded
    /// at stage time, so a staging file truncated by a crash fails commit
    /// instead of becoming visible. Any per-entry error transitions the
    /// journal to `Failed` and leaves it on disk for `rollback` or
    /// `recover` to finish.
    pub fn commit(&mut self) -> Result<()> {
        if !matches!(self.journal.state, TxnState::Pending | TxnState::Committing) {
            return Err(VaultError::TxnStateViolation(format!("cannot commit from {:?}", self.journal.state)));
        }
        self.journal.state = TxnState::Committing;
        self.persist()?;

        for entry in self.journal.entries.clone() {
            if let Err(e) = self.apply_entry(&entry) {
                self.journal.state = TxnState::Failed;
                let _ = self.persist();
                return Err(VaultError::TxnCommitFailed(format!("{}: {e}", entry.target_path)));
            }
        }

        self.journal.state = TxnState::Committed;
        self.persist()?;
        info!(id = %self.journal.id, "transaction committed");
        Ok(())
    }

    fn apply_entry(&self, entry: &JournalEntry) -> Result<()> {
        let target = self.root.join(&entry.target_path);
        match entry.op {
            Op::Create => {
                let staging = self.txn_dir.join(entry.staging_path.as_ref().expect("create entry has staging"));
                verify_staging_checksum(&staging, &entry.checksum)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(&staging, &target)?;
            }
            Op::Replace => {
                let staging = self.txn_dir.join(entry.staging_path.as_ref().expect("replace entry has staging"));
                verify_staging_checksum(&staging, &entry.checksum)?;
                if fs_util::exists(&target)? {
                    let backup = self.txn_dir.join(entry.backup_path.as_ref().expect("replace entry has backup"));
                    fs::rename(&target, backup)?;
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(&staging, &target)?;
            }
            Op::Delete => {}
        }
        Ok(())
    }

    /// Reverses whatever staging/trash moves were made so far. Idempotent:
    /// a second call on an already-`rolled_back` journal is a no-op.
    pub fn rollback(&mut self) -> Result<()> {
        if self.journal.state == TxnState::RolledBack {
            return Ok(());
        }
        self.journal.state = TxnState::RollingBack;
        self.persist()?;

        for entry in self.journal.entries.clone().into_iter().rev() {
            if let Err(e) = self.rollback_entry(&entry) {
                warn!(target = entry.target_path, error = %e, "non-fatal error while rolling back entry");
            }
        }

        self.journal.state = TxnState::RolledBack;
        self.persist()?;
        debug!(id = %self.journal.id, "transaction rolled back");
        Ok(())
    }

    fn rollback_entry(&self, entry: &JournalEntry) -> Result<()> {
        let target = self.root.join(&entry.target_path);
        match entry.op {
            Op::Create => {
                if fs_util::exists(&target)? {
                    fs::remove_file(&target)?;
                }
                if let Some(staging) = &entry.staging_path {
                    let staging = self.txn_dir.join(staging);
                    if fs_util::exists(&staging)? {
                        fs::remove_file(&staging)?;
                    }
                }
            }
            Op::Replace => {
                if let Some(backup) = &entry.backup_path {
                    let backup = self.txn_dir.join(backup);
                    if fs_util::exists(&backup)? {
                        if fs_util::exists(&target)? {
                            fs::remove_file(&target)?;
                        }
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::rename(backup, &target)?;
                    }
                }
                if let Some(staging) = &entry.staging_path {
                    let staging = self.txn_dir.join(staging);
                    if fs_util::exists(&staging)? {
                        fs::remove_file(&staging)?;
                    }
                }
            }
            Op::Delete => {
                if let Some(backup) = &entry.backup_path {
                    let backup = self.txn_dir.join(backup);
                    if fs_util::exists(&backup)? {
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::rename(backup, &target)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn require_pending(&self) -> Result<()> {
        if self.journal.state != TxnState::Pending {
            return Err(VaultError::TxnStateViolation(format!("cannot stage from {:?}", self.journal.state)));
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.journal).map_err(|e| VaultError::TxnStateViolation(e.to_string()))?;
        fs_util::write_atomic(&self.txn_dir.join(JOURNAL_FILE), &bytes)
    }
}

/// Re-hashes a staging file and compares it against the checksum recorded
/// at stage time. A staging file that was truncated (rather than deleted
/// outright) would otherwise be renamed into place unnoticed; failing here
/// instead sends `commit()` to `Failed`, so `rollback()`/`recover()` can
/// still restore the pre-transaction state.
fn verify_staging_checksum(staging: &Path, expected_checksum: &str) -> Result<()> {
    let bytes = fs::read(staging)?;
    let actual_checksum = hash::digest_hex(HashAlgorithm::Sha256, &bytes);
    if actual_checksum != expected_checksum {
        return Err(VaultError::TxnCommitFailed(format!(
            "staging file {} checksum mismatch (expected {expected_checksum}, got {actual_checksum}); likely truncated",
            staging.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stage_create_then_commit_makes_file_visible() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_create("data/file.txt", b"hello").unwrap();
        mgr.commit().unwrap();

        assert_eq!(fs::read(root.join("data/file.txt")).unwrap(), b"hello");
        assert_eq!(mgr.state(), TxnState::Committed);
    }

    #[test]
    fn duplicate_stage_target_conflicts() {
        let dir = tempdir().unwrap();
        let mut mgr = Manager::begin(dir.path(), HashMap::new()).unwrap();
        mgr.stage_create("file.txt", b"a").unwrap();
        let result = mgr.stage_create("file.txt", b"b");
        assert!(matches!(result, Err(VaultError::TxnStageConflict(_))));
    }

    #[test]
    fn stage_replace_then_rollback_restores_old_content() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("file.txt"), b"old").unwrap();

        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_replace("file.txt", b"new").unwrap();
        mgr.rollback().unwrap();

        assert_eq!(fs::read(root.join("file.txt")).unwrap(), b"old");
        assert_eq!(mgr.state(), TxnState::RolledBack);
    }

    #[test]
    fn stage_replace_then_commit_applies_new_content() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("file.txt"), b"old").unwrap();

        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_replace("file.txt", b"new").unwrap();
        mgr.commit().unwrap();

        assert_eq!(fs::read(root.join("file.txt")).unwrap(), b"new");
    }

    #[test]
    fn commit_fails_and_preserves_original_when_staging_file_is_truncated() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("file.txt"), b"old").unwrap();

        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_replace("file.txt", b"new content").unwrap();

        // Truncate the staged file in place, rather than deleting it, so the
        // checksum contract (not mere file-presence) is what catches this.
        let staging_rel = mgr.journal.entries[0].staging_path.clone().unwrap();
        fs::write(mgr.dir().join(&staging_rel), b"new").unwrap();

        let result = mgr.commit();
        assert!(matches!(result, Err(VaultError::TxnCommitFailed(_))));
        assert_eq!(mgr.state(), TxnState::Failed);
        assert_eq!(fs::read(root.join("file.txt")).unwrap(), b"old", "original must survive a failed commit");

        mgr.rollback().unwrap();
        assert_eq!(fs::read(root.join("file.txt")).unwrap(), b"old");
        assert_eq!(mgr.state(), TxnState::RolledBack);
    }

    #[test]
    fn stage_delete_hides_target_before_commit() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("file.txt"), b"gone soon").unwrap();

        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_delete("file.txt").unwrap();
        assert!(!root.join("file.txt").exists());

        mgr.commit().unwrap();
        assert!(!root.join("file.txt").exists());
        assert_eq!(mgr.state(), TxnState::Committed);
    }

    #[test]
    fn stage_delete_of_missing_target_is_a_no_op_success() {
        let dir = tempdir().unwrap();
        let mut mgr = Manager::begin(dir.path(), HashMap::new()).unwrap();
        assert!(mgr.stage_delete("missing.txt").is_ok());
    }

    #[test]
    fn rollback_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut mgr = Manager::begin(root, HashMap::new()).unwrap();
        mgr.stage_create("file.txt", b"x").unwrap();
        mgr.rollback().unwrap();
        assert_eq!(mgr.state(), TxnState::RolledBack);
        mgr.rollback().unwrap();
        assert_eq!(mgr.state(), TxnState::RolledBack);
    }

    #[test]
    fn cannot_stage_after_commit() {
        let dir = tempdir().unwrap();
        let mut mgr = Manager::begin(dir.path(), HashMap::new()).unwrap();
        mgr.stage_create("a.txt", b"x").unwrap();
        mgr.commit().unwrap();
        assert!(matches!(mgr.stage_create("b.txt", b"y"), Err(VaultError::TxnStateViolation(_))));
    }
}
