//! Crash recovery: scans `<root>/.txn/*` and drives every journal found
//! there to a terminal state, or purges it if it's already terminal and
//! past its retention window.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::txn::journal::TxnState;
use crate::txn::manager::Manager;

/// Summary counts returned by [`recover`]. `errors` collects non-fatal
/// per-journal failures; a bad journal never halts the rest of the scan.
#[derive(Debug, Default)]
pub struct RecoverySummary {
    pub purged: u64,
    pub resumed_commits: u64,
    pub rolled_back: u64,
    pub errors: Vec<String>,
}

/// Scans every transaction directory under `root` and resolves it:
/// terminal journals past `retention_secs` (0 disables purging) are
/// deleted; in-flight journals are driven to completion by replaying
/// `commit`, falling back to `rollback` on failure.
pub fn recover(root: &Path, retention_secs: u64) -> Result<RecoverySummary> {
    let mut summary = RecoverySummary::default();
    let txn_root = root.join(".txn");

    let read_dir = match fs::read_dir(&txn_root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summary),
        Err(e) => return Err(e.into()),
    };

    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                summary.errors.push(e.to_string());
                continue;
            }
        };
        if !entry.path().is_dir() {
            continue;
        }

        if let Err(e) = recover_one(root, &entry.path(), retention_secs, &mut summary) {
            summary.errors.push(format!("{}: {e}", entry.path().display()));
        }
    }

    Ok(summary)
}

fn recover_one(root: &Path, txn_dir: &Path, retention_secs: u64, summary: &mut RecoverySummary) -> Result<()> {
    let mut manager = Manager::load(root, txn_dir.to_path_buf())?;

    match manager.state() {
        TxnState::Committed | TxnState::RolledBack => {
            if retention_secs > 0 {
                let age = Utc::now().signed_duration_since(manager.started_at()).num_seconds().max(0) as u64;
                if age > retention_secs {
                    fs::remove_dir_all(txn_dir)?;
                    summary.purged += 1;
                }
            }
        }
        TxnState::RollingBack => {
            manager.rollback()?;
            summary.rolled_back += 1;
        }
        TxnState::Pending | TxnState::Committing | TxnState::Failed => {
            if manager.commit().is_ok() {
                summary.resumed_commits += 1;
            } else {
                warn!(dir = %txn_dir.display(), "commit replay failed during recovery, rolling back");
                manager.rollback()?;
                summary.rolled_back += 1;
            }
        }
    }
    Ok(())
}
