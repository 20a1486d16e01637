//! The persisted record of one transaction: its state machine and the
//! ordered list of operations staged under it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A journal's lifecycle. `Failed` is terminal and reachable from any
/// non-terminal state when `commit` hits a per-entry error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    Pending,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    Failed,
}

impl TxnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// The kind of mutation a single journal entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Create,
    Replace,
    Delete,
}

/// One staged mutation: a target path (relative to the vault root) plus
/// whatever staging/backup locations the operation needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub op: Op,
    pub target_path: String,
    pub staging_path: Option<String>,
    pub backup_path: Option<String>,
    pub checksum: String,
}

/// The full on-disk journal for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub state: TxnState,
    pub metadata: HashMap<String, String>,
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new(id: String, metadata: HashMap<String, String>) -> Self {
        Self { id, started_at: Utc::now(), state: TxnState::Pending, metadata, entries: Vec::new() }
    }

    /// `true` if any staged entry already targets `path` — stage_create and
    /// stage_replace both reject a second entry for the same target.
    pub fn has_entry_for(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.target_path == path)
    }
}
