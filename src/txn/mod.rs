//! Journaled atomic transactions: staged create/replace/delete operations
//! that become visible only via rename, with crash recovery over `.txn/`.

mod journal;
mod manager;
mod recovery;

pub use journal::{Journal, JournalEntry, Op, TxnState};
pub use manager::Manager;
pub use recovery::{RecoverySummary, recover};
