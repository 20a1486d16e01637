//! sietch - a local content-addressed vault.
//!
//! Ingests files into fixed-size chunks, optionally compressing and
//! encrypting each under a vault-scoped key, deduplicating by content hash,
//! and persisting everything through a journaled atomic-transaction layer.

pub mod cipher;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fs_util;
pub mod hash;
pub mod kdf;
pub mod keyvault;
pub mod pipeline;
pub mod secret;
pub mod txn;
pub mod vault;

pub use error::{Result, VaultError};
pub use vault::Vault;
