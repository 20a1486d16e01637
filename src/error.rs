//! Typed error surface for the vault core.
//!
//! Every component in this crate returns [`VaultError`] rather than `anyhow::Error`
//! so that callers (the CLI, recovery logic, test harnesses) can match on the
//! specific kind of failure instead of parsing a message string. The thin CLI
//! binary is the only place `anyhow` appears, wrapping these with `.context(...)`.

use thiserror::Error;

/// The direction a codec operation was attempted in, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecDirection {
    Compress,
    Decompress,
}

impl std::fmt::Display for CodecDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
        })
    }
}

/// Every failure mode the vault core can produce.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("input file is unreadable: {0}")]
    InputUnreadable(std::io::Error),

    #[error("vault configuration could not be read: {0}")]
    VaultConfigUnreadable(String),

    #[error("encryption is passphrase-protected but no passphrase was supplied")]
    PassphraseRequired,

    #[error("incorrect passphrase")]
    PassphraseWrong,

    #[error("cryptographic key has an invalid length")]
    KeyLengthInvalid,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{direction} failed for algorithm {algo}: {message}")]
    CodecFailure {
        algo: String,
        direction: CodecDirection,
        message: String,
    },

    #[error("decompressed output exceeds the configured maximum of {limit} bytes")]
    DecompressionBomb { limit: u64 },

    #[error("ciphertext is shorter than the nonce/IV it must carry")]
    CiphertextTruncated,

    #[error("PKCS#7 padding is invalid")]
    InvalidPadding,

    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(String),

    #[error("failed to persist the dedup index: {0}")]
    IndexPersistenceFailure(String),

    #[error("transaction is not in a state that permits this operation: {0}")]
    TxnStateViolation(String),

    #[error("another staged entry already targets this path: {0}")]
    TxnStageConflict(String),

    #[error("transaction commit failed: {0}")]
    TxnCommitFailed(String),

    #[error("recovery completed with {errors} non-fatal errors", errors = errors.len())]
    TxnRecoveryPartial { errors: Vec<String> },

    #[error("chunk {index} (hash {hash_prefix}…): {source}")]
    Chunk {
        index: u64,
        hash_prefix: String,
        #[source]
        source: Box<VaultError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// Wraps an inner error with the chunk index and a diagnostic hash prefix,
    /// as mandated for every error the pipeline propagates past a single chunk.
    pub fn at_chunk(index: u64, full_hash_hex: &str, source: VaultError) -> Self {
        let hash_prefix = full_hash_hex.chars().take(12).collect();
        Self::Chunk { index, hash_prefix, source: Box::new(source) }
    }
}
