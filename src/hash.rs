//! Algorithm-agnostic hashing primitives.
//!
//! Recognized algorithms: `sha256` (default), `sha512`, `sha1`, `blake3`.
//! Hashers are one-shot — the pipeline builds a fresh one per chunk rather
//! than resetting an existing instance.

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::error::{Result, VaultError};

/// A hash algorithm recognized by the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Sha1,
    Blake3,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl HashAlgorithm {
    /// Parses a recognized algorithm name, defaulting unspecified input to
    /// `sha256`. Any other name fails with `UnsupportedAlgorithm`.
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.unwrap_or("sha256") {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "sha1" => Ok(Self::Sha1),
            "blake3" => Ok(Self::Blake3),
            other => Err(VaultError::UnsupportedAlgorithm(other.to_owned())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Sha1 => "sha1",
            Self::Blake3 => "blake3",
        }
    }
}

/// Computes the hex-encoded digest of `data` under `algo`.
///
/// Each call builds a fresh hasher; this is the only public entry point the
/// pipeline needs because every chunk is hashed exactly once.
pub fn digest_hex(algo: HashAlgorithm, data: &[u8]) -> String {
    match algo {
        HashAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(data)),
        HashAlgorithm::Sha512 => hex::encode(sha2::Sha512::digest(data)),
        HashAlgorithm::Sha1 => hex::encode(sha1::Sha1::digest(data)),
        HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_sha256() {
        assert_eq!(HashAlgorithm::parse(None).unwrap(), HashAlgorithm::Sha256);
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(matches!(
            HashAlgorithm::parse(Some("md5")),
            Err(VaultError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_cdc_as_a_hash_name_too() {
        // cdc is a chunking strategy, never a valid hash algorithm name.
        assert!(HashAlgorithm::parse(Some("cdc")).is_err());
    }

    #[test]
    fn sha256_known_vector() {
        let digest = digest_hex(HashAlgorithm::Sha256, b"hell");
        assert_eq!(
            digest,
            "0ebdc3317b75839f643387d783535adc360ca01f33c75f7c1e7373adcd675c0b"
        );
    }

    #[test]
    fn stable_across_repeated_calls() {
        let a = digest_hex(HashAlgorithm::Blake3, b"hello world");
        let b = digest_hex(HashAlgorithm::Blake3, b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_algorithms_disagree() {
        let a = digest_hex(HashAlgorithm::Sha256, b"hello world");
        let b = digest_hex(HashAlgorithm::Sha512, b"hello world");
        assert_ne!(a, b);
    }
}
