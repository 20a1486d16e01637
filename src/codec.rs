//! Symmetric compression codec over `{none, gzip, zstd, lz4}`.
//!
//! Compression has no size cap. Decompression enforces `max_output_size`
//! *while decoding* — one byte past the ceiling aborts the read before the
//! rest of the (possibly enormous) decoded stream is ever produced.

use std::io::{Read, Write};

use crate::config::CompressionAlgorithm;
use crate::error::{CodecDirection, Result, VaultError};

fn fail(algo: CompressionAlgorithm, direction: CodecDirection, message: impl Into<String>) -> VaultError {
    VaultError::CodecFailure { algo: format!("{algo:?}").to_lowercase(), direction, message: message.into() }
}

/// Compresses `data` under `algo`. `None` is the identity transform.
pub fn compress(data: &[u8], algo: CompressionAlgorithm) -> Result<Vec<u8>> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))
        }
        CompressionAlgorithm::Zstd => {
            zstd::stream::encode_all(data, 0).map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))
        }
        CompressionAlgorithm::Lz4 => {
            let mut encoder = lz4::EncoderBuilder::new()
                .build(Vec::new())
                .map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))?;
            encoder
                .write_all(data)
                .map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))?;
            let (buf, result) = encoder.finish();
            result.map_err(|e| fail(algo, CodecDirection::Compress, e.to_string()))?;
            Ok(buf)
        }
    }
}

/// Decompresses `data` under `algo`, aborting with [`VaultError::DecompressionBomb`]
/// if the decoded length would exceed `max_output_size`.
pub fn decompress(data: &[u8], algo: CompressionAlgorithm, max_output_size: u64) -> Result<Vec<u8>> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Gzip => {
            let decoder = flate2::read::GzDecoder::new(data);
            read_bounded(decoder, max_output_size, algo)
        }
        CompressionAlgorithm::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(data)
                .map_err(|e| fail(algo, CodecDirection::Decompress, e.to_string()))?;
            read_bounded(decoder, max_output_size, algo)
        }
        CompressionAlgorithm::Lz4 => {
            let decoder = lz4::Decoder::new(data).map_err(|e| fail(algo, CodecDirection::Decompress, e.to_string()))?;
            read_bounded(decoder, max_output_size, algo)
        }
    }
}

/// Reads `inner` up to `limit + 1` bytes; if that many are actually
/// available the stream is rejected as a bomb before the rest is read.
fn read_bounded<R: Read>(inner: R, limit: u64, algo: CompressionAlgorithm) -> Result<Vec<u8>> {
    let mut bounded = inner.take(limit.saturating_add(1));
    let mut out = Vec::new();
    bounded
        .read_to_end(&mut out)
        .map_err(|e| fail(algo, CodecDirection::Decompress, e.to_string()))?;
    if out.len() as u64 > limit {
        return Err(VaultError::DecompressionBomb { limit });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 16 * 1024 * 1024;

    #[test]
    fn none_is_identity() {
        let data = b"hello world";
        let compressed = compress(data, CompressionAlgorithm::None).unwrap();
        assert_eq!(compressed, data);
        let decompressed = decompress(&compressed, CompressionAlgorithm::None, LIMIT).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn zstd_roundtrip_and_ratio() {
        let data = vec![b'A'; 1024 * 1024];
        let compressed = compress(&data, CompressionAlgorithm::Zstd).unwrap();
        assert!(compressed.len() < 1024, "expected high compression ratio on repeated bytes");
        let decompressed = decompress(&compressed, CompressionAlgorithm::Zstd, LIMIT).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn gzip_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(64);
        let compressed = compress(&data, CompressionAlgorithm::Gzip).unwrap();
        let decompressed = decompress(&compressed, CompressionAlgorithm::Gzip, LIMIT).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn lz4_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(64);
        let compressed = compress(&data, CompressionAlgorithm::Lz4).unwrap();
        let decompressed = decompress(&compressed, CompressionAlgorithm::Lz4, LIMIT).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn decompression_bomb_is_rejected() {
        let data = vec![0u8; 4 * 1024 * 1024];
        let compressed = compress(&data, CompressionAlgorithm::Zstd).unwrap();
        let result = decompress(&compressed, CompressionAlgorithm::Zstd, 1024);
        assert!(matches!(result, Err(VaultError::DecompressionBomb { limit: 1024 })));
    }
}
