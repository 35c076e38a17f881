//! LZ4 and Zstd compression for the compressing packings

use crate::error::PackError;
use serde::{Deserialize, Serialize};

/// Length of the little-endian size header LZ4 blobs carry in front of the block.
const LZ4_SIZE_PREFIX: usize = 4;

/// Compression algorithm behind a compressing packing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// LZ4 block format with the cleartext size prepended
    Lz4,
    /// Zstandard frame
    Zstd {
        /// Compression level (1=fastest, 19=best ratio, 3=balanced default)
        level: i32,
    },
}

impl Compression {
    /// Compress `data`. Returns compressed bytes.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, PackError> {
        match self {
            Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Compression::Zstd { level } => zstd::encode_all(data, level)
                .map_err(|e| PackError::CompressionFailed(e.to_string())),
        }
    }

    /// Decompress bytes produced by [`Compression::compress`] with the same algorithm.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, PackError> {
        match self {
            Compression::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| PackError::DecompressionFailed(e.to_string())),
            Compression::Zstd { .. } => {
                zstd::decode_all(data).map_err(|e| PackError::DecompressionFailed(e.to_string()))
            }
        }
    }

    /// Worst-case compressed length for `len` input bytes.
    pub fn max_compressed_len(self, len: usize) -> usize {
        match self {
            Compression::Lz4 => LZ4_SIZE_PREFIX + lz4_flex::block::get_maximum_output_size(len),
            Compression::Zstd { .. } => zstd::zstd_safe::compress_bound(len),
        }
    }

    /// Cleartext length recorded in the compressed header, when the format carries one.
    pub fn decompressed_len(self, data: &[u8]) -> Option<usize> {
        match self {
            Compression::Lz4 => {
                let header: [u8; LZ4_SIZE_PREFIX] = data.get(..LZ4_SIZE_PREFIX)?.try_into().ok()?;
                Some(u32::from_le_bytes(header) as usize)
            }
            // Streaming frames do not record a content size.
            Compression::Zstd { .. } => None,
        }
    }
}
