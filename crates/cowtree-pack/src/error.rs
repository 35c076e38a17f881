//! Error types for the cowtree-pack codecs

/// All errors that can occur while packing or unpacking a blob
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// No codec is registered under this descriptor byte
    #[error("no packing {0:#04x} registered")]
    UnknownPacking(u8),
    /// Compression operation failed
    #[error("compression failed: {0}")]
    CompressionFailed(String),
    /// Decompression operation failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// Decryption authentication tag mismatch, or the blob was sealed for another name
    #[error("decryption failed: authentication tag mismatch (data may be corrupted)")]
    DecryptionAuthFailed,
    /// Ciphertext is shorter than the codec's fixed framing
    #[error("ciphertext truncated: {len} bytes, need at least {min}")]
    Truncated {
        /// Length of the ciphertext handed to the codec
        len: usize,
        /// Minimum framing length for this codec
        min: usize,
    },
    /// An encrypting codec was selected but the context carries no master key
    #[error("missing encryption key: packing {0} requires a master key")]
    MissingKey(&'static str),
}
