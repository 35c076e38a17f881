//! The closed set of packings and their dispatch.
//!
//! Each variant maps to one codec. The numeric descriptor is what directory
//! entries persist, so descriptor values must never be reused.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::encryption::{self, Cipher, EncryptionKey, NONCE_LEN, TAG_LEN};
use crate::error::PackError;

/// Default Zstd level for the `Zstd` packing.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Environment shared by every pack and unpack call.
#[derive(Clone, Debug)]
pub struct PackContext {
    master_key: Option<Arc<EncryptionKey>>,
    zstd_level: i32,
}

impl PackContext {
    /// Context without key material. Encrypting packings fail with `MissingKey`.
    pub fn new() -> Self {
        Self {
            master_key: None,
            zstd_level: DEFAULT_ZSTD_LEVEL,
        }
    }

    /// Attach the master key the encrypting packings derive per-blob keys from.
    pub fn with_master_key(mut self, key: EncryptionKey) -> Self {
        self.master_key = Some(Arc::new(key));
        self
    }

    /// Override the Zstd compression level.
    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    /// Returns the configured Zstd compression level.
    pub fn zstd_level(&self) -> i32 {
        self.zstd_level
    }

    fn blob_key(&self, packing: Packing, name: &str) -> Result<EncryptionKey, PackError> {
        let master = self
            .master_key
            .as_deref()
            .ok_or(PackError::MissingKey(packing.name()))?;
        encryption::derive_blob_key(master, name)
    }
}

impl Default for PackContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A packing codec, identified on disk by its descriptor byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Packing {
    /// Identity transform. Used for every directory payload.
    Plain = 0,
    /// LZ4 block compression
    Lz4 = 1,
    /// Zstd compression at the context's level
    Zstd = 2,
    /// AES-256-GCM with a per-name derived key
    AesGcm = 20,
    /// ChaCha20-Poly1305 with a per-name derived key
    ChaCha = 21,
}

impl Packing {
    /// Every registered packing.
    pub const ALL: [Packing; 5] = [
        Packing::Plain,
        Packing::Lz4,
        Packing::Zstd,
        Packing::AesGcm,
        Packing::ChaCha,
    ];

    /// The descriptor byte recorded alongside packed blobs.
    pub fn descriptor(self) -> u8 {
        self as u8
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Packing::Plain => "plain",
            Packing::Lz4 => "lz4",
            Packing::Zstd => "zstd",
            Packing::AesGcm => "aes-gcm",
            Packing::ChaCha => "chacha20-poly1305",
        }
    }

    fn compression(self, ctx: &PackContext) -> Option<Compression> {
        match self {
            Packing::Lz4 => Some(Compression::Lz4),
            Packing::Zstd => Some(Compression::Zstd {
                level: ctx.zstd_level,
            }),
            _ => None,
        }
    }

    fn cipher(self) -> Option<Cipher> {
        match self {
            Packing::AesGcm => Some(Cipher::AesGcm256),
            Packing::ChaCha => Some(Cipher::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Upper bound on the packed length of `cleartext_len` bytes.
    pub fn pack_len(self, ctx: &PackContext, cleartext_len: usize) -> usize {
        match self {
            Packing::Plain => cleartext_len,
            Packing::Lz4 | Packing::Zstd => self
                .compression(ctx)
                .map_or(cleartext_len, |c| c.max_compressed_len(cleartext_len)),
            Packing::AesGcm | Packing::ChaCha => NONCE_LEN + cleartext_len + TAG_LEN,
        }
    }

    /// Pack `cleartext` stored under path `name`.
    pub fn pack(self, ctx: &PackContext, cleartext: &[u8], name: &str) -> Result<Vec<u8>, PackError> {
        tracing::trace!(packing = self.name(), name, len = cleartext.len(), "pack");
        if let Some(compression) = self.compression(ctx) {
            return compression.compress(cleartext);
        }
        if let Some(cipher) = self.cipher() {
            let key = ctx.blob_key(self, name)?;
            return encryption::seal(cleartext, &key, cipher);
        }
        let mut out = Vec::with_capacity(self.pack_len(ctx, cleartext.len()));
        out.extend_from_slice(cleartext);
        Ok(out)
    }

    /// Exact cleartext length of `ciphertext`, when the format records it.
    pub fn unpack_len(self, ciphertext: &[u8]) -> Option<usize> {
        match self {
            Packing::Plain => Some(ciphertext.len()),
            Packing::Lz4 => Compression::Lz4.decompressed_len(ciphertext),
            Packing::Zstd => None,
            Packing::AesGcm | Packing::ChaCha => ciphertext.len().checked_sub(NONCE_LEN + TAG_LEN),
        }
    }

    /// Unpack `ciphertext` that was packed under path `name`.
    pub fn unpack(self, ctx: &PackContext, ciphertext: &[u8], name: &str) -> Result<Vec<u8>, PackError> {
        tracing::trace!(packing = self.name(), name, len = ciphertext.len(), "unpack");
        if let Some(compression) = self.compression(ctx) {
            return compression.decompress(ciphertext);
        }
        if let Some(cipher) = self.cipher() {
            let key = ctx.blob_key(self, name)?;
            return encryption::open(ciphertext, &key, cipher);
        }
        Ok(ciphertext.to_vec())
    }
}

impl TryFrom<u8> for Packing {
    type Error = PackError;

    fn try_from(descriptor: u8) -> Result<Self, Self::Error> {
        Packing::ALL
            .into_iter()
            .find(|p| p.descriptor() == descriptor)
            .ok_or(PackError::UnknownPacking(descriptor))
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keyed() -> PackContext {
        PackContext::new().with_master_key(EncryptionKey([7u8; 32]))
    }

    proptest! {
        #[test]
        fn prop_every_packing_roundtrips(data in prop::collection::vec(0u8..=255, 0..8192)) {
            let ctx = keyed();
            for packing in Packing::ALL {
                let packed = packing.pack(&ctx, &data, "alice@x/f").unwrap();
                prop_assert!(packed.len() <= packing.pack_len(&ctx, data.len()));
                if let Some(len) = packing.unpack_len(&packed) {
                    prop_assert_eq!(len, data.len());
                }
                let unpacked = packing.unpack(&ctx, &packed, "alice@x/f").unwrap();
                prop_assert_eq!(&unpacked, &data);
            }
        }
    }

    #[test]
    fn descriptor_lookup() {
        for packing in Packing::ALL {
            assert_eq!(Packing::try_from(packing.descriptor()).unwrap(), packing);
        }
        assert!(matches!(
            Packing::try_from(0x7f),
            Err(PackError::UnknownPacking(0x7f))
        ));
    }

    #[test]
    fn plain_is_identity() {
        let ctx = PackContext::new();
        assert_eq!(Packing::Plain.pack(&ctx, b"abc", "u@x/").unwrap(), b"abc");
        assert_eq!(Packing::Plain.unpack(&ctx, b"abc", "u@x/").unwrap(), b"abc");
    }

    #[test]
    fn encrypting_packing_needs_key() {
        let ctx = PackContext::new();
        assert!(matches!(
            Packing::AesGcm.pack(&ctx, b"abc", "u@x/f"),
            Err(PackError::MissingKey("aes-gcm"))
        ));
    }

    #[test]
    fn sealed_blob_is_bound_to_name() {
        let ctx = keyed();
        let packed = Packing::ChaCha.pack(&ctx, b"abc", "u@x/one").unwrap();
        assert!(matches!(
            Packing::ChaCha.unpack(&ctx, &packed, "u@x/two"),
            Err(PackError::DecryptionAuthFailed)
        ));
    }

    #[test]
    fn zstd_level_is_configurable() {
        let ctx = PackContext::new().with_zstd_level(19);
        assert_eq!(ctx.zstd_level(), 19);
        let data = vec![b'z'; 10_000];
        let packed = Packing::Zstd.pack(&ctx, &data, "u@x/z").unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(Packing::Zstd.unpack(&ctx, &packed, "u@x/z").unwrap(), data);
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(Packing::Lz4.to_string(), "lz4");
    }
}
