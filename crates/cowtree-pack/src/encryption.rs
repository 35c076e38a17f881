//! AES-256-GCM and ChaCha20-Poly1305 sealing with HKDF per-blob key derivation
//!
//! A sealed blob is `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The key
//! is derived from the master key and the blob's path name, so a blob copied
//! under another name fails authentication instead of decrypting.

use crate::error::PackError;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce length shared by both AEAD ciphers.
pub const NONCE_LEN: usize = 12;
/// Authentication tag length shared by both AEAD ciphers.
pub const TAG_LEN: usize = 16;

/// 256-bit (32-byte) encryption key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey(pub [u8; 32]);

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// AEAD cipher selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cipher {
    /// AES-256-GCM, hardware accelerated on x86 with AES-NI
    AesGcm256,
    /// ChaCha20-Poly1305, constant-time and fast on non-AES hardware
    ChaCha20Poly1305,
}

/// Derive the key for one blob from the master key and the blob's path name using HKDF-SHA256
pub fn derive_blob_key(master_key: &EncryptionKey, name: &str) -> Result<EncryptionKey, PackError> {
    let hk = Hkdf::<Sha256>::new(None, &master_key.0);
    let mut okm = [0u8; 32];
    let mut info = Vec::with_capacity(16 + name.len());
    info.extend_from_slice(b"cowtree-blob-key");
    info.extend_from_slice(name.as_bytes());
    hk.expand(&info, &mut okm)
        .map_err(|e| PackError::EncryptionFailed(e.to_string()))?;
    Ok(EncryptionKey(okm))
}

/// Generate a cryptographically random 12-byte nonce
fn random_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Seal plaintext under `key`. A fresh nonce is generated and stored in front of the ciphertext.
pub fn seal(plaintext: &[u8], key: &EncryptionKey, cipher: Cipher) -> Result<Vec<u8>, PackError> {
    let nonce = random_nonce();
    let ciphertext = match cipher {
        Cipher::AesGcm256 => {
            let aead = Aes256Gcm::new_from_slice(&key.0)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?;
            aead.encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?
        }
        Cipher::ChaCha20Poly1305 => {
            let aead = ChaCha20Poly1305::new_from_slice(&key.0)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?;
            aead.encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?
        }
    };
    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a blob produced by [`seal`]. Returns DecryptionAuthFailed if tampered/corrupted.
pub fn open(sealed: &[u8], key: &EncryptionKey, cipher: Cipher) -> Result<Vec<u8>, PackError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(PackError::Truncated {
            len: sealed.len(),
            min: NONCE_LEN + TAG_LEN,
        });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    match cipher {
        Cipher::AesGcm256 => {
            let aead = Aes256Gcm::new_from_slice(&key.0)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?;
            aead.decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| PackError::DecryptionAuthFailed)
        }
        Cipher::ChaCha20Poly1305 => {
            let aead = ChaCha20Poly1305::new_from_slice(&key.0)
                .map_err(|e| PackError::EncryptionFailed(e.to_string()))?;
            aead.decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| PackError::DecryptionAuthFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey([42u8; 32])
    }

    proptest! {
        #[test]
        fn prop_aesgcm_roundtrip(data in prop::collection::vec(0u8..=255, 0..65_536)) {
            let key = test_key();
            let sealed = seal(&data, &key, Cipher::AesGcm256).unwrap();
            prop_assert_eq!(sealed.len(), NONCE_LEN + data.len() + TAG_LEN);
            let opened = open(&sealed, &key, Cipher::AesGcm256).unwrap();
            prop_assert_eq!(opened, data);
        }
        #[test]
        fn prop_chacha_roundtrip(data in prop::collection::vec(0u8..=255, 0..65_536)) {
            let key = test_key();
            let sealed = seal(&data, &key, Cipher::ChaCha20Poly1305).unwrap();
            let opened = open(&sealed, &key, Cipher::ChaCha20Poly1305).unwrap();
            prop_assert_eq!(opened, data);
        }
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = test_key();
        for cipher in [Cipher::AesGcm256, Cipher::ChaCha20Poly1305] {
            let mut sealed = seal(b"secret payload", &key, cipher).unwrap();
            let last = sealed.len() - 1;
            sealed[last] ^= 0x01;
            assert!(matches!(
                open(&sealed, &key, cipher),
                Err(PackError::DecryptionAuthFailed)
            ));
        }
    }

    #[test]
    fn short_blob_is_truncated() {
        let key = test_key();
        assert!(matches!(
            open(&[0u8; 8], &key, Cipher::ChaCha20Poly1305),
            Err(PackError::Truncated { len: 8, .. })
        ));
    }

    #[test]
    fn derived_keys_depend_on_name() {
        let master = test_key();
        let a = derive_blob_key(&master, "alice@x/a").unwrap();
        let b = derive_blob_key(&master, "alice@x/b").unwrap();
        assert_ne!(a.0, b.0);
        let again = derive_blob_key(&master, "alice@x/a").unwrap();
        assert_eq!(a.0, again.0);
    }

    #[test]
    fn wrong_name_key_fails() {
        let master = test_key();
        let sealed = seal(
            b"data",
            &derive_blob_key(&master, "alice@x/a").unwrap(),
            Cipher::AesGcm256,
        )
        .unwrap();
        let other = derive_blob_key(&master, "alice@x/b").unwrap();
        assert!(open(&sealed, &other, Cipher::AesGcm256).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        assert_eq!(format!("{:?}", test_key()), "EncryptionKey([REDACTED])");
    }
}
