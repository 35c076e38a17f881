//! Content-addressed blob store.
//!
//! The directory service only needs `put` and `get`. The in-memory store keys
//! each blob by the BLAKE3 hash of its bytes and never deletes anything, which
//! is what copy-on-write tree rewriting assumes of its store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{BlobKey, Endpoint};

/// Errors surfaced by a blob store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under the key.
    #[error("blob {0} not found")]
    NotFound(BlobKey),

    /// The store could not complete the request.
    #[error("store error: {0}")]
    Io(String),
}

/// Blob store trait consumed by the directory service.
///
/// This trait abstracts over the storage backend, allowing the directory
/// service to run on an in-memory store for testing and a remote store in
/// production.
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its key. Storing identical bytes twice yields the same key.
    fn put(&self, data: &[u8]) -> Result<BlobKey, StoreError>;

    /// Fetch the blob stored under `key`.
    fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StoreError>;

    /// Endpoint recorded in locations that point into this store.
    fn endpoint(&self) -> Endpoint;
}

/// In-memory content-addressed store. Thread-safe via RwLock.
///
/// Does not persist data across restarts.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobKey, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct blobs held, reachable or orphaned.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Key a blob by the hex BLAKE3 digest of its contents.
pub fn content_key(data: &[u8]) -> BlobKey {
    BlobKey::new(blake3::hash(data).to_hex().to_string())
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, data: &[u8]) -> Result<BlobKey, StoreError> {
        let key = content_key(data);
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        blobs.entry(key.clone()).or_insert_with(|| data.to_vec());
        Ok(key)
    }

    fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StoreError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::in_process()
    }
}
