//! Path navigation over stored directory payloads.
//!
//! Every directory is a packed payload in the blob store. Resolving a path
//! means fetching and unpacking each directory from the root down and scanning
//! it for the next element. The walk records each directory it passes through
//! so a writer can rewrite that chain without fetching it again.

use cowtree_pack::PackContext;

use crate::blobstore::BlobStore;
use crate::entry::{self, DIR_PACKING};
use crate::path::{self, Parsed};
use crate::types::{BlobKey, DirEntry, DirError, Location, Metadata, Timestamp};

/// The directories traversed on the way to a path's parent, root first.
#[derive(Clone, Debug)]
pub struct Chain {
    root: DirEntry,
    below: Vec<DirEntry>,
}

impl Chain {
    /// The synthetic entry for the user's root.
    pub fn root(&self) -> &DirEntry {
        &self.root
    }

    /// Every directory entry of the chain, root first.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &DirEntry> {
        std::iter::once(&self.root).chain(self.below.iter())
    }

    /// The directory that holds the path's final element.
    pub fn parent(&self) -> &DirEntry {
        self.below.last().unwrap_or(&self.root)
    }

    /// Number of directories in the chain, root included.
    pub fn len(&self) -> usize {
        self.below.len() + 1
    }

    /// Always false: a chain holds at least the root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Reads directories out of the blob store.
pub struct Navigator<'a> {
    store: &'a dyn BlobStore,
    ctx: &'a PackContext,
}

impl<'a> Navigator<'a> {
    /// Creates a navigator over `store` using `ctx` for unpacking.
    pub fn new(store: &'a dyn BlobStore, ctx: &'a PackContext) -> Self {
        Self { store, ctx }
    }

    /// The store this navigator reads from.
    pub fn store(&self) -> &'a dyn BlobStore {
        self.store
    }

    /// The pack context used for every payload.
    pub fn ctx(&self) -> &'a PackContext {
        self.ctx
    }

    /// Synthetic directory entry standing for the root of `parsed`'s user.
    pub fn root_entry(&self, parsed: &Parsed, root_key: BlobKey) -> DirEntry {
        DirEntry {
            name: parsed.first(0).path(),
            location: Location {
                endpoint: self.store.endpoint(),
                key: root_key,
            },
            metadata: Metadata {
                is_dir: true,
                sequence: 0,
                size: 0,
                time: Timestamp::default(),
                pack_descriptor: DIR_PACKING.descriptor(),
            },
        }
    }

    /// Returns the unpacked payload of the directory `dir` stored under `key`.
    pub fn fetch_dir(&self, op: &'static str, key: &BlobKey, dir: &str) -> Result<Vec<u8>, DirError> {
        let ciphertext = self
            .store
            .get(key)
            .map_err(|e| DirError::store(op, dir, e))?;
        entry::unpack_dir_payload(self.ctx, op, &ciphertext, dir)
    }

    /// Finds `elem` in the payload of directory `dir`.
    pub fn find_entry(
        &self,
        op: &'static str,
        payload: &[u8],
        dir: &str,
        elem: &str,
    ) -> Result<DirEntry, DirError> {
        if elem.is_empty() {
            return Err(DirError::NotFound {
                op,
                path: path::join(dir, ""),
            });
        }
        let name = path::join(dir, elem);
        for record in entry::records(payload, dir) {
            let record = record?;
            if record.entry.name == name {
                return Ok(record.entry);
            }
        }
        Err(DirError::NotFound { op, path: name })
    }

    /// Fetches directory `dir` and finds `elem` in it. Reads the whole directory.
    pub fn fetch_entry(
        &self,
        op: &'static str,
        key: &BlobKey,
        dir: &str,
        elem: &str,
    ) -> Result<DirEntry, DirError> {
        let payload = self.fetch_dir(op, key, dir)?;
        self.find_entry(op, &payload, dir, elem)
    }

    /// Walks from `root_key` down to the directory holding `parsed`'s last element.
    ///
    /// Every element but the last must exist and be a directory.
    pub fn descend(
        &self,
        op: &'static str,
        root_key: BlobKey,
        parsed: &Parsed,
    ) -> Result<Chain, DirError> {
        let root = self.root_entry(parsed, root_key);
        let depth = parsed.nelem().saturating_sub(1);
        let mut below: Vec<DirEntry> = Vec::with_capacity(depth);
        for (i, elem) in parsed.elems().iter().take(depth).enumerate() {
            let dir = below.last().unwrap_or(&root);
            let next = self.fetch_entry(op, &dir.location.key, &dir.name, elem)?;
            if !next.is_dir() {
                return Err(DirError::NotADirectory {
                    op,
                    path: parsed.first(i + 1).path(),
                });
            }
            tracing::debug!(op, dir = %next.name, key = %next.location.key, "descend");
            below.push(next);
        }
        Ok(Chain { root, below })
    }
}
