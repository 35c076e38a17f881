//! Copy-on-write tree rewriting.
//!
//! A write installs one entry into its parent directory, which yields a new
//! key for that directory. The new key is then installed into the
//! grandparent, and so on up to the user's root. Nothing stored is modified
//! in place: every step writes a new blob, and the write becomes visible only
//! when the root table is pointed at the new root key.
//!
//! A write that fails part way leaves the root table untouched. Blobs it
//! already stored are unreachable and stay in the store.

use cowtree_pack::PackContext;

use crate::blobstore::BlobStore;
use crate::entry::{self, DIR_PACKING};
use crate::navigator::Navigator;
use crate::path::Parsed;
use crate::roots::RootTable;
use crate::types::{BlobKey, DirEntry, DirError, Location, Metadata, Timestamp};

/// Content and attributes of an entry about to be installed.
#[derive(Clone, Debug)]
pub struct NewEntry {
    /// Packed bytes to store; the entry will point at them
    pub content: Vec<u8>,
    /// Attributes to record; `sequence` is assigned during install
    pub metadata: Metadata,
    /// If set, the existing entry must carry this sequence
    pub expected_sequence: Option<u64>,
}

/// Result of installing one entry into one directory.
#[derive(Clone, Debug)]
pub struct Installed {
    /// Key of the rewritten directory payload
    pub dir_key: BlobKey,
    /// Length of the rewritten payload as stored
    pub dir_len: usize,
    /// The entry as written, with its final sequence
    pub entry: DirEntry,
}

/// Rewrites directories in the blob store.
pub struct TreeMutator<'a> {
    nav: Navigator<'a>,
}

impl<'a> TreeMutator<'a> {
    /// Creates a mutator writing to `store`.
    pub fn new(store: &'a dyn BlobStore, ctx: &'a PackContext) -> Self {
        Self {
            nav: Navigator::new(store, ctx),
        }
    }

    /// Installs `new_entry` into the directory `dir` stored under `dir_key`, replacing
    /// any entry with the same name, and stores the rewritten directory.
    pub fn install_entry(
        &self,
        op: &'static str,
        dir: &str,
        dir_key: &BlobKey,
        mut new_entry: DirEntry,
        expected_sequence: Option<u64>,
        dir_overwrite_ok: bool,
    ) -> Result<Installed, DirError> {
        let mut payload = self.nav.fetch_dir(op, dir_key, dir)?;

        let mut existing = None;
        for record in entry::records(&payload, dir) {
            let record = record?;
            if record.entry.name == new_entry.name {
                existing = Some(record);
                break;
            }
        }

        match existing {
            Some(old) => {
                if old.entry.is_dir() && !dir_overwrite_ok {
                    return Err(DirError::CannotOverwriteDirectory {
                        op,
                        path: new_entry.name,
                    });
                }
                if let Some(expected) = expected_sequence {
                    if expected != old.entry.sequence() {
                        return Err(DirError::SequenceMismatch {
                            op,
                            path: new_entry.name,
                            expected,
                            found: old.entry.sequence(),
                        });
                    }
                }
                // Records vary in length, so the old one is cut out and the new one appended.
                payload.drain(old.span);
                new_entry.metadata.sequence = old.entry.sequence() + 1;
            }
            None => new_entry.metadata.sequence = 0,
        }

        payload.extend_from_slice(&entry::marshal(&new_entry)?);
        let packed = entry::pack_dir_payload(self.nav.ctx(), op, &payload, dir)?;
        let dir_key = self
            .nav
            .store()
            .put(&packed)
            .map_err(|e| DirError::store(op, dir, e))?;
        tracing::debug!(
            op,
            dir,
            name = %new_entry.name,
            sequence = new_entry.metadata.sequence,
            key = %dir_key,
            "installed entry"
        );
        Ok(Installed {
            dir_key,
            dir_len: packed.len(),
            entry: new_entry,
        })
    }

    /// Stores `new`, installs an entry for it at `parsed`, rewrites every ancestor
    /// directory up to the root and commits the new root key to `roots`.
    ///
    /// Only the last element of `parsed` may be created; its ancestors must exist.
    pub fn install_and_propagate(
        &self,
        op: &'static str,
        parsed: &Parsed,
        roots: &mut RootTable,
        new: NewEntry,
        dir_overwrite_ok: bool,
    ) -> Result<DirEntry, DirError> {
        let user = parsed.user();
        let root_key = roots.get(user).cloned().ok_or_else(|| DirError::NoSuchUser {
            op,
            user: user.clone(),
        })?;

        let mut stored = 0usize;
        match self.propagate(op, parsed, root_key, new, dir_overwrite_ok, &mut stored) {
            Ok((new_root, leaf)) => {
                let old_root = roots.commit(user, new_root.clone());
                tracing::info!(
                    op,
                    user = %user,
                    path = %leaf.name,
                    old_root = ?old_root,
                    new_root = %new_root,
                    "committed new root"
                );
                Ok(leaf)
            }
            Err(e) => {
                if stored > 0 {
                    tracing::warn!(
                        op,
                        path = %parsed.path(),
                        orphaned_blobs = stored,
                        error = %e,
                        "write failed after storing blobs; tree unchanged, blobs leaked"
                    );
                }
                Err(e)
            }
        }
    }

    fn propagate(
        &self,
        op: &'static str,
        parsed: &Parsed,
        root_key: BlobKey,
        new: NewEntry,
        dir_overwrite_ok: bool,
        stored: &mut usize,
    ) -> Result<(BlobKey, DirEntry), DirError> {
        let chain = self.nav.descend(op, root_key, parsed)?;
        let store = self.nav.store();

        let content_key = store
            .put(&new.content)
            .map_err(|e| DirError::store(op, parsed.path(), e))?;
        *stored += 1;

        let leaf = DirEntry {
            name: parsed.path(),
            location: Location {
                endpoint: store.endpoint(),
                key: content_key,
            },
            metadata: new.metadata,
        };
        let parent = chain.parent();
        let installed = self.install_entry(
            op,
            &parent.name,
            &parent.location.key,
            leaf,
            new.expected_sequence,
            dir_overwrite_ok,
        )?;
        *stored += 1;

        let leaf = installed.entry;
        let mut child_key = installed.dir_key;
        let mut child_len = installed.dir_len;

        // Walk the chain bottom up: each directory receives its rewritten child.
        let dirs: Vec<&DirEntry> = chain.entries().collect();
        for pair in dirs.windows(2).rev() {
            let (ancestor, child) = (pair[0], pair[1]);
            let child_entry = DirEntry {
                name: child.name.clone(),
                location: Location {
                    endpoint: store.endpoint(),
                    key: child_key,
                },
                metadata: Metadata {
                    is_dir: true,
                    sequence: 0,
                    size: child_len as u64,
                    time: Timestamp::now(),
                    pack_descriptor: DIR_PACKING.descriptor(),
                },
            };
            let installed = self.install_entry(
                op,
                &ancestor.name,
                &ancestor.location.key,
                child_entry,
                None,
                true,
            )?;
            *stored += 1;
            child_key = installed.dir_key;
            child_len = installed.dir_len;
        }

        Ok((child_key, leaf))
    }
}
