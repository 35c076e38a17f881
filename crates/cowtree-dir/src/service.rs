//! High-level directory service combining all subsystems.
//!
//! DirService is the primary entry point. It owns the blob store handle, the
//! pack context and the root table, and runs every operation under one
//! reader/writer lock: reads share it, writes hold it exclusively for the whole
//! copy-on-write rewrite, blob store calls included.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cowtree_pack::{EncryptionKey, PackContext, Packing};

use crate::blobstore::{BlobStore, MemoryBlobStore};
use crate::config::DirServiceConfig;
use crate::entry::{self, DIR_PACKING};
use crate::glob;
use crate::mutator::{NewEntry, TreeMutator};
use crate::navigator::Navigator;
use crate::path::{self, Parsed};
use crate::roots::RootTable;
use crate::types::*;

/// The directory service: per-user copy-on-write trees over a blob store.
pub struct DirService {
    store: Arc<dyn BlobStore>,
    ctx: PackContext,
    config: DirServiceConfig,
    roots: RwLock<RootTable>,
}

impl DirService {
    /// Create a service over `store`.
    pub fn new(store: Arc<dyn BlobStore>, config: DirServiceConfig) -> Self {
        tracing::debug!(
            endpoint = ?store.endpoint(),
            config = ?config,
            "creating directory service"
        );
        let ctx = PackContext::new().with_zstd_level(config.zstd_level);
        Self {
            store,
            ctx,
            config,
            roots: RwLock::new(RootTable::new()),
        }
    }

    /// Create a service over a fresh in-memory store with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBlobStore::new()), DirServiceConfig::default())
    }

    /// Supply the master key used by the encrypting packings.
    pub fn with_master_key(mut self, key: EncryptionKey) -> Self {
        self.ctx = self.ctx.with_master_key(key);
        self
    }

    /// The blob store backing this service.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &DirServiceConfig {
        &self.config
    }

    /// Current root key of `user`, if the user has a root.
    pub fn root_key(&self, user: &UserName) -> Result<Option<BlobKey>, DirError> {
        Ok(self.read_roots("RootKey")?.get(user).cloned())
    }

    /// Create a directory. A bare user name (`alice@x/`) creates that user's root.
    ///
    /// Only the last element is created; its parent must already exist.
    pub fn make_directory(&self, name: &str) -> Result<DirEntry, DirError> {
        const OP: &str = "MakeDirectory";
        let parsed = self.parse(OP, name)?;
        let mut roots = self.write_roots(OP)?;
        let dir_name = parsed.path();

        if parsed.is_root() {
            let user = parsed.user();
            if roots.contains(user) {
                return Err(DirError::AlreadyExists { op: OP, path: dir_name });
            }
            let blob = entry::pack_dir_payload(&self.ctx, OP, &[], &dir_name)?;
            let key = self
                .store
                .put(&blob)
                .map_err(|e| DirError::store(OP, &dir_name, e))?;
            roots.create(user.clone(), key.clone());
            tracing::info!(user = %user, key = %key, "created user root");
            return Ok(DirEntry {
                name: dir_name,
                location: Location {
                    endpoint: self.store.endpoint(),
                    key,
                },
                metadata: dir_metadata(0),
            });
        }

        let content = entry::pack_dir_payload(&self.ctx, OP, &[], &dir_name)?;
        let new = NewEntry {
            metadata: dir_metadata(content.len() as u64),
            content,
            expected_sequence: None,
        };
        self.mutator()
            .install_and_propagate(OP, &parsed, &mut roots, new, false)
    }

    /// Create or overwrite the file at `name` with `data`, packed with `packing`.
    ///
    /// Returns the installed entry; its sequence is 0 on creation and one more
    /// than the replaced entry's on overwrite.
    pub fn put(
        &self,
        name: &str,
        data: &[u8],
        packing: Packing,
        opts: &PutOptions,
    ) -> Result<DirEntry, DirError> {
        const OP: &str = "Put";
        let parsed = self.parse(OP, name)?;
        if parsed.is_root() {
            return Err(DirError::MustUseMakeDirectory { path: parsed.path() });
        }
        let mut roots = self.write_roots(OP)?;
        let file_name = parsed.path();

        let content = entry::pack_blob(&self.ctx, OP, packing, data, &file_name)?;
        let new = NewEntry {
            content,
            metadata: Metadata {
                is_dir: false,
                sequence: 0,
                size: opts.size.unwrap_or(data.len() as u64),
                time: opts.time.unwrap_or_else(Timestamp::now),
                pack_descriptor: packing.descriptor(),
            },
            expected_sequence: opts.sequence,
        };
        self.mutator()
            .install_and_propagate(OP, &parsed, &mut roots, new, false)
    }

    /// Return the entry for `name`. Roots are directories; list them with `glob`.
    pub fn lookup(&self, name: &str) -> Result<DirEntry, DirError> {
        const OP: &str = "Lookup";
        let parsed = self.parse(OP, name)?;
        let roots = self.read_roots(OP)?;
        self.lookup_locked(OP, &roots, &parsed)
    }

    /// Return the cleartext content of the file at `name`.
    pub fn get(&self, name: &str) -> Result<Vec<u8>, DirError> {
        const OP: &str = "Get";
        let parsed = self.parse(OP, name)?;
        let roots = self.read_roots(OP)?;
        let found = self.lookup_locked(OP, &roots, &parsed)?;
        if found.is_dir() {
            return Err(DirError::UseGlobForDirectories {
                op: OP,
                path: found.name,
            });
        }
        let ciphertext = self
            .store
            .get(&found.location.key)
            .map_err(|e| DirError::store(OP, &found.name, e))?;
        entry::unpack_blob(
            &self.ctx,
            OP,
            found.metadata.pack_descriptor,
            &ciphertext,
            &found.name,
        )
    }

    /// Return every entry matching `pattern`, sorted by name.
    pub fn glob(&self, pattern: &str) -> Result<Vec<DirEntry>, DirError> {
        let roots = self.read_roots("Glob")?;
        glob::glob(&self.navigator(), &roots, pattern, self.config.glob_capacity)
    }

    fn lookup_locked(
        &self,
        op: &'static str,
        roots: &RootTable,
        parsed: &Parsed,
    ) -> Result<DirEntry, DirError> {
        let Some(last) = parsed.last_elem() else {
            return Err(DirError::UseGlobForDirectories {
                op,
                path: parsed.path(),
            });
        };
        let root_key = roots
            .get(parsed.user())
            .cloned()
            .ok_or_else(|| DirError::NoSuchUser {
                op,
                user: parsed.user().clone(),
            })?;
        let nav = self.navigator();
        let chain = nav.descend(op, root_key, parsed)?;
        let parent = chain.parent();
        nav.fetch_entry(op, &parent.location.key, &parent.name, last)
    }

    fn parse(&self, op: &'static str, name: &str) -> Result<Parsed, DirError> {
        let parsed = path::parse(name)
            .and_then(|p| p.check_depth(self.config.max_path_elements).map(|()| p))
            .map_err(|source| DirError::MalformedPath {
                op,
                path: name.to_string(),
                source,
            })?;
        tracing::debug!(op, path = %parsed.path(), "request");
        Ok(parsed)
    }

    fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self.store.as_ref(), &self.ctx)
    }

    fn mutator(&self) -> TreeMutator<'_> {
        TreeMutator::new(self.store.as_ref(), &self.ctx)
    }

    fn read_roots(&self, op: &'static str) -> Result<RwLockReadGuard<'_, RootTable>, DirError> {
        self.roots
            .read()
            .map_err(|e| DirError::internal(op, "", format!("root table lock poisoned: {e}")))
    }

    fn write_roots(&self, op: &'static str) -> Result<RwLockWriteGuard<'_, RootTable>, DirError> {
        self.roots
            .write()
            .map_err(|e| DirError::internal(op, "", format!("root table lock poisoned: {e}")))
    }
}

fn dir_metadata(size: u64) -> Metadata {
    Metadata {
        is_dir: true,
        sequence: 0,
        size,
        time: Timestamp::now(),
        pack_descriptor: DIR_PACKING.descriptor(),
    }
}
