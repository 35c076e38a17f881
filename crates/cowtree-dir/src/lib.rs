#![warn(missing_docs)]

//! cowtree directory subsystem: per-user copy-on-write trees over a content-addressed blob store
//!
//! Write path:  DirService → TreeMutator (install + propagate) → BlobStore → RootTable commit
//! Read path:   DirService → Navigator (descend) → BlobStore → unpack → DirEntry

pub mod blobstore;
pub mod config;
pub mod entry;
pub mod glob;
pub mod mutator;
pub mod navigator;
pub mod path;
pub mod roots;
pub mod service;
pub mod types;

pub use blobstore::{BlobStore, MemoryBlobStore, StoreError};
pub use config::DirServiceConfig;
pub use path::PathError;
pub use service::DirService;
pub use types::{
    BlobKey, DirEntry, DirError, Endpoint, Location, Metadata, PutOptions, Timestamp, Transport,
    UserName,
};

pub use cowtree_pack::{EncryptionKey, Packing};
