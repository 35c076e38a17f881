//! Core types for the directory service: names, keys, locations, entries and errors.

use serde::{Deserialize, Serialize};
use std::fmt;

use cowtree_pack::PackError;

use crate::blobstore::StoreError;
use crate::path::PathError;

/// The owner of one tree, e.g. `alice@example.com`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserName(String);

impl UserName {
    /// Creates a UserName from its string form
    pub fn new(name: impl Into<String>) -> Self {
        UserName(name.into())
    }

    /// Returns the user name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque key handed out by the blob store for one stored blob
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobKey(String);

impl BlobKey {
    /// Creates a BlobKey from its string form
    pub fn new(key: impl Into<String>) -> Self {
        BlobKey(key.into())
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a blob store is reached
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// The store lives in this address space
    InProcess,
    /// The store is reached over the network at `Endpoint::addr`
    Remote,
}

/// Network identity of a blob store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Transport used to reach the store
    pub transport: Transport,
    /// Address of the store; empty for in-process stores
    pub addr: String,
}

impl Endpoint {
    /// Endpoint of a store living in this process
    pub fn in_process() -> Self {
        Self {
            transport: Transport::InProcess,
            addr: String::new(),
        }
    }
}

/// Where a blob lives: the store endpoint and the key within that store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Store holding the blob
    pub endpoint: Endpoint,
    /// Key of the blob in that store
    pub key: BlobKey,
}

/// Represents a point in time with second and nanosecond precision
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since Unix epoch
    pub secs: u64,
    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    /// Returns the current timestamp
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: now.as_secs(),
            nanos: now.subsec_nanos(),
        }
    }

    /// Timestamp at a whole number of seconds since the epoch
    pub fn from_secs(secs: u64) -> Self {
        Self { secs, nanos: 0 }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.secs
            .cmp(&other.secs)
            .then_with(|| self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Attributes of the content a directory entry points at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// True if the location holds a directory payload rather than user data
    pub is_dir: bool,
    /// Bumped on every overwrite of this name; 0 on first creation
    pub sequence: u64,
    /// Cleartext size of the content in bytes
    pub size: u64,
    /// Modification time supplied by the writer
    pub time: Timestamp,
    /// Descriptor of the packing the content was stored with
    pub pack_descriptor: u8,
}

/// One child record of a directory, and the result of a lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Full canonical path of the entry, e.g. `alice@x/docs/a.txt`
    pub name: String,
    /// Where the content lives
    pub location: Location,
    /// Attributes of the content
    pub metadata: Metadata,
}

impl DirEntry {
    /// Returns true if this entry names a directory
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir
    }

    /// Returns the entry's sequence number
    pub fn sequence(&self) -> u64 {
        self.metadata.sequence
    }
}

/// Caller overrides for `put`. Unset fields take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Sequence the existing entry must carry for the overwrite to proceed
    pub sequence: Option<u64>,
    /// Size to record instead of the cleartext length
    pub size: Option<u64>,
    /// Time to record instead of now
    pub time: Option<Timestamp>,
}

impl PutOptions {
    /// Guard the write: it only succeeds if the current entry has this sequence
    pub fn expect_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Record `size` instead of the cleartext length
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Record `time` instead of the current time
    pub fn with_time(mut self, time: Timestamp) -> Self {
        self.time = Some(time);
        self
    }
}

/// Error types for directory service operations
#[derive(Debug, thiserror::Error)]
pub enum DirError {
    /// The path does not parse.
    #[error("{op} {path}: malformed path: {source}")]
    MalformedPath {
        /// Operation that failed
        op: &'static str,
        /// Path as supplied by the caller
        path: String,
        /// Parse failure
        #[source]
        source: PathError,
    },

    /// A glob element is not a valid wildcard pattern.
    #[error("{op} {pattern}: malformed pattern: {reason}")]
    MalformedPattern {
        /// Operation that failed
        op: &'static str,
        /// Pattern as supplied by the caller
        pattern: String,
        /// Why the pattern was rejected
        reason: String,
    },

    /// A directory payload holds bytes that do not decode as an entry.
    #[error("{path}: malformed directory entry: {reason}")]
    MalformedEntry {
        /// Directory whose payload failed to decode
        path: String,
        /// Decoder message
        reason: String,
    },

    /// The user has no root.
    #[error("{op} {user}: no such user")]
    NoSuchUser {
        /// Operation that failed
        op: &'static str,
        /// User without a root
        user: UserName,
    },

    /// A path element does not exist.
    #[error("{op} {path}: no such directory entry")]
    NotFound {
        /// Operation that failed
        op: &'static str,
        /// Path that does not exist
        path: String,
    },

    /// An intermediate path element exists but is not a directory.
    #[error("{op} {path}: not a directory")]
    NotADirectory {
        /// Operation that failed
        op: &'static str,
        /// Path of the non-directory element
        path: String,
    },

    /// The user's root already exists.
    #[error("{op} {path}: already exists")]
    AlreadyExists {
        /// Operation that failed
        op: &'static str,
        /// Root path
        path: String,
    },

    /// A write would replace a directory.
    #[error("{op} {path}: cannot overwrite directory")]
    CannotOverwriteDirectory {
        /// Operation that failed
        op: &'static str,
        /// Path of the directory
        path: String,
    },

    /// The entry's sequence differs from the one the caller expected.
    #[error("{op} {path}: sequence mismatch: expected {expected}, found {found}")]
    SequenceMismatch {
        /// Operation that failed
        op: &'static str,
        /// Path of the entry
        path: String,
        /// Sequence the caller expected
        expected: u64,
        /// Sequence currently stored
        found: u64,
    },

    /// `put` was asked to create a user root.
    #[error("Put {path}: cannot create root with Put; use MakeDirectory")]
    MustUseMakeDirectory {
        /// Root path
        path: String,
    },

    /// A single-entry read was asked for a directory.
    #[error("{op} {path}: cannot read a directory; use Glob")]
    UseGlobForDirectories {
        /// Operation that failed
        op: &'static str,
        /// Directory path
        path: String,
    },

    /// No codec is registered for the descriptor.
    #[error("{op} {path}: no packing {descriptor:#04x} registered")]
    NoSuchPackingCodec {
        /// Operation that failed
        op: &'static str,
        /// Path of the blob
        path: String,
        /// Unknown descriptor
        descriptor: u8,
    },

    /// The blob store failed.
    #[error("{op} {path}: {source}")]
    Store {
        /// Operation that failed
        op: &'static str,
        /// Path whose blob was being read or written
        path: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// A packing codec failed.
    #[error("{op} {path}: {source}")]
    Pack {
        /// Operation that failed
        op: &'static str,
        /// Path whose blob was being packed or unpacked
        path: String,
        /// Codec failure
        #[source]
        source: PackError,
    },

    /// Stored state contradicts what the tree implies.
    #[error("{op} {path}: internal error: {reason}")]
    InternalInconsistency {
        /// Operation that failed
        op: &'static str,
        /// Path being processed
        path: String,
        /// What was inconsistent
        reason: String,
    },
}

impl DirError {
    /// Wraps a blob store failure with operation context.
    pub fn store(op: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        DirError::Store {
            op,
            path: path.into(),
            source,
        }
    }

    /// Wraps a codec failure with operation context. Unknown descriptors become `NoSuchPackingCodec`.
    pub fn pack(op: &'static str, path: impl Into<String>, source: PackError) -> Self {
        match source {
            PackError::UnknownPacking(descriptor) => DirError::NoSuchPackingCodec {
                op,
                path: path.into(),
                descriptor,
            },
            source => DirError::Pack {
                op,
                path: path.into(),
                source,
            },
        }
    }

    /// Builds an `InternalInconsistency` error.
    pub fn internal(op: &'static str, path: impl Into<String>, reason: impl Into<String>) -> Self {
        DirError::InternalInconsistency {
            op,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let ts1 = Timestamp { secs: 100, nanos: 0 };
        let ts2 = Timestamp { secs: 100, nanos: 5 };
        let ts3 = Timestamp::from_secs(101);
        assert!(ts1 < ts2);
        assert!(ts2 < ts3);
        assert!(Timestamp::now().secs > 0);
    }

    #[test]
    fn test_put_options_builder() {
        let opts = PutOptions::default()
            .expect_sequence(4)
            .with_size(10)
            .with_time(Timestamp::from_secs(9));
        assert_eq!(opts.sequence, Some(4));
        assert_eq!(opts.size, Some(10));
        assert_eq!(opts.time, Some(Timestamp::from_secs(9)));
    }

    #[test]
    fn test_unknown_packing_maps_to_no_such_codec() {
        let err = DirError::pack("Get", "u@x/f", PackError::UnknownPacking(0x42));
        assert!(matches!(
            err,
            DirError::NoSuchPackingCodec { descriptor: 0x42, .. }
        ));
        let err = DirError::pack("Get", "u@x/f", PackError::DecryptionAuthFailed);
        assert!(matches!(err, DirError::Pack { .. }));
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = DirError::NotFound {
            op: "Lookup",
            path: "alice@x/a".into(),
        };
        assert_eq!(err.to_string(), "Lookup alice@x/a: no such directory entry");
        let err = DirError::NoSuchUser {
            op: "Put",
            user: UserName::new("bob@y"),
        };
        assert_eq!(err.to_string(), "Put bob@y: no such user");
    }

    #[test]
    fn test_display_newtypes() {
        assert_eq!(UserName::new("alice@x").to_string(), "alice@x");
        assert_eq!(BlobKey::new("abc").as_str(), "abc");
    }
}
