//! Directory entry encoding and payload packing.
//!
//! A directory payload is the plain concatenation of marshaled entries. Each
//! record is self-delimiting (bincode, fixed-width integers, length-prefixed
//! strings), so a payload is walked front to back with [`records`].

use std::ops::Range;

use cowtree_pack::{PackContext, Packing};

use crate::types::{DirEntry, DirError};

/// Packing used for every directory payload, whatever the files inside use.
pub const DIR_PACKING: Packing = Packing::Plain;

/// Encode one entry.
pub fn marshal(entry: &DirEntry) -> Result<Vec<u8>, DirError> {
    bincode::serialize(entry).map_err(|e| DirError::MalformedEntry {
        path: entry.name.clone(),
        reason: e.to_string(),
    })
}

/// Decode the entry at the front of `buf` and return it with the bytes that follow it.
pub fn unmarshal(buf: &[u8]) -> Result<(DirEntry, &[u8]), bincode::Error> {
    let entry: DirEntry = bincode::deserialize(buf)?;
    let consumed = bincode::serialized_size(&entry)? as usize;
    let rest = buf.get(consumed..).ok_or_else(|| {
        Box::new(bincode::ErrorKind::Custom(format!(
            "record claims {consumed} bytes of a {} byte buffer",
            buf.len()
        )))
    })?;
    Ok((entry, rest))
}

/// One decoded entry and the byte range it occupies in its payload.
#[derive(Clone, Debug)]
pub struct Record {
    /// The decoded entry
    pub entry: DirEntry,
    /// Where the entry's bytes sit in the payload
    pub span: Range<usize>,
}

/// Iterator over the records of a directory payload. Stops after the first decode error.
pub struct Records<'a> {
    payload: &'a [u8],
    offset: usize,
    dir: &'a str,
    failed: bool,
}

/// Walk the records of the payload of directory `dir`.
pub fn records<'a>(payload: &'a [u8], dir: &'a str) -> Records<'a> {
    Records {
        payload,
        offset: 0,
        dir,
        failed: false,
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record, DirError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.payload.len() {
            return None;
        }
        match unmarshal(&self.payload[self.offset..]) {
            Ok((entry, rest)) => {
                let end = self.payload.len() - rest.len();
                let span = self.offset..end;
                self.offset = end;
                Some(Ok(Record { entry, span }))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(DirError::MalformedEntry {
                    path: self.dir.to_string(),
                    reason: format!("at offset {}: {e}", self.offset),
                }))
            }
        }
    }
}

/// Decode every entry of a payload.
pub fn unmarshal_all(payload: &[u8], dir: &str) -> Result<Vec<DirEntry>, DirError> {
    records(payload, dir).map(|r| r.map(|r| r.entry)).collect()
}

/// Pack a directory payload with the directory packing.
pub fn pack_dir_payload(
    ctx: &PackContext,
    op: &'static str,
    cleartext: &[u8],
    dir: &str,
) -> Result<Vec<u8>, DirError> {
    pack_blob(ctx, op, DIR_PACKING, cleartext, dir)
}

/// Unpack a directory payload stored with the directory packing.
pub fn unpack_dir_payload(
    ctx: &PackContext,
    op: &'static str,
    ciphertext: &[u8],
    dir: &str,
) -> Result<Vec<u8>, DirError> {
    DIR_PACKING
        .unpack(ctx, ciphertext, dir)
        .map_err(|e| DirError::pack(op, dir, e))
}

/// Pack a blob with the caller's packing.
pub fn pack_blob(
    ctx: &PackContext,
    op: &'static str,
    packing: Packing,
    cleartext: &[u8],
    name: &str,
) -> Result<Vec<u8>, DirError> {
    packing
        .pack(ctx, cleartext, name)
        .map_err(|e| DirError::pack(op, name, e))
}

/// Unpack a blob whose entry records `descriptor` as its packing.
pub fn unpack_blob(
    ctx: &PackContext,
    op: &'static str,
    descriptor: u8,
    ciphertext: &[u8],
    name: &str,
) -> Result<Vec<u8>, DirError> {
    Packing::try_from(descriptor)
        .and_then(|packing| packing.unpack(ctx, ciphertext, name))
        .map_err(|e| DirError::pack(op, name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlobKey, Endpoint, Location, Metadata, Timestamp};
    use cowtree_pack::EncryptionKey;
    use proptest::prelude::*;

    fn entry(name: &str, seq: u64) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            location: Location {
                endpoint: Endpoint::in_process(),
                key: BlobKey::new(format!("key-{name}")),
            },
            metadata: Metadata {
                is_dir: false,
                sequence: seq,
                size: 42,
                time: Timestamp::from_secs(1_700_000_000),
                pack_descriptor: Packing::Lz4.descriptor(),
            },
        }
    }

    prop_compose! {
        fn arb_entry()(
            name in "[a-z]{1,8}@[a-z]{1,8}(/[a-zA-Z0-9._-]{1,12}){0,4}",
            key in "[0-9a-f]{0,64}",
            addr in ".{0,16}",
            is_dir in any::<bool>(),
            sequence in any::<u64>(),
            size in any::<u64>(),
            secs in any::<u64>(),
            nanos in 0u32..1_000_000_000,
            pack_descriptor in any::<u8>(),
        ) -> DirEntry {
            DirEntry {
                name,
                location: Location {
                    endpoint: Endpoint { transport: crate::types::Transport::Remote, addr },
                    key: BlobKey::new(key),
                },
                metadata: Metadata {
                    is_dir,
                    sequence,
                    size,
                    time: Timestamp { secs, nanos },
                    pack_descriptor,
                },
            }
        }
    }

    proptest! {
        #[test]
        fn prop_marshal_roundtrip(e in arb_entry(), trailer in prop::collection::vec(any::<u8>(), 0..32)) {
            let bytes = marshal(&e).unwrap();
            let mut buf = bytes.clone();
            buf.extend_from_slice(&trailer);
            let (decoded, rest) = unmarshal(&buf).unwrap();
            prop_assert_eq!(decoded, e);
            prop_assert_eq!(buf.len() - rest.len(), bytes.len());
            prop_assert_eq!(rest, &trailer[..]);
        }

        #[test]
        fn prop_truncated_record_fails(e in arb_entry(), cut in 0usize..1000) {
            let bytes = marshal(&e).unwrap();
            let cut = cut % bytes.len();
            prop_assert!(unmarshal(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn test_records_spans() {
        let a = marshal(&entry("u@x/a", 0)).unwrap();
        let b = marshal(&entry("u@x/bb", 3)).unwrap();
        let mut payload = a.clone();
        payload.extend_from_slice(&b);

        let recs: Vec<Record> = records(&payload, "u@x/").collect::<Result<_, _>>().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].span, 0..a.len());
        assert_eq!(recs[1].span, a.len()..a.len() + b.len());
        assert_eq!(recs[1].entry.metadata.sequence, 3);
    }

    #[test]
    fn test_records_stop_at_garbage() {
        let mut payload = marshal(&entry("u@x/a", 0)).unwrap();
        payload.extend_from_slice(&[0xff, 0xff, 0xff]);
        let results: Vec<_> = records(&payload, "u@x/").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(DirError::MalformedEntry { ref path, .. }) if path == "u@x/"
        ));
        assert!(unmarshal_all(&payload, "u@x/").is_err());
    }

    #[test]
    fn test_empty_payload_has_no_records() {
        assert!(unmarshal_all(&[], "u@x/").unwrap().is_empty());
        assert!(unmarshal(&[]).is_err());
    }

    #[test]
    fn test_dir_payload_pack_roundtrip() {
        let ctx = PackContext::new();
        let payload = marshal(&entry("u@x/a", 1)).unwrap();
        let packed = pack_dir_payload(&ctx, "Put", &payload, "u@x/").unwrap();
        let unpacked = unpack_dir_payload(&ctx, "Put", &packed, "u@x/").unwrap();
        assert_eq!(unpacked, payload);
    }

    #[test]
    fn test_blob_pack_uses_descriptor() {
        let ctx = PackContext::new().with_master_key(EncryptionKey([1u8; 32]));
        for packing in Packing::ALL {
            let packed = pack_blob(&ctx, "Put", packing, b"hello world", "u@x/f").unwrap();
            let unpacked =
                unpack_blob(&ctx, "Get", packing.descriptor(), &packed, "u@x/f").unwrap();
            assert_eq!(unpacked, b"hello world");
        }
    }

    #[test]
    fn test_unknown_descriptor() {
        let ctx = PackContext::new();
        assert!(matches!(
            unpack_blob(&ctx, "Get", 0xee, b"x", "u@x/f"),
            Err(DirError::NoSuchPackingCodec { descriptor: 0xee, .. })
        ));
    }
}
