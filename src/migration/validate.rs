//! Shape checks run while walking the payments hierarchy.
//!
//! None of these mutate anything; each fails on the first key of the wrong
//! kind.

use crate::error::{EntryKind, RepairError, Result};
use crate::kvdb::{display_key, Lookup, ReadBucket};

fn corruption<B: ReadBucket>(parent: &B, key: &[u8], expected: EntryKind) -> RepairError {
    RepairError::StructuralCorruption {
        key: display_key(key),
        bucket: parent.name(),
        expected,
    }
}

/// `key` must resolve to a nested bucket.
pub fn expect_bucket<B: ReadBucket>(parent: &B, key: &[u8]) -> Result<B> {
    match parent.lookup(key)? {
        Lookup::Bucket(bucket) => Ok(bucket),
        Lookup::Absent | Lookup::Value(_) => Err(corruption(parent, key, EntryKind::Bucket)),
    }
}

/// `key` may be missing, but if present it must be a nested bucket.
pub fn expect_optional_bucket<B: ReadBucket>(parent: &B, key: &[u8]) -> Result<Option<B>> {
    match parent.lookup(key)? {
        Lookup::Absent => Ok(None),
        Lookup::Bucket(bucket) => Ok(Some(bucket)),
        Lookup::Value(_) => Err(corruption(parent, key, EntryKind::Bucket)),
    }
}

/// `key` must not resolve to a nested bucket.
pub fn expect_not_bucket<B: ReadBucket>(parent: &B, key: &[u8]) -> Result<()> {
    expect_value(parent, key).map(|_| ())
}

/// Value under `key`, `None` when missing. A nested bucket is corruption.
pub fn expect_value<B: ReadBucket>(parent: &B, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match parent.lookup(key)? {
        Lookup::Absent => Ok(None),
        Lookup::Value(v) => Ok(Some(v)),
        Lookup::Bucket(_) => Err(corruption(parent, key, EntryKind::Value)),
    }
}
