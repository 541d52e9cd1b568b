//! Nested bucket store.
//!
//! Buckets hold keys, and every key resolves either to a plain value or to a
//! nested bucket. The migration code only talks to the traits below; the
//! in-memory engine backs tests and transactions, the sled engine persists.

pub mod memory;
pub mod sled_store;

pub use memory::{MemBucket, MemTx, MemoryDb, Node, Tree};
pub use sled_store::SledDb;

use crate::error::StoreError;

/// Result of resolving a key inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<B> {
    Absent,
    Value(Vec<u8>),
    Bucket(B),
}

pub trait ReadBucket: Sized {
    /// Resolves `key` to exactly one of absent, value or nested bucket.
    fn lookup(&self, key: &[u8]) -> Result<Lookup<Self>, StoreError>;

    /// Enumerates direct entries in byte order. Nested buckets are passed
    /// with a `None` value.
    fn for_each<E, F>(&self, f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], Option<&[u8]>) -> Result<(), E>;

    /// Display name of this bucket, used in error messages.
    fn name(&self) -> String;

    /// Plain value stored under `key`; `None` when missing or a bucket.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.lookup(key)? {
            Lookup::Value(v) => Ok(Some(v)),
            Lookup::Absent | Lookup::Bucket(_) => Ok(None),
        }
    }

    /// Nested bucket stored under `key`; `None` when missing or a value.
    fn nested_bucket(&self, key: &[u8]) -> Result<Option<Self>, StoreError> {
        match self.lookup(key)? {
            Lookup::Bucket(b) => Ok(Some(b)),
            Lookup::Absent | Lookup::Value(_) => Ok(None),
        }
    }
}

pub trait RwBucket: ReadBucket {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Removes a plain value. Missing keys are ignored; nested buckets are
    /// refused with `IncompatibleValue`.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    fn create_bucket_if_not_exists(&self, key: &[u8]) -> Result<Self, StoreError>;
}

pub trait RwTx {
    type Bucket: RwBucket;

    /// Opens a top-level bucket, `None` if it does not exist.
    fn read_write_bucket(&self, name: &[u8]) -> Result<Option<Self::Bucket>, StoreError>;

    fn create_top_level_bucket(&self, name: &[u8]) -> Result<Self::Bucket, StoreError>;
}

/// Renders a key as text when it is printable ASCII, hex otherwise.
pub fn display_key(key: &[u8]) -> String {
    if !key.is_empty() && key.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(key).into_owned()
    } else {
        hex::encode(key)
    }
}
