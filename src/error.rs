use std::fmt;

use thiserror::Error;

/// What a key was expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Bucket,
    Value,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Bucket => write!(f, "bucket"),
            EntryKind::Value => write!(f, "value, not a bucket"),
        }
    }
}

/// Failures reported by the key-value engine itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),
    #[error("Cursor active on bucket '{0}', mutation refused")]
    CursorActive(String),
    #[error("Incompatible value at key '{0}'")]
    IncompatibleValue(String),
    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Structural corruption: key '{key}' in '{bucket}' must be a {expected}")]
    StructuralCorruption {
        key: String,
        bucket: String,
        expected: EntryKind,
    },
    #[error("Malformed htlc key '{0}': shorter than its tag")]
    MalformedHtlcKey(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl RepairError {
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            RepairError::StructuralCorruption { .. } | RepairError::MalformedHtlcKey(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RepairError>;
