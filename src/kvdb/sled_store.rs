//! Persistent bucket engine on top of sled.
//!
//! The whole hierarchy lives in one sled tree. Every node is keyed by its
//! bincode-encoded path and stores whether it is a bucket or a value.
//! Transactions run against an in-memory copy; on success the difference is
//! written back as a single atomic batch.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::memory::{bucket_at_mut, path_name, MemTx, Node, Tree};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum StoredEntry {
    Bucket,
    Value(Vec<u8>),
}

type FlatTree = BTreeMap<Vec<Vec<u8>>, StoredEntry>;

pub struct SledDb {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledDb {
    pub fn open(path: impl AsRef<Path>, tree_name: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::with_db(db, tree_name)
    }

    /// Throwaway database, removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, "kvdb")
    }

    fn with_db(db: sled::Db, tree_name: &str) -> Result<Self, StoreError> {
        let tree = db.open_tree(tree_name)?;
        Ok(SledDb { db, tree })
    }

    /// Current hierarchy.
    pub fn load(&self) -> Result<Tree, StoreError> {
        unflatten(&self.load_flat()?)
    }

    /// Runs `f` in a read-write transaction; nothing is written unless `f`
    /// returns `Ok`.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&MemTx) -> Result<T, E>,
    {
        let before = self.load_flat()?;
        let tx = MemTx::new(unflatten(&before)?);
        let out = f(&tx)?;

        let mut after = FlatTree::new();
        flatten(&tx.into_tree(), &mut Vec::new(), &mut after);
        self.write_diff(&before, &after)?;
        Ok(out)
    }

    /// Runs `f` in a transaction that is always discarded.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&MemTx) -> Result<T, E>,
    {
        let tx = MemTx::new(self.load()?);
        f(&tx)
    }

    fn load_flat(&self) -> Result<FlatTree, StoreError> {
        let mut flat = FlatTree::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            let path: Vec<Vec<u8>> = bincode::deserialize(&key)?;
            let entry: StoredEntry = bincode::deserialize(&value)?;
            flat.insert(path, entry);
        }
        Ok(flat)
    }

    fn write_diff(&self, before: &FlatTree, after: &FlatTree) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        let mut written = 0usize;

        for path in before.keys() {
            if !after.contains_key(path) {
                batch.remove(bincode::serialize(path)?);
                removed += 1;
            }
        }
        for (path, entry) in after {
            if before.get(path) != Some(entry) {
                batch.insert(bincode::serialize(path)?, bincode::serialize(entry)?);
                written += 1;
            }
        }

        if removed == 0 && written == 0 {
            return Ok(());
        }
        self.tree.apply_batch(batch)?;
        self.db.flush()?;
        debug!(removed, written, "Applied bucket store batch");
        Ok(())
    }
}

fn flatten(tree: &Tree, prefix: &mut Vec<Vec<u8>>, out: &mut FlatTree) {
    for (key, node) in tree {
        prefix.push(key.clone());
        match node {
            Node::Value(v) => {
                out.insert(prefix.clone(), StoredEntry::Value(v.clone()));
            }
            Node::Bucket(children) => {
                out.insert(prefix.clone(), StoredEntry::Bucket);
                flatten(children, prefix, out);
            }
        }
        prefix.pop();
    }
}

// Paths sort lexicographically, so a parent is always seen before its children.
fn unflatten(flat: &FlatTree) -> Result<Tree, StoreError> {
    let mut root = Tree::new();
    for (path, entry) in flat {
        let (last, parents) = path
            .split_last()
            .ok_or_else(|| StoreError::Corrupt("entry with empty path".to_string()))?;

        let node = match entry {
            StoredEntry::Bucket => Node::empty_bucket(),
            StoredEntry::Value(_) if parents.is_empty() => {
                return Err(StoreError::Corrupt(format!(
                    "top-level value '{}'",
                    path_name(path)
                )))
            }
            StoredEntry::Value(v) => Node::Value(v.clone()),
        };

        let parent = bucket_at_mut(&mut root, parents)
            .map_err(|_| StoreError::Corrupt(format!("orphaned entry '{}'", path_name(path))))?;
        parent.insert(last.clone(), node);
    }
    Ok(root)
}
