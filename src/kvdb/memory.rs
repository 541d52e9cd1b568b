//! In-memory bucket engine.
//!
//! A transaction works on a private copy of the hierarchy. Bucket handles are
//! paths into that copy, so a handle can outlive the bucket it names; such
//! handles fail with `BucketNotFound` instead of observing stale data.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{display_key, Lookup, ReadBucket, RwBucket, RwTx};
use crate::error::StoreError;

pub type Tree = BTreeMap<Vec<u8>, Node>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Value(Vec<u8>),
    Bucket(Tree),
}

impl Node {
    pub fn value(v: impl AsRef<[u8]>) -> Self {
        Node::Value(v.as_ref().to_vec())
    }

    pub fn bucket<K, I>(entries: I) -> Self
    where
        K: AsRef<[u8]>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Bucket(
            entries
                .into_iter()
                .map(|(k, n)| (k.as_ref().to_vec(), n))
                .collect(),
        )
    }

    pub fn empty_bucket() -> Self {
        Node::Bucket(Tree::new())
    }

    pub fn as_bucket(&self) -> Option<&Tree> {
        match self {
            Node::Bucket(tree) => Some(tree),
            Node::Value(_) => None,
        }
    }
}

pub(crate) fn path_name(path: &[Vec<u8>]) -> String {
    path.iter()
        .map(|p| display_key(p))
        .collect::<Vec<_>>()
        .join("/")
}

fn bucket_at<'a>(root: &'a Tree, path: &[Vec<u8>]) -> Result<&'a Tree, StoreError> {
    let mut current = root;
    for component in path {
        current = match current.get(component) {
            Some(Node::Bucket(tree)) => tree,
            _ => return Err(StoreError::BucketNotFound(path_name(path))),
        };
    }
    Ok(current)
}

pub(super) fn bucket_at_mut<'a>(root: &'a mut Tree, path: &[Vec<u8>]) -> Result<&'a mut Tree, StoreError> {
    let mut current = root;
    for component in path {
        current = match current.get_mut(component) {
            Some(Node::Bucket(tree)) => tree,
            _ => return Err(StoreError::BucketNotFound(path_name(path))),
        };
    }
    Ok(current)
}

struct TxState {
    root: Tree,
    // Paths of buckets with an enumeration in progress.
    cursors: Vec<Vec<Vec<u8>>>,
}

/// Read-write transaction over a private copy of the hierarchy.
pub struct MemTx {
    state: Rc<RefCell<TxState>>,
}

impl MemTx {
    pub fn new(root: Tree) -> Self {
        Self {
            state: Rc::new(RefCell::new(TxState {
                root,
                cursors: Vec::new(),
            })),
        }
    }

    /// Copy of the hierarchy as seen by this transaction.
    pub fn snapshot(&self) -> Tree {
        self.state.borrow().root.clone()
    }

    pub(crate) fn into_tree(self) -> Tree {
        let tree = std::mem::take(&mut self.state.borrow_mut().root);
        tree
    }
}

impl RwTx for MemTx {
    type Bucket = MemBucket;

    fn read_write_bucket(&self, name: &[u8]) -> Result<Option<MemBucket>, StoreError> {
        let state = self.state.borrow();
        match state.root.get(name) {
            Some(Node::Bucket(_)) => Ok(Some(MemBucket {
                state: Rc::clone(&self.state),
                path: vec![name.to_vec()],
            })),
            _ => Ok(None),
        }
    }

    fn create_top_level_bucket(&self, name: &[u8]) -> Result<MemBucket, StoreError> {
        let mut state = self.state.borrow_mut();
        let node = state
            .root
            .entry(name.to_vec())
            .or_insert_with(Node::empty_bucket);
        if let Node::Value(_) = node {
            return Err(StoreError::IncompatibleValue(display_key(name)));
        }
        Ok(MemBucket {
            state: Rc::clone(&self.state),
            path: vec![name.to_vec()],
        })
    }
}

/// Handle to one bucket inside a `MemTx`.
#[derive(Clone)]
pub struct MemBucket {
    state: Rc<RefCell<TxState>>,
    path: Vec<Vec<u8>>,
}

impl std::fmt::Debug for MemBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBucket")
            .field("path", &path_name(&self.path))
            .finish()
    }
}

impl MemBucket {
    fn child(&self, key: &[u8]) -> MemBucket {
        let mut path = self.path.clone();
        path.push(key.to_vec());
        MemBucket {
            state: Rc::clone(&self.state),
            path,
        }
    }

    fn check_writable(&self, state: &TxState) -> Result<(), StoreError> {
        if state.cursors.iter().any(|c| *c == self.path) {
            return Err(StoreError::CursorActive(path_name(&self.path)));
        }
        Ok(())
    }
}

struct CursorGuard<'a> {
    state: &'a RefCell<TxState>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.cursors.pop();
        }
    }
}

impl ReadBucket for MemBucket {
    fn lookup(&self, key: &[u8]) -> Result<Lookup<Self>, StoreError> {
        let state = self.state.borrow();
        let tree = bucket_at(&state.root, &self.path)?;
        Ok(match tree.get(key) {
            None => Lookup::Absent,
            Some(Node::Value(v)) => Lookup::Value(v.clone()),
            Some(Node::Bucket(_)) => Lookup::Bucket(self.child(key)),
        })
    }

    fn for_each<E, F>(&self, mut f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&[u8], Option<&[u8]>) -> Result<(), E>,
    {
        let entries: Vec<(Vec<u8>, Option<Vec<u8>>)> = {
            let state = self.state.borrow();
            let tree = bucket_at(&state.root, &self.path)?;
            let entries = tree
                .iter()
                .map(|(k, node)| match node {
                    Node::Value(v) => (k.clone(), Some(v.clone())),
                    Node::Bucket(_) => (k.clone(), None),
                })
                .collect();
            entries
        };

        self.state.borrow_mut().cursors.push(self.path.clone());
        let _guard = CursorGuard { state: &self.state };

        for (key, value) in &entries {
            f(key, value.as_deref())?;
        }
        Ok(())
    }

    fn name(&self) -> String {
        path_name(&self.path)
    }
}

impl RwBucket for MemBucket {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        self.check_writable(&state)?;
        let tree = bucket_at_mut(&mut state.root, &self.path)?;
        if let Some(Node::Bucket(_)) = tree.get(key) {
            return Err(StoreError::IncompatibleValue(display_key(key)));
        }
        tree.insert(key.to_vec(), Node::Value(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        self.check_writable(&state)?;
        let tree = bucket_at_mut(&mut state.root, &self.path)?;
        match tree.get(key) {
            Some(Node::Bucket(_)) => Err(StoreError::IncompatibleValue(display_key(key))),
            Some(Node::Value(_)) => {
                tree.remove(key);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn create_bucket_if_not_exists(&self, key: &[u8]) -> Result<Self, StoreError> {
        let mut state = self.state.borrow_mut();
        self.check_writable(&state)?;
        let tree = bucket_at_mut(&mut state.root, &self.path)?;
        match tree.get(key) {
            Some(Node::Value(_)) => return Err(StoreError::IncompatibleValue(display_key(key))),
            Some(Node::Bucket(_)) => {}
            None => {
                tree.insert(key.to_vec(), Node::empty_bucket());
            }
        }
        Ok(self.child(key))
    }
}

/// Bucket store held entirely in memory.
#[derive(Default)]
pub struct MemoryDb {
    root: Mutex<Tree>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: Tree) -> Self {
        Self {
            root: Mutex::new(tree),
        }
    }

    pub fn snapshot(&self) -> Tree {
        self.lock().clone()
    }

    /// Runs `f` in a read-write transaction. Changes become visible only if
    /// `f` returns `Ok`.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&MemTx) -> Result<T, E>,
    {
        let mut root = self.lock();
        let tx = MemTx::new(root.clone());
        let out = f(&tx)?;
        *root = tx.into_tree();
        Ok(out)
    }

    /// Runs `f` in a transaction that is always discarded.
    pub fn view<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&MemTx) -> T,
    {
        let tx = MemTx::new(self.snapshot());
        f(&tx)
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
