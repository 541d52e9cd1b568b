//! JSON snapshots of a bucket hierarchy.
//!
//! A bucket is a JSON object keyed by hex-encoded keys; a value is a hex
//! string. Used to dump a store, restore one for testing and check a store
//! against an expected state.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::{RepairError, Result};
use crate::kvdb::{display_key, Node, RwBucket, RwTx, Tree};

pub fn tree_to_json(tree: &Tree) -> Value {
    let map: Map<String, Value> = tree
        .iter()
        .map(|(key, node)| (hex::encode(key), node_to_json(node)))
        .collect();
    Value::Object(map)
}

fn node_to_json(node: &Node) -> Value {
    match node {
        Node::Value(v) => Value::String(hex::encode(v)),
        Node::Bucket(children) => tree_to_json(children),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| RepairError::Fixture(format!("invalid hex '{}': {}", s, e)))
}

pub fn tree_from_json(value: &Value) -> Result<Tree> {
    let Value::Object(map) = value else {
        return Err(RepairError::Fixture("bucket must be a JSON object".to_string()));
    };

    let mut tree = Tree::new();
    for (key, child) in map {
        let node = match child {
            Value::String(s) => Node::Value(decode_hex(s)?),
            Value::Object(_) => Node::Bucket(tree_from_json(child)?),
            other => {
                return Err(RepairError::Fixture(format!(
                    "entry '{}' must be a hex string or an object, got {}",
                    key, other
                )))
            }
        };
        tree.insert(decode_hex(key)?, node);
    }
    Ok(tree)
}

/// Writes every top-level bucket of `tree` into the transaction, merging with
/// what is already there.
pub fn restore<T: RwTx>(tx: &T, tree: &Tree) -> Result<()> {
    for (name, node) in tree {
        let Node::Bucket(children) = node else {
            return Err(RepairError::Fixture(format!(
                "top-level entry '{}' must be a bucket",
                display_key(name)
            )));
        };
        let bucket = tx.create_top_level_bucket(name)?;
        write_bucket(&bucket, children)?;
    }
    Ok(())
}

fn write_bucket<B: RwBucket>(bucket: &B, tree: &Tree) -> Result<()> {
    for (key, node) in tree {
        match node {
            Node::Value(v) => bucket.put(key, v)?,
            Node::Bucket(children) => {
                let child = bucket.create_bucket_if_not_exists(key)?;
                write_bucket(&child, children)?;
            }
        }
    }
    Ok(())
}

/// One line per path where `actual` deviates from `expected`.
pub fn diff(expected: &Tree, actual: &Tree) -> Vec<String> {
    let mut out = Vec::new();
    diff_into(expected, actual, "", &mut out);
    out
}

fn diff_into(expected: &Tree, actual: &Tree, prefix: &str, out: &mut Vec<String>) {
    let keys: BTreeSet<&Vec<u8>> = expected.keys().chain(actual.keys()).collect();
    for key in keys {
        let path = if prefix.is_empty() {
            display_key(key)
        } else {
            format!("{}/{}", prefix, display_key(key))
        };
        match (expected.get(key), actual.get(key)) {
            (Some(_), None) => out.push(format!("missing: {}", path)),
            (None, Some(_)) => out.push(format!("unexpected: {}", path)),
            (Some(Node::Bucket(e)), Some(Node::Bucket(a))) => diff_into(e, a, &path, out),
            (Some(Node::Value(e)), Some(Node::Value(a))) => {
                if e != a {
                    out.push(format!(
                        "value differs: {} (expected {}, found {})",
                        path,
                        hex::encode(e),
                        hex::encode(a)
                    ));
                }
            }
            (Some(_), Some(_)) => out.push(format!("kind differs: {}", path)),
            (None, None) => {}
        }
    }
}
