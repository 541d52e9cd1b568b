//! Bucket names and htlc key layout of the payments hierarchy.

use std::collections::HashSet;

use crate::error::{RepairError, Result};
use crate::kvdb::{display_key, ReadBucket};

/// Top-level bucket holding one sub-bucket per payment hash.
pub const PAYMENTS_ROOT_BUCKET: &[u8] = b"payments-root-bucket";

/// Bucket inside a payment that holds its htlc attempts.
pub const PAYMENT_HTLCS_BUCKET: &[u8] = b"payment-htlcs-bucket";

pub const HTLC_ATTEMPT_INFO_KEY: &[u8] = b"ai";
pub const HTLC_SETTLE_INFO_KEY: &[u8] = b"si";
pub const HTLC_FAIL_INFO_KEY: &[u8] = b"fi";

/// All three tags share this length.
pub const HTLC_KEY_TAG_LEN: usize = 2;

/// Htlc keys are the tag followed by the attempt id.
pub fn htlc_bucket_key(prefix: &[u8], attempt_id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + attempt_id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(attempt_id);
    key
}

pub fn attempt_id_from_htlc_key(key: &[u8]) -> Result<&[u8]> {
    key.get(HTLC_KEY_TAG_LEN..)
        .ok_or_else(|| RepairError::MalformedHtlcKey(display_key(key)))
}

/// Distinct attempt ids of an htlcs bucket.
///
/// Ids are materialised before the caller acts on them so no cursor over
/// `htlcs` is open while it gets mutated.
pub fn collect_attempt_ids<B: ReadBucket>(htlcs: &B) -> Result<HashSet<Vec<u8>>> {
    let mut aids = HashSet::new();
    htlcs.for_each(|key, _| -> Result<()> {
        aids.insert(attempt_id_from_htlc_key(key)?.to_vec());
        Ok(())
    })?;
    Ok(aids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvdb::{MemoryDb, Node, RwTx, Tree};

    #[test]
    fn test_htlc_bucket_key() {
        let aid = 7u64.to_be_bytes();
        let key = htlc_bucket_key(HTLC_SETTLE_INFO_KEY, &aid);
        assert_eq!(&key[..2], b"si");
        assert_eq!(attempt_id_from_htlc_key(&key).unwrap(), &aid[..]);
    }

    #[test]
    fn test_short_key_is_malformed() {
        assert!(matches!(
            attempt_id_from_htlc_key(b"a"),
            Err(RepairError::MalformedHtlcKey(_))
        ));
        assert_eq!(attempt_id_from_htlc_key(b"ai").unwrap(), b"");
    }

    #[test]
    fn test_collect_attempt_ids_deduplicates() {
        let mut tree = Tree::new();
        tree.insert(
            b"htlcs".to_vec(),
            Node::bucket([
                ("ai01", Node::value("a")),
                ("si01", Node::value("s")),
                ("fi01", Node::value("f")),
                ("ai02", Node::value("a")),
                ("fi03", Node::empty_bucket()),
            ]),
        );
        let db = MemoryDb::from_tree(tree);

        let aids = db.view(|tx| {
            let htlcs = tx.read_write_bucket(b"htlcs").unwrap().unwrap();
            collect_attempt_ids(&htlcs).unwrap()
        });
        let expected: HashSet<Vec<u8>> = [b"01".to_vec(), b"02".to_vec(), b"03".to_vec()]
            .into_iter()
            .collect();
        assert_eq!(aids, expected);
    }
}
