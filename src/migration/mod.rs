//! Removes failed htlcs from settled payments.
//!
//! Payments live under `payments-root-bucket`, one sub-bucket per payment
//! hash. A payment's htlcs are stored in its `payment-htlcs-bucket` under
//! keys made of a two byte tag (`ai`, `si`, `fi`) and the attempt id. Once a
//! payment is settled its failed htlcs carry no information anymore, so their
//! records are dropped. Unsettled payments are left as they are.
//!
//! The whole pass runs inside the caller's transaction; any error means the
//! caller must discard it.

pub mod classify;
pub mod keys;
pub mod prune;
pub mod validate;

use tracing::{debug, info};

use crate::error::Result;
use crate::kvdb::{display_key, ReadBucket, RwTx};

pub use classify::payment_is_settled;
pub use keys::{PAYMENTS_ROOT_BUCKET, PAYMENT_HTLCS_BUCKET};
pub use prune::{delete_failed_htlcs, PruneOutcome};

/// Counters gathered during one migration pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    pub payments: usize,
    pub without_htlcs: usize,
    pub settled: usize,
    pub attempts_pruned: usize,
    pub keys_deleted: usize,
}

/// Deletes failed htlcs from all settled payments.
pub fn migrate_payments<T: RwTx>(tx: &T) -> Result<MigrationStats> {
    let mut stats = MigrationStats::default();

    let Some(payments) = tx.read_write_bucket(PAYMENTS_ROOT_BUCKET)? else {
        info!("No payments bucket found, nothing to migrate");
        return Ok(stats);
    };

    payments.for_each(|hash, _| -> Result<()> {
        stats.payments += 1;

        let payment = validate::expect_bucket(&payments, hash)?;
        let Some(htlcs) = validate::expect_optional_bucket(&payment, PAYMENT_HTLCS_BUCKET)? else {
            stats.without_htlcs += 1;
            return Ok(());
        };

        if !payment_is_settled(&htlcs)? {
            debug!(payment = %display_key(hash), "Payment not settled, leaving htlcs untouched");
            return Ok(());
        }
        stats.settled += 1;

        let outcome = delete_failed_htlcs(&htlcs)?;
        if !outcome.attempt_ids.is_empty() {
            debug!(
                payment = %display_key(hash),
                pruned = outcome.attempt_ids.len(),
                "Pruned failed htlcs of settled payment"
            );
        }
        stats.attempts_pruned += outcome.attempt_ids.len();
        stats.keys_deleted += outcome.keys_deleted;
        Ok(())
    })?;

    info!(
        payments = stats.payments,
        settled = stats.settled,
        attempts_pruned = stats.attempts_pruned,
        keys_deleted = stats.keys_deleted,
        "Payments migration complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EntryKind, RepairError};
    use crate::kvdb::{MemoryDb, Node, Tree};

    const HASH1: &str = "02acee76ebd53d00824410cf6adecad4f50334dac702bd5a2d3ba01b91709f0e";
    const HASH2: &str = "62eb3f0a48f954e495d0c14ac63df04a67cefa59dafdbcd3d5046d1f5647840c";
    const HASH3: &str = "99eb3f0a48f954e495d0c14ac63df04af8cefa59dafdbcd3d5046d1f564784d1";
    const HASH4: &str = "e312b334ac65ccf950d2411a04f43d7de7143685d87fbf270403433adf2b4961";

    fn hash(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn htlc(tag: &str, attempt: u64) -> Vec<u8> {
        keys::htlc_bucket_key(tag.as_bytes(), &attempt.to_be_bytes())
    }

    fn payments(entries: Vec<(Vec<u8>, Node)>) -> Tree {
        let mut tree = Tree::new();
        tree.insert(PAYMENTS_ROOT_BUCKET.to_vec(), Node::bucket(entries));
        tree
    }

    fn payment(htlcs: Option<Node>, sequence: u64) -> Node {
        let mut entries = vec![
            (b"payment-creation-info".to_vec(), Node::value("aaaa")),
            (b"payment-sequence-key".to_vec(), Node::value(sequence.to_be_bytes())),
        ];
        if let Some(htlcs) = htlcs {
            entries.push((PAYMENT_HTLCS_BUCKET.to_vec(), htlcs));
        }
        Node::bucket(entries)
    }

    fn pre() -> Tree {
        payments(vec![
            (
                hash(HASH1),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 1), Node::value("cccc")),
                        (htlc("fi", 1), Node::value("dddd")),
                    ])),
                    1,
                ),
            ),
            (
                hash(HASH2),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 2), Node::value("ffff")),
                        (htlc("fi", 2), Node::value("gggg")),
                        (htlc("ai", 3), Node::value("hhhh")),
                        (htlc("si", 3), Node::value("iiii")),
                    ])),
                    2,
                ),
            ),
            (hash(HASH3), payment(None, 1)),
            (
                hash(HASH4),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 1), Node::value("eeee")),
                        (htlc("si", 1), Node::value("ffff")),
                        (htlc("fi", 1), Node::value("gggg")),
                    ])),
                    2,
                ),
            ),
        ])
    }

    fn post() -> Tree {
        payments(vec![
            (
                hash(HASH1),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 1), Node::value("cccc")),
                        (htlc("fi", 1), Node::value("dddd")),
                    ])),
                    1,
                ),
            ),
            (
                hash(HASH2),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 3), Node::value("hhhh")),
                        (htlc("si", 3), Node::value("iiii")),
                    ])),
                    2,
                ),
            ),
            (hash(HASH3), payment(None, 1)),
            (hash(HASH4), payment(Some(Node::empty_bucket()), 2)),
        ])
    }

    fn run(db: &MemoryDb) -> Result<MigrationStats> {
        db.update(|tx| migrate_payments(tx))
    }

    fn assert_fails_unchanged(pre: Tree) -> RepairError {
        let db = MemoryDb::from_tree(pre.clone());
        let err = run(&db).unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {err}");
        assert_eq!(db.snapshot(), pre);
        err
    }

    #[test]
    fn test_migration_scenario() {
        let db = MemoryDb::from_tree(pre());
        let stats = run(&db).unwrap();

        assert_eq!(db.snapshot(), post());
        assert_eq!(
            stats,
            MigrationStats {
                payments: 4,
                without_htlcs: 1,
                settled: 2,
                attempts_pruned: 2,
                keys_deleted: 5,
            }
        );
    }

    #[test]
    fn test_migration_is_idempotent() {
        let db = MemoryDb::from_tree(pre());
        run(&db).unwrap();
        let once = db.snapshot();

        let stats = run(&db).unwrap();
        assert_eq!(db.snapshot(), once);
        assert_eq!(stats.attempts_pruned, 0);
        assert_eq!(stats.keys_deleted, 0);
    }

    #[test]
    fn test_missing_root_bucket_is_noop() {
        let db = MemoryDb::new();
        assert_eq!(run(&db).unwrap(), MigrationStats::default());
        assert!(db.snapshot().is_empty());

        let db = MemoryDb::from_tree(payments(vec![]));
        assert_eq!(run(&db).unwrap().payments, 0);
    }

    #[test]
    fn test_unsettled_payments_untouched() {
        let tree = payments(vec![(
            hash(HASH1),
            payment(
                Some(Node::bucket([
                    (htlc("ai", 1), Node::value("a")),
                    (htlc("fi", 1), Node::value("f")),
                    (htlc("ai", 2), Node::value("a")),
                    (htlc("si", 2), Node::value("")),
                    (htlc("fi", 2), Node::value("f")),
                ])),
                1,
            ),
        )]);
        let db = MemoryDb::from_tree(tree.clone());
        let stats = run(&db).unwrap();
        assert_eq!(stats.settled, 0);
        assert_eq!(db.snapshot(), tree);
    }

    #[test]
    fn test_scalar_payment_fails() {
        let err = assert_fails_unchanged(payments(vec![(hash(HASH1), Node::value("bogus"))]));
        match err {
            RepairError::StructuralCorruption { key, bucket, expected } => {
                assert_eq!(key, HASH1);
                assert_eq!(bucket, "payments-root-bucket");
                assert_eq!(expected, EntryKind::Bucket);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scalar_htlcs_bucket_fails() {
        let err = assert_fails_unchanged(payments(vec![(
            hash(HASH1),
            Node::bucket([(PAYMENT_HTLCS_BUCKET, Node::value("bogus"))]),
        )]));
        assert!(matches!(
            err,
            RepairError::StructuralCorruption { ref key, .. } if key == "payment-htlcs-bucket"
        ));
    }

    #[test]
    fn test_bucket_attempt_info_fails() {
        assert_fails_unchanged(payments(vec![(
            hash(HASH1),
            payment(
                Some(Node::bucket([
                    (htlc("ai", 2), Node::empty_bucket()),
                    (htlc("si", 2), Node::value("cccc")),
                    (htlc("fi", 2), Node::value("dddd")),
                ])),
                1,
            ),
        )]));
    }

    #[test]
    fn test_bucket_settle_info_fails() {
        assert_fails_unchanged(payments(vec![(
            hash(HASH1),
            payment(
                Some(Node::bucket([
                    (htlc("ai", 1), Node::value("cccc")),
                    (htlc("si", 1), Node::empty_bucket()),
                    (htlc("fi", 2), Node::value("dddd")),
                ])),
                1,
            ),
        )]));
    }

    #[test]
    fn test_bucket_fail_info_fails() {
        assert_fails_unchanged(payments(vec![(
            hash(HASH1),
            payment(
                Some(Node::bucket([
                    (htlc("ai", 1), Node::value("cccc")),
                    (htlc("si", 1), Node::value("dddd")),
                    (htlc("fi", 2), Node::empty_bucket()),
                ])),
                1,
            ),
        )]));
    }

    #[test]
    fn test_corruption_after_pruning_rolls_back() {
        // HASH2 is pruned before HASH4 fails; the earlier delete must not survive.
        let tree = payments(vec![
            (
                hash(HASH2),
                payment(
                    Some(Node::bucket([
                        (htlc("ai", 2), Node::value("ffff")),
                        (htlc("fi", 2), Node::value("gggg")),
                        (htlc("si", 3), Node::value("iiii")),
                    ])),
                    2,
                ),
            ),
            (hash(HASH4), Node::value("bogus")),
        ]);
        assert_fails_unchanged(tree);
    }

    #[test]
    fn test_short_htlc_key_fails() {
        let err = assert_fails_unchanged(payments(vec![(
            hash(HASH1),
            payment(Some(Node::bucket([("s", Node::value("x"))])), 1),
        )]));
        assert!(matches!(err, RepairError::MalformedHtlcKey(_)));
    }
}
