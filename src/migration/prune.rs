use tracing::debug;

use crate::error::Result;
use crate::kvdb::{display_key, RwBucket};

use super::keys::{
    collect_attempt_ids, htlc_bucket_key, HTLC_ATTEMPT_INFO_KEY, HTLC_FAIL_INFO_KEY,
    HTLC_SETTLE_INFO_KEY,
};
use super::validate::expect_value;

/// What `delete_failed_htlcs` removed from one htlcs bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Attempt ids whose records were removed, sorted.
    pub attempt_ids: Vec<Vec<u8>>,
    /// Keys that existed and were deleted.
    pub keys_deleted: usize,
}

/// Removes the attempt, settle and fail info of every htlc with non-empty
/// fail info.
///
/// Only meant for settled payments. The fail info alone decides: an htlc
/// that also carries settle info is removed all the same.
pub fn delete_failed_htlcs<B: RwBucket>(htlcs: &B) -> Result<PruneOutcome> {
    let aids = collect_attempt_ids(htlcs)?;
    let mut outcome = PruneOutcome::default();

    for aid in aids {
        let fail_info_key = htlc_bucket_key(HTLC_FAIL_INFO_KEY, &aid);
        let attempt_info_key = htlc_bucket_key(HTLC_ATTEMPT_INFO_KEY, &aid);
        let settle_info_key = htlc_bucket_key(HTLC_SETTLE_INFO_KEY, &aid);

        let fail_info = expect_value(htlcs, &fail_info_key)?;
        let attempt_info = expect_value(htlcs, &attempt_info_key)?;
        let settle_info = expect_value(htlcs, &settle_info_key)?;

        if !fail_info.as_ref().is_some_and(|info| !info.is_empty()) {
            continue;
        }

        htlcs.delete(&fail_info_key)?;
        htlcs.delete(&attempt_info_key)?;
        htlcs.delete(&settle_info_key)?;

        outcome.keys_deleted += 1
            + usize::from(attempt_info.is_some())
            + usize::from(settle_info.is_some());
        debug!(
            bucket = %htlcs.name(),
            attempt_id = %display_key(&aid),
            "Deleted failed htlc"
        );
        outcome.attempt_ids.push(aid);
    }

    outcome.attempt_ids.sort();
    Ok(outcome)
}
