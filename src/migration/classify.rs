use crate::error::Result;
use crate::kvdb::ReadBucket;

use super::keys::{collect_attempt_ids, htlc_bucket_key, HTLC_SETTLE_INFO_KEY};
use super::validate::expect_value;

/// Whether any htlc of the payment carries non-empty settle info.
pub fn payment_is_settled<B: ReadBucket>(htlcs: &B) -> Result<bool> {
    let aids = collect_attempt_ids(htlcs)?;

    for aid in &aids {
        let settle_info_key = htlc_bucket_key(HTLC_SETTLE_INFO_KEY, aid);
        let settle_info = expect_value(htlcs, &settle_info_key)?;
        if settle_info.is_some_and(|info| !info.is_empty()) {
            return Ok(true);
        }
    }

    Ok(false)
}
