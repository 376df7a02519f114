//! Lease expiry.
//!
//! A record is dead once `expires < now`. Dead records are never handed back to a
//! caller and are deleted by whichever call path notices them; there is no background
//! reaper. Deletion here is best-effort: a failure is logged and swallowed because the
//! record is re-evaluated on its next lookup anyway.

use time::OffsetDateTime;

use crate::record::SessionRecord;
use crate::store::{DocumentStore, RecordFilter};

/// Whether `record` is past its lease at `now`.
///
/// All timestamps are UTC, so this is a plain instant comparison.
pub fn is_expired(record: &SessionRecord, now: OffsetDateTime) -> bool {
    record.expires < now
}

/// Removes stale records for one application scope.
pub struct ExpiryPolicy<'a, S: ?Sized> {
    store: &'a S,
    application_name: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> ExpiryPolicy<'a, S> {
    /// Scopes deletions to `application_name` on `store`.
    pub fn new(store: &'a S, application_name: &'a str) -> Self {
        Self {
            store,
            application_name,
        }
    }

    /// Deletes `id` if it is still expired at `now`.
    ///
    /// Returns the number of records removed; store failures count as zero.
    pub async fn discard_expired(&self, id: &str, now: OffsetDateTime) -> u64 {
        let filter = RecordFilter::by_key(id, self.application_name).expires_before(now);
        match self.store.delete(&filter).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(session_id = %id, "deleted expired session");
                }
                removed
            }
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "failed to delete expired session");
                0
            }
        }
    }
}
