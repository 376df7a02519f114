//! Exclusive checkout, release and renewal of session records.
//!
//! Mutual exclusion comes entirely from [`DocumentStore::conditional_update`]: the
//! lock is taken by an update whose filter says "unlocked and unexpired", so of many
//! concurrent attempts the store lets exactly one match. Every grant then rolls the
//! record's `lock_id` forward by one, and that fencing token must be presented to
//! release, save or remove the session. Writes carrying an older token match nothing
//! and are dropped without error.

use time::{Duration, OffsetDateTime};

use crate::error::Result;
use crate::expiry::{is_expired, ExpiryPolicy};
use crate::record::{expiry_from, truncate_to_millis, SessionRecord, SessionStateActions};
use crate::store::{DocumentStore, RecordFilter, RecordUpdate};

/// Outcome of a checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum Checkout<T> {
    /// No live record exists. Expired records discovered on the way were deleted.
    Missing,
    /// Another holder has the record locked.
    Locked { lock_id: i64, lock_age: Duration },
    /// The caller may use the session and must present `lock_id` on later writes.
    Granted {
        payload: T,
        lock_id: i64,
        lock_age: Duration,
        actions: SessionStateActions,
    },
}

/// What a read of the current record found.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// No record under the key.
    Absent,
    /// A record whose lease ran out; it must not be handed to a caller.
    Expired(SessionRecord),
    /// A record still within its lease, locked or not.
    Live(SessionRecord),
}

/// The locking protocol for one application scope.
///
/// Borrows the store, so it is cheap to build per call:
///
/// ```
/// use sessionstate_seaorm_store::{LockingProtocol, MemoryStore};
/// use time::OffsetDateTime;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), sessionstate_seaorm_store::Error> {
/// let store = MemoryStore::new();
/// let protocol = LockingProtocol::new(&store, "/shop");
///
/// // Nothing to lock yet
/// assert!(!protocol.acquire("abc123", OffsetDateTime::now_utc()).await?);
/// # Ok(())
/// # }
/// ```
pub struct LockingProtocol<'a, S: ?Sized> {
    store: &'a S,
    application_name: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> LockingProtocol<'a, S> {
    /// Binds the protocol to `store`, scoped to `application_name`.
    pub fn new(store: &'a S, application_name: &'a str) -> Self {
        Self {
            store,
            application_name,
        }
    }

    fn key(&self, id: &str) -> RecordFilter {
        RecordFilter::by_key(id, self.application_name)
    }

    /// Atomically sets `locked = true` if the record is unlocked and unexpired.
    ///
    /// Returns whether this caller won the lock.
    pub async fn acquire(&self, id: &str, now: OffsetDateTime) -> Result<bool> {
        let now = truncate_to_millis(now);
        let filter = self.key(id).locked(false).expires_after(now);
        let update = RecordUpdate::new().locked(true).lock_date(now);

        let acquired = self.store.conditional_update(&filter, &update).await? == 1;
        tracing::debug!(session_id = %id, acquired, "lock attempt");
        Ok(acquired)
    }

    /// Reads the current record and classifies it against `now`.
    pub async fn read(&self, id: &str, now: OffsetDateTime) -> Result<ReadOutcome> {
        Ok(match self.store.find_one(&self.key(id)).await? {
            None => ReadOutcome::Absent,
            Some(record) if is_expired(&record, now) => ReadOutcome::Expired(record),
            Some(record) => ReadOutcome::Live(record),
        })
    }

    /// Hands out a fresh fencing token and clears the action flags.
    ///
    /// The swap only succeeds while `lock_id` still holds the value observed in
    /// `record`. Shared readers additionally require the record to be unlocked, so a
    /// reader can never move the token out from under an exclusive holder. Returns the
    /// new token, or `None` if the swap matched nothing.
    pub async fn roll_over(&self, record: &SessionRecord, exclusive: bool) -> Result<Option<i64>> {
        let next = record.lock_id + 1;
        let mut filter = self.key(&record.id).lock_id(record.lock_id);
        if !exclusive {
            filter = filter.locked(false);
        }
        let update = RecordUpdate::new()
            .lock_id(next)
            .flags(SessionStateActions::NONE);

        let swapped = self.store.conditional_update(&filter, &update).await? == 1;
        tracing::debug!(session_id = %record.id, lock_id = next, swapped, "fencing token rollover");
        Ok(swapped.then_some(next))
    }

    /// Runs the full checkout sequence: optional lock attempt, read, lazy expiry and
    /// fencing token rollover.
    ///
    /// `decode` turns the live record into the caller's payload. It runs before the
    /// rollover, so a record that fails to decode is left exactly as it was read.
    pub async fn checkout<T, F>(
        &self,
        id: &str,
        exclusive: bool,
        now: OffsetDateTime,
        decode: F,
    ) -> Result<Checkout<T>>
    where
        F: FnOnce(&SessionRecord) -> Result<T>,
    {
        let now = truncate_to_millis(now);
        let acquired = if exclusive {
            self.acquire(id, now).await?
        } else {
            false
        };

        let record = match self.read(id, now).await? {
            ReadOutcome::Absent => return Ok(Checkout::Missing),
            ReadOutcome::Expired(_) => {
                ExpiryPolicy::new(self.store, self.application_name)
                    .discard_expired(id, now)
                    .await;
                return Ok(Checkout::Missing);
            }
            ReadOutcome::Live(record) => record,
        };

        let lock_age = record.lock_age(now);
        let held_elsewhere = if exclusive { !acquired } else { record.locked };
        if held_elsewhere {
            return Ok(Checkout::Locked {
                lock_id: record.lock_id,
                lock_age,
            });
        }

        let payload = decode(&record)?;

        let lock_id = match self.roll_over(&record, exclusive).await? {
            Some(lock_id) => lock_id,
            None if exclusive => {
                tracing::warn!(session_id = %id, "lock holder lost fencing token rollover");
                return Ok(Checkout::Locked {
                    lock_id: record.lock_id,
                    lock_age,
                });
            }
            // A shared reader raced a writer; the payload it read is still valid.
            None => record.lock_id,
        };

        Ok(Checkout::Granted {
            payload,
            lock_id,
            lock_age,
            actions: record.flags,
        })
    }

    /// Clears the lock held under `lock_id` and restarts the idle timeout.
    ///
    /// The new expiry is computed from the record's own stored `timeout`. A release
    /// presenting a stale token, or arriving after the lease ran out, matches nothing
    /// and returns `false`.
    pub async fn release(&self, id: &str, lock_id: i64, now: OffsetDateTime) -> Result<bool> {
        let now = truncate_to_millis(now);
        let Some(record) = self.store.find_one(&self.key(id)).await? else {
            return Ok(false);
        };

        let filter = self.key(id).lock_id(lock_id).expires_after(now);
        let update = RecordUpdate::new()
            .locked(false)
            .expires(expiry_from(now, record.timeout));

        let released = self.store.conditional_update(&filter, &update).await? == 1;
        if !released {
            tracing::debug!(session_id = %id, lock_id, "ignoring release with stale lock id");
        }
        Ok(released)
    }

    /// Pushes `expires` out to `now + timeout` without touching the payload or the lock.
    ///
    /// Absent or already expired records are left alone.
    pub async fn renew(&self, id: &str, now: OffsetDateTime) -> Result<bool> {
        let now = truncate_to_millis(now);
        let live = self.key(id).expires_after(now);
        let Some(record) = self.store.find_one(&live).await? else {
            return Ok(false);
        };

        let update = RecordUpdate::new().expires(expiry_from(now, record.timeout));
        Ok(self.store.conditional_update(&live, &update).await? == 1)
    }
}
