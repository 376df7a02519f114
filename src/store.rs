//! The document store abstraction the locking protocol runs against.
//!
//! Every operation touches at most one record and must be atomic at the record
//! level: a [`DocumentStore::conditional_update`] evaluates its filter and applies its
//! update as a single step, which is what makes lock acquisition race-free across
//! processes.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::Result;
use crate::record::{SessionRecord, SessionStateActions};

/// Selects records by key plus optional preconditions.
///
/// `id` and `application_name` are always matched; every other field narrows the
/// match only when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub id: String,
    pub application_name: String,
    pub locked: Option<bool>,
    pub lock_id: Option<i64>,
    /// Matches records with `expires > at`.
    pub expires_after: Option<OffsetDateTime>,
    /// Matches records with `expires < at`.
    pub expires_before: Option<OffsetDateTime>,
}

impl RecordFilter {
    /// Matches the record stored under `(application_name, id)`, whatever its state.
    pub fn by_key(id: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            application_name: application_name.into(),
            locked: None,
            lock_id: None,
            expires_after: None,
            expires_before: None,
        }
    }

    /// Requires the lock flag to equal `locked`.
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    /// Requires the fencing token to equal `lock_id`.
    pub fn lock_id(mut self, lock_id: i64) -> Self {
        self.lock_id = Some(lock_id);
        self
    }

    /// Requires `expires > at`.
    pub fn expires_after(mut self, at: OffsetDateTime) -> Self {
        self.expires_after = Some(at);
        self
    }

    /// Requires `expires < at`.
    pub fn expires_before(mut self, at: OffsetDateTime) -> Self {
        self.expires_before = Some(at);
        self
    }

    /// Evaluates the filter against a record held in memory.
    pub fn matches(&self, record: &SessionRecord) -> bool {
        record.id == self.id
            && record.application_name == self.application_name
            && self.locked.map_or(true, |locked| record.locked == locked)
            && self.lock_id.map_or(true, |lock_id| record.lock_id == lock_id)
            && self.expires_after.map_or(true, |at| record.expires > at)
            && self.expires_before.map_or(true, |at| record.expires < at)
    }
}

/// Field assignments applied by a conditional update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub expires: Option<OffsetDateTime>,
    pub lock_date: Option<OffsetDateTime>,
    pub locked: Option<bool>,
    pub lock_id: Option<i64>,
    pub session_items: Option<String>,
    pub timeout: Option<i32>,
    pub flags: Option<SessionStateActions>,
}

impl RecordUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lease end.
    pub fn expires(mut self, at: OffsetDateTime) -> Self {
        self.expires = Some(at);
        self
    }

    /// Sets when the lock was taken.
    pub fn lock_date(mut self, at: OffsetDateTime) -> Self {
        self.lock_date = Some(at);
        self
    }

    /// Sets the lock flag.
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    /// Sets the fencing token.
    pub fn lock_id(mut self, lock_id: i64) -> Self {
        self.lock_id = Some(lock_id);
        self
    }

    /// Replaces the encoded payload.
    pub fn session_items(mut self, items: impl Into<String>) -> Self {
        self.session_items = Some(items.into());
        self
    }

    /// Sets the idle timeout in minutes.
    pub fn timeout(mut self, minutes: i32) -> Self {
        self.timeout = Some(minutes);
        self
    }

    /// Sets the pending action flags.
    pub fn flags(mut self, flags: SessionStateActions) -> Self {
        self.flags = Some(flags);
        self
    }

    /// `true` when no field would be written.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the assignments to an in-memory record.
    pub fn apply(&self, record: &mut SessionRecord) {
        if let Some(expires) = self.expires {
            record.expires = expires;
        }
        if let Some(lock_date) = self.lock_date {
            record.lock_date = lock_date;
        }
        if let Some(locked) = self.locked {
            record.locked = locked;
        }
        if let Some(lock_id) = self.lock_id {
            record.lock_id = lock_id;
        }
        if let Some(items) = &self.session_items {
            record.session_items.clone_from(items);
        }
        if let Some(timeout) = self.timeout {
            record.timeout = timeout;
        }
        if let Some(flags) = self.flags {
            record.flags = flags;
        }
    }
}

/// A document store offering single-record atomic operations.
///
/// Implementations must be safe to call concurrently from many tasks and processes
/// against the same underlying collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the record matching `filter`, if any.
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<SessionRecord>>;

    /// Applies `update` to the record matching `filter` in one atomic step.
    ///
    /// Returns the number of records affected, 0 or 1.
    async fn conditional_update(&self, filter: &RecordFilter, update: &RecordUpdate)
        -> Result<u64>;

    /// Inserts a new record. Fails with `Error::DuplicateSession` when a record with
    /// the same `(application_name, id)` already exists.
    async fn insert(&self, record: &SessionRecord) -> Result<()>;

    /// Deletes the record matching `filter`, returning how many were removed.
    async fn delete(&self, filter: &RecordFilter) -> Result<u64>;
}
