//! Error types returned by the session state store.
//!
//! Lost lock races and stale fencing tokens are not errors: a lost race is reported
//! as `locked == true` on the fetch result, and a write presenting a superseded
//! `lock_id` simply affects no rows.

/// Errors raised by the session state store and its backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store was configured with a missing or blank connection target.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying document store could not be reached or rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A session payload or timestamp could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored record could not be decoded. The record is left in place.
    #[error("corrupt session record {id}: {reason}")]
    Decode { id: String, reason: String },

    /// An insert collided with a live record for the same session id.
    #[error("session {0} already exists")]
    DuplicateSession(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        Error::Backend(err.to_string())
    }
}
