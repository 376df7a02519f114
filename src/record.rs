//! The persisted session record and the payload it carries.
//!
//! A [`SessionRecord`] is one document per `(application_name, id)` pair. Its
//! `session_items` field holds the host's [`SessionItems`] collection encoded as
//! MessagePack and then base64, so the stored value is always a base64-safe string.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};

/// Bit flags describing how the host should treat a fetched session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionStateActions(i32);

impl SessionStateActions {
    /// A normal, saved session.
    pub const NONE: Self = Self(0);
    /// The record is an uninitialized placeholder reserved by `create_uninitialized`.
    pub const INITIALIZE_ITEM: Self = Self(1);

    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> i32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One persisted session.
///
/// Field names map one to one onto the stored column names (`id`, `applicationName`,
/// `created`, `expires`, `lockDate`, `locked`, `lockId`, `sessionItems`, `timeout`,
/// `flags`), which are kept stable across releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub application_name: String,
    pub created: OffsetDateTime,
    pub expires: OffsetDateTime,
    pub lock_date: OffsetDateTime,
    pub locked: bool,
    /// Fencing token. Only ever increases.
    pub lock_id: i64,
    pub session_items: String,
    /// Idle timeout in minutes.
    pub timeout: i32,
    pub flags: SessionStateActions,
}

impl SessionRecord {
    /// Builds a fresh, unlocked record written at `now` with `lock_id == 0`.
    pub fn new(
        id: impl Into<String>,
        application_name: impl Into<String>,
        session_items: impl Into<String>,
        timeout: i32,
        flags: SessionStateActions,
        now: OffsetDateTime,
    ) -> Self {
        let now = truncate_to_millis(now);
        Self {
            id: id.into(),
            application_name: application_name.into(),
            created: now,
            expires: expiry_from(now, timeout),
            lock_date: now,
            locked: false,
            lock_id: 0,
            session_items: session_items.into(),
            timeout,
            flags,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.flags.contains(SessionStateActions::INITIALIZE_ITEM)
    }

    /// Time elapsed since the most recent lock acquisition, never negative.
    pub fn lock_age(&self, now: OffsetDateTime) -> Duration {
        let age = now - self.lock_date;
        if age.is_negative() {
            Duration::ZERO
        } else {
            age
        }
    }
}

/// Computes `now + timeout` minutes.
pub fn expiry_from(now: OffsetDateTime, timeout_minutes: i32) -> OffsetDateTime {
    now + Duration::minutes(i64::from(timeout_minutes))
}

/// Drops sub-millisecond precision so timestamps compare the same way in every backend.
pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    let millis = at.millisecond();
    at.replace_millisecond(millis).unwrap_or(at)
}

/// The key/value collection a host stores in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionItems(BTreeMap<String, Value>);

impl SessionItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Encodes the collection as base64 over MessagePack.
    pub fn encode(&self) -> Result<String> {
        let bytes = rmp_serde::to_vec(&self.0).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decodes a stored `sessionItems` string. An empty string is an empty collection.
    pub fn decode(session_id: &str, encoded: &str) -> Result<Self> {
        if encoded.is_empty() {
            return Ok(Self::default());
        }
        let corrupt = |reason: String| Error::Decode {
            id: session_id.to_string(),
            reason,
        };
        let bytes = STANDARD.decode(encoded).map_err(|e| corrupt(e.to_string()))?;
        let items = rmp_serde::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        Ok(Self(items))
    }
}

/// A session handed to the host: its items plus the idle timeout in minutes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStateData {
    pub items: SessionItems,
    pub timeout: i32,
}

impl SessionStateData {
    /// An empty-but-initialized session.
    pub fn new(timeout: i32) -> Self {
        Self {
            items: SessionItems::default(),
            timeout,
        }
    }
}
