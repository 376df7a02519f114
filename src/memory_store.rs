use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::record::SessionRecord;
use crate::store::{DocumentStore, RecordFilter, RecordUpdate};

type Key = (String, String);

/// In-memory document store.
///
/// Records live in a `HashMap` keyed by `(application_name, id)` behind a single
/// `RwLock`, so every operation is atomic with respect to every other. Suitable for
/// development and testing, but not for production: records are lost on restart and
/// not shared across processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Key, SessionRecord>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// `true` when no records are held.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn key_of(filter: &RecordFilter) -> Key {
    (filter.application_name.clone(), filter.id.clone())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&key_of(filter))
            .filter(|record| filter.matches(record))
            .cloned())
    }

    async fn conditional_update(
        &self,
        filter: &RecordFilter,
        update: &RecordUpdate,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        match records.get_mut(&key_of(filter)) {
            Some(record) if filter.matches(record) => {
                update.apply(record);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn insert(&self, record: &SessionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let key = (record.application_name.clone(), record.id.clone());
        if records.contains_key(&key) {
            return Err(Error::DuplicateSession(record.id.clone()));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn delete(&self, filter: &RecordFilter) -> Result<u64> {
        let mut records = self.records.write().await;
        let key = key_of(filter);
        match records.get(&key) {
            Some(record) if filter.matches(record) => {
                records.remove(&key);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
