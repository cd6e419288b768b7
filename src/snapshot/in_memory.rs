use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use crate::error::CacheError;
use crate::model::UserId;

use super::store::{SnapshotRecord, SnapshotStore};

type Records = HashMap<UserId, SnapshotRecord>;

/// Per-user snapshots held in process memory. Clones share storage.
///
/// With [`with_max_age`](Self::with_max_age), snapshots older than the limit
/// read as absent and are dropped on the next save.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    records: Arc<RwLock<Records>>,
    max_age: Option<Duration>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Users holding a snapshot, stale ones included, sorted.
    pub fn users(&self) -> Result<Vec<UserId>, CacheError> {
        let mut users: Vec<UserId> = self.records()?.keys().cloned().collect();
        users.sort();
        Ok(users)
    }

    fn is_fresh(&self, record: &SnapshotRecord) -> bool {
        self.max_age.map_or(true, |max_age| record.age() <= max_age)
    }

    fn records(&self) -> Result<RwLockReadGuard<'_, Records>, CacheError> {
        self.records
            .read()
            .map_err(|_| CacheError::LockPoisoned("snapshot read"))
    }

    fn records_mut(&self) -> Result<RwLockWriteGuard<'_, Records>, CacheError> {
        self.records
            .write()
            .map_err(|_| CacheError::LockPoisoned("snapshot write"))
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn get_snapshot(&self, user_id: &str) -> Result<Option<SnapshotRecord>, CacheError> {
        let records = self.records()?;
        match records.get(user_id) {
            Some(record) if self.is_fresh(record) => Ok(Some(record.clone())),
            Some(record) => {
                debug!(user = %user_id, age_secs = record.age().as_secs(), "snapshot expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, record: SnapshotRecord) -> Result<(), CacheError> {
        let mut records = self.records_mut()?;
        records.retain(|_, existing| self.is_fresh(existing));
        records.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn delete_snapshot(&self, user_id: &str) -> Result<bool, CacheError> {
        Ok(self.records_mut()?.remove(user_id).is_some())
    }
}
