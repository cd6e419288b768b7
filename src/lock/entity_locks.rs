use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::CacheError;

/// One async lock per entity key, created lazily.
///
/// Repeated lookups of the same key return the same `Arc`. Holders keep a
/// clone of that `Arc` through their guard, which is what [`prune`](Self::prune)
/// uses to tell idle entries apart.
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        EntityLocks {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_lock(&self, key: &str) -> Result<Arc<AsyncMutex<()>>, CacheError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| CacheError::LockPoisoned("entity lock map"))?;
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Wait until `key` is free and hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>, CacheError> {
        let lock = self.get_lock(key)?;
        Ok(lock.lock_owned().await)
    }

    /// Forget locks that are neither held nor awaited. Returns how many were
    /// dropped.
    pub fn prune(&self) -> Result<usize, CacheError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| CacheError::LockPoisoned("entity lock map"))?;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(before - locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EntityLocks {
    fn default() -> Self {
        Self::new()
    }
}
