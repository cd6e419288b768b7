use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::cache::RelationCache;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::model::UserId;
use crate::notify::{MutationFailure, SubscriptionId};
use crate::remote::{IdentityProvider, RemoteStore};
use crate::snapshot::{SnapshotRecord, SnapshotStore};

/// One signed-in user's view of the relation cache, from login to logout.
///
/// Owns the cache, remembers every listener registered through it, and
/// optionally persists a warm-start snapshot between sessions.
pub struct CacheSession {
    user_id: UserId,
    cache: Arc<RelationCache>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl CacheSession {
    /// Start a session for whoever `identity` reports as signed in.
    pub fn begin(
        identity: Arc<dyn IdentityProvider>,
        remote: Arc<dyn RemoteStore>,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        let user_id = identity.current_user_id()?;
        info!(user = %user_id, "cache session started");
        Ok(Self {
            user_id,
            cache: Arc::new(RelationCache::new(identity, remote, config)),
            snapshots: None,
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Attach a snapshot store and warm the cache from this user's last
    /// snapshot, if any. An undecodable snapshot is discarded.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Result<Self, CacheError> {
        if let Some(record) = store.get_snapshot(self.user_id.as_str())? {
            match self.cache.restore_snapshot(&record.data) {
                Ok(()) => debug!(
                    user = %self.user_id,
                    age_secs = record.age().as_secs(),
                    "cache warmed from snapshot"
                ),
                Err(CacheError::Snapshot(reason)) => {
                    warn!(user = %self.user_id, %reason, "discarding unreadable snapshot");
                    store.delete_snapshot(self.user_id.as_str())?;
                }
                Err(err) => return Err(err),
            }
        }
        self.snapshots = Some(store);
        Ok(self)
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn cache(&self) -> &Arc<RelationCache> {
        &self.cache
    }

    /// Load posts and the user's own follower and following sets.
    pub async fn refresh(&self) -> Result<(), CacheError> {
        self.cache.load_posts().await?;
        self.cache.load_followers(self.user_id.clone()).await?;
        self.cache.load_following(self.user_id.clone()).await?;
        Ok(())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.cache.subscribe(listener);
        self.track(id);
        id
    }

    pub fn on_failure<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&MutationFailure) + Send + Sync + 'static,
    {
        let id = self.cache.notifier().on_failure(listener);
        self.track(id);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|existing| *existing != id);
        self.cache.unsubscribe(id)
    }

    /// Tear down at logout: save a snapshot if a store is attached, drop
    /// every listener, then clear the cache.
    ///
    /// A snapshot cannot be taken while mutations are pending; that case is
    /// logged and the previous snapshot is kept.
    pub fn end(self) -> Result<(), CacheError> {
        if let Some(store) = &self.snapshots {
            match self.cache.export_snapshot() {
                Ok(data) => store.save_snapshot(SnapshotRecord::new(self.user_id.clone(), data))?,
                Err(CacheError::Snapshot(reason)) => {
                    warn!(user = %self.user_id, %reason, "snapshot skipped at session end");
                }
                Err(err) => return Err(err),
            }
        }

        let tracked = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for id in &tracked {
            self.cache.unsubscribe(*id);
        }
        self.cache.notifier().clear();
        self.cache.clear()?;
        info!(user = %self.user_id, listeners = tracked.len(), "cache session ended");
        Ok(())
    }

    fn track(&self, id: SubscriptionId) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }
}
