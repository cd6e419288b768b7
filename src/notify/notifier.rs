use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::CacheError;
use crate::mutation::{MutationId, MutationKind, MutationTarget};

/// Handle returned by [`Notifier::subscribe`] and [`Notifier::on_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Delivered to failure listeners after a mutation is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    pub mutation_id: MutationId,
    pub kind: MutationKind,
    pub target: MutationTarget,
    pub error: CacheError,
}

type Listener = Arc<dyn Fn() + Send + Sync>;
type FailureListener = Arc<dyn Fn(&MutationFailure) + Send + Sync>;

/// Publish/subscribe hub for cache changes.
///
/// Listeners run synchronously on the caller of [`notify`](Self::notify),
/// in subscription order. The listener list is copied before dispatch, so a
/// listener may subscribe, unsubscribe or read the cache without deadlocking.
pub struct Notifier {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    failure_listeners: RwLock<Vec<(SubscriptionId, FailureListener)>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Notifier {
            listeners: RwLock::new(Vec::new()),
            failure_listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a zero-argument change listener.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Register a listener for rolled-back mutations.
    pub fn on_failure<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&MutationFailure) + Send + Sync + 'static,
    {
        let id = self.allocate();
        self.failure_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener of either kind. Returns false if `id` was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        if listeners.len() != before {
            return true;
        }
        drop(listeners);

        let mut failure_listeners = self
            .failure_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = failure_listeners.len();
        failure_listeners.retain(|(existing, _)| *existing != id);
        failure_listeners.len() != before
    }

    pub fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn notify_failure(&self, failure: &MutationFailure) {
        let listeners: Vec<FailureListener> = self
            .failure_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(failure);
        }
    }

    /// Number of registered listeners of both kinds.
    pub fn listener_count(&self) -> usize {
        let changes = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let failures = self
            .failure_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        changes + failures
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.failure_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn allocate(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
