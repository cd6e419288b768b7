use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::config::{CacheConfig, ConcurrencyPolicy};
use crate::error::{CacheError, RemoteError};
use crate::lock::EntityLocks;
use crate::model::{FollowState, LikeState, Post, PostId, UserId};
use crate::mutation::{
    MutationId, MutationKind, MutationOutcome, PendingMutation, RollbackSnapshot,
};
use crate::notify::{MutationFailure, Notifier, SubscriptionId};
use crate::remote::{IdentityProvider, RemoteStore};

#[derive(Default)]
pub(super) struct CacheState {
    pub(super) likes: HashMap<PostId, LikeState>,
    pub(super) follows: HashMap<UserId, FollowState>,
    pub(super) posts: Vec<Post>,
    pub(super) pending: BTreeMap<MutationId, PendingMutation>,
}

/// In-memory mirror of likes and follows, kept ahead of the remote store by
/// optimistic updates.
///
/// Every local change is one critical section on the state lock; listeners
/// are notified after that lock is released and before the matching remote
/// call is awaited.
pub struct RelationCache {
    pub(super) identity: Arc<dyn IdentityProvider>,
    pub(super) remote: Arc<dyn RemoteStore>,
    pub(super) config: CacheConfig,
    pub(super) state: RwLock<CacheState>,
    pub(super) notifier: Notifier,
    locks: EntityLocks,
    next_mutation: AtomicU64,
}

impl RelationCache {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        remote: Arc<dyn RemoteStore>,
        config: CacheConfig,
    ) -> Self {
        RelationCache {
            identity,
            remote,
            config,
            state: RwLock::new(CacheState::default()),
            notifier: Notifier::new(),
            locks: EntityLocks::new(),
            next_mutation: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn current_user_id(&self) -> Result<UserId, CacheError> {
        self.identity.current_user_id()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Cached like count; 0 for unknown posts.
    pub fn like_count(&self, post_id: &str) -> Result<u64, CacheError> {
        self.read(|state| state.likes.get(post_id).map_or(0, |like| like.count))
    }

    pub fn is_post_liked_by_current_user(&self, post_id: &str) -> Result<bool, CacheError> {
        let viewer = self.current_user_id()?;
        self.read(|state| {
            state
                .likes
                .get(post_id)
                .is_some_and(|like| like.is_liked_by(&viewer))
        })
    }

    pub fn like_state(&self, post_id: &str) -> Result<Option<LikeState>, CacheError> {
        self.read(|state| state.likes.get(post_id).cloned())
    }

    /// Whether the current user is among `uid`'s followers.
    pub fn is_following(&self, uid: &str) -> Result<bool, CacheError> {
        let viewer = self.current_user_id()?;
        self.read(|state| {
            state
                .follows
                .get(uid)
                .is_some_and(|follow| follow.followers.contains(&viewer))
        })
    }

    pub fn followers_of(&self, uid: &str) -> Result<Vec<UserId>, CacheError> {
        self.read(|state| {
            state
                .follows
                .get(uid)
                .map(|follow| follow.followers.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn following_of(&self, uid: &str) -> Result<Vec<UserId>, CacheError> {
        self.read(|state| {
            state
                .follows
                .get(uid)
                .map(|follow| follow.following.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn follower_count(&self, uid: &str) -> Result<u64, CacheError> {
        self.read(|state| state.follows.get(uid).map_or(0, |f| f.follower_count))
    }

    pub fn following_count(&self, uid: &str) -> Result<u64, CacheError> {
        self.read(|state| state.follows.get(uid).map_or(0, |f| f.following_count))
    }

    pub fn follow_state(&self, uid: &str) -> Result<Option<FollowState>, CacheError> {
        self.read(|state| state.follows.get(uid).cloned())
    }

    /// Posts from the last load, with like data taken from the live cache.
    pub fn posts(&self) -> Result<Vec<Post>, CacheError> {
        self.read(|state| {
            state
                .posts
                .iter()
                .map(|post| match state.likes.get(&post.id) {
                    Some(like) => Post {
                        like_count: like.count,
                        liked_by: like.liked_by.clone(),
                        ..post.clone()
                    },
                    None => post.clone(),
                })
                .collect()
        })
    }

    /// Mutations applied locally and still awaiting the remote store.
    pub fn pending_mutations(&self) -> Result<Vec<PendingMutation>, CacheError> {
        self.read(|state| state.pending.values().cloned().collect())
    }

    /// Drop all cached state, including pending mutations. Remote results
    /// that arrive afterwards are discarded without touching the cache.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.write(|state| *state = CacheState::default())?;
        debug!("relation cache cleared");
        self.notifier.notify();
        Ok(())
    }

    // ========================================================================
    // Shared machinery
    // ========================================================================

    pub(super) fn read<T>(&self, f: impl FnOnce(&CacheState) -> T) -> Result<T, CacheError> {
        let state = self
            .state
            .read()
            .map_err(|_| CacheError::LockPoisoned("cache read"))?;
        Ok(f(&state))
    }

    pub(super) fn write<T>(&self, f: impl FnOnce(&mut CacheState) -> T) -> Result<T, CacheError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CacheError::LockPoisoned("cache write"))?;
        Ok(f(&mut state))
    }

    pub(super) fn next_mutation_id(&self) -> MutationId {
        MutationId::new(self.next_mutation.fetch_add(1, Ordering::Relaxed))
    }

    /// Under [`ConcurrencyPolicy::Serialized`], wait for exclusive use of
    /// `key`. Under `AcceptRace` there is nothing to wait for.
    pub(super) async fn queue_slot(
        &self,
        key: &str,
    ) -> Result<Option<OwnedMutexGuard<()>>, CacheError> {
        match self.config.concurrency {
            ConcurrencyPolicy::AcceptRace => Ok(None),
            ConcurrencyPolicy::Serialized => self.locks.acquire(key).await.map(Some),
        }
    }

    /// Reserve mutation `id` before it is applied. The returned guard owns
    /// the queue slot; if it is dropped before [`InFlight::settle`] the
    /// mutation is abandoned.
    pub(super) fn begin_mutation(
        &self,
        id: MutationId,
        slot: Option<OwnedMutexGuard<()>>,
    ) -> InFlight<'_> {
        InFlight {
            cache: self,
            id,
            slot,
            settled: false,
        }
    }

    fn release_slot(&self, slot: Option<OwnedMutexGuard<()>>) {
        if let Some(guard) = slot {
            drop(guard);
            if let Err(err) = self.locks.prune() {
                warn!(error = %err, "failed to prune entity locks");
            }
        }
    }

    /// Undo a mutation whose caller went away before the remote result was
    /// known. The remote call may or may not have landed; local state goes
    /// back to its pre-mutation snapshot.
    fn abandon(&self, id: MutationId) {
        let abandoned = self.write(|state| -> Result<Option<PendingMutation>, CacheError> {
            match state.pending.remove(&id) {
                Some(mut mutation) => {
                    let snapshot = mutation.roll_back()?.clone();
                    revert(state, mutation.kind(), &snapshot);
                    Ok(Some(mutation))
                }
                None => Ok(None),
            }
        });
        match abandoned {
            Ok(Ok(Some(mutation))) => {
                warn!(
                    mutation = %id,
                    kind = ?mutation.kind(),
                    target = %mutation.target(),
                    "mutation dropped before settling, rolled back"
                );
                self.notifier.notify();
            }
            Ok(Ok(None)) => {}
            Ok(Err(err)) | Err(err) => {
                warn!(mutation = %id, error = %err, "failed to abandon mutation");
            }
        }
    }

    /// Drive a pending mutation to its terminal state once the remote result
    /// is known.
    fn settle(
        &self,
        id: MutationId,
        result: Result<(), RemoteError>,
    ) -> Result<MutationOutcome, CacheError> {
        match result {
            Ok(()) => {
                let committed = self.write(
                    |state| -> Result<Option<PendingMutation>, CacheError> {
                        match state.pending.remove(&id) {
                            Some(mut mutation) => {
                                mutation.commit()?;
                                Ok(Some(mutation))
                            }
                            None => Ok(None),
                        }
                    },
                )??;
                match committed {
                    Some(mutation) => debug!(
                        mutation = %id,
                        kind = ?mutation.kind(),
                        target = %mutation.target(),
                        "mutation committed"
                    ),
                    None => debug!(mutation = %id, "mutation settled after cache was cleared"),
                }
                Ok(MutationOutcome::Committed)
            }
            Err(remote_err) => {
                let error = CacheError::from(remote_err);
                let rolled_back = self.write(
                    |state| -> Result<Option<PendingMutation>, CacheError> {
                        match state.pending.remove(&id) {
                            Some(mut mutation) => {
                                let snapshot = mutation.roll_back()?.clone();
                                revert(state, mutation.kind(), &snapshot);
                                Ok(Some(mutation))
                            }
                            None => Ok(None),
                        }
                    },
                )??;

                let Some(mutation) = rolled_back else {
                    debug!(mutation = %id, error = %error, "failed mutation discarded after cache was cleared");
                    return Ok(MutationOutcome::RolledBack);
                };

                warn!(
                    mutation = %id,
                    kind = ?mutation.kind(),
                    target = %mutation.target(),
                    error = %error,
                    "remote store rejected mutation, rolled back"
                );
                self.notifier.notify();
                self.notifier.notify_failure(&MutationFailure {
                    mutation_id: id,
                    kind: mutation.kind(),
                    target: mutation.target(),
                    error,
                });
                Ok(MutationOutcome::RolledBack)
            }
        }
    }
}

/// Undo an optimistic change from its snapshot.
fn revert(state: &mut CacheState, kind: MutationKind, snapshot: &RollbackSnapshot) {
    match snapshot {
        RollbackSnapshot::Like { post_id, prior } => match prior {
            Some(prior) => {
                state.likes.insert(post_id.clone(), prior.clone());
            }
            None => {
                state.likes.remove(post_id);
            }
        },
        RollbackSnapshot::Follow {
            subject,
            target,
            changed_followers,
            changed_following,
        } => {
            let undo_follow = match kind {
                MutationKind::Follow => true,
                MutationKind::Unfollow => false,
                MutationKind::Like | MutationKind::Unlike => return,
            };
            if *changed_followers {
                let view = state.follows.entry(target.clone()).or_default();
                if undo_follow {
                    view.remove_follower(subject);
                } else {
                    view.add_follower(subject);
                }
            }
            if *changed_following {
                let view = state.follows.entry(subject.clone()).or_default();
                if undo_follow {
                    view.remove_following(target);
                } else {
                    view.add_following(target);
                }
            }
        }
    }
}

/// Tracks one mutation from optimistic apply to its terminal state.
///
/// Dropping it unsettled (the caller's future was cancelled mid-flight)
/// rolls the mutation back. The queue slot is released on drop either way.
pub(super) struct InFlight<'a> {
    cache: &'a RelationCache,
    id: MutationId,
    slot: Option<OwnedMutexGuard<()>>,
    settled: bool,
}

impl InFlight<'_> {
    pub(super) fn settle(
        &mut self,
        result: Result<(), RemoteError>,
    ) -> Result<MutationOutcome, CacheError> {
        self.settled = true;
        self.cache.settle(self.id, result)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.abandon(self.id);
        }
        self.cache.release_slot(self.slot.take());
    }
}
