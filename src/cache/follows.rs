use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::SelfFollowPolicy;
use crate::error::{CacheError, RemoteError};
use crate::model::UserId;
use crate::mutation::{MutationKind, MutationOutcome, PendingMutation, RollbackSnapshot};

use super::relation_cache::{CacheState, RelationCache};

/// A missing user reads as an empty relation; every other failure propagates.
fn found_or_empty(
    result: Result<BTreeSet<UserId>, RemoteError>,
) -> Result<BTreeSet<UserId>, CacheError> {
    match result {
        Err(RemoteError::NotFound(_)) => Ok(BTreeSet::new()),
        other => other.map_err(CacheError::from),
    }
}

/// Add the edge to both adjacency views. Returns which views changed.
fn link(state: &mut CacheState, subject: &UserId, target: &UserId) -> (bool, bool) {
    let followers = state
        .follows
        .entry(target.clone())
        .or_default()
        .add_follower(subject);
    let following = state
        .follows
        .entry(subject.clone())
        .or_default()
        .add_following(target);
    (followers, following)
}

fn unlink(state: &mut CacheState, subject: &UserId, target: &UserId) -> (bool, bool) {
    let followers = state
        .follows
        .entry(target.clone())
        .or_default()
        .remove_follower(subject);
    let following = state
        .follows
        .entry(subject.clone())
        .or_default()
        .remove_following(target);
    (followers, following)
}

impl RelationCache {
    /// Follow `target` as the current user.
    ///
    /// Already following is a local no-op; the remote call is still made.
    pub async fn follow(&self, target: impl Into<UserId>) -> Result<MutationOutcome, CacheError> {
        self.change_follow(target.into(), MutationKind::Follow)
            .await
    }

    /// Unfollow `target` as the current user. Not following is a local no-op.
    pub async fn unfollow(
        &self,
        target: impl Into<UserId>,
    ) -> Result<MutationOutcome, CacheError> {
        self.change_follow(target.into(), MutationKind::Unfollow)
            .await
    }

    /// Replace `uid`'s follower set and count with the remote store's.
    pub async fn load_followers(
        &self,
        uid: impl Into<UserId>,
    ) -> Result<BTreeSet<UserId>, CacheError> {
        let uid = uid.into();
        let followers = found_or_empty(self.remote.fetch_followers(&uid).await)?;
        self.write(|state| {
            state
                .follows
                .entry(uid.clone())
                .or_default()
                .replace_followers(followers.clone())
        })?;
        debug!(user = %uid, count = followers.len(), "followers loaded");
        self.notifier.notify();
        Ok(followers)
    }

    /// Replace `uid`'s following set and count with the remote store's.
    pub async fn load_following(
        &self,
        uid: impl Into<UserId>,
    ) -> Result<BTreeSet<UserId>, CacheError> {
        let uid = uid.into();
        let following = found_or_empty(self.remote.fetch_following(&uid).await)?;
        self.write(|state| {
            state
                .follows
                .entry(uid.clone())
                .or_default()
                .replace_following(following.clone())
        })?;
        debug!(user = %uid, count = following.len(), "following loaded");
        self.notifier.notify();
        Ok(following)
    }

    async fn change_follow(
        &self,
        target: UserId,
        kind: MutationKind,
    ) -> Result<MutationOutcome, CacheError> {
        let subject = self.current_user_id()?;
        if subject == target && self.config.self_follow == SelfFollowPolicy::Reject {
            debug!(user = %subject, ?kind, "self-follow rejected by policy");
            return Ok(MutationOutcome::Rejected);
        }
        let slot = self.queue_slot(&format!("follow:{target}")).await?;

        let id = self.next_mutation_id();
        let mut in_flight = self.begin_mutation(id, slot);
        let changed = self.write(|state| {
            let (changed_followers, changed_following) = match kind {
                MutationKind::Follow => link(state, &subject, &target),
                _ => unlink(state, &subject, &target),
            };
            let snapshot = RollbackSnapshot::Follow {
                subject: subject.clone(),
                target: target.clone(),
                changed_followers,
                changed_following,
            };
            state
                .pending
                .insert(id, PendingMutation::applied(id, kind, snapshot));
            changed_followers || changed_following
        })?;
        debug!(mutation = %id, user = %subject, target = %target, ?kind, changed, "follow applied locally");
        self.notifier.notify();

        let result = match kind {
            MutationKind::Follow => self.remote.apply_follow(&target).await,
            _ => self.remote.apply_unfollow(&target).await,
        };
        let outcome = in_flight.settle(result)?;

        // The slot stays held through reconciliation.
        if outcome == MutationOutcome::Committed && self.config.reconcile_after_follow {
            if let Err(err) = self.reconcile_follow(&subject, &target, kind).await {
                warn!(
                    user = %subject,
                    target = %target,
                    error = %err,
                    "reconciliation failed, keeping optimistic follow state"
                );
            }
        }
        drop(in_flight);
        Ok(outcome)
    }

    /// Refresh `target`'s followers and `subject`'s following from the remote
    /// store after a confirmed change. The confirmed edge is kept (or kept
    /// absent) even if the fetch lags behind the write.
    async fn reconcile_follow(
        &self,
        subject: &UserId,
        target: &UserId,
        kind: MutationKind,
    ) -> Result<(), CacheError> {
        let mut followers = found_or_empty(self.remote.fetch_followers(target).await)?;
        let mut following = found_or_empty(self.remote.fetch_following(subject).await)?;
        match kind {
            MutationKind::Follow => {
                followers.insert(subject.clone());
                following.insert(target.clone());
            }
            MutationKind::Unfollow => {
                followers.remove(subject);
                following.remove(target);
            }
            MutationKind::Like | MutationKind::Unlike => {}
        }

        self.write(|state| {
            state
                .follows
                .entry(target.clone())
                .or_default()
                .replace_followers(followers);
            state
                .follows
                .entry(subject.clone())
                .or_default()
                .replace_following(following);
        })?;
        debug!(user = %subject, target = %target, "follow state reconciled");
        self.notifier.notify();
        Ok(())
    }
}
