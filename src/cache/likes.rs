use tracing::debug;

use crate::error::CacheError;
use crate::model::{LikeState, Post, PostId};
use crate::mutation::{MutationKind, MutationOutcome, PendingMutation, RollbackSnapshot};

use super::relation_cache::RelationCache;

impl RelationCache {
    /// Like the post if the current user doesn't, unlike it if they do.
    ///
    /// The flip is visible (and listeners notified) before the remote call is
    /// issued. If the remote call fails the post's count and membership are
    /// restored to exactly what they were before this call, and listeners are
    /// notified again.
    pub async fn toggle_like(
        &self,
        post_id: impl Into<PostId>,
    ) -> Result<MutationOutcome, CacheError> {
        let post_id = post_id.into();
        let viewer = self.current_user_id()?;
        let slot = self.queue_slot(&format!("like:{post_id}")).await?;

        let id = self.next_mutation_id();
        let mut in_flight = self.begin_mutation(id, slot);
        let kind = self.write(|state| {
            let prior = state.likes.get(&post_id).cloned();
            let liked = state
                .likes
                .entry(post_id.clone())
                .or_default()
                .toggle(&viewer);
            let kind = if liked {
                MutationKind::Like
            } else {
                MutationKind::Unlike
            };
            let snapshot = RollbackSnapshot::Like {
                post_id: post_id.clone(),
                prior,
            };
            state
                .pending
                .insert(id, PendingMutation::applied(id, kind, snapshot));
            kind
        })?;
        debug!(mutation = %id, post = %post_id, ?kind, "like applied locally");
        self.notifier.notify();

        let result = match kind {
            MutationKind::Like => self.remote.apply_like(&post_id).await,
            _ => self.remote.apply_unlike(&post_id).await,
        };
        in_flight.settle(result)
    }

    /// Rebuild like state from a freshly fetched post list.
    ///
    /// Prior like state, optimistic or not, is discarded first; nothing is
    /// merged.
    pub fn initialize_like_state(&self, posts: &[Post]) -> Result<(), CacheError> {
        self.write(|state| {
            state.likes.clear();
            for post in posts {
                state.likes.insert(
                    post.id.clone(),
                    LikeState {
                        count: post.like_count,
                        liked_by: post.liked_by.clone(),
                    },
                );
            }
        })?;
        debug!(posts = posts.len(), "like state rebuilt");
        self.notifier.notify();
        Ok(())
    }

    /// Fetch the post list and rebuild like state from it.
    pub async fn load_posts(&self) -> Result<Vec<Post>, CacheError> {
        let posts = self.remote.fetch_posts().await?;
        self.write(|state| state.posts = posts.clone())?;
        self.initialize_like_state(&posts)?;
        Ok(posts)
    }
}
