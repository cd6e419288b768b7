use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::model::{FollowState, LikeState, Post, PostId, UserId};

use super::relation_cache::{CacheState, RelationCache};

/// Settled cache contents as written to a warm-start snapshot.
/// Pending mutations are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheImage {
    likes: Vec<(PostId, LikeState)>,
    follows: Vec<(UserId, FollowState)>,
    posts: Vec<Post>,
}

impl RelationCache {
    /// Encode the like and follow maps and the post list with `bitcode`.
    ///
    /// Fails while any mutation is still pending: an image taken then would
    /// capture optimistic values that may yet be rolled back.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, CacheError> {
        let image = self.read(|state| -> Result<CacheImage, CacheError> {
            if !state.pending.is_empty() {
                return Err(CacheError::Snapshot(format!(
                    "{} mutation(s) still pending",
                    state.pending.len()
                )));
            }
            let mut likes: Vec<_> = state
                .likes
                .iter()
                .map(|(id, like)| (id.clone(), like.clone()))
                .collect();
            likes.sort_by(|a, b| a.0.cmp(&b.0));
            let mut follows: Vec<_> = state
                .follows
                .iter()
                .map(|(id, follow)| (id.clone(), follow.clone()))
                .collect();
            follows.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(CacheImage {
                likes,
                follows,
                posts: state.posts.clone(),
            })
        })??;
        let bytes = bitcode::serialize(&image)?;
        debug!(
            likes = image.likes.len(),
            follows = image.follows.len(),
            bytes = bytes.len(),
            "cache snapshot exported"
        );
        Ok(bytes)
    }

    /// Replace all cached state with a previously exported image and notify.
    ///
    /// Refused while mutations are pending. On a decode error the cache is
    /// left untouched.
    pub fn restore_snapshot(&self, bytes: &[u8]) -> Result<(), CacheError> {
        let image: CacheImage = bitcode::deserialize(bytes)?;
        self.write(|state| -> Result<(), CacheError> {
            if !state.pending.is_empty() {
                return Err(CacheError::Snapshot(format!(
                    "cannot restore over {} pending mutation(s)",
                    state.pending.len()
                )));
            }
            *state = CacheState {
                likes: image.likes.into_iter().collect(),
                follows: image.follows.into_iter().collect(),
                posts: image.posts,
                pending: Default::default(),
            };
            Ok(())
        })??;
        debug!("cache snapshot restored");
        self.notifier.notify();
        Ok(())
    }
}
