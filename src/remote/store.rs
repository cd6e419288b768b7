use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::model::{Post, PostId, UserId};

/// The durable backend the cache mirrors.
///
/// Mutations act on behalf of the backend's own signed-in user. Apply calls
/// should be idempotent (or fail harmlessly) since the cache forwards them
/// even when the local state already reflects the change.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn apply_like(&self, post_id: &PostId) -> Result<(), RemoteError>;

    async fn apply_unlike(&self, post_id: &PostId) -> Result<(), RemoteError>;

    async fn apply_follow(&self, target_id: &UserId) -> Result<(), RemoteError>;

    async fn apply_unfollow(&self, target_id: &UserId) -> Result<(), RemoteError>;

    async fn fetch_followers(&self, uid: &UserId) -> Result<BTreeSet<UserId>, RemoteError>;

    async fn fetch_following(&self, uid: &UserId) -> Result<BTreeSet<UserId>, RemoteError>;

    async fn fetch_posts(&self) -> Result<Vec<Post>, RemoteError>;
}
