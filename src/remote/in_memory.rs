use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::model::{decrement, Post, PostId, UserId};

use super::identity::IdentityProvider;
use super::store::RemoteStore;

/// Remote store operations, used to script failures and inspect traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    ApplyLike,
    ApplyUnlike,
    ApplyFollow,
    ApplyUnfollow,
    FetchFollowers,
    FetchFollowing,
    FetchPosts,
}

#[derive(Default)]
struct Backend {
    users: BTreeSet<UserId>,
    posts: BTreeMap<PostId, Post>,
    /// (follower, followee)
    edges: BTreeSet<(UserId, UserId)>,
    scripted: HashMap<RemoteOp, VecDeque<RemoteError>>,
    offline: bool,
    calls: Vec<RemoteOp>,
}

/// In-process backend for tests and offline demos.
///
/// Clone-friendly (clones share the same backend). Mutations act as the
/// user reported by the shared identity provider, the way a hosted SDK
/// acts as its signed-in user.
#[derive(Clone)]
pub struct InMemoryRemoteStore {
    backend: Arc<RwLock<Backend>>,
    identity: Arc<dyn IdentityProvider>,
}

impl InMemoryRemoteStore {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            backend: Arc::new(RwLock::new(Backend::default())),
            identity,
        }
    }

    pub fn with_user(self, user: impl Into<UserId>) -> Self {
        self.add_user(user);
        self
    }

    pub fn with_post(self, post: Post) -> Self {
        self.add_post(post);
        self
    }

    pub fn add_user(&self, user: impl Into<UserId>) {
        self.write().users.insert(user.into());
    }

    pub fn add_post(&self, post: Post) {
        self.write().posts.insert(post.id.clone(), post);
    }

    /// Record an edge made outside this client.
    pub fn add_follow(&self, follower: impl Into<UserId>, followee: impl Into<UserId>) {
        let (follower, followee) = (follower.into(), followee.into());
        let mut backend = self.write();
        backend.users.insert(follower.clone());
        backend.users.insert(followee.clone());
        backend.edges.insert((follower, followee));
    }

    pub fn remove_follow(&self, follower: &str, followee: &str) {
        self.write()
            .edges
            .remove(&(UserId::from(follower), UserId::from(followee)));
    }

    /// Make the next call to `op` fail with `error`. Repeated calls queue up.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.write().scripted.entry(op).or_default().push_back(error);
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    pub fn calls(&self) -> Vec<RemoteOp> {
        self.write().calls.clone()
    }

    pub fn post(&self, id: &str) -> Option<Post> {
        self.write().posts.get(id).cloned()
    }

    pub fn is_following(&self, follower: &str, followee: &str) -> bool {
        self.write()
            .edges
            .contains(&(UserId::from(follower), UserId::from(followee)))
    }

    fn write(&self) -> RwLockWriteGuard<'_, Backend> {
        // Test double: a poisoned backend means an assertion already panicked.
        self.backend
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, op: RemoteOp) -> Result<RwLockWriteGuard<'_, Backend>, RemoteError> {
        let mut backend = self.write();
        backend.calls.push(op);
        if backend.offline {
            return Err(RemoteError::Unavailable("backend offline".into()));
        }
        if let Some(error) = backend.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(backend)
    }

    fn actor(&self) -> Result<UserId, RemoteError> {
        self.identity
            .current_user_id()
            .map_err(|_| RemoteError::Unauthenticated)
    }
}

fn followers_in(edges: &BTreeSet<(UserId, UserId)>, uid: &UserId) -> BTreeSet<UserId> {
    edges
        .iter()
        .filter(|(_, followee)| followee == uid)
        .map(|(follower, _)| follower.clone())
        .collect()
}

fn following_in(edges: &BTreeSet<(UserId, UserId)>, uid: &UserId) -> BTreeSet<UserId> {
    edges
        .iter()
        .filter(|(follower, _)| follower == uid)
        .map(|(_, followee)| followee.clone())
        .collect()
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn apply_like(&self, post_id: &PostId) -> Result<(), RemoteError> {
        let actor = self.actor()?;
        let mut backend = self.begin(RemoteOp::ApplyLike)?;
        let post = backend
            .posts
            .get_mut(post_id)
            .ok_or_else(|| RemoteError::NotFound(format!("post {post_id}")))?;
        if post.liked_by.insert(actor) {
            post.like_count += 1;
        }
        Ok(())
    }

    async fn apply_unlike(&self, post_id: &PostId) -> Result<(), RemoteError> {
        let actor = self.actor()?;
        let mut backend = self.begin(RemoteOp::ApplyUnlike)?;
        let post = backend
            .posts
            .get_mut(post_id)
            .ok_or_else(|| RemoteError::NotFound(format!("post {post_id}")))?;
        if post.liked_by.remove(&actor) {
            decrement(&mut post.like_count);
        }
        Ok(())
    }

    async fn apply_follow(&self, target_id: &UserId) -> Result<(), RemoteError> {
        let actor = self.actor()?;
        let mut backend = self.begin(RemoteOp::ApplyFollow)?;
        if !backend.users.contains(target_id) {
            return Err(RemoteError::NotFound(format!("user {target_id}")));
        }
        backend.users.insert(actor.clone());
        backend.edges.insert((actor, target_id.clone()));
        Ok(())
    }

    async fn apply_unfollow(&self, target_id: &UserId) -> Result<(), RemoteError> {
        let actor = self.actor()?;
        let mut backend = self.begin(RemoteOp::ApplyUnfollow)?;
        if !backend.users.contains(target_id) {
            return Err(RemoteError::NotFound(format!("user {target_id}")));
        }
        backend.edges.remove(&(actor, target_id.clone()));
        Ok(())
    }

    async fn fetch_followers(&self, uid: &UserId) -> Result<BTreeSet<UserId>, RemoteError> {
        let backend = self.begin(RemoteOp::FetchFollowers)?;
        if !backend.users.contains(uid) {
            return Err(RemoteError::NotFound(format!("user {uid}")));
        }
        Ok(followers_in(&backend.edges, uid))
    }

    async fn fetch_following(&self, uid: &UserId) -> Result<BTreeSet<UserId>, RemoteError> {
        let backend = self.begin(RemoteOp::FetchFollowing)?;
        if !backend.users.contains(uid) {
            return Err(RemoteError::NotFound(format!("user {uid}")));
        }
        Ok(following_in(&backend.edges, uid))
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>, RemoteError> {
        let backend = self.begin(RemoteOp::FetchPosts)?;
        Ok(backend.posts.values().cloned().collect())
    }
}
