use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// Subtract one, flooring at zero.
pub(crate) fn decrement(count: &mut u64) {
    *count = count.saturating_sub(1);
}

/// Cached like state of one post.
///
/// `count` is seeded from the remote aggregate and moved by ±1 deltas; it is
/// not derived from `liked_by`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub count: u64,
    pub liked_by: BTreeSet<UserId>,
}

impl LikeState {
    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.liked_by.contains(user)
    }

    /// Flip `user`'s membership and move the count with it. Returns whether
    /// the user likes the post afterwards.
    pub(crate) fn toggle(&mut self, user: &UserId) -> bool {
        if self.liked_by.remove(user) {
            decrement(&mut self.count);
            false
        } else {
            self.liked_by.insert(user.clone());
            self.count += 1;
            true
        }
    }
}

/// Adjacency views and cached counts for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowState {
    pub followers: BTreeSet<UserId>,
    pub following: BTreeSet<UserId>,
    pub follower_count: u64,
    pub following_count: u64,
}

impl FollowState {
    /// Each edit moves the matching count only when the set changed.
    pub(crate) fn add_follower(&mut self, user: &UserId) -> bool {
        let inserted = self.followers.insert(user.clone());
        if inserted {
            self.follower_count += 1;
        }
        inserted
    }

    pub(crate) fn remove_follower(&mut self, user: &UserId) -> bool {
        let removed = self.followers.remove(user);
        if removed {
            decrement(&mut self.follower_count);
        }
        removed
    }

    pub(crate) fn add_following(&mut self, user: &UserId) -> bool {
        let inserted = self.following.insert(user.clone());
        if inserted {
            self.following_count += 1;
        }
        inserted
    }

    pub(crate) fn remove_following(&mut self, user: &UserId) -> bool {
        let removed = self.following.remove(user);
        if removed {
            decrement(&mut self.following_count);
        }
        removed
    }

    /// Full replacement from an authoritative fetch.
    pub(crate) fn replace_followers(&mut self, followers: BTreeSet<UserId>) {
        self.follower_count = followers.len() as u64;
        self.followers = followers;
    }

    pub(crate) fn replace_following(&mut self, following: BTreeSet<UserId>) {
        self.following_count = following.len() as u64;
        self.following = following;
    }
}
