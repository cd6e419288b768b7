use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{PostId, UserId};

/// A post as fetched from the remote store.
///
/// `like_count` is the authoritative aggregate across all users; `liked_by`
/// is the set of users the store reports as liking the post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub liked_by: BTreeSet<UserId>,
}

impl Post {
    pub fn new(id: impl Into<PostId>) -> Self {
        Self {
            id: id.into(),
            author_id: None,
            body: String::new(),
            like_count: 0,
            liked_by: BTreeSet::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<UserId>) -> Self {
        self.author_id = Some(author.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_like_count(mut self, count: u64) -> Self {
        self.like_count = count;
        self
    }

    pub fn liked_by<I, U>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        self.liked_by = users.into_iter().map(Into::into).collect();
        self
    }
}
