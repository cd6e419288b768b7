use thiserror::Error;

use crate::mutation::{MutationId, MutationState};

/// Errors surfaced by the relation cache and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Network or backend failure during an apply/fetch call.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
    /// No signed-in user; like and follow mutations require one.
    #[error("no authenticated user in session")]
    Unauthenticated,
    /// Target user or post is absent in the remote store.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cache lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// A pending mutation was asked to leave a terminal state.
    #[error("mutation {id} is already {from:?}")]
    InvalidTransition { id: MutationId, from: MutationState },
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("config error: {0}")]
    Config(String),
}

/// Failure reported by a [`RemoteStore`](crate::RemoteStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("no such record: {0}")]
    NotFound(String),
    #[error("backend rejected the request: no session")]
    Unauthenticated,
}

impl From<RemoteError> for CacheError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unavailable(msg) => CacheError::RemoteUnavailable(msg),
            RemoteError::NotFound(what) => CacheError::NotFound(what),
            RemoteError::Unauthenticated => CacheError::Unauthenticated,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Config(err.to_string())
    }
}

impl From<bitcode::Error> for CacheError {
    fn from(err: bitcode::Error) -> Self {
        CacheError::Snapshot(err.to_string())
    }
}
