use std::fmt;

use crate::error::CacheError;
use crate::model::{LikeState, PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl MutationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Like,
    Unlike,
    Follow,
    Unfollow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Post(PostId),
    User(UserId),
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationTarget::Post(id) => write!(f, "post {}", id),
            MutationTarget::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Lifecycle of an optimistic mutation. `Committed` and `RolledBack` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    AppliedLocally,
    Committed,
    RolledBack,
}

impl MutationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MutationState::AppliedLocally)
    }
}

/// How a like/follow call resolved, as seen by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote store accepted the change; local state already shows it.
    Committed,
    /// The remote store failed; local state was restored.
    RolledBack,
    /// Refused by policy before anything was applied.
    Rejected,
}

/// State captured before the optimistic change, enough to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackSnapshot {
    /// `prior` is `None` when the post had no cached entry.
    Like {
        post_id: PostId,
        prior: Option<LikeState>,
    },
    /// The flags record which adjacency view the optimistic step changed:
    /// `followers[target]` and `following[subject]`. Both are false when the
    /// local layer was already in the requested state.
    Follow {
        subject: UserId,
        target: UserId,
        changed_followers: bool,
        changed_following: bool,
    },
}

/// An in-flight optimistic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    id: MutationId,
    kind: MutationKind,
    snapshot: RollbackSnapshot,
    state: MutationState,
}

impl PendingMutation {
    pub(crate) fn applied(id: MutationId, kind: MutationKind, snapshot: RollbackSnapshot) -> Self {
        Self {
            id,
            kind,
            snapshot,
            state: MutationState::AppliedLocally,
        }
    }

    pub fn id(&self) -> MutationId {
        self.id
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    pub fn snapshot(&self) -> &RollbackSnapshot {
        &self.snapshot
    }

    pub fn target(&self) -> MutationTarget {
        match &self.snapshot {
            RollbackSnapshot::Like { post_id, .. } => MutationTarget::Post(post_id.clone()),
            RollbackSnapshot::Follow { target, .. } => MutationTarget::User(target.clone()),
        }
    }

    pub(crate) fn commit(&mut self) -> Result<(), CacheError> {
        self.transition(MutationState::Committed)
    }

    /// Mark rolled back and hand out the snapshot to restore.
    pub(crate) fn roll_back(&mut self) -> Result<&RollbackSnapshot, CacheError> {
        self.transition(MutationState::RolledBack)?;
        Ok(&self.snapshot)
    }

    fn transition(&mut self, to: MutationState) -> Result<(), CacheError> {
        if self.state.is_terminal() {
            return Err(CacheError::InvalidTransition {
                id: self.id,
                from: self.state,
            });
        }
        self.state = to;
        Ok(())
    }
}
