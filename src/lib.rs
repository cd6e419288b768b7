//! Optimistic client-side cache of likes and follows.
//!
//! Mutations are applied locally first, then confirmed against a
//! [`RemoteStore`]; a remote failure rolls the local change back. Listeners
//! registered with the [`Notifier`] hear about every visible change.

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod remote;
pub mod session;
pub mod snapshot;

pub use cache::RelationCache;
pub use config::{CacheConfig, ConcurrencyPolicy, SelfFollowPolicy};
pub use error::{CacheError, RemoteError};
pub use lock::EntityLocks;
pub use model::{FollowState, LikeState, Post, PostId, UserId};
pub use mutation::{
    MutationId, MutationKind, MutationOutcome, MutationState, MutationTarget, PendingMutation,
    RollbackSnapshot,
};
pub use notify::{MutationFailure, Notifier, SubscriptionId};
pub use remote::{IdentityProvider, InMemoryRemoteStore, RemoteOp, RemoteStore, SessionIdentity};
pub use session::CacheSession;
pub use snapshot::{InMemorySnapshotStore, SnapshotRecord, SnapshotStore};
