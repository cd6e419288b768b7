use std::time::{Duration, SystemTime};

use crate::error::CacheError;
use crate::model::UserId;

/// A stored warm-start image: whose session it belongs to, when it was
/// taken, and the encoded cache contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub user_id: UserId,
    pub taken_at: SystemTime,
    pub data: Vec<u8>,
}

impl SnapshotRecord {
    pub fn new(user_id: impl Into<UserId>, data: Vec<u8>) -> Self {
        Self {
            user_id: user_id.into(),
            taken_at: SystemTime::now(),
            data,
        }
    }

    /// Time since the snapshot was taken; zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.taken_at)
            .unwrap_or_default()
    }
}

/// Persistence for warm-start snapshots, one per user (latest wins).
pub trait SnapshotStore: Send + Sync {
    fn get_snapshot(&self, user_id: &str) -> Result<Option<SnapshotRecord>, CacheError>;

    fn save_snapshot(&self, record: SnapshotRecord) -> Result<(), CacheError>;

    /// Returns true if a snapshot existed.
    fn delete_snapshot(&self, user_id: &str) -> Result<bool, CacheError>;
}
