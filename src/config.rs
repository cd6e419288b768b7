//! Cache configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable config:
//!
//! ```ignore
//! let config = CacheConfig::from_json(r#"{ "concurrency": "serialized" }"#)?;
//! assert!(config.reconcile_after_follow);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// How overlapping mutations on the same entity are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Each call captures its own snapshot at call time. A rollback from an
    /// earlier call can overwrite the optimistic state of a later one.
    #[default]
    AcceptRace,
    /// Mutations on the same post or followee run one at a time, from
    /// optimistic apply through commit or rollback.
    Serialized,
}

/// Whether a user may follow themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfFollowPolicy {
    #[default]
    Allow,
    /// Self-follow/unfollow resolves as `MutationOutcome::Rejected` with no
    /// local change and no remote call.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Re-fetch follower/following sets after a confirmed follow or unfollow.
    pub reconcile_after_follow: bool,
    pub concurrency: ConcurrencyPolicy,
    pub self_follow: SelfFollowPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reconcile_after_follow: true,
            concurrency: ConcurrencyPolicy::AcceptRace,
            self_follow: SelfFollowPolicy::Allow,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_reconciliation(mut self, enabled: bool) -> Self {
        self.reconcile_after_follow = enabled;
        self
    }

    pub fn with_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = policy;
        self
    }

    pub fn with_self_follow(mut self, policy: SelfFollowPolicy) -> Self {
        self.self_follow = policy;
        self
    }
}
