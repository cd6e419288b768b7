use std::sync::RwLock;

use crate::error::CacheError;
use crate::model::UserId;

/// Source of the current user's identity.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `Unauthenticated` when there is no session.
    fn current_user_id(&self) -> Result<UserId, CacheError>;
}

/// Identity held in process memory; sign-in and sign-out swap it.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<UserId>>,
}

impl SessionIdentity {
    /// A provider with no signed-in user.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self {
            user: RwLock::new(Some(user.into())),
        }
    }

    pub fn sign_in(&self, user: impl Into<UserId>) -> Result<(), CacheError> {
        let mut current = self
            .user
            .write()
            .map_err(|_| CacheError::LockPoisoned("identity write"))?;
        *current = Some(user.into());
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), CacheError> {
        let mut current = self
            .user
            .write()
            .map_err(|_| CacheError::LockPoisoned("identity write"))?;
        *current = None;
        Ok(())
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Result<UserId, CacheError> {
        self.user
            .read()
            .map_err(|_| CacheError::LockPoisoned("identity read"))?
            .clone()
            .ok_or(CacheError::Unauthenticated)
    }
}
