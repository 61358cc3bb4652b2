//! Authentication port.

use crate::domain::user::UserId;

/// Resolves an opaque bearer credential to a user. No other credential
/// logic lives in this crate.
pub trait AuthPort: Send + Sync {
    fn resolve(&self, token: &str) -> Option<UserId>;
}
