//! Registered users and their cash balance.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LedgerError;

pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub balance: Decimal,
}

/// Trimmed username; empty or over-long names are rejected.
pub fn validate_username(raw: &str) -> Result<String, LedgerError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 64 {
        return Err(LedgerError::InvalidRequest {
            reason: "username must be 1 to 64 characters".into(),
        });
    }
    Ok(name.to_string())
}

impl User {
    /// A freshly registered user starts with a zero balance.
    pub fn register(username: &str) -> Self {
        User {
            id: Uuid::new_v4(),
            username: username.trim().to_string(),
            balance: Decimal::ZERO,
        }
    }
}
