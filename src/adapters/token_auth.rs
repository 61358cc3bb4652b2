//! Static bearer-token table from `[auth] tokens`.

use std::collections::HashMap;

use crate::domain::config_validation::parse_token_table;
use crate::domain::error::LedgerError;
use crate::domain::user::UserId;
use crate::ports::auth_port::AuthPort;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        StaticTokenAuth { tokens }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let tokens = match config.get_string("auth", "tokens") {
            Some(raw) => parse_token_table(&raw)?,
            None => HashMap::new(),
        };
        if tokens.is_empty() {
            tracing::warn!("no [auth] tokens configured; every API request will be rejected");
        }
        Ok(Self::new(tokens))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AuthPort for StaticTokenAuth {
    fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token.trim()).copied()
    }
}
