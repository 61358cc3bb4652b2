//! Domain error types.
//!
//! Every rejection produced by the ledger carries the precondition that
//! failed, so a client can render an actionable message.

use rust_decimal::Decimal;

/// Top-level error type for tradeledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown ticker: {ticker}")]
    UnknownTicker { ticker: String },

    #[error("invalid shares: {reason}")]
    InvalidShares { reason: String },

    #[error("invalid amount {amount}: must be positive")]
    InvalidAmount { amount: Decimal },

    #[error("invalid price {price}: must be positive")]
    InvalidPrice { price: Decimal },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("insufficient shares of {ticker}: requested {requested}, held {held}")]
    InsufficientShares {
        ticker: String,
        requested: i64,
        held: i64,
    },

    #[error("no holding in {ticker}")]
    UnknownHolding { ticker: String },

    #[error("{ticker} is already on the watchlist")]
    DuplicateWatchlistEntry { ticker: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("username {username} is already registered")]
    DuplicateUser { username: String },

    #[error("concurrent update to account {user_id}")]
    Conflict { user_id: String },

    #[error("transaction log for {user_id} diverges from live state: {reason}")]
    ReplayDiverged { user_id: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("forecast error: {reason}")]
    Forecast { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound { what: what.into() }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UnknownTicker { .. } => "unknown_ticker",
            LedgerError::InvalidShares { .. } => "invalid_shares",
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InvalidPrice { .. } => "invalid_price",
            LedgerError::InvalidRequest { .. } => "invalid_request",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InsufficientShares { .. } => "insufficient_shares",
            LedgerError::UnknownHolding { .. } => "unknown_holding",
            LedgerError::DuplicateWatchlistEntry { .. } => "duplicate_watchlist_entry",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::DuplicateUser { .. } => "duplicate_user",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::ReplayDiverged { .. } => "replay_diverged",
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => "database",
            LedgerError::MarketData { .. } => "market_data",
            LedgerError::Forecast { .. } => "forecast",
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => "config",
            LedgerError::Io(_) => "io",
        }
    }

    /// True for rejections detected during request validation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::UnknownTicker { .. }
                | LedgerError::InvalidShares { .. }
                | LedgerError::InvalidAmount { .. }
                | LedgerError::InvalidPrice { .. }
                | LedgerError::InvalidRequest { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InsufficientShares { .. }
                | LedgerError::UnknownHolding { .. }
                | LedgerError::DuplicateWatchlistEntry { .. }
                | LedgerError::NotFound { .. }
                | LedgerError::DuplicateUser { .. }
        )
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. }
            | LedgerError::DatabaseQuery { .. }
            | LedgerError::Conflict { .. } => 3,
            LedgerError::ReplayDiverged { .. } => 4,
            LedgerError::MarketData { .. } | LedgerError::Forecast { .. } => 5,
            _ => 6,
        };
        std::process::ExitCode::from(code)
    }
}
