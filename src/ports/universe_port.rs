//! Ticker universe source port.

use crate::domain::error::LedgerError;

/// Supplies the current set of tradeable symbols on each refresh.
pub trait UniverseSource: Send + Sync {
    fn load_tickers(&self) -> Result<Vec<String>, LedgerError>;
}
