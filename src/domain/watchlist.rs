//! Per-account watchlist of tracked tickers.

use std::collections::BTreeSet;

use super::error::LedgerError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    tickers: BTreeSet<String>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }

    /// Explicit add from the API. Fails if the ticker is already tracked.
    pub fn add(&mut self, ticker: &str) -> Result<(), LedgerError> {
        if !self.tickers.insert(ticker.to_string()) {
            return Err(LedgerError::DuplicateWatchlistEntry {
                ticker: ticker.to_string(),
            });
        }
        Ok(())
    }

    /// Implicit add after a buy. Returns true when the ticker was new.
    pub fn track(&mut self, ticker: &str) -> bool {
        self.tickers.insert(ticker.to_string())
    }

    pub fn remove(&mut self, ticker: &str) -> Result<(), LedgerError> {
        if !self.tickers.remove(ticker) {
            return Err(LedgerError::not_found(format!("watchlist entry {ticker}")));
        }
        Ok(())
    }

    /// Tickers in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.tickers.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

impl FromIterator<String> for Watchlist {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Watchlist {
            tickers: iter.into_iter().collect(),
        }
    }
}
