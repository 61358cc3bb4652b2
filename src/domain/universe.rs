//! Ticker universe: the set of symbols the ledger accepts.
//!
//! The set is read-only to the ledger and replaced wholesale by
//! [`TickerUniverse::refresh`] from a [`UniverseSource`].

use std::collections::HashSet;
use std::sync::RwLock;

use crate::domain::error::LedgerError;
use crate::domain::transaction::normalize_ticker;
use crate::ports::universe_port::UniverseSource;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("invalid ticker: {0}")]
    InvalidTicker(String),
}

/// Parse a comma-separated ticker list, upper-casing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let ticker = normalize_ticker(token);
        if ticker.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !is_valid_ticker(&ticker) {
            return Err(UniverseError::InvalidTicker(ticker));
        }
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Letters, digits, `.` and `-` (e.g. `BRK.B`, `BF-B`), at most 10 chars.
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 10
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[derive(Debug, Default)]
pub struct TickerUniverse {
    tickers: RwLock<HashSet<String>>,
}

impl TickerUniverse {
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TickerUniverse {
            tickers: RwLock::new(
                tickers
                    .into_iter()
                    .map(|t| normalize_ticker(t.as_ref()))
                    .filter(|t| is_valid_ticker(t))
                    .collect(),
            ),
        }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        let ticker = normalize_ticker(ticker);
        self.tickers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&ticker)
    }

    pub fn count(&self) -> usize {
        self.tickers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .tickers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Replace the set with the source's current list. Invalid symbols are
    /// skipped with a warning; an empty result keeps the previous set.
    pub fn refresh(&self, source: &dyn UniverseSource) -> Result<usize, LedgerError> {
        let loaded = source.load_tickers()?;
        let mut next = HashSet::with_capacity(loaded.len());
        for raw in loaded {
            let ticker = normalize_ticker(&raw);
            if is_valid_ticker(&ticker) {
                next.insert(ticker);
            } else {
                tracing::warn!(symbol = %raw, "skipping invalid ticker in universe source");
            }
        }

        if next.is_empty() {
            tracing::warn!("universe source returned no tickers; keeping previous set");
            return Ok(self.count());
        }

        let count = next.len();
        *self.tickers.write().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::info!(count, "ticker universe refreshed");
        Ok(count)
    }
}
