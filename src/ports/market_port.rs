//! Market data ports.

use crate::domain::error::LedgerError;
use crate::domain::price_bar::PriceBar;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Stored daily price history, one row per `(ticker, trade_date)`.
pub trait MarketDataPort: Send + Sync {
    /// Insert-or-ignore. Returns the number of rows actually inserted;
    /// rows already present are skipped without error.
    fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, LedgerError>;

    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, LedgerError>;

    /// Ingestion cursor: the most recent stored `trade_date`.
    fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>, LedgerError>;

    /// Latest stored close, used as the current quote.
    fn latest_quote(&self, ticker: &str) -> Result<Option<Decimal>, LedgerError>;

    fn list_tickers(&self) -> Result<Vec<String>, LedgerError>;

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LedgerError>;
}

/// Upstream provider that ingestion pulls new rows from.
pub trait BarSource: Send + Sync {
    /// Rows for `ticker` strictly after `after` (all rows when `None`).
    fn fetch_since(
        &self,
        ticker: &str,
        after: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, LedgerError>;
}
