//! Daily OHLCV price rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::LedgerError;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct PriceBar {
    pub ticker: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// Close as a decimal quote, rounded to four places.
    pub fn close_quote(&self) -> Result<Decimal, LedgerError> {
        Decimal::try_from(self.close)
            .map(|d| d.round_dp(4))
            .map_err(|e| LedgerError::MarketData {
                reason: format!(
                    "close {} for {} on {} is not representable: {e}",
                    self.close, self.ticker, self.trade_date
                ),
            })
    }
}

/// Close series in date order, as fed to a forecaster.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
