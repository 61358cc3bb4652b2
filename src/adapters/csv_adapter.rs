//! CSV bar source: one `<TICKER>.csv` per symbol in a data directory.
//!
//! Columns are located by header name, so the downloader layout
//! (`,Datetime,Open,High,Low,Close,Adj Close,Volume` with a leading index
//! column) and a plain `date,open,high,low,close,volume` file both load.

use crate::domain::error::LedgerError;
use crate::domain::price_bar::PriceBar;
use crate::ports::market_port::BarSource;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, LedgerError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| LedgerError::MarketData {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Columns {
            date: find(&["datetime", "date"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, LedgerError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| LedgerError::MarketData {
            reason: format!("missing {name} value"),
        })
}

fn parse_f64(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, LedgerError> {
    field(record, idx, name)?
        .parse()
        .map_err(|e| LedgerError::MarketData {
            reason: format!("invalid {name} value: {e}"),
        })
}

/// Accepts `YYYY-MM-DD` with an optional time or offset suffix.
fn parse_trade_date(raw: &str) -> Result<NaiveDate, LedgerError> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| LedgerError::MarketData {
        reason: format!("invalid date '{raw}': {e}"),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    pub fn read_bars(&self, ticker: &str) -> Result<Vec<PriceBar>, LedgerError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| LedgerError::MarketData {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| LedgerError::MarketData {
                reason: format!("CSV header error in {}: {e}", path.display()),
            })?
            .clone();
        let cols = Columns::locate(&headers)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| LedgerError::MarketData {
                reason: format!("CSV parse error: {e}"),
            })?;
            let raw_date = field(&record, cols.date, "date")?;
            if raw_date.is_empty() {
                continue;
            }

            bars.push(PriceBar {
                ticker: ticker.to_string(),
                trade_date: parse_trade_date(raw_date)?,
                open: parse_f64(&record, cols.open, "open")?,
                high: parse_f64(&record, cols.high, "high")?,
                low: parse_f64(&record, cols.low, "low")?,
                close: parse_f64(&record, cols.close, "close")?,
                // Some exports write volume as a float.
                volume: parse_f64(&record, cols.volume, "volume")? as i64,
            });
        }

        bars.sort_by_key(|b| b.trade_date);
        Ok(bars)
    }

    /// Tickers with a `.csv` file in the data directory.
    pub fn list_symbols(&self) -> Result<Vec<String>, LedgerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| LedgerError::MarketData {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(ticker) = name.to_string_lossy().strip_suffix(".csv") {
                symbols.push(ticker.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

impl BarSource for CsvAdapter {
    fn fetch_since(
        &self,
        ticker: &str,
        after: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, LedgerError> {
        let mut bars = self.read_bars(ticker)?;
        if let Some(cursor) = after {
            bars.retain(|b| b.trade_date > cursor);
        }
        Ok(bars)
    }
}
