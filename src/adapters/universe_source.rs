//! Universe sources: config list, symbol-list file, market store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::MarketDataPort;
use crate::ports::universe_port::UniverseSource;

/// Fixed list, usually `[universe] tickers`.
pub struct ListSource {
    tickers: Vec<String>,
}

impl ListSource {
    pub fn new(tickers: Vec<String>) -> Self {
        ListSource { tickers }
    }
}

impl UniverseSource for ListSource {
    fn load_tickers(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.tickers.clone())
    }
}

/// A symbol file re-read on every refresh: either one ticker per line, or a
/// CSV whose header has a `Symbol` column.
pub struct SymbolFileSource {
    path: PathBuf,
}

impl SymbolFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SymbolFileSource { path: path.into() }
    }
}

impl UniverseSource for SymbolFileSource {
    fn load_tickers(&self) -> Result<Vec<String>, LedgerError> {
        let content = fs::read_to_string(&self.path).map_err(|e| LedgerError::MarketData {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;

        let first = content.lines().next().unwrap_or_default();
        if !first.contains(',') {
            return Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect());
        }

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let col = rdr
            .headers()
            .map_err(|e| LedgerError::MarketData {
                reason: format!("CSV header error: {e}"),
            })?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("symbol"))
            .ok_or_else(|| LedgerError::MarketData {
                reason: format!("{} has no Symbol column", self.path.display()),
            })?;

        let mut tickers = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| LedgerError::MarketData {
                reason: format!("CSV parse error: {e}"),
            })?;
            if let Some(symbol) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) {
                tickers.push(symbol.to_string());
            }
        }
        Ok(tickers)
    }
}

/// Every ticker with stored price history.
pub struct MarketTickerSource {
    market: Arc<dyn MarketDataPort>,
}

impl MarketTickerSource {
    pub fn new(market: Arc<dyn MarketDataPort>) -> Self {
        MarketTickerSource { market }
    }
}

impl UniverseSource for MarketTickerSource {
    fn load_tickers(&self) -> Result<Vec<String>, LedgerError> {
        self.market.list_tickers()
    }
}

/// `[universe] tickers` wins over `[universe] file`; with neither, the
/// universe follows the market store.
pub fn from_config(
    config: &dyn ConfigPort,
    market: Arc<dyn MarketDataPort>,
) -> Box<dyn UniverseSource> {
    let tickers = config.get_list("universe", "tickers");
    if !tickers.is_empty() {
        return Box::new(ListSource::new(tickers));
    }
    match config.get_string("universe", "file") {
        Some(path) if !path.trim().is_empty() => Box::new(SymbolFileSource::new(path.trim())),
        _ => Box::new(MarketTickerSource::new(market)),
    }
}
