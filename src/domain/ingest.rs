//! Incremental market-data ingestion.
//!
//! Each ticker is pulled from its stored cursor (latest `trade_date`) and
//! written insert-or-ignore, so repeated runs never duplicate a row.

use std::sync::Arc;

use super::error::LedgerError;
use super::universe::TickerUniverse;
use crate::ports::market_port::{BarSource, MarketDataPort};
use crate::ports::universe_port::UniverseSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub tickers: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub failed: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.tickers += other.tickers;
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.failed += other.failed;
    }
}

pub fn ingest_ticker(
    market: &dyn MarketDataPort,
    source: &dyn BarSource,
    ticker: &str,
) -> Result<IngestReport, LedgerError> {
    let cursor = market.latest_date(ticker)?;
    let bars = source.fetch_since(ticker, cursor)?;
    let inserted = if bars.is_empty() {
        0
    } else {
        market.insert_bars(&bars)?
    };
    tracing::debug!(ticker, ?cursor, fetched = bars.len(), inserted, "ticker ingested");
    Ok(IngestReport {
        tickers: 1,
        fetched: bars.len(),
        inserted,
        failed: 0,
    })
}

/// Ingest every ticker, continuing past per-ticker failures.
pub fn ingest_all<S: AsRef<str>>(
    market: &dyn MarketDataPort,
    source: &dyn BarSource,
    tickers: &[S],
) -> IngestReport {
    let mut report = IngestReport::default();
    for ticker in tickers {
        let ticker = ticker.as_ref();
        match ingest_ticker(market, source, ticker) {
            Ok(r) => report.absorb(r),
            Err(e) => {
                tracing::warn!(ticker, error = %e, "ingestion failed");
                report.tickers += 1;
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        tickers = report.tickers,
        inserted = report.inserted,
        failed = report.failed,
        "ingestion pass complete"
    );
    report
}

/// One ingestion pass over the current universe, optionally refreshing the
/// universe from its source first.
pub struct IngestJob {
    market: Arc<dyn MarketDataPort>,
    source: Arc<dyn BarSource>,
    universe: Arc<TickerUniverse>,
    universe_source: Option<Arc<dyn UniverseSource>>,
}

impl IngestJob {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        source: Arc<dyn BarSource>,
        universe: Arc<TickerUniverse>,
    ) -> Self {
        IngestJob {
            market,
            source,
            universe,
            universe_source: None,
        }
    }

    pub fn with_universe_source(mut self, source: Arc<dyn UniverseSource>) -> Self {
        self.universe_source = Some(source);
        self
    }

    pub fn run_once(&self) -> IngestReport {
        if let Some(source) = &self.universe_source {
            if let Err(e) = self.universe.refresh(source.as_ref()) {
                tracing::warn!(error = %e, "universe refresh failed; keeping previous set");
            }
        }
        ingest_all(
            self.market.as_ref(),
            self.source.as_ref(),
            &self.universe.tickers(),
        )
    }
}
