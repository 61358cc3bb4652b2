#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;
use tradeledger::adapters::memory_store::MemoryStore;
use tradeledger::domain::engine::Ledger;
use tradeledger::domain::price_bar::PriceBar;
use tradeledger::domain::transaction::TransactionRequest;
use tradeledger::domain::universe::TickerUniverse;
use tradeledger::domain::user::UserId;
use tradeledger::ports::ledger_port::LedgerStore;

pub const TICKERS: [&str; 3] = ["AAPL", "MSFT", "GOOG"];

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn universe() -> Arc<TickerUniverse> {
    Arc::new(TickerUniverse::new(TICKERS))
}

pub fn memory_ledger() -> (Arc<MemoryStore>, Ledger) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store.clone(), universe());
    (store, ledger)
}

#[cfg(feature = "sqlite")]
pub fn sqlite_ledger() -> (
    Arc<tradeledger::adapters::sqlite_adapter::SqliteAdapter>,
    Ledger,
) {
    let store = Arc::new(tradeledger::adapters::sqlite_adapter::SqliteAdapter::in_memory().unwrap());
    store.initialize_schema().unwrap();
    let ledger = Ledger::new(store.clone(), universe());
    (store, ledger)
}

/// Register `name` and deposit `amount` dated 2024-01-01.
pub fn funded_user(ledger: &Ledger, name: &str, amount: Decimal) -> UserId {
    let user = ledger.register(name).unwrap();
    if amount > Decimal::ZERO {
        ledger
            .execute(user.id, &TransactionRequest::deposit(amount).on(date("2024-01-01")))
            .unwrap();
    }
    user.id
}

pub fn balance(store: &dyn LedgerStore, user_id: UserId) -> Decimal {
    store.get_user(user_id).unwrap().balance
}

/// Consecutive daily bars with a linear close.
pub fn generate_bars(ticker: &str, start: &str, count: usize, base: f64, step: f64) -> Vec<PriceBar> {
    let start = date(start);
    (0..count)
        .map(|i| {
            let close = base + step * i as f64;
            PriceBar {
                ticker: ticker.to_string(),
                trade_date: start + Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000 + i as i64,
            }
        })
        .collect()
}
