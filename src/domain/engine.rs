//! Ledger engine: serializes work per user and commits through a store.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::error::LedgerError;
use super::holding::Holding;
use super::ledger::{self, AccountState};
use super::transaction::{normalize_ticker, Transaction, TransactionRequest};
use super::transaction_log::DateRange;
use super::universe::TickerUniverse;
use super::user::{User, UserId};
use super::valuation::{latest_quotes, value_holdings, Valuation};
use crate::ports::ledger_port::LedgerStore;
use crate::ports::market_port::MarketDataPort;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One mutex per user, created on first use.
#[derive(Default)]
struct UserLocks {
    slots: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn slot(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(user_id).or_default().clone()
    }
}

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    universe: Arc<TickerUniverse>,
    locks: UserLocks,
    max_retries: u32,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, universe: Arc<TickerUniverse>) -> Self {
        Ledger {
            store,
            universe,
            locks: UserLocks::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn universe(&self) -> &Arc<TickerUniverse> {
        &self.universe
    }

    pub fn register(&self, username: &str) -> Result<User, LedgerError> {
        let user = self.store.create_user(username)?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub fn execute(
        &self,
        user_id: UserId,
        request: &TransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        self.execute_on(user_id, request, Utc::now().date_naive())
    }

    /// Execute with an explicit commit date for requests without one.
    pub fn execute_on(
        &self,
        user_id: UserId,
        request: &TransactionRequest,
        today: NaiveDate,
    ) -> Result<Transaction, LedgerError> {
        // Universe lookup stays outside the user lock.
        let ticker_listed = request
            .normalized_ticker()
            .is_some_and(|t| self.universe.contains(&t));
        let entry = ledger::validate(user_id, request, ticker_listed, today)
            .inspect_err(|e| log_rejection(user_id, request, e))?;

        let slot = self.locks.slot(user_id);
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());

        let mut attempt = 0;
        loop {
            let state = self.store.load_account(user_id)?;
            let plan = ledger::plan(&state, entry.clone())
                .inspect_err(|e| log_rejection(user_id, request, e))?;

            match self.store.commit(&plan) {
                Ok(committed) => {
                    tracing::info!(
                        %user_id,
                        id = committed.id,
                        kind = %committed.kind,
                        ticker = committed.ticker.as_deref().unwrap_or("-"),
                        balance = %plan.balance,
                        "transaction committed"
                    );
                    return Ok(committed);
                }
                Err(LedgerError::Conflict { .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(%user_id, attempt, "account changed during commit, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn account(&self, user_id: UserId) -> Result<AccountState, LedgerError> {
        self.store.load_account(user_id)
    }

    pub fn holdings(&self, user_id: UserId) -> Result<Vec<Holding>, LedgerError> {
        self.store.get_user(user_id)?;
        self.store.list_holdings(user_id)
    }

    pub fn transactions(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.store.get_user(user_id)?;
        self.store.list_transactions(user_id, range)
    }

    pub fn watchlist(&self, user_id: UserId) -> Result<Vec<String>, LedgerError> {
        self.store.get_user(user_id)?;
        self.store.list_watchlist(user_id)
    }

    /// Explicit watchlist add. Returns the normalized ticker.
    pub fn watch(&self, user_id: UserId, ticker: &str) -> Result<String, LedgerError> {
        let ticker = normalize_ticker(ticker);
        if !self.universe.contains(&ticker) {
            return Err(LedgerError::UnknownTicker { ticker });
        }
        let slot = self.locks.slot(user_id);
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        self.store.get_user(user_id)?;
        self.store.add_watchlist(user_id, &ticker)?;
        tracing::info!(%user_id, %ticker, "watchlist entry added");
        Ok(ticker)
    }

    pub fn unwatch(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError> {
        let ticker = normalize_ticker(ticker);
        let slot = self.locks.slot(user_id);
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        self.store.get_user(user_id)?;
        self.store.remove_watchlist(user_id, &ticker)?;
        tracing::info!(%user_id, %ticker, "watchlist entry removed");
        Ok(())
    }

    /// Value the account at latest stored closes. Quotes are read without
    /// holding the user lock.
    pub fn valuation(
        &self,
        user_id: UserId,
        market: &dyn MarketDataPort,
    ) -> Result<Valuation, LedgerError> {
        let account = self.store.load_account(user_id)?;
        let holdings = account.holdings();
        let quotes = latest_quotes(market, &holdings)?;
        value_holdings(account.balance, &holdings, &quotes)
    }

    /// Replay the log under the user lock and compare with live state.
    pub fn verify(&self, user_id: UserId) -> Result<AccountState, LedgerError> {
        let slot = self.locks.slot(user_id);
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        let live = self.store.load_account(user_id)?;
        let log = self.store.log_in_commit_order(user_id)?;
        let replayed = ledger::verify(&live, &log)?;
        tracing::info!(%user_id, entries = log.len(), "ledger verified against log");
        Ok(replayed)
    }
}

fn log_rejection(user_id: UserId, request: &TransactionRequest, err: &LedgerError) {
    tracing::info!(
        %user_id,
        kind = %request.kind,
        reason = err.kind(),
        error = %err,
        "transaction rejected"
    );
}
