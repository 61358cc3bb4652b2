//! In-process store for tests and ephemeral runs.
//!
//! A single mutex guards users, holdings, watchlists and the log, so a
//! commit is atomic by construction. Price bars live behind their own lock
//! and never contend with ledger commits.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};

use crate::domain::error::LedgerError;
use crate::domain::holding::{Holding, HoldingsRegistry};
use crate::domain::ledger::{AccountState, CommitPlan};
use crate::domain::price_bar::PriceBar;
use crate::domain::transaction::Transaction;
use crate::domain::transaction_log::{DateRange, TransactionLog};
use crate::domain::user::{validate_username, User, UserId};
use crate::domain::watchlist::Watchlist;
use crate::ports::ledger_port::LedgerStore;
use crate::ports::market_port::MarketDataPort;

#[derive(Debug)]
struct Account {
    user: User,
    holdings: HoldingsRegistry,
    watchlist: Watchlist,
    version: u64,
}

#[derive(Debug)]
struct Books {
    accounts: HashMap<UserId, Account>,
    log: TransactionLog,
}

pub struct MemoryStore {
    books: Mutex<Books>,
    bars: RwLock<BTreeMap<(String, NaiveDate), PriceBar>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            books: Mutex::new(Books {
                accounts: HashMap::new(),
                log: TransactionLog::new(),
            }),
            bars: RwLock::new(BTreeMap::new()),
        }
    }

    fn books(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn user_not_found(user_id: UserId) -> LedgerError {
    LedgerError::not_found(format!("user {user_id}"))
}

impl Books {
    fn account(&self, user_id: UserId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(&user_id)
            .ok_or_else(|| user_not_found(user_id))
    }

    fn account_mut(&mut self, user_id: UserId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(&user_id)
            .ok_or_else(|| user_not_found(user_id))
    }
}

impl LedgerStore for MemoryStore {
    fn create_user(&self, username: &str) -> Result<User, LedgerError> {
        let name = validate_username(username)?;
        let mut books = self.books();
        if books.accounts.values().any(|a| a.user.username == name) {
            return Err(LedgerError::DuplicateUser { username: name });
        }
        let user = User::register(&name);
        books.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                holdings: HoldingsRegistry::new(),
                watchlist: Watchlist::new(),
                version: 0,
            },
        );
        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> Result<User, LedgerError> {
        Ok(self.books().account(user_id)?.user.clone())
    }

    fn load_account(&self, user_id: UserId) -> Result<AccountState, LedgerError> {
        let books = self.books();
        let account = books.account(user_id)?;
        Ok(AccountState {
            user_id,
            balance: account.user.balance,
            holdings: account.holdings.clone(),
            watchlist: account.watchlist.clone(),
            version: account.version,
        })
    }

    fn commit(&self, plan: &CommitPlan) -> Result<Transaction, LedgerError> {
        let mut books = self.books();
        let account = books.account_mut(plan.user_id)?;
        if account.version != plan.expected_version {
            return Err(LedgerError::Conflict {
                user_id: plan.user_id.to_string(),
            });
        }
        if plan.balance < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds {
                required: account.user.balance - plan.balance,
                available: account.user.balance,
            });
        }

        account.user.balance = plan.balance;
        if let Some(change) = &plan.holding {
            account.holdings.apply(change);
        }
        if let Some(ticker) = &plan.watch {
            account.watchlist.track(ticker);
        }
        account.version += 1;

        Ok(books.log.append(plan.entry.clone()))
    }

    fn get_holding(&self, user_id: UserId, ticker: &str) -> Result<Option<Holding>, LedgerError> {
        let books = self.books();
        let account = books.account(user_id)?;
        Ok(account.holdings.get(ticker).map(|shares| Holding {
            user_id,
            ticker: ticker.to_string(),
            shares,
        }))
    }

    fn list_holdings(&self, user_id: UserId) -> Result<Vec<Holding>, LedgerError> {
        Ok(self.books().account(user_id)?.holdings.to_holdings(user_id))
    }

    fn list_transactions(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let books = self.books();
        books.account(user_id)?;
        Ok(books.log.list(user_id, range))
    }

    fn log_in_commit_order(&self, user_id: UserId) -> Result<Vec<Transaction>, LedgerError> {
        let books = self.books();
        books.account(user_id)?;
        Ok(books.log.commit_order(user_id).cloned().collect())
    }

    fn list_watchlist(&self, user_id: UserId) -> Result<Vec<String>, LedgerError> {
        Ok(self.books().account(user_id)?.watchlist.list())
    }

    fn add_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError> {
        self.books().account_mut(user_id)?.watchlist.add(ticker)
    }

    fn remove_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError> {
        self.books().account_mut(user_id)?.watchlist.remove(ticker)
    }
}

impl MarketDataPort for MemoryStore {
    fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, LedgerError> {
        let mut stored = self.bars.write().unwrap_or_else(|e| e.into_inner());
        let mut inserted = 0;
        for bar in bars {
            let key = (bar.ticker.clone(), bar.trade_date);
            if let std::collections::btree_map::Entry::Vacant(slot) = stored.entry(key) {
                slot.insert(bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, LedgerError> {
        let range = DateRange {
            from: start_date,
            to: end_date,
        };
        let stored = self.bars.read().unwrap_or_else(|e| e.into_inner());
        Ok(stored
            .values()
            .filter(|b| b.ticker == ticker && range.contains(b.trade_date))
            .cloned()
            .collect())
    }

    fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>, LedgerError> {
        let stored = self.bars.read().unwrap_or_else(|e| e.into_inner());
        Ok(stored
            .keys()
            .filter(|(t, _)| t == ticker)
            .map(|(_, d)| *d)
            .max())
    }

    fn latest_quote(&self, ticker: &str) -> Result<Option<Decimal>, LedgerError> {
        let stored = self.bars.read().unwrap_or_else(|e| e.into_inner());
        stored
            .values()
            .filter(|b| b.ticker == ticker)
            .max_by_key(|b| b.trade_date)
            .map(PriceBar::close_quote)
            .transpose()
    }

    fn list_tickers(&self) -> Result<Vec<String>, LedgerError> {
        let stored = self.bars.read().unwrap_or_else(|e| e.into_inner());
        let mut tickers: Vec<String> = stored.keys().map(|(t, _)| t.clone()).collect();
        tickers.dedup();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LedgerError> {
        let stored = self.bars.read().unwrap_or_else(|e| e.into_inner());
        let dates: Vec<NaiveDate> = stored
            .keys()
            .filter(|(t, _)| t == ticker)
            .map(|(_, d)| *d)
            .collect();
        match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Ok(Some((*first, *last, dates.len()))),
            _ => Ok(None),
        }
    }
}
