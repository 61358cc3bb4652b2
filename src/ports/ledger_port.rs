//! Ledger storage port.
//!
//! A store is the single owner of users, holdings, watchlists and the
//! transaction log. `commit` must write every part of a [`CommitPlan`] or
//! none of it.

use crate::domain::error::LedgerError;
use crate::domain::holding::Holding;
use crate::domain::ledger::{AccountState, CommitPlan};
use crate::domain::transaction::Transaction;
use crate::domain::transaction_log::DateRange;
use crate::domain::user::{User, UserId};

pub trait LedgerStore: Send + Sync {
    /// Register a new user with a zero balance.
    fn create_user(&self, username: &str) -> Result<User, LedgerError>;

    fn get_user(&self, user_id: UserId) -> Result<User, LedgerError>;

    /// Balance, holdings, watchlist and version in one consistent read.
    fn load_account(&self, user_id: UserId) -> Result<AccountState, LedgerError>;

    /// Atomically apply `plan` and append its log entry. Fails with
    /// `Conflict` when the account version no longer matches.
    fn commit(&self, plan: &CommitPlan) -> Result<Transaction, LedgerError>;

    fn get_holding(&self, user_id: UserId, ticker: &str) -> Result<Option<Holding>, LedgerError>;

    fn list_holdings(&self, user_id: UserId) -> Result<Vec<Holding>, LedgerError>;

    /// Entries ordered by `trade_date` ascending, ties by id.
    fn list_transactions(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Entries in commit order, for replay.
    fn log_in_commit_order(&self, user_id: UserId) -> Result<Vec<Transaction>, LedgerError>;

    fn list_watchlist(&self, user_id: UserId) -> Result<Vec<String>, LedgerError>;

    /// Explicit add; fails with `DuplicateWatchlistEntry` if present.
    fn add_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError>;

    /// Fails with `NotFound` if absent.
    fn remove_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError>;
}
