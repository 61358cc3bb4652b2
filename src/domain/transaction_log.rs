//! Append-only transaction log.

use chrono::NaiveDate;

use super::error::LedgerError;
use super::ledger::{replay, AccountState};
use super::transaction::{NewTransaction, Transaction};
use super::user::UserId;

/// Inclusive `trade_date` window for log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

/// Sort for presentation: `trade_date` ascending, then commit order.
pub fn sort_for_listing(entries: &mut [Transaction]) {
    entries.sort_by(|a, b| a.trade_date.cmp(&b.trade_date).then(a.id.cmp(&b.id)));
}

/// In-memory log shared by every account. Ids are global and strictly
/// increasing in commit order.
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
    next_id: i64,
}

impl TransactionLog {
    pub fn new() -> Self {
        TransactionLog {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn append(&mut self, entry: NewTransaction) -> Transaction {
        let committed = entry.with_id(self.next_id);
        self.next_id += 1;
        self.entries.push(committed.clone());
        committed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for `user_id` inside `range`, ordered by `trade_date`.
    pub fn list(&self, user_id: UserId, range: DateRange) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && range.contains(e.trade_date))
            .cloned()
            .collect();
        sort_for_listing(&mut out);
        out
    }

    /// Entries for `user_id` in commit order.
    pub fn commit_order(&self, user_id: UserId) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().filter(move |e| e.user_id == user_id)
    }

    pub fn recompute(&self, user_id: UserId) -> Result<AccountState, LedgerError> {
        replay(user_id, self.commit_order(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::TransactionKind;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn deposit(user: UserId, day: u32) -> NewTransaction {
        NewTransaction {
            user_id: user,
            kind: TransactionKind::Deposit,
            ticker: None,
            shares: None,
            price: dec!(10),
            trade_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let mut log = TransactionLog::new();
        let user = Uuid::new_v4();
        let a = log.append(deposit(user, 1));
        let b = log.append(deposit(user, 1));
        assert!(b.id > a.id);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn list_orders_by_trade_date_not_commit() {
        let mut log = TransactionLog::new();
        let user = Uuid::new_v4();
        log.append(deposit(user, 5));
        log.append(deposit(user, 2));
        log.append(deposit(Uuid::new_v4(), 1));

        let listed = log.list(user, DateRange::all());
        let days: Vec<_> = listed.iter().map(|e| e.trade_date).collect();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            ]
        );
    }

    #[test]
    fn list_filters_by_range() {
        let mut log = TransactionLog::new();
        let user = Uuid::new_v4();
        for day in 1..=5 {
            log.append(deposit(user, day));
        }
        let range = DateRange::between(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        );
        assert_eq!(log.list(user, range).len(), 2);
    }

    #[test]
    fn recompute_sums_deposits() {
        let mut log = TransactionLog::new();
        let user = Uuid::new_v4();
        log.append(deposit(user, 1));
        log.append(deposit(user, 2));
        assert_eq!(log.recompute(user).unwrap().balance, dec!(20));
    }
}
