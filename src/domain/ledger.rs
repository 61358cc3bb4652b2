//! Ledger state transitions.
//!
//! Everything here is a pure function of `(account state, request)`. A request
//! is validated in two steps: [`validate`] performs the stateless checks
//! (shape, universe membership, positivity) and [`plan`] applies the result to
//! a copy of the account, yielding a [`CommitPlan`] that a store writes
//! atomically. The live account is never touched when either step fails.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::holding::{Holding, HoldingChange, HoldingsRegistry};
use super::transaction::{NewTransaction, Transaction, TransactionKind, TransactionRequest};
use super::user::UserId;
use super::watchlist::Watchlist;

/// Snapshot of one user's account as loaded from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub user_id: UserId,
    pub balance: Decimal,
    pub holdings: HoldingsRegistry,
    pub watchlist: Watchlist,
    /// Bumped by every commit; used for optimistic concurrency.
    pub version: u64,
}

impl AccountState {
    pub fn empty(user_id: UserId) -> Self {
        AccountState {
            user_id,
            balance: Decimal::ZERO,
            holdings: HoldingsRegistry::new(),
            watchlist: Watchlist::new(),
            version: 0,
        }
    }

    pub fn holdings(&self) -> Vec<Holding> {
        self.holdings.to_holdings(self.user_id)
    }

    /// Apply the effects of one entry in place.
    ///
    /// Returns the holding row change and the ticker newly added to the
    /// watchlist, if any. On error `self` may be partially modified, so
    /// callers work on a clone.
    fn apply_effects(
        &mut self,
        kind: TransactionKind,
        ticker: Option<&str>,
        shares: Option<i64>,
        price: Decimal,
    ) -> Result<(Option<HoldingChange>, Option<String>), LedgerError> {
        match kind {
            TransactionKind::Deposit => {
                self.credit(price)?;
                Ok((None, None))
            }
            TransactionKind::Withdraw => {
                self.debit(price)?;
                Ok((None, None))
            }
            TransactionKind::Buy => {
                let (ticker, shares) = trade_fields(kind, ticker, shares)?;
                let cost = notional(shares, price)?;
                self.debit(cost)?;
                let change = self.holdings.upsert_add(ticker, shares)?;
                let tracked = self.watchlist.track(ticker).then(|| ticker.to_string());
                Ok((Some(change), tracked))
            }
            TransactionKind::Sell => {
                let (ticker, shares) = trade_fields(kind, ticker, shares)?;
                let change = self.holdings.reduce_or_delete(ticker, shares)?;
                self.credit(notional(shares, price)?)?;
                Ok((Some(change), None))
            }
        }
    }

    fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        self.balance =
            self.balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::InvalidRequest {
                    reason: format!("crediting {amount} overflows the balance"),
                })?;
        Ok(())
    }

    fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

fn trade_fields(
    kind: TransactionKind,
    ticker: Option<&str>,
    shares: Option<i64>,
) -> Result<(&str, i64), LedgerError> {
    match (ticker, shares) {
        (Some(t), Some(s)) => Ok((t, s)),
        _ => Err(LedgerError::InvalidRequest {
            reason: format!("{kind} requires a ticker and shares"),
        }),
    }
}

fn notional(shares: i64, price: Decimal) -> Result<Decimal, LedgerError> {
    price
        .checked_mul(Decimal::from(shares))
        .ok_or_else(|| LedgerError::InvalidRequest {
            reason: format!("notional of {shares} x {price} overflows"),
        })
}

/// Everything a store must write, atomically, to commit one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPlan {
    pub user_id: UserId,
    /// Version the plan was computed against; the commit fails with
    /// `Conflict` if the stored account has moved on.
    pub expected_version: u64,
    pub balance: Decimal,
    pub holding: Option<HoldingChange>,
    pub watch: Option<String>,
    pub entry: NewTransaction,
}

/// Stateless checks. `ticker_listed` is the universe lookup for the request's
/// normalized ticker, resolved by the caller before any lock is taken.
pub fn validate(
    user_id: UserId,
    request: &TransactionRequest,
    ticker_listed: bool,
    today: NaiveDate,
) -> Result<NewTransaction, LedgerError> {
    let trade_date = request.trade_date.unwrap_or(today);

    if !request.kind.is_trade() {
        if request.normalized_ticker().is_some() || request.shares.is_some() {
            return Err(LedgerError::InvalidRequest {
                reason: format!("{} does not take a ticker or shares", request.kind),
            });
        }
        if request.price <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: request.price,
            });
        }
        return Ok(NewTransaction {
            user_id,
            kind: request.kind,
            ticker: None,
            shares: None,
            price: request.price,
            trade_date,
        });
    }

    let ticker = request
        .normalized_ticker()
        .ok_or_else(|| LedgerError::InvalidRequest {
            reason: format!("{} requires a ticker", request.kind),
        })?;
    if !ticker_listed {
        return Err(LedgerError::UnknownTicker { ticker });
    }
    let shares = match request.shares {
        None => {
            return Err(LedgerError::InvalidShares {
                reason: "shares are required".into(),
            });
        }
        Some(s) if s <= 0 => {
            return Err(LedgerError::InvalidShares {
                reason: format!("shares must be positive, got {s}"),
            });
        }
        Some(s) => s,
    };
    if request.price <= Decimal::ZERO {
        return Err(LedgerError::InvalidPrice {
            price: request.price,
        });
    }

    Ok(NewTransaction {
        user_id,
        kind: request.kind,
        ticker: Some(ticker),
        shares: Some(shares),
        price: request.price,
        trade_date,
    })
}

/// Stateful checks against the current account; computes the post-commit
/// balance and row changes without touching `state`.
pub fn plan(state: &AccountState, entry: NewTransaction) -> Result<CommitPlan, LedgerError> {
    let mut next = state.clone();
    let (holding, watch) =
        next.apply_effects(entry.kind, entry.ticker.as_deref(), entry.shares, entry.price)?;

    Ok(CommitPlan {
        user_id: state.user_id,
        expected_version: state.version,
        balance: next.balance,
        holding,
        watch,
        entry,
    })
}

/// Fold log entries, in commit order, over an empty account.
pub fn replay<'a, I>(user_id: UserId, entries: I) -> Result<AccountState, LedgerError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut state = AccountState::empty(user_id);
    let mut last_id = i64::MIN;
    for entry in entries {
        if entry.id <= last_id {
            return Err(LedgerError::ReplayDiverged {
                user_id: user_id.to_string(),
                reason: format!("entry #{} is out of commit order", entry.id),
            });
        }
        last_id = entry.id;
        state
            .apply_effects(entry.kind, entry.ticker.as_deref(), entry.shares, entry.price)
            .map_err(|e| LedgerError::ReplayDiverged {
                user_id: user_id.to_string(),
                reason: format!("entry #{} cannot be applied: {e}", entry.id),
            })?;
        state.version += 1;
    }
    Ok(state)
}

/// Check that the log reproduces the live balance and holdings.
pub fn verify<'a, I>(live: &AccountState, entries: I) -> Result<AccountState, LedgerError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let replayed = replay(live.user_id, entries)?;
    if replayed.balance != live.balance {
        return Err(LedgerError::ReplayDiverged {
            user_id: live.user_id.to_string(),
            reason: format!(
                "balance is {} but the log yields {}",
                live.balance, replayed.balance
            ),
        });
    }
    if replayed.holdings != live.holdings {
        return Err(LedgerError::ReplayDiverged {
            user_id: live.user_id.to_string(),
            reason: "holdings differ from the log".into(),
        });
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn funded(balance: Decimal) -> AccountState {
        let mut state = AccountState::empty(Uuid::new_v4());
        state.balance = balance;
        state
    }

    fn commit(state: &mut AccountState, plan: &CommitPlan) {
        state.balance = plan.balance;
        if let Some(change) = &plan.holding {
            state.holdings.apply(change);
        }
        if let Some(t) = &plan.watch {
            state.watchlist.track(t);
        }
        state.version += 1;
    }

    fn run(
        state: &mut AccountState,
        request: TransactionRequest,
    ) -> Result<CommitPlan, LedgerError> {
        let entry = validate(state.user_id, &request, true, today())?;
        let plan = plan(state, entry)?;
        commit(state, &plan);
        Ok(plan)
    }

    #[test]
    fn deposit_overflowing_balance_is_rejected() {
        let mut state = funded(dec!(0));
        run(&mut state, TransactionRequest::deposit(Decimal::MAX)).unwrap();

        let err = run(&mut state, TransactionRequest::deposit(Decimal::ONE)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest { .. }));
        assert_eq!(state.balance, Decimal::MAX);
        assert_eq!(state.version, 1);
    }

    #[test]
    fn sell_overflowing_balance_is_rejected() {
        let mut state = funded(dec!(10));
        run(&mut state, TransactionRequest::buy("AAPL", 1, dec!(10))).unwrap();
        run(&mut state, TransactionRequest::deposit(Decimal::MAX)).unwrap();

        let err = run(&mut state, TransactionRequest::sell("AAPL", 1, dec!(10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest { .. }));
        assert_eq!(state.balance, Decimal::MAX);
        assert_eq!(state.holdings.get("AAPL"), Some(1));
    }

    #[test]
    fn deposit_increases_balance() {
        let mut state = funded(dec!(0));
        let plan = run(&mut state, TransactionRequest::deposit(dec!(250.50))).unwrap();
        assert_eq!(plan.balance, dec!(250.50));
        assert_eq!(plan.entry.trade_date, today());
        assert!(plan.holding.is_none());
    }

    #[test]
    fn non_positive_deposit_rejected() {
        let state = funded(dec!(10));
        let err = validate(
            state.user_id,
            &TransactionRequest::deposit(dec!(0)),
            true,
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
    }

    #[test]
    fn withdraw_more_than_balance_fails() {
        let state = funded(dec!(100.00));
        let entry = validate(
            state.user_id,
            &TransactionRequest::withdraw(dec!(150.00)),
            true,
            today(),
        )
        .unwrap();
        match plan(&state, entry) {
            Err(LedgerError::InsufficientFunds {
                required,
                available,
            }) => {
                assert_eq!(required, dec!(150.00));
                assert_eq!(available, dec!(100.00));
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(state.balance, dec!(100.00));
    }

    #[test]
    fn buy_then_sell_scenario() {
        let mut state = funded(dec!(1000.00));
        let buy = run(&mut state, TransactionRequest::buy("AAPL", 10, dec!(50.00))).unwrap();
        assert_eq!(buy.balance, dec!(500.00));
        assert_eq!(
            buy.holding,
            Some(HoldingChange::Set {
                ticker: "AAPL".into(),
                shares: 10
            })
        );
        assert_eq!(buy.watch.as_deref(), Some("AAPL"));

        let sell = run(&mut state, TransactionRequest::sell("AAPL", 10, dec!(60.00))).unwrap();
        assert_eq!(sell.balance, dec!(1100.00));
        assert_eq!(
            sell.holding,
            Some(HoldingChange::Delete {
                ticker: "AAPL".into()
            })
        );
        assert!(!state.holdings.contains("AAPL"));
    }

    #[test]
    fn second_buy_does_not_retrack() {
        let mut state = funded(dec!(1000));
        run(&mut state, TransactionRequest::buy("AAPL", 1, dec!(10))).unwrap();
        let again = run(&mut state, TransactionRequest::buy("AAPL", 1, dec!(10))).unwrap();
        assert_eq!(again.watch, None);
        assert_eq!(state.watchlist.len(), 1);
    }

    #[test]
    fn unlisted_ticker_rejected_before_shares() {
        let err = validate(
            Uuid::new_v4(),
            &TransactionRequest::buy("ZZZZ", 0, dec!(1)),
            false,
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTicker { ticker } if ticker == "ZZZZ"));
    }

    #[test]
    fn missing_or_negative_shares_rejected() {
        let mut req = TransactionRequest::buy("AAPL", -2, dec!(1));
        assert!(matches!(
            validate(Uuid::new_v4(), &req, true, today()),
            Err(LedgerError::InvalidShares { .. })
        ));
        req.shares = None;
        assert!(matches!(
            validate(Uuid::new_v4(), &req, true, today()),
            Err(LedgerError::InvalidShares { .. })
        ));
    }

    #[test]
    fn deposit_with_ticker_rejected() {
        let mut req = TransactionRequest::deposit(dec!(5));
        req.ticker = Some("AAPL".into());
        assert!(matches!(
            validate(Uuid::new_v4(), &req, true, today()),
            Err(LedgerError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn caller_trade_date_wins() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();
        let entry = validate(
            Uuid::new_v4(),
            &TransactionRequest::deposit(dec!(5)).on(date),
            true,
            today(),
        )
        .unwrap();
        assert_eq!(entry.trade_date, date);
    }

    #[test]
    fn oversell_leaves_state_untouched() {
        let mut state = funded(dec!(100));
        run(&mut state, TransactionRequest::buy("MSFT", 2, dec!(10))).unwrap();
        let before = state.clone();

        let entry = validate(
            state.user_id,
            &TransactionRequest::sell("MSFT", 3, dec!(10)),
            true,
            today(),
        )
        .unwrap();
        assert!(matches!(
            plan(&state, entry),
            Err(LedgerError::InsufficientShares { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn sell_without_holding_is_unknown_holding() {
        let state = funded(dec!(100));
        let entry = validate(
            state.user_id,
            &TransactionRequest::sell("MSFT", 1, dec!(10)),
            true,
            today(),
        )
        .unwrap();
        assert!(matches!(
            plan(&state, entry),
            Err(LedgerError::UnknownHolding { .. })
        ));
    }

    #[test]
    fn replay_reproduces_balance_and_holdings() {
        let user = Uuid::new_v4();
        let d = today();
        let log = vec![
            NewTransaction {
                user_id: user,
                kind: TransactionKind::Deposit,
                ticker: None,
                shares: None,
                price: dec!(1000),
                trade_date: d,
            }
            .with_id(1),
            NewTransaction {
                user_id: user,
                kind: TransactionKind::Buy,
                ticker: Some("AAPL".into()),
                shares: Some(4),
                price: dec!(100),
                trade_date: d,
            }
            .with_id(2),
            NewTransaction {
                user_id: user,
                kind: TransactionKind::Sell,
                ticker: Some("AAPL".into()),
                shares: Some(1),
                price: dec!(120),
                trade_date: d,
            }
            .with_id(5),
        ];
        let state = replay(user, &log).unwrap();
        assert_eq!(state.balance, dec!(720));
        assert_eq!(state.holdings.get("AAPL"), Some(3));
        assert_eq!(state.version, 3);
    }

    #[test]
    fn replay_rejects_impossible_log() {
        let user = Uuid::new_v4();
        let log = vec![
            NewTransaction {
                user_id: user,
                kind: TransactionKind::Withdraw,
                ticker: None,
                shares: None,
                price: dec!(1),
                trade_date: today(),
            }
            .with_id(1),
        ];
        assert!(matches!(
            replay(user, &log),
            Err(LedgerError::ReplayDiverged { .. })
        ));
    }

    #[test]
    fn verify_detects_balance_drift() {
        let user = Uuid::new_v4();
        let log = vec![
            NewTransaction {
                user_id: user,
                kind: TransactionKind::Deposit,
                ticker: None,
                shares: None,
                price: dec!(10),
                trade_date: today(),
            }
            .with_id(1),
        ];
        let mut live = AccountState::empty(user);
        live.balance = dec!(11);
        assert!(matches!(
            verify(&live, &log),
            Err(LedgerError::ReplayDiverged { .. })
        ));
        live.balance = dec!(10);
        assert!(verify(&live, &log).is_ok());
    }
}
