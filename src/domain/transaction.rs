//! Transaction requests and committed transaction records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;
use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "web", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "web", serde(rename_all = "lowercase"))]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Buy,
    Sell,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
        }
    }

    /// Buy and sell carry a ticker and a share count; cash movements do not.
    pub fn is_trade(&self) -> bool {
        matches!(self, TransactionKind::Buy | TransactionKind::Sell)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdraw" => Ok(TransactionKind::Withdraw),
            "buy" => Ok(TransactionKind::Buy),
            "sell" => Ok(TransactionKind::Sell),
            other => Err(LedgerError::InvalidRequest {
                reason: format!("unknown transaction type '{other}'"),
            }),
        }
    }
}

/// A request as submitted by a client. For deposit and withdraw, `price`
/// is the cash amount.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Deserialize))]
pub struct TransactionRequest {
    #[cfg_attr(feature = "web", serde(rename = "transaction_type"))]
    pub kind: TransactionKind,
    #[cfg_attr(feature = "web", serde(default))]
    pub ticker: Option<String>,
    #[cfg_attr(feature = "web", serde(default))]
    pub shares: Option<i64>,
    pub price: Decimal,
    #[cfg_attr(feature = "web", serde(default))]
    pub trade_date: Option<NaiveDate>,
}

impl TransactionRequest {
    pub fn deposit(amount: Decimal) -> Self {
        Self::cash(TransactionKind::Deposit, amount)
    }

    pub fn withdraw(amount: Decimal) -> Self {
        Self::cash(TransactionKind::Withdraw, amount)
    }

    pub fn buy(ticker: &str, shares: i64, price: Decimal) -> Self {
        Self::trade(TransactionKind::Buy, ticker, shares, price)
    }

    pub fn sell(ticker: &str, shares: i64, price: Decimal) -> Self {
        Self::trade(TransactionKind::Sell, ticker, shares, price)
    }

    pub fn on(mut self, trade_date: NaiveDate) -> Self {
        self.trade_date = Some(trade_date);
        self
    }

    fn cash(kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            kind,
            ticker: None,
            shares: None,
            price: amount,
            trade_date: None,
        }
    }

    fn trade(kind: TransactionKind, ticker: &str, shares: i64, price: Decimal) -> Self {
        Self {
            kind,
            ticker: Some(ticker.to_string()),
            shares: Some(shares),
            price,
            trade_date: None,
        }
    }

    /// Ticker trimmed and upper-cased; `None` when absent or blank.
    pub fn normalized_ticker(&self) -> Option<String> {
        self.ticker
            .as_deref()
            .map(normalize_ticker)
            .filter(|t| !t.is_empty())
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A transaction that passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub ticker: Option<String>,
    pub shares: Option<i64>,
    pub price: Decimal,
    pub trade_date: NaiveDate,
}

impl NewTransaction {
    pub fn with_id(self, id: i64) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            kind: self.kind,
            ticker: self.ticker,
            shares: self.shares,
            price: self.price,
            trade_date: self.trade_date,
        }
    }
}

/// Immutable record in the transaction log.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct Transaction {
    pub id: i64,
    pub user_id: UserId,
    #[cfg_attr(feature = "web", serde(rename = "transaction_type"))]
    pub kind: TransactionKind,
    pub ticker: Option<String>,
    pub shares: Option<i64>,
    pub price: Decimal,
    pub trade_date: NaiveDate,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ticker, self.shares) {
            (Some(ticker), Some(shares)) => write!(
                f,
                "#{} {} {} {} {} @ {}",
                self.id, self.trade_date, self.kind, shares, ticker, self.price
            ),
            _ => write!(
                f,
                "#{} {} {} {}",
                self.id, self.trade_date, self.kind, self.price
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn entry(kind: TransactionKind, shares: Option<i64>, price: Decimal) -> Transaction {
        Transaction {
            id: 1,
            user_id: Uuid::nil(),
            kind,
            ticker: shares.map(|_| "AAPL".to_string()),
            shares,
            price,
            trade_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        }
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("BUY".parse::<TransactionKind>().unwrap(), TransactionKind::Buy);
        assert_eq!(
            " withdraw ".parse::<TransactionKind>().unwrap(),
            TransactionKind::Withdraw
        );
        assert!("transfer".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn normalized_ticker_trims_and_uppercases() {
        let req = TransactionRequest::buy("  aapl ", 1, dec!(10));
        assert_eq!(req.normalized_ticker().as_deref(), Some("AAPL"));

        let blank = TransactionRequest::buy("   ", 1, dec!(10));
        assert_eq!(blank.normalized_ticker(), None);
    }

    #[test]
    fn display_trade_and_cash() {
        let buy = entry(TransactionKind::Buy, Some(10), dec!(50.00));
        assert_eq!(buy.to_string(), "#1 2024-01-02 buy 10 AAPL @ 50.00");
        let dep = entry(TransactionKind::Deposit, None, dec!(1000));
        assert_eq!(dep.to_string(), "#1 2024-01-02 deposit 1000");
    }
}
