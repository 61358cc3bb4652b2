//! Holdings registry: per-ticker share counts for one account.

use std::collections::BTreeMap;

use super::error::LedgerError;
use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct Holding {
    pub user_id: UserId,
    pub ticker: String,
    pub shares: i64,
}

/// Outcome of a share change, as it must be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingChange {
    /// Row now holds `shares` (created if absent).
    Set { ticker: String, shares: i64 },
    /// Row reached zero and must not exist any more.
    Delete { ticker: String },
}

/// Share counts keyed by ticker. A stored count is always positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldingsRegistry {
    shares: BTreeMap<String, i64>,
}

impl HoldingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ticker: &str) -> Option<i64> {
        self.shares.get(ticker).copied()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.shares.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.shares.iter().map(|(t, s)| (t.as_str(), *s))
    }

    pub fn upsert_add(&mut self, ticker: &str, delta: i64) -> Result<HoldingChange, LedgerError> {
        if delta <= 0 {
            return Err(LedgerError::InvalidShares {
                reason: format!("share delta must be positive, got {delta}"),
            });
        }
        let entry = self.shares.entry(ticker.to_string()).or_insert(0);
        *entry = entry
            .checked_add(delta)
            .ok_or_else(|| LedgerError::InvalidShares {
                reason: format!("share count overflow for {ticker}"),
            })?;
        Ok(HoldingChange::Set {
            ticker: ticker.to_string(),
            shares: *entry,
        })
    }

    pub fn reduce_or_delete(
        &mut self,
        ticker: &str,
        delta: i64,
    ) -> Result<HoldingChange, LedgerError> {
        if delta <= 0 {
            return Err(LedgerError::InvalidShares {
                reason: format!("share delta must be positive, got {delta}"),
            });
        }
        let held = self
            .get(ticker)
            .ok_or_else(|| LedgerError::UnknownHolding {
                ticker: ticker.to_string(),
            })?;
        if held < delta {
            return Err(LedgerError::InsufficientShares {
                ticker: ticker.to_string(),
                requested: delta,
                held,
            });
        }

        let remaining = held - delta;
        if remaining == 0 {
            self.shares.remove(ticker);
            Ok(HoldingChange::Delete {
                ticker: ticker.to_string(),
            })
        } else {
            self.shares.insert(ticker.to_string(), remaining);
            Ok(HoldingChange::Set {
                ticker: ticker.to_string(),
                shares: remaining,
            })
        }
    }

    /// Write a change computed elsewhere, as a store does on commit.
    pub fn apply(&mut self, change: &HoldingChange) {
        match change {
            HoldingChange::Set { ticker, shares } => {
                self.shares.insert(ticker.clone(), *shares);
            }
            HoldingChange::Delete { ticker } => {
                self.shares.remove(ticker);
            }
        }
    }

    pub fn to_holdings(&self, user_id: UserId) -> Vec<Holding> {
        self.shares
            .iter()
            .map(|(ticker, shares)| Holding {
                user_id,
                ticker: ticker.clone(),
                shares: *shares,
            })
            .collect()
    }
}

impl FromIterator<(String, i64)> for HoldingsRegistry {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        HoldingsRegistry {
            shares: iter.into_iter().filter(|(_, s)| *s > 0).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_creates_then_increments() {
        let mut reg = HoldingsRegistry::new();
        assert_eq!(
            reg.upsert_add("AAPL", 10).unwrap(),
            HoldingChange::Set {
                ticker: "AAPL".into(),
                shares: 10
            }
        );
        reg.upsert_add("AAPL", 5).unwrap();
        assert_eq!(reg.get("AAPL"), Some(15));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reduce_to_zero_deletes_row() {
        let mut reg = HoldingsRegistry::new();
        reg.upsert_add("MSFT", 3).unwrap();
        let change = reg.reduce_or_delete("MSFT", 3).unwrap();
        assert_eq!(
            change,
            HoldingChange::Delete {
                ticker: "MSFT".into()
            }
        );
        assert!(!reg.contains("MSFT"));
        assert!(reg.is_empty());
    }

    #[test]
    fn partial_reduce_keeps_remaining() {
        let mut reg = HoldingsRegistry::new();
        reg.upsert_add("MSFT", 8).unwrap();
        reg.reduce_or_delete("MSFT", 3).unwrap();
        assert_eq!(reg.get("MSFT"), Some(5));
    }

    #[test]
    fn reduce_below_zero_is_rejected_without_change() {
        let mut reg = HoldingsRegistry::new();
        reg.upsert_add("MSFT", 2).unwrap();
        let err = reg.reduce_or_delete("MSFT", 3).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientShares {
                requested: 3,
                held: 2,
                ..
            }
        ));
        assert_eq!(reg.get("MSFT"), Some(2));
    }

    #[test]
    fn reduce_missing_is_unknown_holding() {
        let mut reg = HoldingsRegistry::new();
        assert!(matches!(
            reg.reduce_or_delete("TSLA", 1),
            Err(LedgerError::UnknownHolding { .. })
        ));
    }

    #[test]
    fn non_positive_delta_rejected() {
        let mut reg = HoldingsRegistry::new();
        assert!(reg.upsert_add("AAPL", 0).is_err());
        assert!(reg.upsert_add("AAPL", -1).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn from_iter_drops_empty_rows() {
        let reg: HoldingsRegistry = vec![("AAPL".to_string(), 4), ("MSFT".to_string(), 0)]
            .into_iter()
            .collect();
        assert_eq!(reg.len(), 1);
    }
}
