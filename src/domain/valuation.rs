//! Portfolio valuation at latest stored quotes.

use rust_decimal::Decimal;
use std::collections::HashMap;

use super::error::LedgerError;
use super::holding::Holding;
use crate::ports::market_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct PositionValue {
    pub ticker: String,
    pub shares: i64,
    /// `None` when the market store has no close for the ticker.
    pub price: Option<Decimal>,
    pub market_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct Valuation {
    pub cash: Decimal,
    pub positions: Vec<PositionValue>,
    /// Cash plus every priced position. Unpriced positions are excluded.
    pub total_equity: Decimal,
}

fn overflow(what: &str) -> LedgerError {
    LedgerError::MarketData {
        reason: format!("{what} overflows the decimal range"),
    }
}

pub fn value_holdings(
    cash: Decimal,
    holdings: &[Holding],
    quotes: &HashMap<String, Decimal>,
) -> Result<Valuation, LedgerError> {
    let mut positions = Vec::with_capacity(holdings.len());
    let mut total_equity = cash;
    for h in holdings {
        let price = quotes.get(&h.ticker).copied();
        let market_value = match price {
            Some(p) => Some(
                p.checked_mul(Decimal::from(h.shares))
                    .ok_or_else(|| overflow(&format!("market value of {}", h.ticker)))?,
            ),
            None => None,
        };
        if let Some(value) = market_value {
            total_equity = total_equity
                .checked_add(value)
                .ok_or_else(|| overflow("total equity"))?;
        }
        positions.push(PositionValue {
            ticker: h.ticker.clone(),
            shares: h.shares,
            price,
            market_value,
        });
    }

    Ok(Valuation {
        cash,
        positions,
        total_equity,
    })
}

/// Latest close for each holding's ticker, skipping tickers with no data.
pub fn latest_quotes(
    market: &dyn MarketDataPort,
    holdings: &[Holding],
) -> Result<HashMap<String, Decimal>, LedgerError> {
    let mut quotes = HashMap::with_capacity(holdings.len());
    for holding in holdings {
        if let Some(quote) = market.latest_quote(&holding.ticker)? {
            quotes.insert(holding.ticker.clone(), quote);
        }
    }
    Ok(quotes)
}
