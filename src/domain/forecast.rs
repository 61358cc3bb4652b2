//! Close-price forecasting: trading-day calendar and the lag-1 linear model.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use super::error::LedgerError;
use super::price_bar::{closes, PriceBar};
use crate::ports::forecast_port::Forecaster;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "web", derive(serde::Serialize))]
pub struct ForecastPoint {
    pub trade_date: NaiveDate,
    pub close: f64,
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Next calendar day that is not a Saturday or Sunday.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Days::new(1);
    while !is_trading_day(next) {
        next = next + Days::new(1);
    }
    next
}

/// The `n` trading days strictly after `last`.
pub fn trading_days_after(last: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(n);
    let mut cursor = last;
    for _ in 0..n {
        cursor = next_trading_day(cursor);
        dates.push(cursor);
    }
    dates
}

/// Ordinary least squares of `close[t+1]` on `close[t]`, walked forward by
/// feeding each prediction back in as the next input.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearForecaster;

impl LinearForecaster {
    /// `(slope, intercept)` of the lag-1 fit.
    pub fn fit(closes: &[f64]) -> Result<(f64, f64), LedgerError> {
        if closes.len() < 2 {
            return Err(LedgerError::Forecast {
                reason: format!("need at least 2 closes, got {}", closes.len()),
            });
        }
        let x = &closes[..closes.len() - 1];
        let y = &closes[1..];
        let n = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / n;
        let mean_y = y.iter().sum::<f64>() / n;

        let (mut cov, mut var) = (0.0, 0.0);
        for (xi, yi) in x.iter().zip(y) {
            cov += (xi - mean_x) * (yi - mean_y);
            var += (xi - mean_x) * (xi - mean_x);
        }

        // Constant input: no slope to learn, predict the mean.
        let slope = if var == 0.0 { 0.0 } else { cov / var };
        Ok((slope, mean_y - slope * mean_x))
    }
}

impl Forecaster for LinearForecaster {
    fn name(&self) -> &str {
        "linear"
    }

    fn predict(&self, closes: &[f64], steps: usize) -> Result<Vec<f64>, LedgerError> {
        let (slope, intercept) = Self::fit(closes)?;
        let mut last = closes[closes.len() - 1];
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            last = slope * last + intercept;
            out.push(last);
        }
        Ok(out)
    }
}

/// Forecast `days` trading days past the last bar. The last actual close is
/// not repeated in the output.
pub fn forecast_bars(
    forecaster: &dyn Forecaster,
    bars: &[PriceBar],
    days: usize,
) -> Result<Vec<ForecastPoint>, LedgerError> {
    let last = bars.last().ok_or_else(|| LedgerError::Forecast {
        reason: "no price history".into(),
    })?;
    let predicted = forecaster.predict(&closes(bars), days)?;
    Ok(trading_days_after(last.trade_date, days)
        .into_iter()
        .zip(predicted)
        .map(|(trade_date, close)| ForecastPoint { trade_date, close })
        .collect())
}
