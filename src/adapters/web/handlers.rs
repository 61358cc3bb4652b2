//! HTTP request handlers for the JSON API.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::error::LedgerError;
use crate::domain::forecast::{forecast_bars, ForecastPoint};
use crate::domain::holding::Holding;
use crate::domain::price_bar::PriceBar;
use crate::domain::transaction::{normalize_ticker, Transaction, TransactionRequest};
use crate::domain::transaction_log::DateRange;
use crate::domain::user::User;
use crate::domain::valuation::Valuation;

use super::{blocking, AppState, AuthUser, WebError};

#[derive(Debug, Default, serde::Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, WebError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(WebError::bad_request("'from' must not be after 'to'"));
            }
        }
        Ok(DateRange {
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ForecastQuery {
    pub days: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
pub struct WatchRequest {
    pub ticker: String,
}

#[derive(Debug, serde::Serialize)]
pub struct UserDetails {
    pub user: User,
    pub holdings: Vec<Holding>,
    pub transactions: Vec<Transaction>,
    pub watchlist: Vec<String>,
    pub valuation: Valuation,
}

const DEFAULT_FORECAST_DAYS: usize = 5;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(request) = body.map_err(|e| WebError::bad_request(e.body_text()))?;
    let ledger = state.ledger.clone();
    let committed = blocking(move || ledger.execute(user_id, &request)).await?;
    Ok((StatusCode::CREATED, Json(committed)).into_response())
}

pub async fn user_details(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserDetails>, WebError> {
    let ledger = state.ledger.clone();
    let market = state.market.clone();
    let details = blocking(move || {
        Ok(UserDetails {
            user: ledger.store().get_user(user_id)?,
            holdings: ledger.holdings(user_id)?,
            transactions: ledger.transactions(user_id, DateRange::all())?,
            watchlist: ledger.watchlist(user_id)?,
            valuation: ledger.valuation(user_id, market.as_ref())?,
        })
    })
    .await?;
    Ok(Json(details))
}

pub async fn list_holdings(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Holding>>, WebError> {
    let ledger = state.ledger.clone();
    Ok(Json(blocking(move || ledger.holdings(user_id)).await?))
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Transaction>>, WebError> {
    let range = query.range()?;
    let ledger = state.ledger.clone();
    Ok(Json(
        blocking(move || ledger.transactions(user_id, range)).await?,
    ))
}

pub async fn list_watchlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<String>>, WebError> {
    let ledger = state.ledger.clone();
    Ok(Json(blocking(move || ledger.watchlist(user_id)).await?))
}

pub async fn add_watchlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<WatchRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(request) = body.map_err(|e| WebError::bad_request(e.body_text()))?;
    let ledger = state.ledger.clone();
    let ticker = blocking(move || ledger.watch(user_id, &request.ticker)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "ticker": ticker })),
    )
        .into_response())
}

pub async fn remove_watchlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(ticker): Path<String>,
) -> Result<StatusCode, WebError> {
    let ledger = state.ledger.clone();
    blocking(move || ledger.unwatch(user_id, &ticker)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stock_history(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(ticker): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<PriceBar>>, WebError> {
    let range = query.range()?;
    let ticker = normalize_ticker(&ticker);
    let market = state.market.clone();
    let bars = blocking(move || {
        let bars = market.fetch_bars(&ticker, range.from, range.to)?;
        if bars.is_empty() && market.latest_date(&ticker)?.is_none() {
            return Err(LedgerError::not_found(format!("price history for {ticker}")));
        }
        Ok(bars)
    })
    .await?;
    Ok(Json(bars))
}

pub async fn stock_forecast(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(ticker): Path<String>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Vec<ForecastPoint>>, WebError> {
    let days = query.days.unwrap_or(DEFAULT_FORECAST_DAYS);
    if days == 0 || days > state.max_forecast_days {
        return Err(WebError::bad_request(format!(
            "days must be between 1 and {}",
            state.max_forecast_days
        )));
    }

    let ticker = normalize_ticker(&ticker);
    let market = state.market.clone();
    let forecaster = state.forecaster.clone();
    let points = blocking(move || {
        let bars = market.fetch_bars(&ticker, None, None)?;
        if bars.is_empty() {
            return Err(LedgerError::not_found(format!("price history for {ticker}")));
        }
        forecast_bars(forecaster.as_ref(), &bars, days)
    })
    .await?;
    Ok(Json(points))
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such route")
}
