//! JSON HTTP adapter.
//!
//! Every route except `/health` requires `Authorization: Bearer <token>`,
//! resolved to a user by the configured [`AuthPort`].

mod auth;
mod error;
mod handlers;

pub use auth::AuthUser;
pub use error::WebError;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::domain::engine::Ledger;
use crate::ports::auth_port::AuthPort;
use crate::ports::forecast_port::Forecaster;
use crate::ports::market_port::MarketDataPort;

pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub market: Arc<dyn MarketDataPort>,
    pub auth: Arc<dyn AuthPort>,
    pub forecaster: Arc<dyn Forecaster>,
    pub max_forecast_days: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transactions", post(handlers::create_transaction))
        .route("/users/me", get(handlers::user_details))
        .route("/users/me/holdings", get(handlers::list_holdings))
        .route("/users/me/transactions", get(handlers::list_transactions))
        .route(
            "/watchlist",
            get(handlers::list_watchlist).post(handlers::add_watchlist),
        )
        .route("/watchlist/{ticker}", delete(handlers::remove_watchlist))
        .route("/stocks/{ticker}", get(handlers::stock_history))
        .route("/stocks/{ticker}/forecast", get(handlers::stock_forecast))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run blocking store work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, WebError>
where
    F: FnOnce() -> Result<T, crate::domain::error::LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WebError::internal(format!("worker failed: {e}")))?
        .map_err(WebError::from)
}
