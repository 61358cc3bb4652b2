//! Port traits implemented by adapters.

pub mod auth_port;
pub mod config_port;
pub mod forecast_port;
pub mod ledger_port;
pub mod market_port;
pub mod universe_port;
