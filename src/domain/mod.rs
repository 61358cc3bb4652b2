//! Core domain types and logic.

pub mod error;
pub mod user;
pub mod transaction;
pub mod holding;
pub mod watchlist;
pub mod ledger;
pub mod transaction_log;
pub mod engine;
pub mod universe;
pub mod price_bar;
pub mod valuation;
pub mod forecast;
pub mod ingest;
pub mod config_validation;
