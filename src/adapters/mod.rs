//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod memory_store;
pub mod scheduler;
pub mod token_auth;
pub mod universe_source;
