//! Configuration validation.
//!
//! Validates every section the binary reads before any adapter is built.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::domain::error::LedgerError;
use crate::domain::universe::parse_tickers;
use crate::domain::user::UserId;
use crate::ports::config_port::ConfigPort;

pub fn validate_app_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_database(config)?;
    validate_universe(config)?;
    validate_ledger(config)?;
    validate_ingest(config)?;
    validate_web(config)?;
    validate_auth(config)?;
    validate_forecast(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> LedgerError {
    LedgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_database(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    match config.get_string("database", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(LedgerError::ConfigMissing {
                section: "database".to_string(),
                key: "path".to_string(),
            })
        }
    }
    let pool_size = config.get_int("database", "pool_size", 4);
    if pool_size < 1 {
        return Err(invalid("database", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

fn validate_universe(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let tickers = config.get_string("universe", "tickers");
    let file = config.get_string("universe", "file");

    match (tickers, file) {
        (Some(t), _) if !t.trim().is_empty() => parse_tickers(&t)
            .map(|_| ())
            .map_err(|e| invalid("universe", "tickers", e.to_string())),
        (_, Some(f)) if !f.trim().is_empty() => Ok(()),
        _ => Err(LedgerError::ConfigMissing {
            section: "universe".to_string(),
            key: "tickers".to_string(),
        }),
    }
}

fn validate_ledger(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let retries = config.get_int("ledger", "max_retries", 3);
    if !(0..=100).contains(&retries) {
        return Err(invalid("ledger", "max_retries", "max_retries must be between 0 and 100"));
    }
    Ok(())
}

fn validate_ingest(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if !config.get_bool("ingest", "enabled", false) {
        return Ok(());
    }
    match config.get_string("ingest", "data_dir") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(LedgerError::ConfigMissing {
                section: "ingest".to_string(),
                key: "data_dir".to_string(),
            })
        }
    }
    if config.get_int("ingest", "interval_secs", 3600) < 1 {
        return Err(invalid("ingest", "interval_secs", "interval_secs must be positive"));
    }
    Ok(())
}

fn validate_web(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(listen) = config.get_string("web", "listen") {
        listen
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| invalid("web", "listen", format!("'{listen}': {e}")))?;
    }
    Ok(())
}

fn validate_auth(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    if let Some(raw) = config.get_string("auth", "tokens") {
        parse_token_table(&raw)?;
    }
    Ok(())
}

fn validate_forecast(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    let max_days = config.get_int("forecast", "max_days", 30);
    if max_days < 1 {
        return Err(invalid("forecast", "max_days", "max_days must be at least 1"));
    }
    Ok(())
}

/// Parse `token=uuid,token=uuid` into a lookup table.
pub fn parse_token_table(raw: &str) -> Result<HashMap<String, UserId>, LedgerError> {
    let mut table = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (token, user) = pair
            .split_once('=')
            .ok_or_else(|| invalid("auth", "tokens", format!("expected token=uuid, got '{pair}'")))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid("auth", "tokens", "empty token"));
        }
        let user_id = user
            .trim()
            .parse::<UserId>()
            .map_err(|e| invalid("auth", "tokens", format!("bad user id for '{token}': {e}")))?;
        if table.insert(token.to_string(), user_id).is_some() {
            return Err(invalid("auth", "tokens", format!("duplicate token '{token}'")));
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BASE: &str = "[database]\npath = ledger.db\n[universe]\ntickers = AAPL,MSFT\n";

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[database]
path = ledger.db
pool_size = 8

[universe]
tickers = AAPL,MSFT,GOOGL

[ledger]
max_retries = 5

[ingest]
enabled = true
data_dir = data
interval_secs = 600

[web]
listen = 127.0.0.1:8080

[auth]
tokens = alpha=67e55044-10b1-426f-9247-bb680e5fe0c8

[forecast]
max_days = 60
"#,
        );
        assert!(validate_app_config(&config).is_ok());
    }

    #[test]
    fn missing_database_path_fails() {
        let config = make_config("[universe]\ntickers = AAPL\n");
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn pool_size_zero_fails() {
        let config = make_config(
            "[database]\npath = ledger.db\npool_size = 0\n[universe]\ntickers = AAPL\n",
        );
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "pool_size"));
    }

    #[test]
    fn universe_required() {
        let config = make_config("[database]\npath = ledger.db\n");
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing { section, .. } if section == "universe"));
    }

    #[test]
    fn universe_file_is_enough() {
        let config = make_config("[database]\npath = ledger.db\n[universe]\nfile = sp500.csv\n");
        assert!(validate_app_config(&config).is_ok());
    }

    #[test]
    fn duplicate_universe_ticker_fails() {
        let config = make_config("[database]\npath = ledger.db\n[universe]\ntickers = AAPL,aapl\n");
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "tickers"));
    }

    #[test]
    fn negative_retries_fail() {
        let config = make_config(&format!("{BASE}[ledger]\nmax_retries = -1\n"));
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "max_retries"));
    }

    #[test]
    fn enabled_ingest_needs_data_dir() {
        let config = make_config(&format!("{BASE}[ingest]\nenabled = true\n"));
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigMissing { key, .. } if key == "data_dir"));
    }

    #[test]
    fn disabled_ingest_is_not_checked() {
        let config = make_config(&format!("{BASE}[ingest]\nenabled = false\ninterval_secs = 0\n"));
        assert!(validate_app_config(&config).is_ok());
    }

    #[test]
    fn bad_listen_address_fails() {
        let config = make_config(&format!("{BASE}[web]\nlisten = localhost\n"));
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "listen"));
    }

    #[test]
    fn forecast_max_days_zero_fails() {
        let config = make_config(&format!("{BASE}[forecast]\nmax_days = 0\n"));
        let err = validate_app_config(&config).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "max_days"));
    }

    #[test]
    fn token_table_parses() {
        let table = parse_token_table(
            "alpha=67e55044-10b1-426f-9247-bb680e5fe0c8, beta=936da01f-9abd-4d9d-80c7-02af85c822a8",
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table["beta"].to_string(),
            "936da01f-9abd-4d9d-80c7-02af85c822a8"
        );
    }

    #[test]
    fn token_table_rejects_bad_pairs() {
        assert!(parse_token_table("alpha").is_err());
        assert!(parse_token_table("alpha=not-a-uuid").is_err());
        assert!(parse_token_table("=67e55044-10b1-426f-9247-bb680e5fe0c8").is_err());
        assert!(parse_token_table(
            "a=67e55044-10b1-426f-9247-bb680e5fe0c8,a=67e55044-10b1-426f-9247-bb680e5fe0c8"
        )
        .is_err());
    }
}
