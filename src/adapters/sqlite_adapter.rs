//! SQLite ledger and market-data store.
//!
//! Decimals and UUIDs are stored as TEXT, dates as `YYYY-MM-DD`. Every
//! commit runs in an IMMEDIATE transaction and re-checks the account version.

use crate::domain::error::LedgerError;
use crate::domain::holding::{Holding, HoldingChange, HoldingsRegistry};
use crate::domain::ledger::{AccountState, CommitPlan};
use crate::domain::price_bar::PriceBar;
use crate::domain::transaction::Transaction;
use crate::domain::transaction_log::DateRange;
use crate::domain::user::{validate_username, User, UserId};
use crate::domain::watchlist::Watchlist;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerStore;
use crate::ports::market_port::MarketDataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FMT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    balance TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS holdings (
    user_id TEXT NOT NULL REFERENCES users(id),
    ticker TEXT NOT NULL,
    shares INTEGER NOT NULL CHECK (shares > 0),
    PRIMARY KEY (user_id, ticker)
);
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    kind TEXT NOT NULL CHECK (kind IN ('deposit', 'withdraw', 'buy', 'sell')),
    ticker TEXT,
    shares INTEGER,
    price TEXT NOT NULL,
    trade_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date
    ON transactions(user_id, trade_date, id);
CREATE TABLE IF NOT EXISTS watchlist (
    user_id TEXT NOT NULL REFERENCES users(id),
    ticker TEXT NOT NULL,
    PRIMARY KEY (user_id, ticker)
);
CREATE TABLE IF NOT EXISTS price_bars (
    ticker TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume INTEGER NOT NULL,
    PRIMARY KEY (ticker, trade_date)
);
CREATE INDEX IF NOT EXISTS idx_price_bars_date ON price_bars(trade_date);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> LedgerError {
    LedgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn corrupt(what: &str, value: &str, e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Database {
        reason: format!("stored {what} '{value}' is unreadable: {e}"),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, LedgerError> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|e| corrupt("date", value, e))
}

fn parse_decimal(value: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(value).map_err(|e| corrupt("decimal", value, e))
}

fn parse_user_id(value: &str) -> Result<UserId, LedgerError> {
    UserId::parse_str(value).map_err(|e| corrupt("user id", value, e))
}

fn with_pragmas(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
}

/// Raw `transactions` row before decoding.
type TxRow = (i64, String, String, Option<String>, Option<i64>, String, String);

fn decode_transaction(row: TxRow) -> Result<Transaction, LedgerError> {
    let (id, user_id, kind, ticker, shares, price, trade_date) = row;
    Ok(Transaction {
        id,
        user_id: parse_user_id(&user_id)?,
        kind: kind.parse().map_err(|e| corrupt("kind", &kind, e))?,
        ticker,
        shares,
        price: parse_decimal(&price)?,
        trade_date: parse_date(&trade_date)?,
    })
}

fn read_user(conn: &Connection, user_id: UserId) -> Result<(User, u64), LedgerError> {
    let row: Option<(String, String, i64)> = conn
        .query_row(
            "SELECT username, balance, version FROM users WHERE id = ?1",
            params![user_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(query_err)?;

    let (username, balance, version) =
        row.ok_or_else(|| LedgerError::not_found(format!("user {user_id}")))?;
    Ok((
        User {
            id: user_id,
            username,
            balance: parse_decimal(&balance)?,
        },
        version as u64,
    ))
}

fn read_holdings(conn: &Connection, user_id: UserId) -> Result<HoldingsRegistry, LedgerError> {
    let mut stmt = conn
        .prepare("SELECT ticker, shares FROM holdings WHERE user_id = ?1 ORDER BY ticker")
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(query_err)?;
    rows.collect::<Result<HoldingsRegistry, _>>().map_err(query_err)
}

fn read_watchlist(conn: &Connection, user_id: UserId) -> Result<Vec<String>, LedgerError> {
    let mut stmt = conn
        .prepare("SELECT ticker FROM watchlist WHERE user_id = ?1 ORDER BY ticker")
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![user_id.to_string()], |row| row.get(0))
        .map_err(query_err)?;
    rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| LedgerError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("database", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path).with_init(with_pragmas);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(path = %db_path, pool_size, "sqlite pool opened");
        Ok(Self { pool })
    }

    /// Single-connection in-memory database.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory().with_init(with_pragmas);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(pool_err)
    }

    fn ensure_user(conn: &Connection, user_id: UserId) -> Result<(), LedgerError> {
        read_user(conn, user_id).map(|_| ())
    }
}

impl LedgerStore for SqliteAdapter {
    fn create_user(&self, username: &str) -> Result<User, LedgerError> {
        let name = validate_username(username)?;
        let user = User::register(&name);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, username, balance, version) VALUES (?1, ?2, ?3, 0)",
            params![user.id.to_string(), user.username, user.balance.to_string()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                LedgerError::DuplicateUser {
                    username: name.clone(),
                }
            }
            other => query_err(other),
        })?;
        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> Result<User, LedgerError> {
        let conn = self.conn()?;
        read_user(&conn, user_id).map(|(user, _)| user)
    }

    fn load_account(&self, user_id: UserId) -> Result<AccountState, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let (user, version) = read_user(&tx, user_id)?;
        let holdings = read_holdings(&tx, user_id)?;
        let watchlist: Watchlist = read_watchlist(&tx, user_id)?.into_iter().collect();
        tx.finish().map_err(query_err)?;

        Ok(AccountState {
            user_id,
            balance: user.balance,
            holdings,
            watchlist,
            version,
        })
    }

    fn commit(&self, plan: &CommitPlan) -> Result<Transaction, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let uid = plan.user_id.to_string();

        let (_, version) = read_user(&tx, plan.user_id)?;
        if version != plan.expected_version {
            return Err(LedgerError::Conflict { user_id: uid });
        }

        tx.execute(
            "UPDATE users SET balance = ?1, version = version + 1 WHERE id = ?2",
            params![plan.balance.to_string(), uid],
        )
        .map_err(query_err)?;

        match &plan.holding {
            Some(HoldingChange::Set { ticker, shares }) => {
                tx.execute(
                    "INSERT INTO holdings (user_id, ticker, shares) VALUES (?1, ?2, ?3)
                     ON CONFLICT (user_id, ticker) DO UPDATE SET shares = excluded.shares",
                    params![uid, ticker, shares],
                )
                .map_err(query_err)?;
            }
            Some(HoldingChange::Delete { ticker }) => {
                tx.execute(
                    "DELETE FROM holdings WHERE user_id = ?1 AND ticker = ?2",
                    params![uid, ticker],
                )
                .map_err(query_err)?;
            }
            None => {}
        }

        if let Some(ticker) = &plan.watch {
            tx.execute(
                "INSERT OR IGNORE INTO watchlist (user_id, ticker) VALUES (?1, ?2)",
                params![uid, ticker],
            )
            .map_err(query_err)?;
        }

        let entry = &plan.entry;
        tx.execute(
            "INSERT INTO transactions (user_id, kind, ticker, shares, price, trade_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uid,
                entry.kind.as_str(),
                entry.ticker,
                entry.shares,
                entry.price.to_string(),
                entry.trade_date.format(DATE_FMT).to_string()
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();

        tx.commit().map_err(query_err)?;
        Ok(entry.clone().with_id(id))
    }

    fn get_holding(&self, user_id: UserId, ticker: &str) -> Result<Option<Holding>, LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        let shares: Option<i64> = conn
            .query_row(
                "SELECT shares FROM holdings WHERE user_id = ?1 AND ticker = ?2",
                params![user_id.to_string(), ticker],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        Ok(shares.map(|shares| Holding {
            user_id,
            ticker: ticker.to_string(),
            shares,
        }))
    }

    fn list_holdings(&self, user_id: UserId) -> Result<Vec<Holding>, LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        Ok(read_holdings(&conn, user_id)?.to_holdings(user_id))
    }

    fn list_transactions(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        let from = range.from.map(|d| d.format(DATE_FMT).to_string());
        let to = range.to.map(|d| d.format(DATE_FMT).to_string());

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, kind, ticker, shares, price, trade_date
                 FROM transactions
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR trade_date >= ?2)
                   AND (?3 IS NULL OR trade_date <= ?3)
                 ORDER BY trade_date ASC, id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id.to_string(), from, to], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_transaction(row.map_err(query_err)?)?);
        }
        Ok(out)
    }

    fn log_in_commit_order(&self, user_id: UserId) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, kind, ticker, shares, price, trade_date
                 FROM transactions WHERE user_id = ?1 ORDER BY id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_transaction(row.map_err(query_err)?)?);
        }
        Ok(out)
    }

    fn list_watchlist(&self, user_id: UserId) -> Result<Vec<String>, LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        read_watchlist(&conn, user_id)
    }

    fn add_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO watchlist (user_id, ticker) VALUES (?1, ?2)",
                params![user_id.to_string(), ticker],
            )
            .map_err(query_err)?;
        if inserted == 0 {
            return Err(LedgerError::DuplicateWatchlistEntry {
                ticker: ticker.to_string(),
            });
        }
        Ok(())
    }

    fn remove_watchlist(&self, user_id: UserId, ticker: &str) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        Self::ensure_user(&conn, user_id)?;
        let removed = conn
            .execute(
                "DELETE FROM watchlist WHERE user_id = ?1 AND ticker = ?2",
                params![user_id.to_string(), ticker],
            )
            .map_err(query_err)?;
        if removed == 0 {
            return Err(LedgerError::not_found(format!("watchlist entry {ticker}")));
        }
        Ok(())
    }
}

impl MarketDataPort for SqliteAdapter {
    fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        for bar in bars {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO price_bars
                        (ticker, trade_date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        bar.ticker,
                        bar.trade_date.format(DATE_FMT).to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, LedgerError> {
        let conn = self.conn()?;
        let start = start_date.map(|d| d.format(DATE_FMT).to_string());
        let end = end_date.map(|d| d.format(DATE_FMT).to_string());

        let mut stmt = conn
            .prepare(
                "SELECT trade_date, open, high, low, close, volume
                 FROM price_bars
                 WHERE ticker = ?1
                   AND (?2 IS NULL OR trade_date >= ?2)
                   AND (?3 IS NULL OR trade_date <= ?3)
                 ORDER BY trade_date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![ticker, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row.map_err(query_err)?;
            bars.push(PriceBar {
                ticker: ticker.to_string(),
                trade_date: parse_date(&date)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>, LedgerError> {
        let conn = self.conn()?;
        let max: Option<String> = conn
            .query_row(
                "SELECT MAX(trade_date) FROM price_bars WHERE ticker = ?1",
                params![ticker],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        max.as_deref().map(parse_date).transpose()
    }

    fn latest_quote(&self, ticker: &str) -> Result<Option<Decimal>, LedgerError> {
        let conn = self.conn()?;
        let row: Option<(String, f64)> = conn
            .query_row(
                "SELECT trade_date, close FROM price_bars
                 WHERE ticker = ?1 ORDER BY trade_date DESC LIMIT 1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(query_err)?;

        match row {
            None => Ok(None),
            Some((date, close)) => {
                let bar = PriceBar {
                    ticker: ticker.to_string(),
                    trade_date: parse_date(&date)?,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0,
                };
                bar.close_quote().map(Some)
            }
        }
    }

    fn list_tickers(&self) -> Result<Vec<String>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM price_bars ORDER BY ticker")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LedgerError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(trade_date), MAX(trade_date), COUNT(*)
                 FROM price_bars WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
