//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::universe_source;
use crate::domain::config_validation::validate_app_config;
use crate::domain::engine::Ledger;
use crate::domain::error::LedgerError;
use crate::domain::forecast::{forecast_bars, LinearForecaster};
use crate::domain::ingest::ingest_all;
use crate::domain::transaction::{normalize_ticker, TransactionKind, TransactionRequest};
use crate::domain::transaction_log::DateRange;
use crate::domain::universe::TickerUniverse;
use crate::domain::user::UserId;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerStore;
use crate::ports::market_port::MarketDataPort;
use crate::ports::universe_port::UniverseSource;

#[derive(Parser, Debug)]
#[command(name = "tradeledger", about = "Portfolio ledger with market-data ingestion")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true, default_value = "tradeledger.ini")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a user with a zero balance
    CreateUser { username: String },
    /// Apply a deposit, withdraw, buy or sell
    Transact {
        #[arg(long)]
        user: UserId,
        /// deposit | withdraw | buy | sell
        kind: TransactionKind,
        /// Cash amount for deposit/withdraw, unit price for buy/sell
        #[arg(long)]
        price: Decimal,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        shares: Option<i64>,
        /// Trade date (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show holdings valued at the latest stored close
    Holdings {
        #[arg(long)]
        user: UserId,
    },
    /// List transactions by trade date
    Transactions {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Manage a user's watchlist
    Watchlist {
        #[arg(long)]
        user: UserId,
        #[command(subcommand)]
        action: WatchlistAction,
    },
    /// Replay the transaction log and compare with live state
    Verify {
        #[arg(long)]
        user: UserId,
    },
    /// Ingest new price rows from CSV files
    Ingest {
        /// Only this ticker (defaults to the whole universe)
        #[arg(long)]
        ticker: Option<String>,
        /// Overrides [ingest] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the latest stored close
    Quote { ticker: String },
    /// Forecast closes with the linear model
    Forecast {
        ticker: String,
        #[arg(long, default_value_t = 5)]
        days: usize,
    },
    /// Start the HTTP API
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum WatchlistAction {
    List,
    Add { ticker: String },
    Remove { ticker: String },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve => run_serve(&cli.config),
        command => open(&cli.config).and_then(|app| dispatch(&app, command)),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LedgerError> {
    FileConfigAdapter::from_file(path).map_err(|e| LedgerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Everything a command needs, wired from one config file.
pub struct App {
    pub config: FileConfigAdapter,
    pub ledger: Arc<Ledger>,
    pub market: Arc<dyn MarketDataPort>,
    pub universe: Arc<TickerUniverse>,
    pub universe_source: Arc<dyn UniverseSource>,
}

pub fn open(config_path: &Path) -> Result<App, LedgerError> {
    let config = load_config(config_path)?;
    validate_app_config(&config)?;
    build_app(config)
}

pub fn build_app(config: FileConfigAdapter) -> Result<App, LedgerError> {
    let (store, market) = open_store(&config)?;

    let universe = Arc::new(TickerUniverse::default());
    let source: Arc<dyn UniverseSource> =
        universe_source::from_config(&config, market.clone()).into();
    let count = universe.refresh(source.as_ref())?;
    if count == 0 {
        tracing::warn!("ticker universe is empty; every trade will be rejected");
    }

    let max_retries = config.get_int("ledger", "max_retries", 3).max(0) as u32;
    let ledger = Ledger::new(store, universe.clone()).with_max_retries(max_retries);

    Ok(App {
        config,
        ledger: Arc::new(ledger),
        market,
        universe,
        universe_source: source,
    })
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: &dyn ConfigPort,
) -> Result<(Arc<dyn LedgerStore>, Arc<dyn MarketDataPort>), LedgerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = Arc::new(SqliteAdapter::from_config(config)?);
    adapter.initialize_schema()?;
    Ok((adapter.clone(), adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_store(
    _config: &dyn ConfigPort,
) -> Result<(Arc<dyn LedgerStore>, Arc<dyn MarketDataPort>), LedgerError> {
    use crate::adapters::memory_store::MemoryStore;

    tracing::warn!("built without the sqlite feature; state will not persist");
    let store = Arc::new(MemoryStore::new());
    Ok((store.clone(), store))
}

fn dispatch(app: &App, command: Command) -> Result<(), LedgerError> {
    match command {
        Command::CreateUser { username } => {
            let user = app.ledger.register(&username)?;
            println!("{}\t{}", user.id, user.username);
            Ok(())
        }
        Command::Transact {
            user,
            kind,
            price,
            ticker,
            shares,
            date,
        } => {
            let request = TransactionRequest {
                kind,
                ticker,
                shares,
                price,
                trade_date: date,
            };
            let committed = app.ledger.execute(user, &request)?;
            println!("{committed}");
            let balance = app.ledger.store().get_user(user)?.balance;
            eprintln!("Balance: {balance}");
            Ok(())
        }
        Command::Holdings { user } => run_holdings(app, user),
        Command::Transactions { user, from, to } => {
            for entry in app.ledger.transactions(user, DateRange { from, to })? {
                println!("{entry}");
            }
            Ok(())
        }
        Command::Watchlist { user, action } => match action {
            WatchlistAction::List => {
                for ticker in app.ledger.watchlist(user)? {
                    println!("{ticker}");
                }
                Ok(())
            }
            WatchlistAction::Add { ticker } => {
                let ticker = app.ledger.watch(user, &ticker)?;
                eprintln!("Added {ticker}");
                Ok(())
            }
            WatchlistAction::Remove { ticker } => {
                app.ledger.unwatch(user, &ticker)?;
                eprintln!("Removed {}", normalize_ticker(&ticker));
                Ok(())
            }
        },
        Command::Verify { user } => {
            let replayed = app.ledger.verify(user)?;
            println!(
                "ok: {} entries replayed, balance {}, {} holdings",
                replayed.version,
                replayed.balance,
                replayed.holdings.len()
            );
            Ok(())
        }
        Command::Ingest { ticker, data_dir } => run_ingest(app, ticker.as_deref(), data_dir),
        Command::Quote { ticker } => {
            let ticker = normalize_ticker(&ticker);
            let quote = app
                .market
                .latest_quote(&ticker)?
                .ok_or_else(|| LedgerError::not_found(format!("price history for {ticker}")))?;
            println!("{ticker}\t{quote}");
            Ok(())
        }
        Command::Forecast { ticker, days } => run_forecast(app, &ticker, days),
        Command::Serve => Ok(()),
    }
}

fn run_holdings(app: &App, user: UserId) -> Result<(), LedgerError> {
    let valuation = app.ledger.valuation(user, app.market.as_ref())?;
    for position in &valuation.positions {
        match (position.price, position.market_value) {
            (Some(price), Some(value)) => println!(
                "{:<8} {:>8} @ {:>10} = {:>12}",
                position.ticker, position.shares, price, value
            ),
            _ => println!("{:<8} {:>8}   (no quote)", position.ticker, position.shares),
        }
    }
    println!("Cash:         {}", valuation.cash);
    println!("Total equity: {}", valuation.total_equity);
    Ok(())
}

fn bar_source(config: &dyn ConfigPort, data_dir: Option<PathBuf>) -> Result<CsvAdapter, LedgerError> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => config
            .get_string("ingest", "data_dir")
            .map(PathBuf::from)
            .ok_or_else(|| LedgerError::ConfigMissing {
                section: "ingest".into(),
                key: "data_dir".into(),
            })?,
    };
    Ok(CsvAdapter::new(dir))
}

fn run_ingest(app: &App, ticker: Option<&str>, data_dir: Option<PathBuf>) -> Result<(), LedgerError> {
    let source = bar_source(&app.config, data_dir)?;
    let tickers = match ticker {
        Some(t) => vec![normalize_ticker(t)],
        None => app.universe.tickers(),
    };
    eprintln!("Ingesting {} tickers...", tickers.len());

    let report = ingest_all(app.market.as_ref(), &source, &tickers);
    println!(
        "{} tickers, {} rows fetched, {} inserted, {} failed",
        report.tickers, report.fetched, report.inserted, report.failed
    );
    if report.failed > 0 && report.failed == report.tickers {
        return Err(LedgerError::MarketData {
            reason: "every ticker failed to ingest".into(),
        });
    }
    Ok(())
}

fn run_forecast(app: &App, ticker: &str, days: usize) -> Result<(), LedgerError> {
    let max_days = app.config.get_int("forecast", "max_days", 30).max(1) as usize;
    if days == 0 || days > max_days {
        return Err(LedgerError::InvalidRequest {
            reason: format!("days must be between 1 and {max_days}"),
        });
    }
    let ticker = normalize_ticker(ticker);
    let bars = app.market.fetch_bars(&ticker, None, None)?;
    if bars.is_empty() {
        return Err(LedgerError::not_found(format!("price history for {ticker}")));
    }
    for point in forecast_bars(&LinearForecaster, &bars, days)? {
        println!("{}\t{:.2}", point.trade_date, point.close);
    }
    Ok(())
}

fn run_serve(config_path: &Path) -> Result<(), LedgerError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::scheduler::IngestScheduler;
        use crate::adapters::token_auth::StaticTokenAuth;
        use crate::adapters::web::{build_router, AppState};
        use crate::domain::ingest::IngestJob;
        use std::net::SocketAddr;
        use std::time::Duration;

        eprintln!("Loading config from {}", config_path.display());
        let config = load_config(config_path)?;
        validate_app_config(&config)?;

        let auth = StaticTokenAuth::from_config(&config)?;
        let addr: SocketAddr = config
            .get_string("web", "listen")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .trim()
            .parse()
            .map_err(|e| LedgerError::ConfigInvalid {
                section: "web".into(),
                key: "listen".into(),
                reason: format!("{e}"),
            })?;
        let max_forecast_days = config.get_int("forecast", "max_days", 30).max(1) as usize;

        let ingest = if config.get_bool("ingest", "enabled", false) {
            let source = Arc::new(bar_source(&config, None)?);
            let every = Duration::from_secs(config.get_int("ingest", "interval_secs", 3600).max(1) as u64);
            Some((source, every))
        } else {
            None
        };

        let app = build_app(config)?;
        let state = AppState {
            ledger: app.ledger.clone(),
            market: app.market.clone(),
            auth: Arc::new(auth),
            forecaster: Arc::new(LinearForecaster),
            max_forecast_days,
        };
        let router = build_router(state);

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async move {
            let scheduler = ingest.map(|(source, every)| {
                let job = IngestJob::new(app.market.clone(), source, app.universe.clone())
                    .with_universe_source(app.universe_source.clone());
                IngestScheduler::start(Arc::new(job), every)
            });

            let listener = tokio::net::TcpListener::bind(addr).await?;
            eprintln!("Listening on {addr}");
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;

            if let Some(scheduler) = scheduler {
                scheduler.stop().await;
            }
            served.map_err(LedgerError::from)
        })
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(LedgerError::InvalidRequest {
            reason: "built without the web feature; serve is unavailable".into(),
        })
    }
}
