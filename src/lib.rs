//! NHL player statistics ETL library
//!
//! Fetches rosters and per-game player statistics from the NHL web API,
//! assembles them into one wide table per player category, stages the table
//! as CSV in object storage and upserts it into a warehouse (BigQuery or a
//! local SQLite file).
//!
//! # Examples
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use nhl_etl::config::Config;
//! use nhl_etl::data_fetcher::{NhlClient, PlayerCategory};
//! use nhl_etl::data_fetcher::api::create_http_client_with_timeout;
//! use nhl_etl::error::AppError;
//! use nhl_etl::pipeline::run_pipeline;
//! use nhl_etl::warehouse::{LocalStore, SqliteWarehouse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let config = Config::default();
//!     let http = create_http_client_with_timeout(config.http_timeout_seconds)?;
//!     let client = NhlClient::new(http, &config.api_base_url);
//!     let warehouse = SqliteWarehouse::open("nhl.db")?;
//!     let store = LocalStore::new("objects");
//!
//!     let summary = run_pipeline(
//!         &config,
//!         &PlayerCategory::ALL,
//!         &client,
//!         &client,
//!         &warehouse,
//!         &store,
//!         Utc::now(),
//!     )
//!     .await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod data_fetcher;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod table;
pub mod testing_utils;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use config::Config;
pub use data_fetcher::{GameLogRow, GameType, NhlClient, PlayerCategory, RosterRow, Season};
pub use error::AppError;
pub use pipeline::{PipelineSummary, run_pipeline};
pub use table::{Table, Value};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
