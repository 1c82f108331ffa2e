//! Application-wide constants and default configuration values
//!
//! This module centralizes all magic numbers and configuration constants
//! to improve maintainability and make the codebase more configurable.

/// Default base URL of the NHL web API
pub const DEFAULT_API_BASE_URL: &str = "https://api-web.nhle.com/v1";

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Maximum number of connections per host in the HTTP client pool
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Default season id (start year followed by end year)
pub const DEFAULT_SEASON: u32 = 20242025;

/// Default game type (2 = regular season)
pub const DEFAULT_GAME_TYPE: u8 = 2;

/// Default size of the game-log worker pool
pub const DEFAULT_WORKERS: usize = 8;

/// Default global request rate against the stats API
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 5.0;

/// Staging tables are dropped by the warehouse after this many hours
pub const DEFAULT_STAGING_EXPIRATION_HOURS: u64 = 24;

/// Upper bound on the staging expiration (one year)
pub const MAX_STAGING_EXPIRATION_HOURS: u64 = 24 * 365;

/// Default merge key columns of the production tables
pub const DEFAULT_MERGE_KEYS: [&str; 3] = ["game_date", "game_id", "player_id"];

/// Column the production tables are partitioned on
pub const PARTITION_COLUMN: &str = "game_date";

/// Column the production tables are clustered on
pub const CLUSTER_COLUMN: &str = "game_id";

/// Format of the run timestamp used in staging table and object names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current NHL club abbreviations
pub const DEFAULT_TEAMS: [&str; 32] = [
    "ANA", "BOS", "BUF", "CAR", "CBJ", "CGY", "CHI", "COL", "DAL", "DET", "EDM", "FLA", "LAK",
    "MIN", "MTL", "NJD", "NSH", "NYI", "NYR", "OTT", "PHI", "PIT", "SEA", "SJS", "STL", "TBL",
    "TOR", "UTA", "VAN", "VGK", "WPG", "WSH",
];

/// Google Cloud endpoints
pub mod gcp {
    /// BigQuery REST API v2 root
    pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

    /// Cloud Storage JSON API root
    pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

    /// Default dataset location
    pub const DEFAULT_LOCATION: &str = "US";

    /// How long a single jobs.query call may block server-side
    pub const QUERY_TIMEOUT_MS: u64 = 60_000;

    /// Delay between polls of a running job
    pub const JOB_POLL_INTERVAL_MS: u64 = 1_000;

    /// Give up waiting on a job after this many polls
    pub const JOB_MAX_POLLS: u32 = 600;
}

/// Environment variable names
pub mod env_vars {
    pub const API_BASE_URL: &str = "NHL_ETL_API_BASE_URL";
    pub const SEASON: &str = "NHL_ETL_SEASON";
    pub const GAME_TYPE: &str = "NHL_ETL_GAME_TYPE";
    pub const WORKERS: &str = "NHL_ETL_WORKERS";
    pub const REQUESTS_PER_SECOND: &str = "NHL_ETL_REQUESTS_PER_SECOND";
    pub const HTTP_TIMEOUT: &str = "NHL_ETL_HTTP_TIMEOUT";
    pub const LOG_FILE: &str = "NHL_ETL_LOG_FILE";
    pub const PROJECT_ID: &str = "NHL_ETL_PROJECT_ID";
    pub const STAGING_DATASET: &str = "NHL_ETL_STAGING_DATASET";
    pub const PRODUCTION_DATASET: &str = "NHL_ETL_PRODUCTION_DATASET";
    pub const BUCKET: &str = "NHL_ETL_BUCKET";
    pub const WAREHOUSE: &str = "NHL_ETL_WAREHOUSE";
    pub const STORAGE: &str = "NHL_ETL_STORAGE";
    pub const SQLITE_PATH: &str = "NHL_ETL_SQLITE_PATH";
    pub const LOCAL_OBJECT_DIR: &str = "NHL_ETL_LOCAL_OBJECT_DIR";
    pub const ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_teams_are_unique_abbreviations() {
        let mut teams = DEFAULT_TEAMS.to_vec();
        teams.sort_unstable();
        teams.dedup();
        assert_eq!(teams.len(), DEFAULT_TEAMS.len());
        assert!(teams.iter().all(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_uppercase())));
    }

    #[test]
    fn test_partition_and_cluster_columns_are_merge_keys() {
        assert!(DEFAULT_MERGE_KEYS.contains(&PARTITION_COLUMN));
        assert!(DEFAULT_MERGE_KEYS.contains(&CLUSTER_COLUMN));
    }
}
