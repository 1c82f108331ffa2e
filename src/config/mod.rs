use crate::constants::{self, env_vars, gcp};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod paths;
pub mod validation;

use paths::{default_object_dir, default_sqlite_path, get_config_path, get_log_dir_path};
use validation::validate_config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    #[default]
    Sqlite,
    #[serde(rename = "bigquery")]
    BigQuery,
}

impl FromStr for WarehouseBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(WarehouseBackend::Sqlite),
            "bigquery" => Ok(WarehouseBackend::BigQuery),
            other => Err(AppError::config_error(format!(
                "Unknown warehouse backend '{other}', expected sqlite or bigquery"
            ))),
        }
    }
}

impl fmt::Display for WarehouseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarehouseBackend::Sqlite => "sqlite",
            WarehouseBackend::BigQuery => "bigquery",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Gcs,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "gcs" => Ok(StorageBackend::Gcs),
            other => Err(AppError::config_error(format!(
                "Unknown storage backend '{other}', expected local or gcs"
            ))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageBackend::Local => "local",
            StorageBackend::Gcs => "gcs",
        })
    }
}

/// The `[warehouse]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    /// Google Cloud project (BigQuery only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub location: String,
    pub staging_dataset: String,
    pub production_dataset: String,
    pub staging_expiration_hours: u64,
    pub merge_keys: Vec<String>,
    /// SQLite database file (SQLite only)
    pub sqlite_path: String,
    pub bigquery_base_url: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig {
            backend: WarehouseBackend::default(),
            project_id: None,
            location: gcp::DEFAULT_LOCATION.to_string(),
            staging_dataset: "nhl_staging".to_string(),
            production_dataset: "nhl".to_string(),
            staging_expiration_hours: constants::DEFAULT_STAGING_EXPIRATION_HOURS,
            merge_keys: constants::DEFAULT_MERGE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            sqlite_path: default_sqlite_path(),
            bigquery_base_url: gcp::BIGQUERY_BASE_URL.to_string(),
        }
    }
}

/// The `[storage]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// GCS bucket (GCS only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub object_prefix: String,
    /// Root directory of the local store
    pub local_dir: String,
    pub storage_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageBackend::default(),
            bucket: None,
            object_prefix: "nhl".to_string(),
            local_dir: default_object_dir(),
            storage_base_url: gcp::STORAGE_BASE_URL.to_string(),
        }
    }
}

/// Configuration structure for the application.
/// Handles loading, saving, and managing application settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the stats API. Should include the https:// prefix.
    pub api_base_url: String,
    /// Season id such as 20242025
    pub season: u32,
    /// 1 = preseason, 2 = regular season, 3 = playoffs
    pub game_type: u8,
    /// Team abbreviations whose rosters are fetched
    pub teams: Vec<String>,
    /// Concurrent game-log requests
    pub workers: usize,
    /// Global request rate against the stats API
    pub requests_per_second: f64,
    /// HTTP timeout in seconds for every request
    pub http_timeout_seconds: u64,
    /// Path to the log file. If not specified, logs will be written to a default location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    pub warehouse: WarehouseConfig,
    pub storage: StorageConfig,
    /// Google OAuth access token. Read from the environment only and never
    /// written to disk.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            season: constants::DEFAULT_SEASON,
            game_type: constants::DEFAULT_GAME_TYPE,
            teams: constants::DEFAULT_TEAMS.iter().map(|t| t.to_string()).collect(),
            workers: constants::DEFAULT_WORKERS,
            requests_per_second: constants::DEFAULT_REQUESTS_PER_SECOND,
            http_timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECONDS,
            log_file_path: None,
            warehouse: WarehouseConfig::default(),
            storage: StorageConfig::default(),
            access_token: None,
        }
    }
}

/// Reads `name` and parses it. A set but unparsable value is an error, since
/// config is loaded before logging exists and a warning would be lost.
fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, AppError> {
    let Some(raw) = env_string(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| AppError::config_error(format!("Invalid value for {name}: '{raw}'")))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from `path`, or from the default config file
    /// location when `path` is `None`. A missing file means all defaults.
    /// A `.env` file in the working directory is read first, then
    /// environment variables override file values.
    ///
    /// # Environment Variables
    /// - `NHL_ETL_API_BASE_URL`, `NHL_ETL_SEASON`, `NHL_ETL_GAME_TYPE`
    /// - `NHL_ETL_WORKERS`, `NHL_ETL_REQUESTS_PER_SECOND`, `NHL_ETL_HTTP_TIMEOUT`
    /// - `NHL_ETL_LOG_FILE`
    /// - `NHL_ETL_WAREHOUSE`, `NHL_ETL_PROJECT_ID`, `NHL_ETL_STAGING_DATASET`,
    ///   `NHL_ETL_PRODUCTION_DATASET`, `NHL_ETL_SQLITE_PATH`
    /// - `NHL_ETL_STORAGE`, `NHL_ETL_BUCKET`, `NHL_ETL_LOCAL_OBJECT_DIR`
    /// - `GOOGLE_OAUTH_ACCESS_TOKEN`
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded and validated configuration
    /// * `Err(AppError)` - Unreadable file, bad TOML or failed validation
    pub async fn load(path: Option<&str>) -> Result<Self, AppError> {
        // A missing .env is the normal case
        let _ = dotenvy::dotenv();

        let config_path = path.map_or_else(get_config_path, str::to_string);
        let mut config = if Path::new(&config_path).exists() {
            Self::load_from_path(&config_path).await?
        } else if path.is_some() {
            return Err(AppError::config_error(format!(
                "Config file '{config_path}' does not exist"
            )));
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), AppError> {
        if let Some(url) = env_string(env_vars::API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(season) = env_parse(env_vars::SEASON)? {
            self.season = season;
        }
        if let Some(game_type) = env_parse(env_vars::GAME_TYPE)? {
            self.game_type = game_type;
        }
        if let Some(workers) = env_parse(env_vars::WORKERS)? {
            self.workers = workers;
        }
        if let Some(rate) = env_parse(env_vars::REQUESTS_PER_SECOND)? {
            self.requests_per_second = rate;
        }
        if let Some(timeout) = env_parse(env_vars::HTTP_TIMEOUT)? {
            self.http_timeout_seconds = timeout;
        }
        if let Some(log_file) = env_string(env_vars::LOG_FILE) {
            self.log_file_path = Some(log_file);
        }

        if let Some(backend) = env_string(env_vars::WAREHOUSE) {
            self.warehouse.backend = backend.parse()?;
        }
        if let Some(project) = env_string(env_vars::PROJECT_ID) {
            self.warehouse.project_id = Some(project);
        }
        if let Some(dataset) = env_string(env_vars::STAGING_DATASET) {
            self.warehouse.staging_dataset = dataset;
        }
        if let Some(dataset) = env_string(env_vars::PRODUCTION_DATASET) {
            self.warehouse.production_dataset = dataset;
        }
        if let Some(sqlite_path) = env_string(env_vars::SQLITE_PATH) {
            self.warehouse.sqlite_path = sqlite_path;
        }

        if let Some(backend) = env_string(env_vars::STORAGE) {
            self.storage.backend = backend.parse()?;
        }
        if let Some(bucket) = env_string(env_vars::BUCKET) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(dir) = env_string(env_vars::LOCAL_OBJECT_DIR) {
            self.storage.local_dir = dir;
        }

        if let Some(token) = env_string(env_vars::ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        Ok(())
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), AppError> {
        validate_config(self)
    }

    /// Returns the platform-specific path for the config file.
    pub fn get_config_path() -> String {
        paths::get_config_path()
    }

    /// Returns the platform-specific path for the log directory.
    pub fn get_log_dir_path() -> String {
        paths::get_log_dir_path()
    }

    /// Human-readable summary of the effective settings. The access token is
    /// never shown.
    pub fn display(&self, config_path: &str) -> String {
        let rule = "────────────────────────────────────";
        let token = match &self.access_token {
            Some(_) => "(set, hidden)",
            None => "(not set)",
        };
        let log_file = match &self.log_file_path {
            Some(path) => path.clone(),
            None => format!("{}/nhl_etl.log (default location)", get_log_dir_path()),
        };
        let warehouse_target = match self.warehouse.backend {
            WarehouseBackend::Sqlite => self.warehouse.sqlite_path.clone(),
            WarehouseBackend::BigQuery => format!(
                "project {} ({})",
                self.warehouse.project_id.as_deref().unwrap_or("(not set)"),
                self.warehouse.location
            ),
        };
        let storage_target = match self.storage.backend {
            StorageBackend::Local => self.storage.local_dir.clone(),
            StorageBackend::Gcs => format!(
                "gs://{}",
                self.storage.bucket.as_deref().unwrap_or("(not set)")
            ),
        };

        [
            "Current Configuration".to_string(),
            rule.to_string(),
            format!("Config Location:     {config_path}"),
            format!("API Base URL:        {}", self.api_base_url),
            format!("Season / Game Type:  {} / {}", self.season, self.game_type),
            format!("Teams:               {}", self.teams.join(" ")),
            format!(
                "Workers / Rate:      {} / {} req/s",
                self.workers, self.requests_per_second
            ),
            format!("HTTP Timeout:        {} seconds", self.http_timeout_seconds),
            format!("Log File:            {log_file}"),
            rule.to_string(),
            format!(
                "Warehouse:           {} at {warehouse_target}",
                self.warehouse.backend
            ),
            format!(
                "Datasets:            staging {} (expires after {}h), production {}",
                self.warehouse.staging_dataset,
                self.warehouse.staging_expiration_hours,
                self.warehouse.production_dataset
            ),
            format!("Merge Keys:          {}", self.warehouse.merge_keys.join(", ")),
            format!("Storage:             {} at {storage_target}", self.storage.backend),
            format!("Object Prefix:       {}", self.storage.object_prefix),
            format!("Access Token:        {token}"),
        ]
        .join("\n")
    }

    /// Saves configuration to a custom file path, creating the parent
    /// directory if needed. The access token is never written.
    ///
    /// # Errors
    /// * `AppError::Config` - If the provided path has no parent directory
    /// * `AppError::Io` - If there's an I/O error creating directories or writing the file
    /// * `AppError::TomlSerialize` - If there's an error serializing the configuration
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }
        let content = toml::to_string_pretty(self)?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Writes a config file with default settings to `path`. Fails rather
    /// than overwrite an existing file.
    pub async fn init_file(path: &str) -> Result<Self, AppError> {
        if Path::new(path).exists() {
            return Err(AppError::config_error(format!(
                "Config file '{path}' already exists"
            )));
        }
        let config = Config::default();
        config.save_to_path(path).await?;
        Ok(config)
    }

    /// Loads configuration from a file path without environment overrides
    /// or validation.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    const ALL_ENV_VARS: [&str; 16] = [
        env_vars::API_BASE_URL,
        env_vars::SEASON,
        env_vars::GAME_TYPE,
        env_vars::WORKERS,
        env_vars::REQUESTS_PER_SECOND,
        env_vars::HTTP_TIMEOUT,
        env_vars::LOG_FILE,
        env_vars::PROJECT_ID,
        env_vars::STAGING_DATASET,
        env_vars::PRODUCTION_DATASET,
        env_vars::BUCKET,
        env_vars::WAREHOUSE,
        env_vars::STORAGE,
        env_vars::SQLITE_PATH,
        env_vars::LOCAL_OBJECT_DIR,
        env_vars::ACCESS_TOKEN,
    ];

    fn clear_env() {
        for name in ALL_ENV_VARS {
            // SAFETY: env-touching tests are #[serial]
            unsafe { std::env::remove_var(name) };
        }
    }

    #[tokio::test]
    async fn test_config_load_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_content = r#"
season = 20232024
workers = 4

[warehouse]
production_dataset = "hockey"
"#;
        tokio::fs::write(&config_path, config_content).await.unwrap();

        let config = Config::load_from_path(&config_path.to_string_lossy())
            .await
            .unwrap();

        assert_eq!(config.season, 20232024);
        assert_eq!(config.workers, 4);
        assert_eq!(config.warehouse.production_dataset, "hockey");
        assert_eq!(config.warehouse.staging_dataset, "nhl_staging");
        assert_eq!(config.teams.len(), 32);
        assert_eq!(config.api_base_url, constants::DEFAULT_API_BASE_URL);
    }

    #[tokio::test]
    async fn test_config_backends_from_toml() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_content = r#"
[warehouse]
backend = "bigquery"
project_id = "my-project"

[storage]
backend = "gcs"
bucket = "nhl-stats"
"#;
        tokio::fs::write(&config_path, config_content).await.unwrap();

        let config = Config::load_from_path(&config_path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(config.warehouse.backend, WarehouseBackend::BigQuery);
        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.storage.bucket.as_deref(), Some("nhl-stats"));
    }

    #[tokio::test]
    async fn test_config_save_and_load_roundtrip_without_token() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let config_path_str = config_path.to_string_lossy();

        let original = Config {
            season: 20222023,
            log_file_path: Some("/custom/log/path".to_string()),
            access_token: Some("secret-token".to_string()),
            ..Config::default()
        };
        original.save_to_path(&config_path_str).await.unwrap();

        let content = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(!content.contains("secret-token"));
        assert!(content.contains("[warehouse]"));

        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded.access_token, None);
        assert_eq!(
            loaded,
            Config {
                access_token: None,
                ..original
            }
        );
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "season = [not toml")
            .await
            .unwrap();
        let result = Config::load_from_path(&config_path.to_string_lossy()).await;
        assert!(matches!(result, Err(AppError::TomlDeserialize(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_overrides_file() {
        clear_env();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "season = 20232024\nworkers = 2\n")
            .await
            .unwrap();

        // SAFETY: env-touching tests are #[serial]
        unsafe {
            std::env::set_var(env_vars::SEASON, "20212022");
            std::env::set_var(env_vars::REQUESTS_PER_SECOND, "2.5");
            std::env::set_var(env_vars::WAREHOUSE, "SQLite");
            std::env::set_var(env_vars::ACCESS_TOKEN, "tok");
        }

        let config = Config::load(Some(&config_path.to_string_lossy()))
            .await
            .unwrap();
        clear_env();

        assert_eq!(config.season, 20212022);
        assert_eq!(config.workers, 2);
        assert_eq!(config.requests_per_second, 2.5);
        assert_eq!(config.warehouse.backend, WarehouseBackend::Sqlite);
        assert_eq!(config.access_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_init_file_writes_defaults_once() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nhl_etl").join("config.toml");
        let config_path = config_path.to_string_lossy();

        let written = Config::init_file(&config_path).await.unwrap();
        assert_eq!(written, Config::default());
        let loaded = Config::load_from_path(&config_path).await.unwrap();
        assert_eq!(loaded, Config::default());

        let again = Config::init_file(&config_path).await;
        assert!(matches!(again, Err(AppError::Config(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_unparsable_number_is_error() {
        clear_env();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "workers = 2\n").await.unwrap();
        // SAFETY: env-touching tests are #[serial]
        unsafe { std::env::set_var(env_vars::WORKERS, "not-a-number") };
        let result = Config::load(Some(&config_path.to_string_lossy())).await;
        clear_env();
        match result {
            Err(AppError::Config(message)) => assert!(message.contains(env_vars::WORKERS)),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_env_unknown_backend_is_error() {
        clear_env();
        // SAFETY: env-touching tests are #[serial]
        unsafe { std::env::set_var(env_vars::STORAGE, "s3") };
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        clear_env();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_load_explicit_missing_file_is_error() {
        clear_env();
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("absent.toml");
        let result = Config::load(Some(&missing.to_string_lossy())).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_display_hides_token() {
        let config = Config {
            access_token: Some("ya29.very-secret".to_string()),
            ..Config::default()
        };
        let text = config.display("/tmp/config.toml");
        assert!(!text.contains("very-secret"));
        assert!(text.contains("(set, hidden)"));
        assert!(text.contains("/tmp/config.toml"));
        assert!(text.contains("game_date, game_id, player_id"));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "BigQuery".parse::<WarehouseBackend>().unwrap(),
            WarehouseBackend::BigQuery
        );
        assert_eq!("gcs".parse::<StorageBackend>().unwrap(), StorageBackend::Gcs);
        assert!("postgres".parse::<WarehouseBackend>().is_err());
    }

    #[test]
    fn test_get_config_path() {
        let config_path = Config::get_config_path();
        assert!(config_path.contains("nhl_etl"));
        assert!(config_path.ends_with("config.toml"));
    }

    #[test]
    fn test_get_log_dir_path() {
        let log_dir_path = Config::get_log_dir_path();
        assert!(log_dir_path.contains("nhl_etl"));
        assert!(log_dir_path.ends_with("logs"));
    }
}
