use super::{Config, StorageBackend, WarehouseBackend};
use crate::constants::MAX_STAGING_EXPIRATION_HOURS;
use crate::data_fetcher::models::{GameType, Season};
use crate::error::AppError;
use crate::warehouse::sql::{Ident, validate_project_id};
use std::path::Path;

/// Validates the configuration settings
///
/// # Validation Rules
/// - API base URL must be an http(s) URL
/// - Season must be a valid 8-digit season id and game type 1-3
/// - Worker count, request rate and HTTP timeout must be positive
/// - Staging expiration must be between 1 hour and one year
/// - Teams and merge keys cannot be empty
/// - Dataset names and merge keys must be plain SQL identifiers
/// - The BigQuery and GCS backends need a project / bucket and an access token
/// - If log file path is provided, its parent directory must exist or be creatable
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    let url = config.api_base_url.trim();
    if url.is_empty() {
        return Err(AppError::config_error("API base URL cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::config_error(
            "API base URL must start with http:// or https://",
        ));
    }

    Season::new(config.season)?;
    GameType::try_from(config.game_type)?;

    if config.workers == 0 {
        return Err(AppError::config_error("Worker count must be at least 1"));
    }
    if !config.requests_per_second.is_finite() || config.requests_per_second <= 0.0 {
        return Err(AppError::config_error(
            "Requests per second must be a positive number",
        ));
    }
    if config.http_timeout_seconds == 0 {
        return Err(AppError::config_error("HTTP timeout must be at least 1 second"));
    }

    if config.teams.is_empty() {
        return Err(AppError::config_error("Team list cannot be empty"));
    }
    if let Some(team) = config
        .teams
        .iter()
        .find(|t| t.is_empty() || !t.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return Err(AppError::config_error(format!(
            "Invalid team abbreviation '{team}'"
        )));
    }

    let warehouse = &config.warehouse;
    if warehouse.merge_keys.is_empty() {
        return Err(AppError::config_error("Merge keys cannot be empty"));
    }
    for key in &warehouse.merge_keys {
        Ident::new(key)?;
    }
    Ident::new(&warehouse.staging_dataset)?;
    Ident::new(&warehouse.production_dataset)?;
    if warehouse.staging_dataset == warehouse.production_dataset {
        return Err(AppError::config_error(
            "Staging and production datasets must differ",
        ));
    }
    if !(1..=MAX_STAGING_EXPIRATION_HOURS).contains(&warehouse.staging_expiration_hours) {
        return Err(AppError::config_error(format!(
            "Staging expiration must be between 1 and {MAX_STAGING_EXPIRATION_HOURS} hours"
        )));
    }

    if config.storage.object_prefix.split('/').any(|part| part == "..") {
        return Err(AppError::config_error("Object prefix cannot contain '..'"));
    }

    if warehouse.backend == WarehouseBackend::BigQuery {
        let project = warehouse.project_id.as_deref().ok_or_else(|| {
            AppError::config_error("The BigQuery warehouse needs a project id")
        })?;
        validate_project_id(project)?;
    }
    if config.storage.backend == StorageBackend::Gcs && config.storage.bucket.is_none() {
        return Err(AppError::config_error("GCS storage needs a bucket name"));
    }
    let needs_token = warehouse.backend == WarehouseBackend::BigQuery
        || config.storage.backend == StorageBackend::Gcs;
    if needs_token && config.access_token.as_deref().is_none_or(str::is_empty) {
        return Err(AppError::config_error(
            "BigQuery and GCS need an access token in GOOGLE_OAUTH_ACCESS_TOKEN",
        ));
    }

    // Validate log file path if provided
    if let Some(log_path) = &config.log_file_path {
        if log_path.is_empty() {
            return Err(AppError::config_error("Log file path cannot be empty"));
        }

        if let Some(parent) = Path::new(log_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config_error(format!(
                    "Cannot create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_scalars() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.api_base_url = String::new()),
            Box::new(|c| c.api_base_url = "ftp://example.com".into()),
            Box::new(|c| c.season = 20242026),
            Box::new(|c| c.game_type = 4),
            Box::new(|c| c.workers = 0),
            Box::new(|c| c.requests_per_second = 0.0),
            Box::new(|c| c.http_timeout_seconds = 0),
            Box::new(|c| c.teams.clear()),
            Box::new(|c| c.teams = vec!["TO/R".into()]),
            Box::new(|c| c.warehouse.merge_keys.clear()),
            Box::new(|c| c.warehouse.merge_keys = vec!["game id".into()]),
            Box::new(|c| c.warehouse.staging_dataset = "nhl-staging".into()),
            Box::new(|c| c.warehouse.staging_dataset = c.warehouse.production_dataset.clone()),
            Box::new(|c| c.warehouse.staging_expiration_hours = 0),
            Box::new(|c| c.warehouse.staging_expiration_hours = MAX_STAGING_EXPIRATION_HOURS + 1),
            Box::new(|c| c.warehouse.staging_expiration_hours = 10_000_000_000),
            Box::new(|c| c.storage.object_prefix = "a/../b".into()),
            Box::new(|c| c.log_file_path = Some(String::new())),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(
                validate_config(&config).is_err(),
                "case {i} should have been rejected"
            );
        }
    }

    #[test]
    fn test_bigquery_needs_project_and_token() {
        let mut config = Config::default();
        config.warehouse.backend = WarehouseBackend::BigQuery;
        assert!(validate_config(&config).is_err());

        config.warehouse.project_id = Some("my-project".into());
        assert!(validate_config(&config).is_err());

        config.access_token = Some("ya29.token".into());
        assert!(validate_config(&config).is_ok());

        config.warehouse.project_id = Some("My Project".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_gcs_needs_bucket() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Gcs;
        config.access_token = Some("ya29.token".into());
        assert!(validate_config(&config).is_err());
        config.storage.bucket = Some("nhl-stats".into());
        assert!(validate_config(&config).is_ok());
    }
}
