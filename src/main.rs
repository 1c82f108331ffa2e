// src/main.rs
use chrono::Utc;
use clap::Parser;
use nhl_etl::cli::Args;
use nhl_etl::config::{Config, StorageBackend, WarehouseBackend};
use nhl_etl::data_fetcher::NhlClient;
use nhl_etl::data_fetcher::api::create_http_client_with_timeout;
use nhl_etl::error::AppError;
use nhl_etl::logging::setup_logging;
use nhl_etl::pipeline::{PipelineSummary, run_pipeline};
use nhl_etl::warehouse::{
    BigQueryWarehouse, GcsStore, LocalStore, ObjectStore, SqliteWarehouse, Warehouse,
};
use reqwest::Client;
use tracing::{error, info};

/// Applies command-line overrides and re-validates.
fn apply_args(config: &mut Config, args: &Args) -> Result<(), AppError> {
    if let Some(season) = args.season {
        config.season = season;
    }
    if let Some(game_type) = args.game_type {
        config.game_type = game_type;
    }
    if let Some(log_file) = &args.log_file {
        config.log_file_path = Some(log_file.clone());
    }
    config.validate()
}

fn access_token(config: &Config) -> Result<String, AppError> {
    config
        .access_token
        .clone()
        .ok_or_else(|| AppError::config_error("GOOGLE_OAUTH_ACCESS_TOKEN is not set"))
}

async fn run_with<W: Warehouse, O: ObjectStore>(
    config: &Config,
    args: &Args,
    client: &NhlClient,
    warehouse: &W,
    store: &O,
) -> Result<PipelineSummary, AppError> {
    run_pipeline(
        config,
        &args.categories(),
        client,
        client,
        warehouse,
        store,
        Utc::now(),
    )
    .await
}

async fn run_with_warehouse<W: Warehouse>(
    config: &Config,
    args: &Args,
    http: &Client,
    client: &NhlClient,
    warehouse: &W,
) -> Result<PipelineSummary, AppError> {
    match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalStore::new(&config.storage.local_dir);
            run_with(config, args, client, warehouse, &store).await
        }
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .bucket
                .clone()
                .ok_or_else(|| AppError::config_error("GCS storage needs a bucket name"))?;
            let store = GcsStore::new(
                http.clone(),
                &config.storage.storage_base_url,
                bucket,
                access_token(config)?,
            );
            run_with(config, args, client, warehouse, &store).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    if args.init_config {
        let config_path = args
            .config_path
            .clone()
            .unwrap_or_else(Config::get_config_path);
        Config::init_file(&config_path).await?;
        println!("Wrote default configuration to {config_path}");
        return Ok(());
    }

    let mut config = Config::load(args.config_path.as_deref()).await?;
    apply_args(&mut config, &args)?;

    if args.list_config {
        let config_path = args
            .config_path
            .clone()
            .unwrap_or_else(Config::get_config_path);
        println!("{}", config.display(&config_path));
        return Ok(());
    }

    let (log_file_path, _guard) = setup_logging(
        config.log_file_path.as_deref(),
        &Config::get_log_dir_path(),
        args.quiet,
    )
    .await?;
    info!("Logs are being written to: {log_file_path}");

    let http = create_http_client_with_timeout(config.http_timeout_seconds)?;
    let client = NhlClient::new(http.clone(), &config.api_base_url);

    let summary = match config.warehouse.backend {
        WarehouseBackend::Sqlite => {
            let warehouse = SqliteWarehouse::open(&config.warehouse.sqlite_path)?;
            run_with_warehouse(&config, &args, &http, &client, &warehouse).await?
        }
        WarehouseBackend::BigQuery => {
            let project = config
                .warehouse
                .project_id
                .clone()
                .ok_or_else(|| AppError::config_error("BigQuery needs a project id"))?;
            let warehouse = BigQueryWarehouse::new(
                http.clone(),
                &config.warehouse.bigquery_base_url,
                project,
                &config.warehouse.location,
                access_token(&config)?,
            );
            run_with_warehouse(&config, &args, &http, &client, &warehouse).await?
        }
    };

    if summary.all_succeeded() {
        info!("Run complete");
    } else {
        error!("Run finished with failed categories, see the log for details");
    }
    println!("{summary}");
    Ok(())
}
