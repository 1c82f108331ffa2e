//! End-to-end run: rosters, game logs, assembly, staging, upsert.

use crate::config::Config;
use crate::constants::RUN_TIMESTAMP_FORMAT;
use crate::data_fetcher::{
    GameLogSource, GameType, NhlClient, PlayerCategory, RosterRow, Season, Throttle,
    fetch_game_logs, fetch_rosters,
};
use crate::error::AppError;
use crate::table::assemble_performance_table;
use crate::warehouse::{
    ObjectStore, StagingRequest, TableRef, Warehouse, apply_upsert, load_staging,
};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryStatus {
    Loaded {
        staging_table: String,
        rows_staged: u64,
        rows_merged: u64,
        columns_added: usize,
        production_created: bool,
    },
    /// Nothing to load, e.g. no games played yet
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: PlayerCategory,
    pub players_requested: usize,
    pub players_failed: Vec<i64>,
    pub game_log_rows: usize,
    pub table_rows: usize,
    pub status: CategoryStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub run_timestamp: String,
    pub rostered_players: usize,
    pub categories: Vec<CategorySummary>,
}

impl PipelineSummary {
    pub fn all_succeeded(&self) -> bool {
        self.categories
            .iter()
            .all(|c| !matches!(c.status, CategoryStatus::Failed(_)))
    }

    pub fn category(&self, category: PlayerCategory) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Run {}: {} rostered players",
            self.run_timestamp, self.rostered_players
        )?;
        for c in &self.categories {
            write!(
                f,
                "  {}: {} players ({} failed), {} game rows -> ",
                c.category,
                c.players_requested,
                c.players_failed.len(),
                c.table_rows
            )?;
            match &c.status {
                CategoryStatus::Loaded {
                    staging_table,
                    rows_merged,
                    columns_added,
                    ..
                } => writeln!(
                    f,
                    "merged {rows_merged} rows from {staging_table}, {columns_added} new columns"
                )?,
                CategoryStatus::Skipped(reason) => writeln!(f, "skipped: {reason}")?,
                CategoryStatus::Failed(reason) => writeln!(f, "FAILED: {reason}")?,
            }
        }
        Ok(())
    }
}

/// Everything a category run needs besides the backends.
struct RunContext<'a> {
    config: &'a Config,
    season: Season,
    game_type: GameType,
    throttle: &'a Throttle,
    run_timestamp: &'a str,
}

/// Runs the whole pipeline for `categories`.
///
/// Only setup problems (invalid season, game type or rate) are returned as
/// errors. A category that fails to stage or merge is logged and reported in
/// the summary, and the remaining categories still run.
#[instrument(skip_all, fields(season = config.season, game_type = config.game_type))]
pub async fn run_pipeline<S, W, O>(
    config: &Config,
    categories: &[PlayerCategory],
    client: &NhlClient,
    source: &S,
    warehouse: &W,
    store: &O,
    run_at: DateTime<Utc>,
) -> Result<PipelineSummary, AppError>
where
    S: GameLogSource,
    W: Warehouse,
    O: ObjectStore,
{
    let season = Season::new(config.season)?;
    let game_type = GameType::try_from(config.game_type)?;
    let throttle = Throttle::new(config.requests_per_second)?;
    let run_timestamp = run_at.format(RUN_TIMESTAMP_FORMAT).to_string();
    info!("Starting run {run_timestamp} for season {season}, game type {game_type}");

    let roster = fetch_rosters(client, &throttle, &config.teams).await;
    if roster.is_empty() {
        warn!("No rostered players found, nothing will be loaded");
    }

    let ctx = RunContext {
        config,
        season,
        game_type,
        throttle: &throttle,
        run_timestamp: &run_timestamp,
    };

    let mut summary = PipelineSummary {
        run_timestamp: run_timestamp.clone(),
        rostered_players: roster.len(),
        categories: Vec::with_capacity(categories.len()),
    };
    for &category in categories {
        let category_roster: Vec<RosterRow> = roster
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect();
        let result = run_category(&ctx, category, &category_roster, source, warehouse, store).await;
        if let CategoryStatus::Failed(reason) = &result.status {
            error!("Category {category} failed: {reason}");
        }
        summary.categories.push(result);
    }

    info!("Run {run_timestamp} finished");
    Ok(summary)
}

async fn run_category<S, W, O>(
    ctx: &RunContext<'_>,
    category: PlayerCategory,
    roster: &[RosterRow],
    source: &S,
    warehouse: &W,
    store: &O,
) -> CategorySummary
where
    S: GameLogSource,
    W: Warehouse,
    O: ObjectStore,
{
    let player_ids: Vec<i64> = roster.iter().map(|r| r.player_id).collect();
    info!("Processing {} {category}", player_ids.len());

    let report = fetch_game_logs(
        source,
        ctx.throttle,
        &player_ids,
        ctx.season,
        ctx.game_type,
        ctx.config.workers,
    )
    .await;
    let table = assemble_performance_table(&report.rows, roster);

    let mut summary = CategorySummary {
        category,
        players_requested: player_ids.len(),
        players_failed: report.failed,
        game_log_rows: report.rows.len(),
        table_rows: table.len(),
        status: CategoryStatus::Skipped(String::new()),
    };

    if table.is_empty() {
        let reason = format!("no game-log rows for {category}");
        warn!("Skipping load: {reason}");
        summary.status = CategoryStatus::Skipped(reason);
        return summary;
    }

    summary.status = match stage_and_merge(ctx, category, &table, warehouse, store).await {
        Ok(status) => status,
        Err(e) => CategoryStatus::Failed(e.to_string()),
    };
    summary
}

async fn stage_and_merge<W: Warehouse, O: ObjectStore>(
    ctx: &RunContext<'_>,
    category: PlayerCategory,
    table: &crate::table::Table,
    warehouse: &W,
    store: &O,
) -> Result<CategoryStatus, AppError> {
    let wh = &ctx.config.warehouse;
    let project = wh.project_id.as_deref();
    let request = StagingRequest {
        name: category.table_name(),
        project,
        dataset: &wh.staging_dataset,
        run_timestamp: ctx.run_timestamp,
        object_prefix: &ctx.config.storage.object_prefix,
        expiration_hours: wh.staging_expiration_hours,
    };
    let staged = load_staging(warehouse, store, table, &request).await?;

    let production = TableRef::new(project, &wh.production_dataset, category.table_name())?;
    let upsert = apply_upsert(warehouse, &staged.table, &production, &wh.merge_keys).await?;

    Ok(CategoryStatus::Loaded {
        staging_table: staged.table.to_string(),
        rows_staged: staged.rows_loaded,
        rows_merged: upsert.rows_affected,
        columns_added: upsert.schema_sync.added.len(),
        production_created: upsert.created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_fetcher::api::http_client::create_test_http_client;
    use crate::testing_utils::ScriptedGameLogSource;
    use crate::warehouse::{LocalStore, SqliteWarehouse};
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn config(api: &str) -> Config {
        Config {
            api_base_url: api.to_string(),
            teams: vec!["TOR".to_string(), "XXX".to_string()],
            requests_per_second: 1000.0,
            workers: 2,
            ..Config::default()
        }
    }

    async fn mount_roster(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/roster/TOR/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "forwards": [
                    {"id": 1, "firstName": {"default": "Auston"}, "lastName": {"default": "Matthews"}, "positionCode": "C"},
                    {"id": 2, "firstName": {"default": "Mitch"}, "lastName": {"default": "Marner"}, "positionCode": "R"}
                ],
                "defensemen": [],
                "goalies": [
                    {"id": 3, "firstName": {"default": "Joseph"}, "lastName": {"default": "Woll"}, "positionCode": "G"}
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/roster/XXX/current"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    fn run_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_pipeline_with_scripted_source() {
        let server = MockServer::start().await;
        mount_roster(&server).await;
        let dir = tempdir().unwrap();

        let config = config(&server.uri());
        let client = NhlClient::new(create_test_http_client(), server.uri());
        let source = ScriptedGameLogSource::new(3).failing_for(2);
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        let store = LocalStore::new(dir.path());

        let summary = run_pipeline(
            &config,
            &PlayerCategory::ALL,
            &client,
            &source,
            &warehouse,
            &store,
            run_at(),
        )
        .await
        .unwrap();

        assert_eq!(summary.run_timestamp, "20250115_083000");
        assert_eq!(summary.rostered_players, 3);
        assert!(summary.all_succeeded());

        let skaters = summary.category(PlayerCategory::Skaters).unwrap();
        assert_eq!(skaters.players_requested, 2);
        assert_eq!(skaters.players_failed, vec![2]);
        assert_eq!(skaters.table_rows, 3);
        assert!(matches!(
            skaters.status,
            CategoryStatus::Loaded { rows_merged: 3, production_created: true, .. }
        ));

        let goalies = TableRef::new(None, "nhl", "goalies").unwrap();
        assert_eq!(warehouse.row_count(&goalies).unwrap(), 3);
        assert!(dir.path().join("nhl/skaters/20250115_083000.csv").exists());
        assert!(summary.to_string().contains("skaters"));
    }

    #[tokio::test]
    async fn test_category_without_games_is_skipped() {
        let server = MockServer::start().await;
        mount_roster(&server).await;
        let dir = tempdir().unwrap();

        let config = config(&server.uri());
        let client = NhlClient::new(create_test_http_client(), server.uri());
        let source = ScriptedGameLogSource::new(0);
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        let store = LocalStore::new(dir.path());

        let summary = run_pipeline(
            &config,
            &[PlayerCategory::Goalies],
            &client,
            &source,
            &warehouse,
            &store,
            run_at(),
        )
        .await
        .unwrap();

        assert_eq!(summary.categories.len(), 1);
        assert!(matches!(
            summary.categories[0].status,
            CategoryStatus::Skipped(_)
        ));
        assert!(summary.all_succeeded());
    }

    #[tokio::test]
    async fn test_invalid_season_is_setup_error() {
        let dir = tempdir().unwrap();
        let config = Config {
            season: 20242026,
            ..config("http://127.0.0.1:9")
        };
        let client = NhlClient::new(create_test_http_client(), config.api_base_url.clone());
        let result = run_pipeline(
            &config,
            &PlayerCategory::ALL,
            &client,
            &ScriptedGameLogSource::new(1),
            &SqliteWarehouse::open_in_memory().unwrap(),
            &LocalStore::new(dir.path()),
            run_at(),
        )
        .await;
        assert!(result.is_err());
    }
}
