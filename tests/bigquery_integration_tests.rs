//! A skaters run against mocked BigQuery and Cloud Storage REST endpoints.

use chrono::{DateTime, Utc};
use nhl_etl::config::{Config, StorageBackend, WarehouseBackend};
use nhl_etl::data_fetcher::api::create_http_client_with_timeout;
use nhl_etl::data_fetcher::{NhlClient, PlayerCategory};
use nhl_etl::pipeline::{CategoryStatus, run_pipeline};
use nhl_etl::warehouse::{BigQueryWarehouse, GcsStore};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

const STAGING_TABLE: &str = "skaters_20250115_083000";

fn table_schema() -> serde_json::Value {
    json!({"schema": {"fields": [
        {"name": "player_id", "type": "INTEGER"},
        {"name": "season_id", "type": "INTEGER"},
        {"name": "game_type_id", "type": "INTEGER"},
        {"name": "game_id", "type": "INTEGER"},
        {"name": "game_date", "type": "DATE"},
        {"name": "toi_seconds", "type": "INTEGER"},
        {"name": "goals", "type": "INTEGER"}
    ]}})
}

async fn mount_stats_api(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/roster/TOR/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "forwards": [{"id": 8479318, "firstName": {"default": "Auston"},
                          "lastName": {"default": "Matthews"}, "positionCode": "C"}],
            "defensemen": [],
            "goalies": []
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player/8479318/game-log/20242025/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gameLog": [
                {"gameId": 2024020002, "gameDate": "2024-10-09", "goals": 1, "toi": "19:58"},
                {"gameId": 2024020010, "gameDate": "2024-10-12", "goals": 0, "toi": "21:03"}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_google(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/nhl-stats/o"))
        .and(query_param("name", "nhl/skaters/20250115_083000.csv"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "nhl/skaters/20250115_083000.csv",
            "bucket": "nhl-stats"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/proj/datasets"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "Already Exists"}
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/proj/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"jobId": "load_1", "location": "US"},
            "status": {"state": "DONE"},
            "statistics": {"load": {"outputRows": "2"}}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("/projects/proj/datasets/nhl_staging/tables/{STAGING_TABLE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/projects/proj/datasets/nhl_staging/tables/{STAGING_TABLE}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(table_schema()))
        .mount(server)
        .await;

    // Production is missing on the first lookup and exists afterwards
    Mock::given(method("GET"))
        .and(path("/projects/proj/datasets/nhl/tables/skaters"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/proj/datasets/nhl/tables/skaters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(table_schema()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects/proj/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"jobId": "query_1", "location": "US"},
            "jobComplete": true,
            "numDmlAffectedRows": "2"
        })))
        .mount(server)
        .await;
}

fn queries(requests: &[Request]) -> Vec<String> {
    requests
        .iter()
        .filter(|r| r.url.path() == "/projects/proj/queries")
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["query"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_skaters_run_against_bigquery_and_gcs() {
    let stats = MockServer::start().await;
    let google = MockServer::start().await;
    mount_stats_api(&stats).await;
    mount_google(&google).await;

    let mut config = Config {
        api_base_url: stats.uri(),
        teams: vec!["TOR".to_string()],
        requests_per_second: 500.0,
        access_token: Some("test-token".to_string()),
        ..Config::default()
    };
    config.warehouse.backend = WarehouseBackend::BigQuery;
    config.warehouse.project_id = Some("proj".to_string());
    config.storage.backend = StorageBackend::Gcs;
    config.storage.bucket = Some("nhl-stats".to_string());
    config.validate().unwrap();

    let http = create_http_client_with_timeout(10).unwrap();
    let client = NhlClient::new(http.clone(), stats.uri());
    let warehouse = BigQueryWarehouse::new(http.clone(), google.uri(), "proj", "US", "test-token")
        .with_poll_interval(Duration::from_millis(5));
    let store = GcsStore::new(http, google.uri(), "nhl-stats", "test-token");

    let run_at = DateTime::parse_from_rfc3339("2025-01-15T08:30:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let summary = run_pipeline(
        &config,
        &[PlayerCategory::Skaters],
        &client,
        &client,
        &warehouse,
        &store,
        run_at,
    )
    .await
    .unwrap();

    assert!(summary.all_succeeded(), "{summary}");
    assert!(matches!(
        &summary.categories[0].status,
        CategoryStatus::Loaded {
            rows_staged: 2,
            rows_merged: 2,
            production_created: true,
            columns_added: 0,
            ..
        }
    ));

    let sql = queries(&google.received_requests().await.unwrap());
    assert_eq!(sql.len(), 2, "expected CREATE TABLE then MERGE, got {sql:?}");
    assert!(sql[0].starts_with("CREATE TABLE IF NOT EXISTS `proj.nhl.skaters`"));
    assert!(sql[0].contains("PARTITION BY `game_date`"));
    assert!(sql[0].contains("CLUSTER BY `game_id`"));
    assert!(sql[1].starts_with("MERGE `proj.nhl.skaters` AS T"));
    assert!(sql[1].contains(&format!("`proj.nhl_staging.{STAGING_TABLE}`")));
    assert!(sql[1].contains(
        "ON T.`game_date` = S.`game_date` AND T.`game_id` = S.`game_id` AND T.`player_id` = S.`player_id`"
    ));
}

#[tokio::test]
async fn test_failed_load_is_reported_per_category() {
    let stats = MockServer::start().await;
    let google = MockServer::start().await;
    mount_stats_api(&stats).await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/nhl-stats/o"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Permission denied"}
        })))
        .mount(&google)
        .await;

    let mut config = Config {
        api_base_url: stats.uri(),
        teams: vec!["TOR".to_string()],
        requests_per_second: 500.0,
        ..Config::default()
    };
    config.warehouse.project_id = Some("proj".to_string());

    let http = create_http_client_with_timeout(10).unwrap();
    let client = NhlClient::new(http.clone(), stats.uri());
    let warehouse = BigQueryWarehouse::new(http.clone(), google.uri(), "proj", "US", "t");
    let store = GcsStore::new(http, google.uri(), "nhl-stats", "t");

    let summary = run_pipeline(
        &config,
        &PlayerCategory::ALL,
        &client,
        &client,
        &warehouse,
        &store,
        Utc::now(),
    )
    .await
    .unwrap();

    assert!(!summary.all_succeeded());
    let skaters = summary.category(PlayerCategory::Skaters).unwrap();
    match &skaters.status {
        CategoryStatus::Failed(reason) => assert!(reason.contains("Permission denied")),
        other => panic!("unexpected status: {other:?}"),
    }
    // No goalies on the roster, so that category is skipped rather than failed
    assert!(matches!(
        summary.category(PlayerCategory::Goalies).unwrap().status,
        CategoryStatus::Skipped(_)
    ));
}
