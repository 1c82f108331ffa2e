//! BigQuery through its REST API v2.
//!
//! Authentication is a bearer access token supplied by the caller (for
//! example from `gcloud auth print-access-token`). Token refresh is out of
//! scope: a run is expected to finish well within a token's lifetime.

use super::Warehouse;
use super::sql::{Dialect, Ident, Statement, TableRef};
use super::storage::ObjectRef;
use crate::constants::gcp;
use crate::data_fetcher::api::fetch_utils::{map_request_error, read_json};
use crate::error::AppError;
use crate::table::{Column, Schema};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as Json, json};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct BigQueryWarehouse {
    client: Client,
    base_url: String,
    project: String,
    location: String,
    access_token: String,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Debug, Deserialize)]
struct TableResource {
    #[serde(default)]
    schema: Option<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct JobReference {
    #[serde(rename = "jobId")]
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    state: String,
    #[serde(rename = "errorResult", default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct LoadStatistics {
    #[serde(rename = "outputRows", default)]
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(rename = "jobReference")]
    job_reference: JobReference,
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "jobReference")]
    job_reference: JobReference,
    #[serde(rename = "jobComplete", default)]
    job_complete: bool,
    #[serde(rename = "numDmlAffectedRows", default)]
    num_dml_affected_rows: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl BigQueryWarehouse {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project: impl Into<String>,
        location: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        BigQueryWarehouse {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            location: location.into(),
            access_token: access_token.into(),
            poll_interval: Duration::from_millis(gcp::JOB_POLL_INTERVAL_MS),
            max_polls: gcp::JOB_MAX_POLLS,
        }
    }

    /// Overrides how often running jobs are polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn project_of<'a>(&'a self, table: &'a TableRef) -> &'a str {
        table.project.as_deref().unwrap_or(&self.project)
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.base_url,
            self.project_of(table),
            table.dataset,
            table.table
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, AppError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| map_request_error(e, url))?;
        read_json(response, url).await
    }

    /// Polls a job until it reaches `DONE`.
    async fn wait_for_job(&self, mut job: Job) -> Result<Job, AppError> {
        let mut polls = 0;
        while job.status.state != "DONE" {
            if polls >= self.max_polls {
                return Err(AppError::warehouse_job(
                    &job.job_reference.job_id,
                    format!("still {} after {polls} polls", job.status.state),
                ));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            let location = job
                .job_reference
                .location
                .clone()
                .unwrap_or_else(|| self.location.clone());
            let url = format!(
                "{}/projects/{}/jobs/{}",
                self.base_url, self.project, job.job_reference.job_id
            );
            let request = self.client.get(&url).query(&[("location", location.as_str())]);
            job = self.send(request, &url).await?;
            debug!("Job {} is {}", job.job_reference.job_id, job.status.state);
        }

        if let Some(error) = &job.status.error_result {
            return Err(AppError::warehouse_job(
                &job.job_reference.job_id,
                match &error.reason {
                    Some(reason) => format!("{reason}: {}", error.message),
                    None => error.message.clone(),
                },
            ));
        }
        Ok(job)
    }
}

impl Warehouse for BigQueryWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::BigQuery
    }

    #[instrument(skip(self))]
    async fn ensure_dataset(&self, dataset: &Ident) -> Result<(), AppError> {
        let url = format!("{}/projects/{}/datasets", self.base_url, self.project);
        let body = json!({
            "datasetReference": {"projectId": self.project, "datasetId": dataset.as_str()},
            "location": self.location,
        });
        match self.send::<Json>(self.client.post(&url).json(&body), &url).await {
            Ok(_) => {
                info!("Created dataset {}.{dataset}", self.project);
                Ok(())
            }
            Err(AppError::ApiClientError { status: 409, .. }) => {
                debug!("Dataset {}.{dataset} already exists", self.project);
                Ok(())
            }
            Err(e) => Err(AppError::warehouse("create dataset", e.to_string())),
        }
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn table_schema(&self, table: &TableRef) -> Result<Option<Schema>, AppError> {
        let url = self.table_url(table);
        match self.send::<TableResource>(self.client.get(&url), &url).await {
            Ok(resource) => {
                let fields = resource.schema.map(|s| s.fields).unwrap_or_default();
                Ok(Some(Schema::new(
                    fields
                        .into_iter()
                        .map(|f| Column::new(f.name, Dialect::BigQuery.parse_type(&f.field_type)))
                        .collect(),
                )))
            }
            Err(AppError::ApiNotFound { .. }) => Ok(None),
            Err(e) => Err(AppError::warehouse("get table", e.to_string())),
        }
    }

    #[instrument(skip(self, schema), fields(object = %object.uri, table = %table))]
    async fn load_csv(
        &self,
        object: &ObjectRef,
        table: &TableRef,
        schema: &Schema,
    ) -> Result<u64, AppError> {
        let fields: Vec<Json> = schema
            .columns()
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": Dialect::BigQuery.type_name(c.column_type),
                    "mode": "NULLABLE",
                })
            })
            .collect();
        let body = json!({
            "jobReference": {"projectId": self.project, "location": self.location},
            "configuration": {
                "load": {
                    "sourceUris": [object.uri],
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "writeDisposition": "WRITE_TRUNCATE",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "destinationTable": {
                        "projectId": self.project_of(table),
                        "datasetId": table.dataset.as_str(),
                        "tableId": table.table.as_str(),
                    },
                    "schema": {"fields": fields},
                }
            }
        });

        let url = format!("{}/projects/{}/jobs", self.base_url, self.project);
        let job: Job = self
            .send(self.client.post(&url).json(&body), &url)
            .await
            .map_err(|e| AppError::warehouse("load", e.to_string()))?;
        info!("Started load job {}", job.job_reference.job_id);

        let job = self.wait_for_job(job).await?;
        let rows = parse_count(
            job.statistics
                .as_ref()
                .and_then(|s| s.load.as_ref())
                .and_then(|l| l.output_rows.as_deref()),
        );
        info!("Loaded {rows} rows into {table}");
        Ok(rows)
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn set_expiration(
        &self,
        table: &TableRef,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let url = self.table_url(table);
        let body = json!({"expirationTime": expires_at.timestamp_millis().to_string()});
        self.send::<Json>(self.client.patch(&url).json(&body), &url)
            .await
            .map_err(|e| AppError::warehouse("set expiration", e.to_string()))?;
        debug!("{table} expires at {expires_at}");
        Ok(())
    }

    #[instrument(skip(self, statement), fields(kind = ?statement.kind))]
    async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
        debug!("Executing:\n{}", statement.sql);
        let url = format!("{}/projects/{}/queries", self.base_url, self.project);
        let body = json!({
            "query": statement.sql,
            "useLegacySql": false,
            "timeoutMs": gcp::QUERY_TIMEOUT_MS,
            "location": self.location,
        });
        let mut response: QueryResponse = self
            .send(self.client.post(&url).json(&body), &url)
            .await
            .map_err(|e| AppError::warehouse("query", e.to_string()))?;

        let mut polls = 0;
        while !response.job_complete {
            if polls >= self.max_polls {
                return Err(AppError::warehouse_job(
                    &response.job_reference.job_id,
                    format!("query incomplete after {polls} polls"),
                ));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            let location = response
                .job_reference
                .location
                .clone()
                .unwrap_or_else(|| self.location.clone());
            let poll_url = format!("{url}/{}", response.job_reference.job_id);
            let timeout = gcp::QUERY_TIMEOUT_MS.to_string();
            let request = self.client.get(&poll_url).query(&[
                ("location", location.as_str()),
                ("timeoutMs", timeout.as_str()),
                ("maxResults", "0"),
            ]);
            response = self.send(request, &poll_url).await?;
        }

        if let Some(error) = response.errors.first() {
            warn!("Query {} reported errors", response.job_reference.job_id);
            return Err(AppError::warehouse_job(
                &response.job_reference.job_id,
                error.message.clone(),
            ));
        }
        Ok(parse_count(response.num_dml_affected_rows.as_deref()))
    }
}
