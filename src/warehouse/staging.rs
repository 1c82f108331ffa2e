use super::sql::TableRef;
use super::storage::{ObjectRef, ObjectStore};
use super::Warehouse;
use crate::error::AppError;
use crate::table::{Schema, Table, infer_schema, to_csv_bytes};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, instrument, warn};

/// `now + hours`, or `None` when that does not fit in a timestamp.
fn expiration_time(now: DateTime<Utc>, hours: u64) -> Option<DateTime<Utc>> {
    let hours = i64::try_from(hours).ok()?;
    now.checked_add_signed(TimeDelta::try_hours(hours)?)
}

/// Where and under which names one table is staged.
#[derive(Debug, Clone)]
pub struct StagingRequest<'a> {
    /// Base name shared by the object and the staging table, e.g. `skaters`
    pub name: &'a str,
    pub project: Option<&'a str>,
    pub dataset: &'a str,
    /// Run timestamp, already formatted
    pub run_timestamp: &'a str,
    pub object_prefix: &'a str,
    pub expiration_hours: u64,
}

impl StagingRequest<'_> {
    pub fn object_key(&self) -> String {
        let prefix = self.object_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}.csv", self.name, self.run_timestamp)
        } else {
            format!("{prefix}/{}/{}.csv", self.name, self.run_timestamp)
        }
    }

    pub fn table_ref(&self) -> Result<TableRef, AppError> {
        TableRef::new(
            self.project,
            self.dataset,
            &format!("{}_{}", self.name, self.run_timestamp),
        )
    }
}

#[derive(Debug, Clone)]
pub struct StagingOutcome {
    pub table: TableRef,
    pub schema: Schema,
    pub object: ObjectRef,
    pub rows_loaded: u64,
}

/// Writes `table` to object storage as CSV and loads it into a fresh,
/// expiring staging table.
///
/// A failure to set the expiration is logged and does not fail the load.
#[instrument(skip(warehouse, store, table), fields(name = request.name, rows = table.len()))]
pub async fn load_staging<W: Warehouse, S: ObjectStore>(
    warehouse: &W,
    store: &S,
    table: &Table,
    request: &StagingRequest<'_>,
) -> Result<StagingOutcome, AppError> {
    let target = request.table_ref()?;
    let schema = infer_schema(table);

    let bytes = to_csv_bytes(table)?;
    let object = store.put(&request.object_key(), bytes, "text/csv").await?;

    warehouse.ensure_dataset(&target.dataset).await?;
    let rows_loaded = warehouse.load_csv(&object, &target, &schema).await?;
    if rows_loaded != table.len() as u64 {
        warn!(
            "{target}: loaded {rows_loaded} rows but the table had {}",
            table.len()
        );
    }

    match expiration_time(Utc::now(), request.expiration_hours) {
        Some(expires_at) => {
            if let Err(e) = warehouse.set_expiration(&target, expires_at).await {
                warn!("Could not set expiration on {target}: {e}");
            }
        }
        None => warn!(
            "Could not set expiration on {target}: {} hours is out of range",
            request.expiration_hours
        ),
    }

    info!(
        "Staged {rows_loaded} rows in {target} from {}",
        object.uri
    );
    Ok(StagingOutcome {
        table: target,
        schema,
        object,
        rows_loaded,
    })
}
