//! Warehouse and object-storage backends plus the load/merge steps built on
//! top of them.

pub mod bigquery;
pub mod schema_sync;
pub mod sql;
pub mod sqlite;
pub mod staging;
pub mod storage;
pub mod upsert;

pub use bigquery::BigQueryWarehouse;
pub use schema_sync::{SchemaSyncReport, sync_schema};
pub use sql::{Dialect, Ident, Statement, StatementKind, TableLayout, TableRef};
pub use sqlite::SqliteWarehouse;
pub use staging::{StagingOutcome, StagingRequest, load_staging};
pub use storage::{GcsStore, LocalStore, ObjectRef, ObjectStore};
pub use upsert::{UpsertOutcome, apply_upsert};

use crate::error::AppError;
use crate::table::Schema;
use chrono::{DateTime, Utc};

/// Operations the pipeline needs from an analytical warehouse.
///
/// Implementations render SQL through [`sql`] using their own [`Dialect`].
#[allow(async_fn_in_trait)]
pub trait Warehouse {
    fn dialect(&self) -> Dialect;

    /// Creates the dataset if it does not exist yet. An already-existing
    /// dataset is not an error.
    async fn ensure_dataset(&self, dataset: &Ident) -> Result<(), AppError>;

    /// Current schema of `table`, or `None` if the table does not exist.
    async fn table_schema(&self, table: &TableRef) -> Result<Option<Schema>, AppError>;

    /// Replaces the contents of `table` with the CSV object, creating the
    /// table with `schema` if needed. Returns the number of rows loaded.
    async fn load_csv(
        &self,
        object: &ObjectRef,
        table: &TableRef,
        schema: &Schema,
    ) -> Result<u64, AppError>;

    async fn set_expiration(
        &self,
        table: &TableRef,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Runs one statement and returns the number of affected rows where the
    /// backend reports it.
    async fn execute(&self, statement: &Statement) -> Result<u64, AppError>;
}
