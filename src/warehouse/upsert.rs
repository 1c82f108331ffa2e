use super::Warehouse;
use super::schema_sync::{SchemaSyncReport, sync_schema};
use super::sql::{self, TableLayout, TableRef};
use crate::constants::{CLUSTER_COLUMN, PARTITION_COLUMN};
use crate::error::AppError;
use crate::table::Schema;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    /// Production did not exist and was created by this upsert
    pub created: bool,
    pub schema_sync: SchemaSyncReport,
    /// Rows inserted or updated, as reported by the warehouse
    pub rows_affected: u64,
}

fn production_layout(schema: &Schema, keys: &[String]) -> TableLayout {
    TableLayout {
        partition_by: schema
            .contains(PARTITION_COLUMN)
            .then(|| PARTITION_COLUMN.to_string()),
        cluster_by: if schema.contains(CLUSTER_COLUMN) {
            vec![CLUSTER_COLUMN.to_string()]
        } else {
            Vec::new()
        },
        unique_key: keys.to_vec(),
    }
}

/// Merges the staging table into production, keyed on `keys`.
///
/// Production is created from the staging schema if it does not exist, and
/// its schema is widened to the staging schema before the merge. The steps
/// are not transactional; re-running after a failure converges.
#[instrument(skip(warehouse), fields(staging = %staging, production = %production))]
pub async fn apply_upsert<W: Warehouse>(
    warehouse: &W,
    staging: &TableRef,
    production: &TableRef,
    keys: &[String],
) -> Result<UpsertOutcome, AppError> {
    let result = upsert_steps(warehouse, staging, production, keys).await;
    if let Err(e) = &result {
        error!("Upsert of {staging} into {production} failed: {e}");
    }
    result
}

async fn upsert_steps<W: Warehouse>(
    warehouse: &W,
    staging: &TableRef,
    production: &TableRef,
    keys: &[String],
) -> Result<UpsertOutcome, AppError> {
    let dialect = warehouse.dialect();
    let staging_schema = warehouse.table_schema(staging).await?.ok_or_else(|| {
        AppError::warehouse("upsert", format!("staging table {staging} does not exist"))
    })?;

    if keys.is_empty() {
        return Err(AppError::warehouse("upsert", "no key columns given"));
    }
    for key in keys {
        if !staging_schema.contains(key) {
            return Err(AppError::unknown_column(key, staging.to_string()));
        }
    }

    let mut outcome = UpsertOutcome::default();
    if warehouse.table_schema(production).await?.is_none() {
        warehouse.ensure_dataset(&production.dataset).await?;
        let layout = production_layout(&staging_schema, keys);
        let create = sql::create_table(dialect, production, &staging_schema, &layout)?;
        warehouse.execute(&create).await?;
        info!("Created {production} from the schema of {staging}");
        outcome.created = true;
    }

    outcome.schema_sync = sync_schema(warehouse, production, staging).await?;

    let merge = sql::merge(dialect, production, staging, &staging_schema, keys)?;
    outcome.rows_affected = warehouse.execute(&merge).await?;
    info!(
        "Merged {staging} into {production}: {} rows affected",
        outcome.rows_affected
    );
    Ok(outcome)
}
