use super::Warehouse;
use super::sql::{self, TableRef};
use crate::error::AppError;
use crate::table::Column;
use tracing::{error, info, instrument};

/// Outcome of one schema synchronisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSyncReport {
    pub added: Vec<Column>,
    /// Columns that could not be added, with the reason
    pub failed: Vec<(Column, String)>,
}

impl SchemaSyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.failed.is_empty()
    }
}

/// Adds every staging column production lacks, with the staging type.
///
/// Columns are never dropped or retyped. A column that fails to add is
/// logged and recorded; the remaining columns are still attempted.
#[instrument(skip(warehouse), fields(production = %production, staging = %staging))]
pub async fn sync_schema<W: Warehouse>(
    warehouse: &W,
    production: &TableRef,
    staging: &TableRef,
) -> Result<SchemaSyncReport, AppError> {
    let staging_schema = warehouse.table_schema(staging).await?.ok_or_else(|| {
        AppError::warehouse("schema sync", format!("staging table {staging} does not exist"))
    })?;
    let production_schema = warehouse.table_schema(production).await?.ok_or_else(|| {
        AppError::warehouse(
            "schema sync",
            format!("production table {production} does not exist"),
        )
    })?;

    let mut report = SchemaSyncReport::default();
    for column in staging_schema.columns_missing_from(&production_schema) {
        let result = match sql::add_column(warehouse.dialect(), production, column) {
            Ok(statement) => warehouse.execute(&statement).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => {
                info!(
                    "Added column {} {} to {production}",
                    column.name, column.column_type
                );
                report.added.push(column.clone());
            }
            Err(e) => {
                error!("Failed to add column {} to {production}: {e}", column.name);
                report.failed.push((column.clone(), e.to_string()));
            }
        }
    }

    if report.is_noop() {
        info!("{production} already has every staging column");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Schema};
    use crate::warehouse::sql::{Dialect, Ident, Statement, TableLayout};
    use crate::warehouse::storage::ObjectRef;
    use crate::warehouse::SqliteWarehouse;
    use chrono::{DateTime, Utc};
    use std::path::Path;
    use tempfile::tempdir;

    /// Delegates to SQLite but refuses statements mentioning one column.
    struct RefusingWarehouse {
        inner: SqliteWarehouse,
        refuse: &'static str,
    }

    impl Warehouse for RefusingWarehouse {
        fn dialect(&self) -> Dialect {
            self.inner.dialect()
        }
        async fn ensure_dataset(&self, dataset: &Ident) -> Result<(), AppError> {
            self.inner.ensure_dataset(dataset).await
        }
        async fn table_schema(&self, table: &TableRef) -> Result<Option<Schema>, AppError> {
            self.inner.table_schema(table).await
        }
        async fn load_csv(
            &self,
            object: &ObjectRef,
            table: &TableRef,
            schema: &Schema,
        ) -> Result<u64, AppError> {
            self.inner.load_csv(object, table, schema).await
        }
        async fn set_expiration(
            &self,
            table: &TableRef,
            expires_at: DateTime<Utc>,
        ) -> Result<(), AppError> {
            self.inner.set_expiration(table, expires_at).await
        }
        async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
            if statement.sql.contains(self.refuse) {
                return Err(AppError::warehouse("execute", "refused"));
            }
            self.inner.execute(statement).await
        }
    }

    fn staging() -> TableRef {
        TableRef::new(None, "nhl_staging", "skaters_20250101_000000").unwrap()
    }

    fn production() -> TableRef {
        TableRef::new(None, "nhl", "skaters").unwrap()
    }

    async fn prepare(warehouse: &SqliteWarehouse, dir: &Path) {
        let path = dir.join("staging.csv");
        std::fs::write(&path, "player_id,game_date,goals,ot_goals,shifts\n").unwrap();
        let object = ObjectRef {
            key: "staging.csv".into(),
            uri: format!("file://{}", path.display()),
        };
        let staging_schema = Schema::new(vec![
            Column::new("player_id", ColumnType::Int64),
            Column::new("game_date", ColumnType::Date),
            Column::new("goals", ColumnType::Int64),
            Column::new("ot_goals", ColumnType::Int64),
            Column::new("shifts", ColumnType::Int64),
        ]);
        warehouse
            .load_csv(&object, &staging(), &staging_schema)
            .await
            .unwrap();

        let production_schema = Schema::new(vec![
            Column::new("player_id", ColumnType::Int64),
            Column::new("GAME_DATE", ColumnType::Date),
            Column::new("goals", ColumnType::Int64),
        ]);
        let create = sql::create_table(
            Dialect::Sqlite,
            &production(),
            &production_schema,
            &TableLayout::default(),
        )
        .unwrap();
        warehouse.execute(&create).await.unwrap();
    }

    #[tokio::test]
    async fn test_adds_missing_columns_once() {
        let dir = tempdir().unwrap();
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        prepare(&warehouse, dir.path()).await;

        let first = sync_schema(&warehouse, &production(), &staging()).await.unwrap();
        let added: Vec<&str> = first.added.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(added, vec!["ot_goals", "shifts"]);
        assert!(first.failed.is_empty());

        let schema = warehouse.table_schema(&production()).await.unwrap().unwrap();
        assert_eq!(schema.len(), 5);
        assert_eq!(schema.get("shifts").unwrap().column_type, ColumnType::Int64);

        let second = sync_schema(&warehouse, &production(), &staging()).await.unwrap();
        assert!(second.is_noop());
    }

    #[tokio::test]
    async fn test_one_failed_column_does_not_block_others() {
        let dir = tempdir().unwrap();
        let inner = SqliteWarehouse::open_in_memory().unwrap();
        prepare(&inner, dir.path()).await;
        let warehouse = RefusingWarehouse {
            inner,
            refuse: "ot_goals",
        };

        let report = sync_schema(&warehouse, &production(), &staging()).await.unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].name, "shifts");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.name, "ot_goals");
    }

    #[tokio::test]
    async fn test_missing_tables_are_errors() {
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        let result = sync_schema(&warehouse, &production(), &staging()).await;
        assert!(matches!(result, Err(AppError::Warehouse { .. })));
    }
}
