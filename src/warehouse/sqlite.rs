//! Single-file warehouse on SQLite.
//!
//! SQLite has one namespace per database, so a `dataset.table` pair is stored
//! as the table `dataset__table`. Table expirations live in
//! `__table_expirations` and are enforced each time the file is opened.

use super::Warehouse;
use super::sql::{self, Dialect, Ident, Statement, TableLayout, TableRef};
use super::storage::ObjectRef;
use crate::error::AppError;
use crate::table::{Column, ColumnType, Schema};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const EXPIRATIONS_TABLE: &str = "__table_expirations";

pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWarehouse").finish_non_exhaustive()
    }
}

impl SqliteWarehouse {
    /// Opens (or creates) the database file and drops any expired tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite warehouse at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {EXPIRATIONS_TABLE} (
                table_name TEXT PRIMARY KEY,
                expires_at TEXT NOT NULL
            )"
        ))?;
        let warehouse = SqliteWarehouse {
            conn: Mutex::new(conn),
        };
        let purged = warehouse.purge_expired(Utc::now())?;
        if purged > 0 {
            info!("Dropped {purged} expired tables");
        }
        Ok(warehouse)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::warehouse("lock", "SQLite connection mutex poisoned"))
    }

    /// Drops every table whose expiration is at or before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let conn = self.lock()?;
        let cutoff = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let expired: Vec<String> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT table_name FROM {EXPIRATIONS_TABLE} WHERE expires_at <= ?1"
            ))?;
            stmt.query_map([&cutoff], |row| row.get(0))?
                .collect::<Result<_, _>>()?
        };

        for name in &expired {
            let ident = Ident::new(name)?;
            debug!("Dropping expired table {name}");
            conn.execute(&format!("DROP TABLE IF EXISTS {}", Dialect::Sqlite.quote(&ident)), [])?;
            conn.execute(
                &format!("DELETE FROM {EXPIRATIONS_TABLE} WHERE table_name = ?1"),
                [name],
            )?;
        }
        Ok(expired.len())
    }

    pub fn row_count(&self, table: &TableRef) -> Result<u64, AppError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", Dialect::Sqlite.qualify(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Every row of `table` in insertion order, cells in column order.
    pub fn fetch_rows(&self, table: &TableRef) -> Result<Vec<Vec<SqlValue>>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY rowid",
            Dialect::Sqlite.qualify(table)
        ))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Expiration recorded for `table`, if any.
    pub fn expiration(&self, table: &TableRef) -> Result<Option<String>, AppError> {
        let conn = self.lock()?;
        let expires_at = conn
            .query_row(
                &format!("SELECT expires_at FROM {EXPIRATIONS_TABLE} WHERE table_name = ?1"),
                [table.flat_name()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(expires_at)
    }
}

/// Converts one CSV field to a typed SQLite value.
fn convert_field(field: &str, column: &Column, line: u64) -> Result<SqlValue, AppError> {
    if field.is_empty() {
        return Ok(SqlValue::Null);
    }
    let bad = || {
        AppError::warehouse(
            "load",
            format!(
                "line {line}: '{field}' is not a valid {} for column {}",
                column.column_type.as_str(),
                column.name
            ),
        )
    };
    Ok(match column.column_type {
        ColumnType::Int64 => SqlValue::Integer(field.parse().map_err(|_| bad())?),
        ColumnType::Float64 => SqlValue::Real(field.parse().map_err(|_| bad())?),
        ColumnType::Bool => match field.to_ascii_lowercase().as_str() {
            "true" | "1" => SqlValue::Integer(1),
            "false" | "0" => SqlValue::Integer(0),
            _ => return Err(bad()),
        },
        ColumnType::Date => {
            chrono::NaiveDate::parse_from_str(field, "%Y-%m-%d").map_err(|_| bad())?;
            SqlValue::Text(field.to_string())
        }
        ColumnType::String => SqlValue::Text(field.to_string()),
    })
}

impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn ensure_dataset(&self, dataset: &Ident) -> Result<(), AppError> {
        debug!("SQLite has no datasets, {dataset} is a table-name prefix");
        Ok(())
    }

    async fn table_schema(&self, table: &TableRef) -> Result<Option<Schema>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table.flat_name()], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                Ok(Column::new(name, Dialect::Sqlite.parse_type(&declared)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Schema::new(columns)))
        }
    }

    #[instrument(skip(self, schema), fields(object = %object.uri, table = %table))]
    async fn load_csv(
        &self,
        object: &ObjectRef,
        table: &TableRef,
        schema: &Schema,
    ) -> Result<u64, AppError> {
        let path = object.local_path().ok_or_else(|| {
            AppError::warehouse(
                "load",
                format!("SQLite can only load file:// objects, got {}", object.uri),
            )
        })?;

        let mut reader = csv::Reader::from_path(&path)?;
        let columns = reader
            .headers()?
            .iter()
            .map(|h| {
                schema
                    .get(h)
                    .cloned()
                    .ok_or_else(|| AppError::unknown_column(h, table.to_string()))
            })
            .collect::<Result<Vec<Column>, _>>()?;

        let create = sql::create_table(Dialect::Sqlite, table, schema, &TableLayout::default())?;
        let idents = columns
            .iter()
            .map(|c| Ident::new(&c.name).map(|i| Dialect::Sqlite.quote(&i)))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            Dialect::Sqlite.qualify(table),
            idents.join(", ")
        );

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", Dialect::Sqlite.qualify(table)), [])?;
        tx.execute(&create.sql, [])?;

        let mut loaded = 0u64;
        {
            let mut stmt = tx.prepare(&insert)?;
            for (i, record) in reader.records().enumerate() {
                let record = record?;
                let line = i as u64 + 2;
                let values = record
                    .iter()
                    .zip(&columns)
                    .map(|(field, column)| convert_field(field, column, line))
                    .collect::<Result<Vec<_>, _>>()?;
                stmt.execute(params_from_iter(values))?;
                loaded += 1;
            }
        }
        tx.commit()?;

        info!("Loaded {loaded} rows into {table}");
        Ok(loaded)
    }

    async fn set_expiration(
        &self,
        table: &TableRef,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {EXPIRATIONS_TABLE} (table_name, expires_at) VALUES (?1, ?2)
                 ON CONFLICT (table_name) DO UPDATE SET expires_at = excluded.expires_at"
            ),
            params![
                table.flat_name(),
                expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ],
        )?;
        debug!("{table} expires at {expires_at}");
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
        debug!("Executing {:?}:\n{}", statement.kind, statement.sql);
        let conn = self.lock()?;
        match conn.execute(&statement.sql, []) {
            Ok(affected) => Ok(affected as u64),
            Err(e) => {
                warn!("Statement failed: {e}");
                Err(e.into())
            }
        }
    }
}
