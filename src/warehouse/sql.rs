//! Statement builders for the warehouse DDL and merge.
//!
//! Identifiers are never interpolated raw: every table and column name goes
//! through [`Ident`] validation, and column names are additionally checked
//! against the schema they are supposed to come from before the SQL text is
//! produced.

use crate::error::AppError;
use crate::table::{Column, ColumnType, Schema};
use std::fmt;
use tracing::warn;

/// Longest column name BigQuery accepts
const MAX_IDENT_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    BigQuery,
    Sqlite,
}

impl Dialect {
    pub fn type_name(&self, column_type: ColumnType) -> &'static str {
        match self {
            Dialect::BigQuery => column_type.as_str(),
            Dialect::Sqlite => match column_type {
                ColumnType::Int64 => "INTEGER",
                ColumnType::Float64 => "REAL",
                ColumnType::Bool => "BOOLEAN",
                ColumnType::Date => "DATE",
                ColumnType::String => "TEXT",
            },
        }
    }

    /// Maps a type name reported by the warehouse back to a column type.
    pub fn parse_type(&self, name: &str) -> ColumnType {
        let upper = name.trim().to_ascii_uppercase();
        match self {
            Dialect::BigQuery => match upper.as_str() {
                "INT64" | "INTEGER" => ColumnType::Int64,
                "FLOAT64" | "FLOAT" | "NUMERIC" | "BIGNUMERIC" => ColumnType::Float64,
                "BOOL" | "BOOLEAN" => ColumnType::Bool,
                "DATE" => ColumnType::Date,
                _ => ColumnType::String,
            },
            // SQLite column affinity rules, plus the two names this crate declares
            Dialect::Sqlite => {
                if upper.contains("INT") {
                    ColumnType::Int64
                } else if upper.contains("BOOL") {
                    ColumnType::Bool
                } else if upper == "DATE" {
                    ColumnType::Date
                } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB")
                {
                    ColumnType::Float64
                } else {
                    ColumnType::String
                }
            }
        }
    }

    pub fn quote(&self, ident: &Ident) -> String {
        match self {
            Dialect::BigQuery => format!("`{}`", ident.0),
            Dialect::Sqlite => format!("\"{}\"", ident.0),
        }
    }

    /// Fully qualified table name. SQLite has no datasets, so the dataset
    /// becomes a table-name prefix.
    pub fn qualify(&self, table: &TableRef) -> String {
        match self {
            Dialect::BigQuery => match &table.project {
                Some(project) => format!("`{}.{}.{}`", project, table.dataset, table.table),
                None => format!("`{}.{}`", table.dataset, table.table),
            },
            Dialect::Sqlite => format!("\"{}\"", table.flat_name()),
        }
    }
}

/// A validated SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: &str) -> Result<Self, AppError> {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return Err(AppError::invalid_identifier(name, "identifier is empty"));
        };
        if name.len() > MAX_IDENT_LEN {
            return Err(AppError::invalid_identifier(
                name,
                format!("longer than {MAX_IDENT_LEN} characters"),
            ));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(AppError::invalid_identifier(
                name,
                "must start with a letter or underscore",
            ));
        }
        if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(AppError::invalid_identifier(
                name,
                format!("contains '{bad}'"),
            ));
        }
        Ok(Ident(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: Option<String>,
    pub dataset: Ident,
    pub table: Ident,
}

impl TableRef {
    pub fn new(project: Option<&str>, dataset: &str, table: &str) -> Result<Self, AppError> {
        let project = match project {
            Some(p) => Some(validate_project_id(p)?),
            None => None,
        };
        Ok(TableRef {
            project,
            dataset: Ident::new(dataset)?,
            table: Ident::new(table)?,
        })
    }

    /// `dataset__table`, the single-namespace form used by SQLite
    pub fn flat_name(&self) -> String {
        format!("{}__{}", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}.{}.{}", project, self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

/// Project ids are lowercase letters, digits and hyphens.
pub fn validate_project_id(project: &str) -> Result<String, AppError> {
    let valid = !project.is_empty()
        && project.len() <= 63
        && project
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !project.starts_with('-')
        && !project.ends_with('-');
    if valid {
        Ok(project.to_string())
    } else {
        Err(AppError::invalid_identifier(
            project,
            "project id must be lowercase letters, digits and inner hyphens",
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    AddColumn,
    Merge,
}

/// A fully rendered SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
}

/// Physical layout of a production table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    pub partition_by: Option<String>,
    pub cluster_by: Vec<String>,
    pub unique_key: Vec<String>,
}

/// Resolves `name` against `schema` and returns the schema's own spelling.
fn schema_ident(schema: &Schema, name: &str, table: &TableRef) -> Result<Ident, AppError> {
    let column = schema
        .get(name)
        .ok_or_else(|| AppError::unknown_column(name, table.to_string()))?;
    Ident::new(&column.name)
}

fn column_idents(schema: &Schema) -> Result<Vec<Ident>, AppError> {
    schema.names().map(Ident::new).collect()
}

/// `CREATE TABLE IF NOT EXISTS` with one column per schema entry.
pub fn create_table(
    dialect: Dialect,
    target: &TableRef,
    schema: &Schema,
    layout: &TableLayout,
) -> Result<Statement, AppError> {
    if schema.is_empty() {
        return Err(AppError::warehouse(
            "create table",
            format!("schema for {target} has no columns"),
        ));
    }

    let mut definitions = Vec::with_capacity(schema.len() + 1);
    for column in schema.columns() {
        let ident = Ident::new(&column.name)?;
        definitions.push(format!(
            "  {} {}",
            dialect.quote(&ident),
            dialect.type_name(column.column_type)
        ));
    }

    let mut sql = String::new();
    match dialect {
        Dialect::BigQuery => {
            sql.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
                dialect.qualify(target),
                definitions.join(",\n")
            ));
            if let Some(partition) = &layout.partition_by {
                let ident = schema_ident(schema, partition, target)?;
                let is_date = schema
                    .get(partition)
                    .is_some_and(|c| c.column_type == ColumnType::Date);
                if is_date {
                    sql.push_str(&format!("\nPARTITION BY {}", dialect.quote(&ident)));
                } else {
                    warn!("Not partitioning {target}: column {partition} is not a DATE");
                }
            }
            if !layout.cluster_by.is_empty() {
                let cluster = layout
                    .cluster_by
                    .iter()
                    .map(|c| schema_ident(schema, c, target).map(|i| dialect.quote(&i)))
                    .collect::<Result<Vec<_>, _>>()?;
                sql.push_str(&format!("\nCLUSTER BY {}", cluster.join(", ")));
            }
        }
        Dialect::Sqlite => {
            if !layout.unique_key.is_empty() {
                let key = layout
                    .unique_key
                    .iter()
                    .map(|c| schema_ident(schema, c, target).map(|i| dialect.quote(&i)))
                    .collect::<Result<Vec<_>, _>>()?;
                definitions.push(format!("  UNIQUE ({})", key.join(", ")));
            }
            sql.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
                dialect.qualify(target),
                definitions.join(",\n")
            ));
        }
    }

    Ok(Statement {
        kind: StatementKind::CreateTable,
        sql,
    })
}

/// `ALTER TABLE .. ADD COLUMN` for one column.
pub fn add_column(
    dialect: Dialect,
    target: &TableRef,
    column: &Column,
) -> Result<Statement, AppError> {
    let ident = Ident::new(&column.name)?;
    Ok(Statement {
        kind: StatementKind::AddColumn,
        sql: format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            dialect.qualify(target),
            dialect.quote(&ident),
            dialect.type_name(column.column_type)
        ),
    })
}

/// Upsert of every `source` row into `target`, keyed on `keys`.
///
/// Matched rows get every non-key column overwritten; unmatched rows are
/// inserted in full. Source rows with a NULL key never match anything and
/// are skipped so that re-running the statement converges.
pub fn merge(
    dialect: Dialect,
    target: &TableRef,
    source: &TableRef,
    source_schema: &Schema,
    keys: &[String],
) -> Result<Statement, AppError> {
    if keys.is_empty() {
        return Err(AppError::warehouse("merge", "no key columns given"));
    }
    let key_idents = keys
        .iter()
        .map(|k| schema_ident(source_schema, k, source))
        .collect::<Result<Vec<_>, _>>()?;
    let columns = column_idents(source_schema)?;
    let non_key: Vec<&Ident> = columns
        .iter()
        .filter(|c| !key_idents.iter().any(|k| k.as_str().eq_ignore_ascii_case(c.as_str())))
        .collect();

    let q = |i: &Ident| dialect.quote(i);
    let not_null = key_idents
        .iter()
        .map(|k| format!("{} IS NOT NULL", q(k)))
        .collect::<Vec<_>>()
        .join(" AND ");
    let column_list = columns.iter().map(q).collect::<Vec<_>>().join(", ");

    let sql = match dialect {
        Dialect::BigQuery => {
            let on = key_idents
                .iter()
                .map(|k| format!("T.{} = S.{}", q(k), q(k)))
                .collect::<Vec<_>>()
                .join(" AND ");
            let mut sql = format!(
                "MERGE {} AS T\nUSING (SELECT * FROM {} WHERE {}) AS S\nON {}",
                dialect.qualify(target),
                dialect.qualify(source),
                not_null,
                on
            );
            if !non_key.is_empty() {
                let set = non_key
                    .iter()
                    .map(|c| format!("{} = S.{}", q(c), q(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!("\nWHEN MATCHED THEN UPDATE SET {set}"));
            }
            let values = columns
                .iter()
                .map(|c| format!("S.{}", q(c)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(
                "\nWHEN NOT MATCHED THEN INSERT ({column_list}) VALUES ({values})"
            ));
            sql
        }
        Dialect::Sqlite => {
            let conflict = key_idents.iter().map(q).collect::<Vec<_>>().join(", ");
            // The WHERE clause is required before ON CONFLICT in INSERT .. SELECT
            let mut sql = format!(
                "INSERT INTO {} ({column_list})\nSELECT {column_list} FROM {} WHERE {}\nON CONFLICT ({conflict}) ",
                dialect.qualify(target),
                dialect.qualify(source),
                not_null
            );
            if non_key.is_empty() {
                sql.push_str("DO NOTHING");
            } else {
                let set = non_key
                    .iter()
                    .map(|c| format!("{} = excluded.{}", q(c), q(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!("DO UPDATE SET {set}"));
            }
            sql
        }
    };

    Ok(Statement {
        kind: StatementKind::Merge,
        sql,
    })
}
