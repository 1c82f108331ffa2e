//! In-memory tabular data used between fetching and loading.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Value`]s. It
//! plays the role a dataframe would: the assembler builds one, the schema is
//! inferred from it, and it is serialized to CSV for the warehouse load.

pub mod assemble;
pub mod csv_export;
pub mod schema;

pub use assemble::{assemble_performance_table, game_log_table};
pub use csv_export::to_csv_bytes;
pub use schema::{Column, ColumnType, Schema, infer_schema};

use crate::error::AppError;
use chrono::NaiveDate;
use std::collections::HashSet;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    /// Converts a scalar JSON value. Localized objects (`{"default": ..}`)
    /// collapse to their default text; arrays and other objects have no cell
    /// representation and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::text(s)),
            serde_json::Value::Object(map) => map
                .get("default")
                .and_then(|d| d.as_str())
                .map(|s| Value::text(s.trim())),
            serde_json::Value::Array(_) => None,
        }
    }

    /// Text cell. Empty text is stored as NULL, since CSV has no way to tell
    /// the two apart once written.
    pub fn text(s: impl Into<String>) -> Value {
        let s = s.into();
        if s.is_empty() {
            Value::Null
        } else {
            Value::Text(s)
        }
    }

    /// Text form used in CSV output. NULL is the empty string.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Int)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::text(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::Null, Value::text)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Appends a row; its width must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), AppError> {
        if row.len() != self.columns.len() {
            return Err(AppError::table_shape(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Removes exact duplicate rows, keeping the first occurrence. Returns the
    /// number of rows removed.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
        self.rows.retain(|row| {
            // Cell text plus a type tag so Int(1) and Text("1") stay distinct
            let key: Vec<String> = row
                .iter()
                .map(|v| format!("{}:{}", type_tag(v), v.to_field()))
                .collect();
            seen.insert(key)
        });
        before - self.rows.len()
    }
}

fn type_tag(value: &Value) -> char {
    match value {
        Value::Null => 'n',
        Value::Int(_) => 'i',
        Value::Float(_) => 'f',
        Value::Bool(_) => 'b',
        Value::Text(_) => 't',
        Value::Date(_) => 'd',
    }
}
