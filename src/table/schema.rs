use super::{Table, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Date,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "INT64",
            ColumnType::Float64 => "FLOAT64",
            ColumnType::Bool => "BOOL",
            ColumnType::Date => "DATE",
            ColumnType::String => "STRING",
        }
    }

    fn of(value: &Value) -> Option<ColumnType> {
        match value {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int64),
            Value::Float(_) => Some(ColumnType::Float64),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Text(_) => Some(ColumnType::String),
        }
    }

    /// Widens two observed types to one both fit in.
    fn unify(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column list of a table. Name lookups are case-insensitive, as
/// they are in the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns of `self` that `other` lacks, in `self`'s order.
    pub fn columns_missing_from<'a>(&'a self, other: &Schema) -> Vec<&'a Column> {
        self.columns
            .iter()
            .filter(|c| !other.contains(&c.name))
            .collect()
    }
}

/// Infers one type per column from the non-null cells of `table`.
///
/// Integers mixed with floats widen to FLOAT64; any other mix, and columns
/// with no non-null cell, become STRING.
pub fn infer_schema(table: &Table) -> Schema {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let inferred = table
                .rows()
                .iter()
                .filter_map(|row| ColumnType::of(&row[idx]))
                .reduce(ColumnType::unify)
                .unwrap_or(ColumnType::String);
            Column::new(name.clone(), inferred)
        })
        .collect();
    Schema::new(columns)
}
