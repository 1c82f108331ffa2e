use super::Table;
use crate::error::AppError;

/// Serializes a table as comma-delimited text with a header row.
/// NULL cells are written as empty fields.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.to_field()))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use chrono::NaiveDate;

    #[test]
    fn test_csv_output() {
        let mut table = Table::new(vec!["player_id".into(), "game_date".into(), "name".into()]);
        table
            .push_row(vec![
                Value::Int(8478483),
                Value::Date(NaiveDate::from_ymd_opt(2024, 10, 9).unwrap()),
                "Marner, Mitch".into(),
            ])
            .unwrap();
        table
            .push_row(vec![Value::Int(1), Value::Null, Value::Null])
            .unwrap();

        let text = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(
            text,
            "player_id,game_date,name\n8478483,2024-10-09,\"Marner, Mitch\"\n1,,\n"
        );
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let table = Table::new(vec!["a".into(), "b".into()]);
        let text = String::from_utf8(to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(text, "a,b\n");
    }
}
