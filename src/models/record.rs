use anyhow::Result;
use polars::prelude::*;
use serde_json::{Map, Value};

/// One row as sent to the hosted table: column name to string or null
pub type Record = Map<String, Value>;

/// Text values that the hosted table should receive as null
const NULL_MARKERS: &[&str] = &["", "nan"];

/// Map a cell to its upload value: absent, empty and `"nan"` become null
pub fn normalize_cell(cell: Option<&str>) -> Value {
    match cell {
        None => Value::Null,
        Some(v) if NULL_MARKERS.contains(&v) => Value::Null,
        Some(v) => Value::String(v.to_string()),
    }
}

/// Convert rows `[start, end)` of a frame into upload records
pub fn records_for_rows(df: &DataFrame, start: usize, end: usize) -> Result<Vec<Record>> {
    let end = end.min(df.height());
    let start = start.min(end);
    let batch = df.slice(start as i64, end - start);

    let columns = batch
        .get_columns()
        .iter()
        .map(|c| c.cast(&DataType::String))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut records = vec![Record::new(); batch.height()];
    for column in &columns {
        let values = column.str()?;
        for (record, value) in records.iter_mut().zip(values.iter()) {
            record.insert(column.name().to_string(), normalize_cell(value));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_table_str;

    #[test]
    fn test_null_equivalents_become_null() {
        assert_eq!(normalize_cell(None), Value::Null);
        assert_eq!(normalize_cell(Some("")), Value::Null);
        assert_eq!(normalize_cell(Some("nan")), Value::Null);
        assert_eq!(
            normalize_cell(Some("NaN Holdings")),
            Value::String("NaN Holdings".to_string())
        );
        assert_eq!(normalize_cell(Some("0")), Value::String("0".to_string()));
    }

    #[test]
    fn test_records_for_rows_keeps_column_order() {
        let df = parse_table_str("b,a\n2,nan\n,x\n").unwrap();

        let records = records_for_rows(&df, 0, 10).unwrap();
        assert_eq!(records.len(), 2);

        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(records[0]["a"], Value::Null);
        assert_eq!(records[1]["b"], Value::Null);
        assert_eq!(records[1]["a"], Value::String("x".to_string()));
    }

    #[test]
    fn test_records_for_rows_slices_window() {
        let df = parse_table_str("a\n0\n1\n2\n3\n").unwrap();
        let records = records_for_rows(&df, 1, 3).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], Value::String("1".to_string()));
        assert_eq!(records[1]["a"], Value::String("2".to_string()));
    }

    #[test]
    fn test_records_for_rows_out_of_range() {
        let df = parse_table_str("a\n1\n").unwrap();
        assert!(records_for_rows(&df, 5, 10).unwrap().is_empty());
    }
}
