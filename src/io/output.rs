use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Write a frame as comma-separated text with a header row.
///
/// Null cells are written as empty fields. Parent directories are created.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    write_table_to(df, file).with_context(|| format!("Failed to write CSV: {:?}", path))
}

/// Write a frame as comma-separated text to any writer
pub fn write_table_to<W: Write>(df: &mut DataFrame, mut writer: W) -> Result<()> {
    CsvWriter::new(&mut writer)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{parse_table_str, read_table};

    #[test]
    fn test_write_nulls_as_empty_fields() {
        let mut df = parse_table_str("a,b,c\n1,,\"x,y\"\n").unwrap();

        let mut buf = Vec::new();
        write_table_to(&mut df, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text, "a,b,c\n1,,\"x,y\"\n");
    }

    #[test]
    fn test_write_table_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("companies_full.csv");
        let mut df = parse_table_str("expediente,nombre\n1,ACME\n2,\n").unwrap();

        write_table(&mut df, &path).unwrap();

        let back = read_table(&path).unwrap();
        assert!(back.equals_missing(&df));
    }
}
