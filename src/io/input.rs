use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Every column is read as text; nothing is type-inferred
fn read_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
}

/// Load a comma-separated file with a header row into a text frame.
///
/// Empty fields become null. Rows shorter than the header are padded with
/// null; rows longer than the header are an error.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    read_options()
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("Failed to parse CSV: {:?}", path))
}

/// Parse comma-separated text with a header row into a text frame
pub fn parse_table_str(text: &str) -> Result<DataFrame> {
    let cursor = Cursor::new(text.as_bytes().to_vec());
    read_options()
        .into_reader_with_file_handle(cursor)
        .finish()
        .context("Failed to parse CSV text")
}
