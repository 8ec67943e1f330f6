use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;
use tracing::info;

use crate::io::{read_table, write_table};
use crate::models::{COMPANY_COLUMNS, has_column};

/// Configuration for Stage 2
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Joined file produced by Stage 1
    pub input: PathBuf,
    /// Schema-aligned output file
    pub output: PathBuf,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("output/companies_full.csv"),
            output: PathBuf::from("output/companies_final.csv"),
        }
    }
}

/// Result of Stage 2
#[derive(Debug)]
pub struct AlignResult {
    pub output: PathBuf,
    pub input_columns: usize,
    pub output_columns: usize,
    pub rows: usize,
    /// Target columns that were absent from the input and filled with null
    pub added_columns: Vec<String>,
}

/// Execute Stage 2: reshape the joined file to the `companies` column order
pub fn execute_stage2(config: &AlignConfig) -> Result<AlignResult> {
    info!("Loading {:?}...", config.input);
    let table = read_table(&config.input)?;
    let input_columns = table.width();
    info!("Current columns: {}", input_columns);
    info!("Rows: {}", table.height());

    let (mut aligned, added_columns) = align_to_schema(table, COMPANY_COLUMNS)?;

    info!("Final columns: {}", aligned.width());
    info!("Rows: {}", aligned.height());

    info!("Saving to {:?}...", config.output);
    write_table(&mut aligned, &config.output)?;
    info!("Done! Ready to upload");

    Ok(AlignResult {
        output: config.output.clone(),
        input_columns,
        output_columns: aligned.width(),
        rows: aligned.height(),
        added_columns,
    })
}

/// Pad missing target columns with null, then keep only the targets in order
pub fn align_to_schema(table: DataFrame, target: &[&str]) -> Result<(DataFrame, Vec<String>)> {
    let added: Vec<String> = target
        .iter()
        .filter(|c| !has_column(&table, c))
        .map(|c| c.to_string())
        .collect();
    for column in &added {
        info!("Added missing column: {}", column);
    }

    let padding: Vec<Expr> = added
        .iter()
        .map(|c| lit(NULL).cast(DataType::String).alias(c.as_str()))
        .collect();
    let selection: Vec<Expr> = target.iter().map(|c| col(*c)).collect();

    let aligned = table
        .lazy()
        .with_columns(padding)
        .select(selection)
        .collect()?;
    Ok((aligned, added))
}
