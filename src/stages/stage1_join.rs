use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;
use tracing::{info, warn};

use crate::io::{read_table, write_table};
use crate::models::{JoinStats, LeftJoin, left_join, require_column, trim_column_names, trim_columns};

/// Input and output locations for Stage 1
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Filing table (one row per expediente)
    pub compania: PathBuf,
    /// Ranking table (one row per expediente per year)
    pub ranking: PathBuf,
    /// Segment lookup (id_segmento -> segmento)
    pub segmento: PathBuf,
    /// Industry-code lookup (ciiu -> descripcion)
    pub ciiu: PathBuf,
    /// Joined output file
    pub output: PathBuf,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            compania: PathBuf::from("data/bi_compania (1).csv"),
            ranking: PathBuf::from("data/bi_ranking.csv"),
            segmento: PathBuf::from("data/bi_segmento (1).csv"),
            ciiu: PathBuf::from("data/bi_ciiu (1).csv"),
            output: PathBuf::from("output/companies_full.csv"),
        }
    }
}

/// Source tables of Stage 1, already loaded
#[derive(Debug, Clone)]
pub struct JoinInputs {
    pub compania: DataFrame,
    pub ranking: DataFrame,
    pub segmento: DataFrame,
    pub ciiu: DataFrame,
}

/// Result of Stage 1
#[derive(Debug)]
pub struct JoinResult {
    /// Path of the joined file
    pub output: PathBuf,
    pub compania_rows: usize,
    pub ranking_rows: usize,
    /// Rows in the joined output (always equal to `ranking_rows`)
    pub rows: usize,
    pub columns: usize,
    pub compania_join: JoinStats,
    pub ciiu_join: JoinStats,
    pub segmento_join: JoinStats,
}

/// Joined table plus the per-join counters
#[derive(Debug)]
pub struct JoinedTable {
    pub table: DataFrame,
    pub compania_join: JoinStats,
    pub ciiu_join: JoinStats,
    pub segmento_join: JoinStats,
}

/// Execute Stage 1: load the four source tables, join them and write the result
pub fn execute_stage1(config: &JoinConfig) -> Result<JoinResult> {
    info!("Loading bi_compania from {:?}...", config.compania);
    let compania = read_table(&config.compania)?;

    info!("Loading bi_ranking from {:?} (this takes a minute)...", config.ranking);
    let ranking = read_table(&config.ranking)?;

    info!("Loading bi_segmento from {:?}...", config.segmento);
    let segmento = read_table(&config.segmento)?;

    info!("Loading bi_ciiu from {:?}...", config.ciiu);
    let ciiu = read_table(&config.ciiu)?;

    let inputs = JoinInputs {
        compania,
        ranking,
        segmento,
        ciiu,
    };
    let compania_rows = inputs.compania.height();
    let ranking_rows = inputs.ranking.height();

    let mut joined = join_tables(inputs)?;

    info!("Saving to {:?}...", config.output);
    write_table(&mut joined.table, &config.output)?;

    info!(
        "Done! File: {:?} ({} columns, {} rows)",
        config.output,
        joined.table.width(),
        joined.table.height()
    );

    Ok(JoinResult {
        output: config.output.clone(),
        compania_rows,
        ranking_rows,
        rows: joined.table.height(),
        columns: joined.table.width(),
        compania_join: joined.compania_join,
        ciiu_join: joined.ciiu_join,
        segmento_join: joined.segmento_join,
    })
}

/// Normalize join keys and left join ranking -> compania -> ciiu -> segmento
pub fn join_tables(inputs: JoinInputs) -> Result<JoinedTable> {
    let JoinInputs {
        compania,
        ranking,
        mut segmento,
        mut ciiu,
    } = inputs;

    let compania = trim_columns(compania, "compania", &["expediente"])?;
    let ranking = normalize_expediente(ranking)?;

    trim_column_names(&mut segmento)?;
    let segmento = trim_columns(segmento, "segmento", &["id_segmento", "segmento"])?;

    trim_column_names(&mut ciiu)?;
    let ciiu = trim_columns(ciiu, "ciiu", &["ciiu"])?;

    info!("Compania rows: {}", compania.height());
    info!("Ranking rows: {}", ranking.height());

    info!("Merging ranking + compania...");
    let (merged, compania_join) = left_join(
        ranking,
        compania,
        &LeftJoin {
            lookup: "compania",
            left_key: "expediente",
            right_key: "expediente",
            suffix: "_comp",
        },
    )?;
    log_join("compania", &compania_join);
    info!("After merge with compania: {} rows", merged.height());

    info!("Adding CIIU descriptions...");
    let (merged, ciiu_join) = left_join(
        merged,
        ciiu,
        &LeftJoin {
            lookup: "ciiu",
            left_key: "ciiu_n6",
            right_key: "ciiu",
            suffix: "_ciiu",
        },
    )?;
    log_join("ciiu", &ciiu_join);

    info!("Adding segment names...");
    let (merged, segmento_join) = left_join(
        merged,
        segmento,
        &LeftJoin {
            lookup: "segmento",
            left_key: "cod_segmento",
            right_key: "id_segmento",
            suffix: "_seg",
        },
    )?;
    log_join("segmento", &segmento_join);

    info!("Final rows: {}", merged.height());

    Ok(JoinedTable {
        table: merged,
        compania_join,
        ciiu_join,
        segmento_join,
    })
}

/// Clean the ranking `expediente` key.
///
/// Missing values become empty text, surrounding whitespace is removed and a
/// trailing `.0` left behind by float coercion is dropped.
pub fn normalize_expediente(ranking: DataFrame) -> Result<DataFrame> {
    require_column(&ranking, "ranking", "expediente")?;
    let normalized = ranking
        .lazy()
        .with_column(
            col("expediente")
                .fill_null(lit(""))
                .str()
                .strip_chars(lit(" \t\r\n"))
                .str()
                .strip_suffix(lit(".0")),
        )
        .collect()?;
    Ok(normalized)
}

fn log_join(lookup: &str, stats: &JoinStats) {
    info!(
        "Join with {}: {} matched, {} unmatched",
        lookup, stats.matched, stats.unmatched
    );
    if stats.duplicate_right_keys > 0 {
        warn!(
            "{} has {} duplicate keys; first occurrence used",
            lookup, stats.duplicate_right_keys
        );
    }
}
