use anyhow::Result;
use polars::prelude::*;
use thiserror::Error;

/// Characters stripped from keys and labels
const WHITESPACE: &str = " \t\r\n";

/// Scratch columns used while joining
const ROW_INDEX: &str = "__row_nr";
const JOIN_KEY: &str = "__join_key";
const MATCH_FLAG: &str = "__matched";

/// Errors raised by table checks
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("Column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },
}

/// Parameters of a left join against a lookup table
#[derive(Debug, Clone)]
pub struct LeftJoin<'a> {
    /// Name of the lookup table, for diagnostics
    pub lookup: &'a str,
    /// Key column on the left (accumulated) table
    pub left_key: &'a str,
    /// Key column on the right (lookup) table
    pub right_key: &'a str,
    /// Suffix appended to right-hand columns whose names already exist
    pub suffix: &'a str,
}

/// Outcome counters of a left join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    /// Left rows that found a right match
    pub matched: usize,
    /// Left rows with no right match (right fields left null)
    pub unmatched: usize,
    /// Right rows ignored because an earlier row had the same key
    pub duplicate_right_keys: usize,
}

pub fn has_column(df: &DataFrame, column: &str) -> bool {
    df.column(column).is_ok()
}

/// Fail with `TableError::MissingColumn` unless the column exists
pub fn require_column(df: &DataFrame, table: &str, column: &str) -> Result<(), TableError> {
    if has_column(df, column) {
        Ok(())
    } else {
        Err(TableError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

/// Column names in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

/// Borrow a text cell (None for null, a missing column or a non-text column)
pub fn cell<'a>(df: &'a DataFrame, row: usize, column: &str) -> Option<&'a str> {
    df.column(column).ok()?.str().ok()?.get(row)
}

/// Strip surrounding whitespace from every column name
pub fn trim_column_names(df: &mut DataFrame) -> Result<()> {
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(())
}

/// Strip surrounding whitespace from the values of the named columns; nulls stay null
pub fn trim_columns(df: DataFrame, table: &str, columns: &[&str]) -> Result<DataFrame> {
    for column in columns {
        require_column(&df, table, column)?;
    }
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| col(*c).str().strip_chars(lit(WHITESPACE)))
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Left join `right` onto `left`.
///
/// Every left row is kept exactly once and in its input order. Keys are
/// compared after trimming and a null key never matches. If the lookup repeats
/// a key, the first row carrying it wins. When both key columns share a name
/// the right key column is dropped; otherwise it is kept. Right columns whose
/// names are already taken get `suffix` appended.
pub fn left_join(
    left: DataFrame,
    right: DataFrame,
    join: &LeftJoin<'_>,
) -> Result<(DataFrame, JoinStats)> {
    require_column(&left, "joined", join.left_key)?;
    require_column(&right, join.lookup, join.right_key)?;

    let keyed_rows = right.height() - right.column(join.right_key)?.null_count();
    let mut lookup = right
        .lazy()
        .with_column(
            col(join.right_key)
                .str()
                .strip_chars(lit(WHITESPACE))
                .alias(JOIN_KEY),
        )
        .filter(col(JOIN_KEY).is_not_null())
        .unique_stable(Some(vec![JOIN_KEY.into()]), UniqueKeepStrategy::First)
        .with_column(lit(true).alias(MATCH_FLAG))
        .collect()?;
    let duplicate_right_keys = keyed_rows - lookup.height();
    if join.left_key == join.right_key {
        lookup = lookup.drop(join.right_key)?;
    }

    let args = JoinArgs::new(JoinType::Left)
        .with_suffix(Some(join.suffix.into()))
        .with_coalesce(JoinCoalesce::CoalesceColumns);

    let joined = left
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .with_column(
            col(join.left_key)
                .str()
                .strip_chars(lit(WHITESPACE))
                .alias(JOIN_KEY),
        )
        .join(lookup.lazy(), [col(JOIN_KEY)], [col(JOIN_KEY)], args)
        .sort_by_exprs(vec![col(ROW_INDEX)], SortMultipleOptions::default())
        .collect()?;

    let unmatched = joined.column(MATCH_FLAG)?.null_count();
    let stats = JoinStats {
        matched: joined.height() - unmatched,
        unmatched,
        duplicate_right_keys,
    };

    let joined = joined.drop(ROW_INDEX)?.drop(JOIN_KEY)?.drop(MATCH_FLAG)?;
    Ok((joined, stats))
}
