use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::io::read_table;
use crate::models::{COMPANIES_TABLE, Record, records_for_rows};
use crate::supabase::TableSink;

/// Configuration for Stage 3
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Schema-aligned file produced by Stage 2
    pub input: PathBuf,
    /// Destination table on the hosted backend
    pub table_name: String,
    /// Rows per insert request
    pub batch_size: usize,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("output/companies_final.csv"),
            table_name: COMPANIES_TABLE.to_string(),
            batch_size: 500,
            show_progress: true,
        }
    }
}

/// The batch that stopped an upload
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// Index of the first row of the batch
    pub offset: usize,
    /// Error reported by the sink
    pub error: String,
    /// First record of the batch, for diagnosis
    pub first_record: Option<Record>,
}

/// Result of Stage 3
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub total_rows: usize,
    /// Rows in batches the sink accepted
    pub uploaded_rows: usize,
    /// Insert requests issued, including a failed one
    pub batches_sent: usize,
    pub failure: Option<BatchFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Execute Stage 3: load the final file and insert it batch by batch
pub async fn execute_stage3<S: TableSink>(sink: &S, config: &UploadConfig) -> Result<UploadReport> {
    info!("Loading {:?}...", config.input);
    let table = read_table(&config.input)?;
    info!("Total rows: {}", table.height());

    let report = upload_table(sink, &table, config).await?;

    info!("Done! Uploaded {} rows", report.uploaded_rows);
    Ok(report)
}

/// Insert a table in fixed-size batches, stopping at the first failed batch.
///
/// Batches already accepted stay committed; nothing after the failed batch is
/// sent.
pub async fn upload_table<S: TableSink>(
    sink: &S,
    table: &DataFrame,
    config: &UploadConfig,
) -> Result<UploadReport> {
    if config.batch_size == 0 {
        anyhow::bail!("Batch size must be greater than zero");
    }

    let total_rows = table.height();
    let batch_count = total_rows.div_ceil(config.batch_size);
    let progress = progress_bar(batch_count, config.show_progress)?;

    let mut report = UploadReport {
        total_rows,
        uploaded_rows: 0,
        batches_sent: 0,
        failure: None,
    };

    for offset in (0..total_rows).step_by(config.batch_size) {
        let batch = records_for_rows(table, offset, offset + config.batch_size)?;
        debug!("Inserting rows {}..{}", offset, offset + batch.len());

        report.batches_sent += 1;
        let outcome = sink.insert(&config.table_name, &batch).await;
        progress.inc(1);

        match outcome {
            Ok(()) => report.uploaded_rows += batch.len(),
            Err(e) => {
                progress.abandon();
                let first_record = batch.into_iter().next();
                error!("Error at row {}: {:#}", offset, e);
                match &first_record {
                    Some(record) => error!(
                        "First record in failed batch: {}",
                        serde_json::to_string(record).unwrap_or_default()
                    ),
                    None => error!("First record in failed batch: empty"),
                }
                report.failure = Some(BatchFailure {
                    offset,
                    error: format!("{:#}", e),
                    first_record,
                });
                return Ok(report);
            }
        }
    }

    progress.finish();
    Ok(report)
}

fn progress_bar(batches: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(batches as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "Uploading {bar:40.cyan/blue} {pos}/{len} batches [{elapsed_precise}]",
        )
        .context("Invalid progress template")?
        .progress_chars("##-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;
    use crate::io::parse_table_str;

    /// Sink that records batch sizes and fails on a chosen call
    struct RecordingSink {
        fail_on_call: Option<usize>,
        calls: Mutex<Vec<(String, Vec<Record>)>>,
    }

    impl RecordingSink {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                fail_on_call,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|(_, b)| b.len()).collect()
        }
    }

    impl TableSink for RecordingSink {
        async fn insert(&self, table: &str, records: &[Record]) -> Result<()> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((table.to_string(), records.to_vec()));
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                anyhow::bail!("duplicate key value violates unique constraint");
            }
            Ok(())
        }
    }

    fn config(batch_size: usize) -> UploadConfig {
        UploadConfig {
            batch_size,
            show_progress: false,
            ..Default::default()
        }
    }

    fn table_with_rows(n: usize) -> DataFrame {
        let mut csv = String::from("expediente,nombre\n");
        for i in 0..n {
            csv.push_str(&format!("{},EMPRESA {}\n", i, i));
        }
        parse_table_str(&csv).unwrap()
    }

    #[tokio::test]
    async fn test_batches_in_order() {
        let sink = RecordingSink::new(None);
        let report = upload_table(&sink, &table_with_rows(1250), &config(500))
            .await
            .unwrap();

        assert_eq!(sink.batch_sizes(), vec![500, 500, 250]);
        assert_eq!(report.uploaded_rows, 1250);
        assert_eq!(report.batches_sent, 3);
        assert!(report.is_complete());

        let calls = sink.calls.lock().unwrap();
        assert!(calls.iter().all(|(table, _)| table == "companies"));
        assert_eq!(calls[1].1[0]["expediente"], Value::String("500".to_string()));
    }

    #[tokio::test]
    async fn test_stops_after_failed_batch() {
        let sink = RecordingSink::new(Some(2));
        let report = upload_table(&sink, &table_with_rows(1250), &config(500))
            .await
            .unwrap();

        assert_eq!(sink.batch_sizes(), vec![500, 500]);
        assert_eq!(report.uploaded_rows, 500);
        assert_eq!(report.batches_sent, 2);

        let failure = report.failure.unwrap();
        assert_eq!(failure.offset, 500);
        assert!(failure.error.contains("unique constraint"));
        assert_eq!(
            failure.first_record.unwrap()["expediente"],
            Value::String("500".to_string())
        );
    }

    #[tokio::test]
    async fn test_first_batch_failure_uploads_nothing() {
        let sink = RecordingSink::new(Some(1));
        let report = upload_table(&sink, &table_with_rows(10), &config(500))
            .await
            .unwrap();

        assert_eq!(report.uploaded_rows, 0);
        assert_eq!(report.failure.unwrap().offset, 0);
    }

    #[tokio::test]
    async fn test_empty_table_sends_nothing() {
        let sink = RecordingSink::new(None);
        let report = upload_table(&sink, &table_with_rows(0), &config(500))
            .await
            .unwrap();

        assert!(sink.batch_sizes().is_empty());
        assert_eq!(report.uploaded_rows, 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let sink = RecordingSink::new(None);
        assert!(upload_table(&sink, &table_with_rows(3), &config(0)).await.is_err());
        assert!(sink.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_null_equivalents_sent_as_null() {
        let table = parse_table_str("expediente,ruc,nombre,canton\n1,nan,,GUAYAQUIL\n").unwrap();
        let sink = RecordingSink::new(None);
        upload_table(&sink, &table, &config(500)).await.unwrap();

        let calls = sink.calls.lock().unwrap();
        let record = &calls[0].1[0];
        assert_eq!(record["ruc"], Value::Null);
        assert_eq!(record["nombre"], Value::Null);
        assert_eq!(record["canton"], Value::String("GUAYAQUIL".to_string()));
    }

    #[tokio::test]
    async fn test_execute_stage3_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("companies_final.csv");
        std::fs::write(&input, "expediente,nombre\n1,A\n2,B\n3,C\n").unwrap();

        let sink = RecordingSink::new(None);
        let report = execute_stage3(
            &sink,
            &UploadConfig {
                input,
                ..config(2)
            },
        )
        .await
        .unwrap();

        assert_eq!(report.total_rows, 3);
        assert_eq!(sink.batch_sizes(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_report_written_as_json() {
        let sink = RecordingSink::new(Some(2));
        let report = upload_table(&sink, &table_with_rows(3), &config(2))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("upload.json");
        report.write_json(&path).unwrap();

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total_rows"], 3);
        assert_eq!(json["uploaded_rows"], 2);
        assert_eq!(json["batches_sent"], 2);
        assert_eq!(json["failure"]["offset"], 2);
        assert_eq!(json["failure"]["first_record"]["expediente"], "2");
    }

    #[tokio::test]
    async fn test_complete_report_has_null_failure() {
        let sink = RecordingSink::new(None);
        let report = upload_table(&sink, &table_with_rows(1), &config(500))
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failure"], Value::Null);
    }
}
