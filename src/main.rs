use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use empresas_etl::{
    AlignConfig, COMPANIES_TABLE, COMPANY_COLUMNS, JoinConfig, SupabaseClient, SupabaseConfig,
    UploadConfig, UploadReport, execute_stage1, execute_stage2, execute_stage3, read_table,
    schema_coverage,
};

#[derive(Parser)]
#[command(name = "empresas-etl")]
#[command(author, version, about = "Ecuadorian company data pipeline", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 1: join ranking, compania, ciiu and segmento tables
    Join(JoinArgs),

    /// Stage 2: reorder and pad columns to the companies table layout
    Align(AlignArgs),

    /// Stage 3: insert the final file into the hosted companies table
    Upload(UploadArgs),

    /// Run join, align and upload one after another
    Run {
        #[command(flatten)]
        join: JoinArgs,

        /// Schema-aligned output file
        #[arg(long, default_value = "output/companies_final.csv")]
        final_output: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Report how a file's columns line up with the companies table
    Analyze {
        /// Input file (comma-separated, header row)
        #[arg(short, long, default_value = "output/companies_final.csv")]
        input: PathBuf,
    },
}

#[derive(Args)]
struct JoinArgs {
    /// Filing table
    #[arg(long, default_value = "data/bi_compania (1).csv")]
    compania: PathBuf,

    /// Ranking table
    #[arg(long, default_value = "data/bi_ranking.csv")]
    ranking: PathBuf,

    /// Segment lookup table
    #[arg(long, default_value = "data/bi_segmento (1).csv")]
    segmento: PathBuf,

    /// Industry-code lookup table
    #[arg(long, default_value = "data/bi_ciiu (1).csv")]
    ciiu: PathBuf,

    /// Joined output file
    #[arg(short, long, default_value = "output/companies_full.csv")]
    output: PathBuf,
}

#[derive(Args)]
struct AlignArgs {
    /// Joined file from the join stage
    #[arg(short, long, default_value = "output/companies_full.csv")]
    input: PathBuf,

    /// Schema-aligned output file
    #[arg(short, long, default_value = "output/companies_final.csv")]
    output: PathBuf,
}

#[derive(Args)]
struct UploadArgs {
    /// Schema-aligned file from the align stage
    #[arg(short, long, default_value = "output/companies_final.csv")]
    input: PathBuf,

    #[command(flatten)]
    remote: RemoteArgs,
}

#[derive(Args)]
struct RemoteArgs {
    /// Project URL (defaults to SUPABASE_URL)
    #[arg(long)]
    url: Option<String>,

    /// API key (defaults to SUPABASE_KEY)
    #[arg(long)]
    key: Option<String>,

    /// Destination table
    #[arg(long, default_value = COMPANIES_TABLE)]
    table: String,

    /// Rows per insert request
    #[arg(long, default_value = "500")]
    batch_size: usize,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Write the upload report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl From<JoinArgs> for JoinConfig {
    fn from(args: JoinArgs) -> Self {
        Self {
            compania: args.compania,
            ranking: args.ranking,
            segmento: args.segmento,
            ciiu: args.ciiu,
            output: args.output,
        }
    }
}

impl RemoteArgs {
    fn supabase_config(&self) -> SupabaseConfig {
        let env = SupabaseConfig::from_env();
        SupabaseConfig::new(
            self.url.clone().unwrap_or(env.url),
            self.key.clone().unwrap_or(env.key),
        )
    }

    fn upload_config(&self, input: PathBuf) -> UploadConfig {
        UploadConfig {
            input,
            table_name: self.table.clone(),
            batch_size: self.batch_size,
            show_progress: !self.no_progress,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Join(args) => {
            execute_stage1(&args.into())?;
            Ok(())
        }
        Commands::Align(args) => {
            execute_stage2(&AlignConfig {
                input: args.input,
                output: args.output,
            })?;
            Ok(())
        }
        Commands::Upload(args) => {
            let config = args.remote.upload_config(args.input);
            upload(&args.remote, &config).await
        }
        Commands::Run {
            join,
            final_output,
            remote,
        } => {
            info!("Stage 1: Joining source tables...");
            let joined = execute_stage1(&join.into())?;

            info!("Stage 2: Aligning columns...");
            execute_stage2(&AlignConfig {
                input: joined.output,
                output: final_output.clone(),
            })?;

            info!("Stage 3: Uploading...");
            let config = remote.upload_config(final_output);
            upload(&remote, &config).await
        }
        Commands::Analyze { input } => analyze_file(input),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn upload(remote: &RemoteArgs, config: &UploadConfig) -> Result<()> {
    let client = SupabaseClient::new(remote.supabase_config())
        .context("Failed to configure Supabase client")?;
    let report = execute_stage3(&client, config).await?;
    summarize_upload(&report);
    if let Some(path) = &remote.report {
        report.write_json(path)?;
        info!("Report written to {:?}", path);
    }
    Ok(())
}

fn summarize_upload(report: &UploadReport) {
    match &report.failure {
        None => info!(
            "Complete: {} of {} rows uploaded in {} batches",
            report.uploaded_rows, report.total_rows, report.batches_sent
        ),
        Some(failure) => warn!(
            "Stopped at row {}: {} of {} rows uploaded; later batches were not sent",
            failure.offset, report.uploaded_rows, report.total_rows
        ),
    }
}

fn analyze_file(input: PathBuf) -> Result<()> {
    info!("Analyzing {:?}", input);
    let df = read_table(&input).context("Failed to load input file")?;
    let coverage = schema_coverage(&df, COMPANY_COLUMNS);

    println!("Table Analysis");
    println!("==============");
    println!("Rows: {}", df.height());
    println!("Columns: {}", df.width());
    println!("Matches companies layout: {}", coverage.aligned);
    println!();

    println!("Missing Columns ({})", coverage.missing.len());
    println!("---------------");
    for column in &coverage.missing {
        println!("{}", column);
    }
    println!();

    println!("Extra Columns ({})", coverage.extra.len());
    println!("-------------");
    for column in &coverage.extra {
        println!("{}", column);
    }
    println!();

    println!("Null Counts");
    println!("-----------");
    let rows = df.height().max(1) as f64;
    for (column, nulls) in &coverage.null_counts {
        println!(
            "{}: {} ({:.1}%)",
            column,
            nulls,
            *nulls as f64 / rows * 100.0
        );
    }

    Ok(())
}
