//! Table drift validation tool.
//!
//! This binary compares a source table with its replicated or transformed
//! counterpart, either one pair at a time or in bulk from a job list, and
//! reports whether the two are still statistically consistent. It can also
//! profile the columns of tables on a single side.
//!
//! # Exit Codes
//! - `0`: every comparison passed
//! - `1`: at least one comparison failed, errored or timed out, or a table
//!   could not be profiled
//! - `2`: invalid arguments, configuration or input files

mod output;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tabledrift_core::{
    BulkScheduler, ComparisonConfig, ComparisonStatus, JobStatus, ResultAggregator, RunFilter,
    RunSummary, SchedulerConfig, TableComparator, TableMapping, TableProfiler, TableRef,
    bulk::{needs_retry, read_job_list, retry_filter, retry_jobs, write_job_list},
    create_provider,
    error::redact_database_url,
    init_logging,
    logging::RUN_LOG_FILE,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "tabledrift")]
#[command(about = "Statistical table drift validation")]
#[command(version)]
#[command(long_about = "
tabledrift - Statistical validation of replicated tables

Compares two representations of the same logical table using sampled data:
- Row counts and schema differences
- Null rates per column
- KS and t-tests for numerical columns
- PSI and chi-square tests for categorical columns
- Min/max ranges for temporal columns

Profiles single tables: null and distinct counts, top values, quartiles,
string lengths, date spans and gaps per column.

SUPPORTED SOURCES:
- SQLite (sqlite:// or .db/.sqlite files)
- JSON fixtures (memory: prefix or .json files)

EXAMPLES:
  tabledrift compare --source-url erp.db --destination-url lake.db SAPISU.EABL main.eabl
  tabledrift bulk --source-url erp.db --destination-url lake.db --jobs jobs.csv --parallel 4
  tabledrift retry run_summary.json --output retry.csv
  tabledrift summarize run_summary.json --top 20
  tabledrift profile --url lake.db main.eabl main.eanl --output-dir profiles
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare one table pair
    Compare(CompareArgs),
    /// Compare every table pair in a job list
    Bulk(BulkArgs),
    /// Write a job list of the jobs that did not pass in a previous run
    Retry(RetryArgs),
    /// Print the aggregated report of a previous run
    Summarize(SummarizeArgs),
    /// Profile the columns of one or more tables
    Profile(ProfileArgs),
}

#[derive(Args)]
pub struct Connections {
    /// Source connection string
    #[arg(
        long,
        env = "TABLEDRIFT_SOURCE_URL",
        help = "Source connection string (credentials will be sanitized in logs)"
    )]
    pub source_url: String,

    /// Destination connection string
    #[arg(
        long,
        env = "TABLEDRIFT_DESTINATION_URL",
        help = "Destination connection string (credentials will be sanitized in logs)"
    )]
    pub destination_url: String,
}

#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub connections: Connections,

    /// Source table as schema.table
    pub source_table: String,

    /// Destination table as schema.table
    pub destination_table: String,

    /// Columns to test
    #[arg(long, value_delimiter = ',', help = "Comma-separated columns to test (default: all)")]
    pub columns: Vec<String>,

    /// Output file path
    #[arg(short, long, help = "Write the JSON result here instead of stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BulkArgs {
    #[command(flatten)]
    pub connections: Connections,

    /// Job list CSV
    #[arg(long, help = "CSV job list (source_schema,source_table,destination_schema,destination_table[,columns])")]
    pub jobs: PathBuf,

    /// Concurrent jobs
    #[arg(long, default_value = "1", help = "Number of jobs to run at once (1 = sequential)")]
    pub parallel: usize,

    /// Per-job timeout
    #[arg(long, default_value = "3600", help = "Wall-clock limit per job in seconds")]
    pub timeout_secs: u64,

    /// Summary output path
    #[arg(short, long, default_value = "run_summary.json", help = "Run summary output path")]
    pub output: PathBuf,

    /// Business date filter
    #[arg(long, help = "Filter date recorded in the run summary")]
    pub filter_date: Option<String>,
}

/// Statuses selectable for retry.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryStatus {
    Fail,
    Error,
    Timeout,
}

impl From<RetryStatus> for JobStatus {
    fn from(status: RetryStatus) -> Self {
        match status {
            RetryStatus::Fail => JobStatus::Fail,
            RetryStatus::Error => JobStatus::Error,
            RetryStatus::Timeout => JobStatus::Timeout,
        }
    }
}

#[derive(Args)]
pub struct RetryArgs {
    /// Run summary JSON from a previous bulk run
    pub summary: PathBuf,

    /// Job list output path
    #[arg(short, long, default_value = "retry_jobs.csv", help = "Job list output path")]
    pub output: PathBuf,

    /// Statuses to retry
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        help = "Statuses to retry (default: everything that did not pass)"
    )]
    pub status: Vec<RetryStatus>,
}

/// Summary output formats
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain-text report
    #[default]
    Text,
    /// JSON structured output
    Json,
}

#[derive(Args)]
pub struct SummarizeArgs {
    /// Run summary JSON
    pub summary: PathBuf,

    /// Entries per ranking
    #[arg(long, default_value = "10", help = "Number of largest differences to list")]
    pub top: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Connection string of the profiled side
    #[arg(
        long,
        env = "TABLEDRIFT_SOURCE_URL",
        help = "Connection string (credentials will be sanitized in logs)"
    )]
    pub url: String,

    /// Tables as schema.table
    #[arg(required = true)]
    pub tables: Vec<String>,

    /// Rows sampled per table
    #[arg(long, help = "Rows sampled per table (default: profile.sample_size)")]
    pub sample_size: Option<usize>,

    /// Frequent values per column
    #[arg(long, help = "Most frequent values listed per column (default: profile.top_k)")]
    pub top_k: Option<usize>,

    /// Output file path
    #[arg(
        short,
        long,
        help = "Write the profile (one table) or the profiling summary here instead of stdout"
    )]
    pub output: Option<PathBuf>,

    /// Report directory
    #[arg(long, help = "Write one JSON profile per table and profiling_summary.json here")]
    pub output_dir: Option<PathBuf>,
}

/// Summary file written next to per-table profiles.
const PROFILING_SUMMARY_FILE: &str = "profiling_summary.json";

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Comparison configuration file
    #[arg(
        long,
        global = true,
        env = "TABLEDRIFT_CONFIG",
        help = "Threshold and sampling configuration (.yaml, .yml or .json)"
    )]
    pub config: Option<PathBuf>,

    /// Log directory
    #[arg(
        long,
        global = true,
        help = "Directory for per-job logs and the run log (_run.log)"
    )]
    pub log_dir: Option<PathBuf>,
}

/// Process exit code for configuration and usage failures.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let run_log = cli.global.log_dir.as_ref().map(|dir| dir.join(RUN_LOG_FILE));
    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet, run_log.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Compare(args) => compare(args, load_config(&cli.global)?).await,
        Command::Bulk(args) => {
            bulk(args, load_config(&cli.global)?, cli.global.log_dir.as_deref()).await
        }
        Command::Retry(args) => retry(args),
        Command::Summarize(args) => summarize(args),
        Command::Profile(args) => profile(args, load_config(&cli.global)?).await,
    }
}

/// Loads comparison settings: file, then environment overrides.
fn load_config(global: &GlobalArgs) -> anyhow::Result<ComparisonConfig> {
    let mut config = match &global.config {
        Some(path) => ComparisonConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ComparisonConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Compares one table pair and prints the result
async fn compare(args: &CompareArgs, config: ComparisonConfig) -> anyhow::Result<ExitCode> {
    let mapping = TableMapping::new(
        TableRef::parse(&args.source_table),
        TableRef::parse(&args.destination_table),
    )
    .with_columns(args.columns.iter().cloned());
    mapping.validate()?;

    info!("Source: {}", redact_database_url(&args.connections.source_url));
    info!(
        "Destination: {}",
        redact_database_url(&args.connections.destination_url)
    );
    let seed = config.sampling.seed;
    let comparator = TableComparator::new(
        create_provider(&args.connections.source_url, seed)?,
        create_provider(&args.connections.destination_url, seed)?,
        config,
    );

    let result = match comparator.compare(&mapping).await {
        Ok(result) => result,
        Err(e) => {
            error!("Comparison failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let json = output::to_json(&result, "comparison result")?;
    output::emit_json(&json, args.output.as_deref()).await?;

    for column in result.failed_columns() {
        warn!("Column {} failed", column);
    }
    info!(
        "{} -> {}: {:?}",
        result.source, result.destination, result.status
    );
    Ok(exit_code(result.status == ComparisonStatus::Pass))
}

/// Runs a job list and writes the run summary
async fn bulk(
    args: &BulkArgs,
    config: ComparisonConfig,
    log_dir: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    if args.parallel == 0 {
        bail!("--parallel must be at least 1");
    }
    if args.timeout_secs == 0 {
        bail!("--timeout-secs must be at least 1");
    }
    let jobs = read_job_list(&args.jobs)?;
    if jobs.is_empty() {
        warn!("Job list {} is empty", args.jobs.display());
    }

    let mut scheduler_config = SchedulerConfig::new()
        .with_concurrency(args.parallel)
        .with_job_timeout(Duration::from_secs(args.timeout_secs));
    if let Some(dir) = log_dir {
        scheduler_config = scheduler_config.with_log_dir(dir);
    }

    let seed = config.sampling.seed;
    let scheduler = BulkScheduler::new(
        create_provider(&args.connections.source_url, seed)?,
        create_provider(&args.connections.destination_url, seed)?,
        config,
        scheduler_config,
    );
    let filter = RunFilter {
        filter_date: args.filter_date.clone(),
        job_source: Some(args.jobs.display().to_string()),
        retry_of: None,
    };

    let summary = scheduler.run(jobs, filter).await?;
    write_summary(&summary, &args.output).await?;

    println!(
        "{} jobs: {} passed, {} failed, {} errored ({} timed out)",
        summary.total, summary.passed, summary.failed, summary.errored, summary.timed_out
    );
    println!("Summary: {}", args.output.display());
    Ok(exit_code(summary.is_success()))
}

async fn write_summary(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let json = summary.to_json()?;
    output::save_json(&json, path)
        .await
        .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
    info!("Run summary saved to {}", path.display());
    Ok(())
}

/// Writes a retry job list from a previous summary
fn retry(args: &RetryArgs) -> anyhow::Result<ExitCode> {
    let summary = RunSummary::load(&args.summary)?;
    let statuses: Vec<JobStatus> = args.status.iter().copied().map(JobStatus::from).collect();
    let jobs = if statuses.is_empty() {
        retry_jobs(&summary, needs_retry)
    } else {
        retry_jobs(&summary, |record| statuses.contains(&record.status))
    };

    write_job_list(&args.output, &jobs)?;
    let filter = retry_filter(&summary);
    println!(
        "{} jobs from run {} written to {}",
        jobs.len(),
        filter.retry_of.map(|id| id.to_string()).unwrap_or_default(),
        args.output.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Prints the aggregated report of a summary
fn summarize(args: &SummarizeArgs) -> anyhow::Result<ExitCode> {
    let summary = RunSummary::load(&args.summary)?;
    let report = ResultAggregator::report(&summary, args.top);
    match args.format {
        ReportFormat::Text => print!("{}", output::render_report(&report)),
        ReportFormat::Json => println!("{}", output::to_json(&report, "summary report")?),
    }
    Ok(exit_code(summary.is_success()))
}

/// Profiles tables and writes their JSON profiles
async fn profile(args: &ProfileArgs, config: ComparisonConfig) -> anyhow::Result<ExitCode> {
    let mut settings = config.profile.clone();
    if let Some(rows) = args.sample_size {
        settings = settings.with_sample_size(rows);
    }
    if let Some(top_k) = args.top_k {
        settings = settings.with_top_k(top_k);
    }
    settings.validate().context("Invalid profiling settings")?;

    let tables: Vec<TableRef> = args
        .tables
        .iter()
        .map(String::as_str)
        .map(TableRef::parse)
        .collect();
    info!("Profiling {} tables on {}", tables.len(), redact_database_url(&args.url));
    let profiler = TableProfiler::new(create_provider(&args.url, config.sampling.seed)?, settings);

    if let ([table], None) = (tables.as_slice(), &args.output_dir) {
        let profile = match profiler.profile(table).await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Profiling failed: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        };
        let json = profile.to_json()?;
        output::emit_json(&json, args.output.as_deref()).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let summary = profiler
        .profile_tables(&tables, args.output_dir.as_deref())
        .await?;
    let summary_path = args.output.clone().or_else(|| {
        args.output_dir
            .as_ref()
            .map(|dir| dir.join(PROFILING_SUMMARY_FILE))
    });
    let json = summary.to_json()?;
    output::emit_json(&json, summary_path.as_deref()).await?;
    if let Some(path) = &summary_path {
        println!(
            "{} tables: {} profiled, {} failed",
            summary.total, summary.successful, summary.failed
        );
        println!("Summary: {}", path.display());
    }
    Ok(exit_code(summary.is_success()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bulk() {
        let cli = Cli::try_parse_from([
            "tabledrift",
            "-vv",
            "bulk",
            "--source-url",
            "erp.db",
            "--destination-url",
            "lake.db",
            "--jobs",
            "jobs.csv",
            "--parallel",
            "4",
            "--filter-date",
            "2024-06-30",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        let Command::Bulk(args) = cli.command else {
            panic!("expected bulk");
        };
        assert_eq!(args.parallel, 4);
        assert_eq!(args.timeout_secs, 3600);
        assert_eq!(args.output, PathBuf::from("run_summary.json"));
        assert_eq!(args.filter_date.as_deref(), Some("2024-06-30"));
    }

    #[test]
    fn test_parse_retry_statuses() {
        let cli = Cli::try_parse_from([
            "tabledrift",
            "retry",
            "summary.json",
            "--status",
            "error,timeout",
        ])
        .unwrap();
        let Command::Retry(args) = cli.command else {
            panic!("expected retry");
        };
        assert_eq!(args.status, vec![RetryStatus::Error, RetryStatus::Timeout]);
    }

    #[test]
    fn test_parse_profile() {
        let cli = Cli::try_parse_from([
            "tabledrift",
            "profile",
            "--url",
            "lake.db",
            "main.eabl",
            "main.eanl",
            "--top-k",
            "5",
        ])
        .unwrap();
        let Command::Profile(args) = cli.command else {
            panic!("expected profile");
        };
        assert_eq!(args.tables, vec!["main.eabl", "main.eanl"]);
        assert_eq!(args.top_k, Some(5));
        assert_eq!(args.sample_size, None);
        assert!(Cli::try_parse_from(["tabledrift", "profile", "--url", "lake.db"]).is_err());
    }

    #[test]
    fn test_env_overrides_applied() {
        temp_env::with_vars(
            [("KS_TEST_PVALUE", Some("0.01")), ("SAMPLE_SIZE", Some("1000"))],
            || {
                let global = GlobalArgs {
                    verbose: 0,
                    quiet: false,
                    config: None,
                    log_dir: None,
                };
                let config = load_config(&global).unwrap();
                assert_eq!(config.thresholds.ks_test_pvalue, 0.01);
                assert_eq!(config.sampling.max_sample_size, 1000);
            },
        );
    }

    #[test]
    fn test_invalid_env_override_rejected() {
        temp_env::with_var("PSI_THRESHOLD", Some("lots"), || {
            let global = GlobalArgs {
                verbose: 0,
                quiet: false,
                config: None,
                log_dir: None,
            };
            assert!(load_config(&global).is_err());
        });
    }

    #[test]
    fn test_config_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.yaml");
        std::fs::write(
            &path,
            "thresholds:\n  psi_threshold: 0.2\n  max_cardinality_for_psi: 50\n",
        )
        .unwrap();
        temp_env::with_vars_unset(["PSI_THRESHOLD", "CHI_SQUARE_MAX_CARDINALITY"], || {
            let global = GlobalArgs {
                verbose: 0,
                quiet: false,
                config: Some(path.clone()),
                log_dir: None,
            };
            let config = load_config(&global).unwrap();
            assert_eq!(config.thresholds.psi_threshold, 0.2);
            assert_eq!(config.thresholds.max_cardinality_for_chi_square, 50);
        });
    }

    #[tokio::test]
    async fn test_bulk_end_to_end_with_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = r#"{
            "tables": [
                {"schema": "S", "table": "A", "columns": [{"name": "ID", "type": "INTEGER"}],
                 "rows": [[1], [2], [3], [4]]},
                {"schema": "S", "table": "B", "columns": [{"name": "ID", "type": "INTEGER"}],
                 "rows": [[1], [2]]}
            ]
        }"#;
        let fixture_path = dir.path().join("fixture.json");
        std::fs::write(&fixture_path, fixture).unwrap();
        let jobs_path = dir.path().join("jobs.csv");
        std::fs::write(&jobs_path, "S,A,S,A\nS,B,S,MISSING\n").unwrap();
        let output = dir.path().join("summary.json");

        let args = BulkArgs {
            connections: Connections {
                source_url: fixture_path.display().to_string(),
                destination_url: fixture_path.display().to_string(),
            },
            jobs: jobs_path,
            parallel: 2,
            timeout_secs: 60,
            output: output.clone(),
            filter_date: None,
        };
        let log_dir = dir.path().join("logs");
        let code = bulk(&args, ComparisonConfig::default(), Some(&log_dir))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);

        let summary = RunSummary::load(&output).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.records[1].status, JobStatus::Error);
        assert!(log_dir.join("0000_S.A__S.A.log").exists());
    }

    #[tokio::test]
    async fn test_profile_end_to_end_with_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = r#"{
            "tables": [
                {"schema": "S", "table": "A",
                 "columns": [{"name": "ID", "type": "INTEGER"}, {"name": "CODE", "type": "TEXT"}],
                 "rows": [[1, "x"], [2, "y"], [3, "x"], [4, null]]}
            ]
        }"#;
        let fixture_path = dir.path().join("fixture.json");
        std::fs::write(&fixture_path, fixture).unwrap();
        let reports = dir.path().join("profiles");

        let args = ProfileArgs {
            url: fixture_path.display().to_string(),
            tables: vec!["S.A".to_string(), "S.MISSING".to_string()],
            sample_size: None,
            top_k: Some(1),
            output: None,
            output_dir: Some(reports.clone()),
        };
        let code = profile(&args, ComparisonConfig::default()).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);

        let summary: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(reports.join(PROFILING_SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["successful"], 1);
        assert_eq!(summary["failed"], 1);

        let profile: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(reports.join("0000_S.A.json")).unwrap(),
        )
        .unwrap();
        let code_column = &profile["columns"][1];
        assert_eq!(code_column["name"], "CODE");
        assert_eq!(code_column["basic"]["null_count"], 1);
        assert_eq!(code_column["top_values"].as_array().unwrap().len(), 1);
        assert_eq!(code_column["top_values"][0]["value"], "x");
    }
}
