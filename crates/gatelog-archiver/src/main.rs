//! `archive-attendance-logs` — moves attendance logs older than the current
//! school year into per-year archive tables.
//!
//! # Usage
//!
//! ```text
//! archive-attendance-logs
//! archive-attendance-logs --school=BUNHS
//! archive-attendance-logs --school=BUNHS --dry-run --now 2025-06-01
//! archive-attendance-logs --list
//! ```
//!
//! Meant to run once a year on June 1st, e.g. from cron:
//!
//! ```text
//! 0 1 1 6 * archive-attendance-logs --school=BUNHS
//! ```
//!
//! Re-running at any time is safe; rows already archived are gone from the
//! live table and are not selected again. Do not run two invocations against
//! the same database at once.

mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use gatelog_core::{
  ArchiveError,
  archiver::{ArchiveReport, SchoolYearArchiver},
  store::AttendanceStore,
};
use gatelog_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use config::ArchiverConfig;

#[derive(Parser, Debug)]
#[command(
  name = "archive-attendance-logs",
  version,
  about = "Archive attendance logs older than the current school year into yearly tables"
)]
struct Cli {
  /// Only archive logs of the first school whose name contains this
  /// (case-insensitive).
  #[arg(long, value_name = "NAME")]
  school: Option<String>,

  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "gatelog.toml")]
  config: PathBuf,

  /// Reference time instead of the local clock: `YYYY-MM-DD` or
  /// `YYYY-MM-DD HH:MM:SS`.
  #[arg(long, value_parser = parse_now)]
  now: Option<NaiveDateTime>,

  /// Report what would be archived without creating tables or moving rows.
  #[arg(long)]
  dry_run: bool,

  /// Print the final report as JSON on stdout.
  #[arg(long)]
  json: bool,

  /// List existing archive tables with their row counts and exit.
  #[arg(long)]
  list: bool,
}

fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
    return Ok(dt);
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .ok_or_else(|| format!("expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS, got {s:?}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ArchiverConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;

  if cli.list {
    return list_archives(&store).await;
  }

  let archiver = SchoolYearArchiver::new(store).with_batch_size(cfg.batch_size);
  let now      = cli.now.unwrap_or_else(|| Local::now().naive_local());
  let school   = cli.school.as_deref();

  let result = if cli.dry_run {
    archiver.plan(now, school).await
  } else {
    archiver.run(now, school).await
  };

  let Some(report) = settle(result)? else {
    return Ok(());
  };

  if cli.json {
    println!(
      "{}",
      serde_json::to_string_pretty(&report).context("serialising report")?
    );
  } else {
    print_summary(&report);
  }

  Ok(())
}

/// Maps an archiver outcome to the process outcome. An unmatched `--school`
/// is logged and is not a failure.
fn settle<E>(result: Result<ArchiveReport, ArchiveError<E>>) -> anyhow::Result<Option<ArchiveReport>>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match result {
    Ok(report) => Ok(Some(report)),
    Err(ArchiveError::SchoolNotFound(pattern)) => {
      tracing::error!("School matching '{pattern}' not found.");
      Ok(None)
    }
    Err(e) => Err(e).context("archiving failed"),
  }
}

fn print_summary(report: &ArchiveReport) {
  let verb = if report.dry_run { "would move" } else { "moved" };

  for b in &report.brackets {
    let created = if b.created { " (created)" } else { "" };
    println!(
      "SY {}  {}{created}  {verb} {} row(s) in {} batch(es)",
      b.school_year, b.table, b.rows_moved, b.batches
    );
  }
  println!(
    "Total: {verb} {} row(s) across {} school year(s); cutoff {}",
    report.total_rows(),
    report.brackets.len(),
    report.cutoff
  );
}

async fn list_archives(store: &SqliteStore) -> anyhow::Result<()> {
  let tables = store
    .list_archive_tables()
    .await
    .context("listing archive tables")?;

  if tables.is_empty() {
    println!("No archive tables.");
    return Ok(());
  }

  for table in tables {
    let rows = store
      .count_archived(&table)
      .await
      .with_context(|| format!("counting rows in {table}"))?;
    println!("{table}\t{rows}");
  }
  Ok(())
}
