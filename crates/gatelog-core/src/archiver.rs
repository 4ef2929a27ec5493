//! [`SchoolYearArchiver`] — moves attendance rows from past school years out
//! of the live table into per-bracket archive tables.
//!
//! A run computes the current bracket from `now`, finds the oldest live row
//! before its start, and then drains every bracket from that row's bracket up
//! to (but excluding) the current one, oldest first. Each bracket is moved in
//! id-keyed batches; every batch is a single insert-then-delete transaction in
//! the store, so a row is always in exactly one of the two tables.
//!
//! Runs are resumable: only committed batches leave the live table, so the
//! next run's oldest-row lookup starts wherever the last one stopped.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
  ArchiveError,
  archive_table::{ArchiveTable, SchoolPrefix},
  school::School,
  school_year::SchoolYear,
  store::{AttendanceStore, ScanWindow},
};

/// Rows moved per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ─── Report ──────────────────────────────────────────────────────────────────

/// Outcome of archiving one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BracketReport {
  pub school_year:  SchoolYear,
  pub table:        ArchiveTable,
  pub window_start: NaiveDateTime,
  pub window_end:   NaiveDateTime,
  /// Whether this run created the archive table.
  pub created:      bool,
  /// Rows moved; for a dry run, rows that would be moved.
  pub rows_moved:   u64,
  pub batches:      u64,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
  pub current_year: SchoolYear,
  /// Start of the current school year; only rows before it are eligible.
  pub cutoff:       NaiveDateTime,
  pub school:       Option<School>,
  pub dry_run:      bool,
  pub brackets:     Vec<BracketReport>,
}

impl ArchiveReport {
  pub fn total_rows(&self) -> u64 { self.brackets.iter().map(|b| b.rows_moved).sum() }

  /// `true` when no bracket needed archiving.
  pub fn is_noop(&self) -> bool { self.brackets.is_empty() }
}

// ─── Archiver ────────────────────────────────────────────────────────────────

struct Scope {
  school: Option<School>,
  prefix: SchoolPrefix,
}

impl Scope {
  fn school_id(&self) -> Option<i64> { self.school.as_ref().map(|s| s.id) }
}

type RunResult<T, S> = Result<T, ArchiveError<<S as AttendanceStore>::Error>>;

/// Archives past school years out of the live attendance table.
///
/// Not safe to run concurrently with itself on the same database; callers
/// must serialise invocations.
pub struct SchoolYearArchiver<S> {
  store:      S,
  batch_size: usize,
}

impl<S: AttendanceStore> SchoolYearArchiver<S> {
  pub fn new(store: S) -> Self { Self { store, batch_size: DEFAULT_BATCH_SIZE } }

  /// Override the number of rows per transaction. Zero is treated as one.
  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  /// Archive every bracket before the one containing `now`.
  ///
  /// `school_filter` restricts the run to the first school whose name
  /// contains it (case-insensitive); tables are then namespaced by that
  /// school's prefix.
  pub async fn run(
    &self,
    now: NaiveDateTime,
    school_filter: Option<&str>,
  ) -> RunResult<ArchiveReport, S> {
    self.execute(now, school_filter, false).await
  }

  /// Report what [`run`](Self::run) would do without creating tables or
  /// moving rows.
  pub async fn plan(
    &self,
    now: NaiveDateTime,
    school_filter: Option<&str>,
  ) -> RunResult<ArchiveReport, S> {
    self.execute(now, school_filter, true).await
  }

  async fn execute(
    &self,
    now: NaiveDateTime,
    school_filter: Option<&str>,
    dry_run: bool,
  ) -> RunResult<ArchiveReport, S> {
    tracing::info!("Starting attendance logs archiving process (dry run: {dry_run})");

    let scope   = self.resolve_scope(school_filter).await?;
    let current = SchoolYear::containing(now)?;
    let cutoff  = current.start();

    tracing::info!("Current school year starts: {}", current.start_year());
    tracing::info!("Cutoff date for archiving: {cutoff}");

    let mut report = ArchiveReport {
      current_year: current,
      cutoff,
      school: scope.school.clone(),
      dry_run,
      brackets: Vec::new(),
    };

    let oldest = self
      .store
      .oldest_scan_before(cutoff, scope.school_id())
      .await
      .map_err(ArchiveError::Store)?;

    let Some(oldest) = oldest else {
      tracing::info!("No attendance logs require archiving at this time.");
      return Ok(report);
    };

    let mut year = SchoolYear::containing(oldest.scanned_at)?;
    tracing::info!(
      "Oldest unarchived log is from {}, school year {year}",
      oldest.scanned_at
    );

    while year < current {
      let bracket = if dry_run {
        self.preview_bracket(year, &scope).await?
      } else {
        self.archive_bracket(year, &scope, report.total_rows()).await?
      };
      report.brackets.push(bracket);
      year = year.next()?;
    }

    tracing::info!(
      "Archiving process completed: {} record(s) across {} school year(s).",
      report.total_rows(),
      report.brackets.len()
    );
    Ok(report)
  }

  async fn resolve_scope(&self, school_filter: Option<&str>) -> RunResult<Scope, S> {
    let Some(pattern) = school_filter else {
      return Ok(Scope { school: None, prefix: SchoolPrefix::none() });
    };

    let school = self
      .store
      .find_school(pattern)
      .await
      .map_err(ArchiveError::Store)?
      .ok_or_else(|| ArchiveError::SchoolNotFound(pattern.to_owned()))?;

    let prefix = SchoolPrefix::for_school(&school);

    let others: Vec<String> = self
      .store
      .list_schools()
      .await
      .map_err(ArchiveError::Store)?
      .into_iter()
      .filter(|s| s.id != school.id && SchoolPrefix::for_school(s) == prefix)
      .map(|s| s.name)
      .collect();

    if !others.is_empty() {
      return Err(ArchiveError::SchoolPrefixCollision {
        school: school.name,
        prefix: prefix.to_string(),
        others,
      });
    }

    tracing::info!(
      "Filtering archive ONLY for school: {} (ID: {})",
      school.name,
      school.id
    );
    Ok(Scope { school: Some(school), prefix })
  }

  async fn archive_bracket(
    &self,
    year: SchoolYear,
    scope: &Scope,
    archived_before: u64,
  ) -> RunResult<BracketReport, S> {
    let table  = ArchiveTable::new(&year, &scope.prefix)?;
    let window = ScanWindow::new(year, scope.school_id());

    let created = self
      .store
      .ensure_archive_table(&table)
      .await
      .map_err(|source| ArchiveError::ArchiveTableCreationFailed {
        table: table.to_string(),
        source,
      })?;
    if created {
      tracing::info!("Created archive table: {table}");
    }

    tracing::info!("Moving records for SY {year} to {table}...");

    // Page by id, never by offset: every committed batch shrinks the live
    // table underneath the cursor.
    let mut after_id   = i64::MIN;
    let mut rows_moved = 0u64;
    let mut batches    = 0u64;

    loop {
      let batch = self
        .store
        .scan_batch(&window, after_id, self.batch_size)
        .await
        .map_err(ArchiveError::Store)?;

      let Some(last) = batch.last() else { break };
      after_id = last.id;

      let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
      let moved = self
        .store
        .move_batch(&table, &ids)
        .await
        .map_err(|source| ArchiveError::ArchiveTransactionFailed {
          table: table.to_string(),
          batches_committed: batches,
          rows_archived: archived_before + rows_moved,
          source,
        })?;

      rows_moved += moved;
      batches += 1;
      tracing::debug!("Committed batch {batches} into {table}: {moved} row(s)");
    }

    tracing::info!("Success! Archived {rows_moved} records for SY {year}.");

    Ok(BracketReport {
      school_year: year,
      table,
      window_start: year.start(),
      window_end: year.end(),
      created,
      rows_moved,
      batches,
    })
  }

  async fn preview_bracket(
    &self,
    year: SchoolYear,
    scope: &Scope,
  ) -> RunResult<BracketReport, S> {
    let table  = ArchiveTable::new(&year, &scope.prefix)?;
    let window = ScanWindow::new(year, scope.school_id());

    let eligible = self
      .store
      .count_live(&window)
      .await
      .map_err(ArchiveError::Store)?;

    tracing::info!("Would move {eligible} record(s) for SY {year} to {table}");

    Ok(BracketReport {
      school_year: year,
      table,
      window_start: year.start(),
      window_end: year.end(),
      created: false,
      rows_moved: eligible,
      batches: eligible.div_ceil(self.batch_size as u64),
    })
  }
}
