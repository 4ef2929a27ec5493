//! The `AttendanceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `gatelog-store-sqlite`).
//! The archiver depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDateTime;

use crate::{
  archive_table::ArchiveTable,
  attendance::AttendanceRecord,
  school::{NewStudent, School, Student},
  school_year::SchoolYear,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// The live rows belonging to one bracket, optionally for one school.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
  pub school_year: SchoolYear,
  pub school_id:   Option<i64>,
}

impl ScanWindow {
  pub fn new(school_year: SchoolYear, school_id: Option<i64>) -> Self {
    Self { school_year, school_id }
  }

  /// Inclusive lower bound on `scanned_at`.
  pub fn start(&self) -> NaiveDateTime { self.school_year.start() }

  /// Exclusive upper bound on `scanned_at`.
  pub fn end_exclusive(&self) -> NaiveDateTime { self.school_year.next_start() }

  pub fn contains(&self, record: &AttendanceRecord) -> bool {
    self.school_year.contains(record.scanned_at)
      && self.school_id.is_none_or(|id| id == record.school_id)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the attendance database.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schools and students ──────────────────────────────────────────────

  fn add_school(
    &self,
    name: String,
  ) -> impl Future<Output = Result<School, Self::Error>> + Send + '_;

  /// First school (lowest id) whose name contains `pattern`,
  /// case-insensitively.
  fn find_school<'a>(
    &'a self,
    pattern: &'a str,
  ) -> impl Future<Output = Result<Option<School>, Self::Error>> + Send + 'a;

  fn list_schools(
    &self,
  ) -> impl Future<Output = Result<Vec<School>, Self::Error>> + Send + '_;

  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  // ── Live table ────────────────────────────────────────────────────────

  /// Record a kiosk scan at `scanned_at`.
  ///
  /// Resolves the student by RFID within the school, applies the scan
  /// cooldown and infers the direction from the student's scans that day.
  fn record_scan(
    &self,
    school_id: i64,
    rfid_code: String,
    scanned_at: NaiveDateTime,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  /// The live row with the earliest `scanned_at` strictly before `cutoff`.
  fn oldest_scan_before(
    &self,
    cutoff: NaiveDateTime,
    school_id: Option<i64>,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Up to `limit` live rows inside `window` with `id > after_id`, ascending
  /// by id.
  fn scan_batch<'a>(
    &'a self,
    window: &'a ScanWindow,
    after_id: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;

  fn count_live<'a>(
    &'a self,
    window: &'a ScanWindow,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Archive tables ────────────────────────────────────────────────────

  /// Create `table` with the live schema minus foreign keys, unless it
  /// already exists. Returns `true` if the table was created by this call.
  fn ensure_archive_table<'a>(
    &'a self,
    table: &'a ArchiveTable,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Copy the live rows with the given ids into `table` and delete them from
  /// the live table, as one transaction. Returns the number of rows moved.
  ///
  /// On error nothing has been moved.
  fn move_batch<'a>(
    &'a self,
    table: &'a ArchiveTable,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  fn count_archived<'a>(
    &'a self,
    table: &'a ArchiveTable,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Every existing archive table, sorted by name.
  fn list_archive_tables(
    &self,
  ) -> impl Future<Output = Result<Vec<ArchiveTable>, Self::Error>> + Send + '_;
}
