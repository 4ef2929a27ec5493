//! Error types for `gatelog-core`.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("school year starting {0} is outside the representable date range")]
  YearOutOfRange(i32),

  #[error("unknown scan direction: {0:?}")]
  UnknownDirection(String),

  #[error("not an archive table name: {0:?}")]
  NotAnArchiveTable(String),

  #[error("no student with rfid {rfid:?} at school {school_id}")]
  UnknownRfid { school_id: i64, rfid: String },

  /// The student scanned again before the cooldown elapsed.
  #[error("already scanned at {last_scan}, please wait before scanning again")]
  ScanThrottled { last_scan: NaiveDateTime },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a [`SchoolYearArchiver`](crate::archiver::SchoolYearArchiver)
/// run, generic over the store's error type.
#[derive(Debug, Error)]
pub enum ArchiveError<E>
where
  E: std::error::Error + 'static,
{
  #[error("school matching {0:?} not found")]
  SchoolNotFound(String),

  /// Another school's name strips down to the same table prefix.
  #[error("school {school:?} shares archive prefix {prefix:?} with {others:?}")]
  SchoolPrefixCollision {
    school: String,
    prefix: String,
    others: Vec<String>,
  },

  #[error("failed to create archive table {table}: {source}")]
  ArchiveTableCreationFailed {
    table:  String,
    #[source]
    source: E,
  },

  #[error(
    "archive transaction into {table} failed after {batches_committed} \
     committed batch(es), {rows_archived} row(s) archived this run: {source}"
  )]
  ArchiveTransactionFailed {
    table:             String,
    /// Batches committed for this bracket before the failure.
    batches_committed: u64,
    /// Rows moved across the whole run before the failure.
    rows_archived:     u64,
    #[source]
    source:            E,
  },

  #[error("core error: {0}")]
  Core(#[from] Error),

  #[error("store error: {0}")]
  Store(#[source] E),
}
