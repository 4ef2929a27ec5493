//! Error type for `gatelog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gatelog_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("school not found: {0}")]
  SchoolNotFound(i64),

  /// A table with the archive name exists but does not have the live
  /// table's columns.
  #[error("table {table} exists with incompatible columns {columns:?}")]
  IncompatibleArchiveTable {
    table:   String,
    columns: Vec<String>,
  },

  /// The insert and delete halves of a batch touched different row counts;
  /// the transaction was rolled back.
  #[error("batch into {table} copied {inserted} row(s) but deleted {deleted}")]
  BatchMismatch {
    table:    String,
    inserted: usize,
    deleted:  usize,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
