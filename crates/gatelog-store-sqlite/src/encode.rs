//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are school-local wall-clock times stored as
//! `YYYY-MM-DD HH:MM:SS`, so string comparison in SQL orders them
//! chronologically.

use chrono::NaiveDateTime;
use gatelog_core::{
  attendance::{AttendanceRecord, Direction},
  school::Student,
};

use crate::{Error, Result};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Accepts an optional fractional part written by other tools.
const DT_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: NaiveDateTime) -> String { dt.format(DT_FORMAT).to_string() }

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, DT_PARSE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by the live table and every archive table, in the
/// order [`RawRecord::from_row`] reads them.
pub const RECORD_COLUMNS: &str =
  "id, student_id, school_id, rfid_code, scanned_at, direction, created_at, updated_at";

/// Raw values read directly from an `attendance_logs` row.
pub struct RawRecord {
  pub id:         i64,
  pub student_id: i64,
  pub school_id:  i64,
  pub rfid_code:  String,
  pub scanned_at: String,
  pub direction:  String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      student_id: row.get(1)?,
      school_id:  row.get(2)?,
      rfid_code:  row.get(3)?,
      scanned_at: row.get(4)?,
      direction:  row.get(5)?,
      created_at: row.get(6)?,
      updated_at: row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      id:         self.id,
      student_id: self.student_id,
      school_id:  self.school_id,
      rfid_code:  self.rfid_code,
      scanned_at: decode_dt(&self.scanned_at)?,
      direction:  Direction::parse(&self.direction)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const STUDENT_COLUMNS: &str =
  "id, school_id, first_name, last_name, rfid_code, created_at";

/// Raw values read directly from a `students` row.
pub struct RawStudent {
  pub id:         i64,
  pub school_id:  i64,
  pub first_name: String,
  pub last_name:  String,
  pub rfid_code:  Option<String>,
  pub created_at: String,
}

impl RawStudent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      school_id:  row.get(1)?,
      first_name: row.get(2)?,
      last_name:  row.get(3)?,
      rfid_code:  row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      id:         self.id,
      school_id:  self.school_id,
      first_name: self.first_name,
      last_name:  self.last_name,
      rfid_code:  self.rfid_code,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
