//! Attendance records — one row per RFID scan at the school gate.
//!
//! Rows are created by the kiosk path and are never edited afterwards. The
//! archiver relocates them between tables verbatim.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Name of the live attendance table.
pub const LIVE_TABLE: &str = "attendance_logs";

// ─── Direction ───────────────────────────────────────────────────────────────

/// Whether a scan was entering or leaving the campus.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
  #[default]
  In,
  Out,
}

impl Direction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::In => "in",
      Self::Out => "out",
    }
  }

  /// Parse the stored tag, mapping failures into the crate error.
  pub fn parse(tag: &str) -> Result<Self> {
    tag
      .parse()
      .map_err(|_| Error::UnknownDirection(tag.to_owned()))
  }
}

// ─── AttendanceRecord ────────────────────────────────────────────────────────

/// A stored scan. `id` is unique within its table only: live and archive
/// tables each have their own id space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub id:         i64,
  pub student_id: i64,
  pub school_id:  i64,
  pub rfid_code:  String,
  /// Authoritative ordering and partitioning field.
  pub scanned_at: NaiveDateTime,
  pub direction:  Direction,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

/// A row to insert as-is, bypassing kiosk rules. Used for backfills and
/// imports from other systems.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
  pub student_id: i64,
  pub school_id:  i64,
  pub rfid_code:  String,
  pub scanned_at: NaiveDateTime,
  pub direction:  Direction,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn direction_tags_are_lowercase() {
    assert_eq!(Direction::In.as_str(), "in");
    assert_eq!(Direction::Out.to_string(), "out");
    assert_eq!(Direction::parse("out").unwrap(), Direction::Out);
  }

  #[test]
  fn unknown_direction_is_an_error() {
    assert!(matches!(
      Direction::parse("sideways"),
      Err(Error::UnknownDirection(t)) if t == "sideways"
    ));
  }
}
