//! Kiosk scan rules: how a raw RFID tap becomes an attendance row.

use chrono::{NaiveDateTime, TimeDelta};

use crate::{
  Error, Result,
  attendance::{AttendanceRecord, Direction},
};

/// Minimum gap between two accepted scans of the same student.
pub const SCAN_COOLDOWN_MINUTES: i64 = 5;

/// Decide the direction of a new scan from the student's scans earlier the
/// same day.
///
/// A latest `in` with no `out` after it means the student is on campus and
/// the new scan leaves; anything else enters.
pub fn infer_direction(todays_scans: &[AttendanceRecord]) -> Direction {
  let last_in = todays_scans
    .iter()
    .filter(|r| r.direction == Direction::In)
    .map(|r| r.scanned_at)
    .max();

  let Some(last_in) = last_in else {
    return Direction::In;
  };

  let left_since = todays_scans
    .iter()
    .any(|r| r.direction == Direction::Out && r.scanned_at > last_in);

  if left_since { Direction::In } else { Direction::Out }
}

/// Reject a scan that follows the previous one too closely.
pub fn check_cooldown(
  last_scan: Option<NaiveDateTime>,
  now: NaiveDateTime,
) -> Result<()> {
  match last_scan {
    Some(last) if last >= now - TimeDelta::minutes(SCAN_COOLDOWN_MINUTES) => {
      Err(Error::ScanThrottled { last_scan: last })
    }
    _ => Ok(()),
  }
}
