//! School-year brackets — the archiving epoch.
//!
//! A school year runs from June 1 00:00:00 to May 31 23:59:59 of the
//! following calendar year. Any instant in June or later belongs to the
//! bracket starting that calendar year; anything earlier belongs to the
//! bracket that started the year before.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Calendar month in which a school year begins.
pub const SCHOOL_YEAR_START_MONTH: u32 = 6;

fn first_day(year: i32) -> Option<NaiveDateTime> {
  NaiveDate::from_ymd_opt(year, SCHOOL_YEAR_START_MONTH, 1)?.and_hms_opt(0, 0, 0)
}

fn last_second(year: i32) -> Option<NaiveDateTime> {
  NaiveDate::from_ymd_opt(year, SCHOOL_YEAR_START_MONTH - 1, 31)?
    .and_hms_opt(23, 59, 59)
}

/// The bracket `[June 1 start_year, May 31 start_year + 1]`.
///
/// Serialised as its start year.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i32", into = "i32")]
pub struct SchoolYear {
  start_year: i32,
  start:      NaiveDateTime,
  end:        NaiveDateTime,
  next_start: NaiveDateTime,
}

impl SchoolYear {
  pub fn new(start_year: i32) -> Result<Self> {
    let end_year = start_year
      .checked_add(1)
      .ok_or(Error::YearOutOfRange(start_year))?;

    match (
      first_day(start_year),
      last_second(end_year),
      first_day(end_year),
    ) {
      (Some(start), Some(end), Some(next_start)) => Ok(Self {
        start_year,
        start,
        end,
        next_start,
      }),
      _ => Err(Error::YearOutOfRange(start_year)),
    }
  }

  /// The bracket `at` falls in.
  pub fn containing(at: NaiveDateTime) -> Result<Self> {
    let start_year = if at.month() >= SCHOOL_YEAR_START_MONTH {
      at.year()
    } else {
      at.year() - 1
    };
    Self::new(start_year)
  }

  pub fn start_year(&self) -> i32 { self.start_year }

  pub fn end_year(&self) -> i32 { self.start_year + 1 }

  /// June 1, 00:00:00 of the start year. Also the archiving cutoff when this
  /// is the current school year.
  pub fn start(&self) -> NaiveDateTime { self.start }

  /// May 31, 23:59:59 of the end year.
  pub fn end(&self) -> NaiveDateTime { self.end }

  /// First instant of the following bracket. Range queries use this as an
  /// exclusive bound so sub-second timestamps after `end()` are not missed.
  pub fn next_start(&self) -> NaiveDateTime { self.next_start }

  pub fn contains(&self, at: NaiveDateTime) -> bool {
    self.start <= at && at < self.next_start
  }

  pub fn next(&self) -> Result<Self> { Self::new(self.end_year()) }
}

impl fmt::Display for SchoolYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.start_year, self.end_year())
  }
}

impl TryFrom<i32> for SchoolYear {
  type Error = Error;

  fn try_from(start_year: i32) -> Result<Self> { Self::new(start_year) }
}

impl From<SchoolYear> for i32 {
  fn from(year: SchoolYear) -> Self { year.start_year }
}
