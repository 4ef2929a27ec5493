//! Deterministic naming of per-bracket archive tables.
//!
//! Every `(school year, school prefix)` pair maps to exactly one table name,
//! `attendance_logs_{prefix}{start_year}`. The prefix is empty for unscoped
//! runs. Names only ever contain `[a-z0-9_]`, so stores may interpolate them
//! into DDL.

use std::fmt;

use serde::Serialize;

use crate::{Error, Result, attendance::LIVE_TABLE, school::School, school_year::SchoolYear};

// ─── SchoolPrefix ────────────────────────────────────────────────────────────

/// Table-name namespace for a single school, e.g. `BUNHS` -> `bunhs_`.
///
/// Two schools whose names strip to the same characters get the same prefix;
/// the archiver refuses to run in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SchoolPrefix(String);

impl SchoolPrefix {
  /// The prefix for runs that are not scoped to a school.
  pub fn none() -> Self { Self(String::new()) }

  pub fn for_school(school: &School) -> Self {
    let stripped: String = school
      .name
      .chars()
      .filter(char::is_ascii_alphanumeric)
      .map(|c| c.to_ascii_lowercase())
      .collect();

    if stripped.is_empty() {
      Self(format!("school{}_", school.id.unsigned_abs()))
    } else {
      Self(format!("{stripped}_"))
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SchoolPrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── ArchiveTable ────────────────────────────────────────────────────────────

/// A validated archive table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArchiveTable(String);

impl ArchiveTable {
  pub fn new(school_year: &SchoolYear, prefix: &SchoolPrefix) -> Result<Self> {
    let year = school_year.start_year();
    if year < 0 {
      return Err(Error::YearOutOfRange(year));
    }
    Ok(Self(format!("{LIVE_TABLE}_{prefix}{year}")))
  }

  /// Recognise an existing table name as an archive table.
  pub fn parse(name: &str) -> Result<Self> {
    let not_archive = || Error::NotAnArchiveTable(name.to_owned());

    let rest = name
      .strip_prefix(LIVE_TABLE)
      .and_then(|r| r.strip_prefix('_'))
      .ok_or_else(not_archive)?;

    let (prefix, year) = match rest.rfind('_') {
      Some(idx) => rest.split_at(idx + 1),
      None => ("", rest),
    };

    let prefix_ok = prefix
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    let year_ok = !year.is_empty() && year.chars().all(|c| c.is_ascii_digit());

    if !prefix_ok || !year_ok || prefix == "_" {
      return Err(not_archive());
    }
    Ok(Self(name.to_owned()))
  }

  pub fn name(&self) -> &str { &self.0 }

  /// The bracket start year encoded in the name.
  pub fn start_year(&self) -> Option<i32> {
    let digits = self.0.rsplit('_').next()?;
    digits.parse().ok()
  }

  /// The school prefix encoded in the name; empty for unscoped tables.
  pub fn prefix(&self) -> &str {
    let rest = &self.0[LIVE_TABLE.len() + 1..];
    match rest.rfind('_') {
      Some(idx) => &rest[..=idx],
      None => "",
    }
  }
}

impl fmt::Display for ArchiveTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
