//! Schools and the students enrolled in them.
//!
//! Both are plain records owned by the CRUD side of the platform. The
//! archiver only reads schools, to resolve `--school` and derive table
//! prefixes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
  pub id:   i64,
  /// Display name, unique across schools.
  pub name: String,
}

impl School {
  /// Case-insensitive substring match against the display name.
  pub fn matches(&self, pattern: &str) -> bool {
    self.name.to_lowercase().contains(&pattern.to_lowercase())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub id:         i64,
  pub school_id:  i64,
  pub first_name: String,
  pub last_name:  String,
  pub rfid_code:  Option<String>,
  pub created_at: NaiveDateTime,
}

/// Input to [`crate::store::AttendanceStore::add_student`].
#[derive(Debug, Clone)]
pub struct NewStudent {
  pub school_id:  i64,
  pub first_name: String,
  pub last_name:  String,
  pub rfid_code:  Option<String>,
}
