//! SQL schema for the Gatelog SQLite store.
//!
//! The live schema is executed once at connection startup. Archive tables
//! are created on demand from [`archive_table_ddl`].

use gatelog_core::archive_table::ArchiveTable;

/// Full live schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schools (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id   INTEGER NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    rfid_code   TEXT UNIQUE,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS students_rfid_code_index ON students(rfid_code);

-- AUTOINCREMENT keeps ids from being reused after rows are archived, so an
-- id never reaches the same archive table twice.
CREATE TABLE IF NOT EXISTS attendance_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    school_id   INTEGER NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
    rfid_code   TEXT NOT NULL,
    scanned_at  TEXT NOT NULL,            -- YYYY-MM-DD HH:MM:SS, school-local
    direction   TEXT NOT NULL DEFAULT 'in' CHECK (direction IN ('in', 'out')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS attendance_logs_school_id_scanned_at_index
    ON attendance_logs(school_id, scanned_at);
CREATE INDEX IF NOT EXISTS attendance_logs_student_id_scanned_at_index
    ON attendance_logs(student_id, scanned_at);
CREATE INDEX IF NOT EXISTS attendance_logs_student_id_index
    ON attendance_logs(student_id);
CREATE INDEX IF NOT EXISTS attendance_logs_created_at_index
    ON attendance_logs(created_at);
CREATE INDEX IF NOT EXISTS attendance_logs_school_id_index
    ON attendance_logs(school_id);

PRAGMA user_version = 1;
";

/// Columns every archive table must have, sorted.
pub const ARCHIVE_COLUMNS: [&str; 8] = [
  "created_at",
  "direction",
  "id",
  "rfid_code",
  "scanned_at",
  "school_id",
  "student_id",
  "updated_at",
];

/// DDL for one archive table: the live columns and indexes, no foreign keys.
///
/// Archive rows must stay readable after their student or school is deleted.
pub fn archive_table_ddl(table: &ArchiveTable) -> String {
  let t = table.name();
  format!(
    "
CREATE TABLE IF NOT EXISTS \"{t}\" (
    id          INTEGER PRIMARY KEY,
    student_id  INTEGER NOT NULL,
    school_id   INTEGER NOT NULL,
    rfid_code   TEXT NOT NULL,
    scanned_at  TEXT NOT NULL,
    direction   TEXT NOT NULL DEFAULT 'in',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
{}",
    archive_index_ddl(table)
  )
}

/// The five live-table indexes for an archive table, each `IF NOT EXISTS`.
///
/// Index names are prefixed with the table name because SQLite index names
/// share one namespace.
pub fn archive_index_ddl(table: &ArchiveTable) -> String {
  let t = table.name();
  format!(
    "
CREATE INDEX IF NOT EXISTS \"{t}_school_id_scanned_at_index\" ON \"{t}\"(school_id, scanned_at);
CREATE INDEX IF NOT EXISTS \"{t}_student_id_scanned_at_index\" ON \"{t}\"(student_id, scanned_at);
CREATE INDEX IF NOT EXISTS \"{t}_student_id_index\" ON \"{t}\"(student_id);
CREATE INDEX IF NOT EXISTS \"{t}_created_at_index\" ON \"{t}\"(created_at);
CREATE INDEX IF NOT EXISTS \"{t}_school_id_index\" ON \"{t}\"(school_id);
"
  )
}
