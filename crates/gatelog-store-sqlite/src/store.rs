//! [`SqliteStore`] — the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{Local, NaiveDateTime, SubsecRound as _};
use rusqlite::{OptionalExtension as _, TransactionBehavior, params_from_iter, types::Value};

use gatelog_core::{
  archive_table::ArchiveTable,
  attendance::{AttendanceRecord, NewAttendanceRecord},
  scan::{check_cooldown, infer_direction},
  school::{NewStudent, School, Student},
  store::{AttendanceStore, ScanWindow},
};

use crate::{
  Error, Result,
  encode::{RECORD_COLUMNS, RawRecord, RawStudent, STUDENT_COLUMNS, decode_dt, encode_dt},
  schema::{ARCHIVE_COLUMNS, SCHEMA, archive_index_ddl, archive_table_ddl},
};

/// Ids per `IN (...)` list in [`SqliteStore::move_batch`]. The bundled
/// SQLite allows at most 32766 bound parameters per statement.
const MOVE_CHUNK: usize = 10_000;

/// Wall-clock time at the school, truncated to the stored precision.
fn now_local() -> NaiveDateTime { Local::now().naive_local().trunc_subsecs(0) }

/// `WHERE` fragment and positional values selecting the live rows in
/// `window`.
fn window_filter(window: &ScanWindow) -> (String, Vec<Value>) {
  let mut sql    = String::from("scanned_at >= ? AND scanned_at < ?");
  let mut values = vec![
    Value::Text(encode_dt(window.start())),
    Value::Text(encode_dt(window.end_exclusive())),
  ];
  if let Some(id) = window.school_id {
    sql.push_str(" AND school_id = ?");
    values.push(Value::Integer(id));
  }
  (sql, values)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Gatelog attendance store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert rows exactly as given, bypassing the kiosk scan rules, in one
  /// transaction. Returns the new ids in input order.
  pub async fn import_records(&self, records: Vec<NewAttendanceRecord>) -> Result<Vec<i64>> {
    let now_str = encode_dt(now_local());

    let ids = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO attendance_logs (
               student_id, school_id, rfid_code, scanned_at, direction,
               created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          )?;
          for r in &records {
            stmt.execute(rusqlite::params![
              r.student_id,
              r.school_id,
              r.rfid_code,
              encode_dt(r.scanned_at),
              r.direction.as_str(),
              now_str,
            ])?;
            ids.push(tx.last_insert_rowid());
          }
        }
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    Ok(ids)
  }

  async fn get_school(&self, id: i64) -> Result<School> {
    let school = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, name FROM schools WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok(School { id: row.get(0)?, name: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;

    school.ok_or(Error::SchoolNotFound(id))
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run raw SQL against the connection.
  pub(crate) async fn exec_raw(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query returning a single integer.
  pub(crate) async fn query_i64(&self, sql: &str) -> Result<i64> {
    let sql = sql.to_owned();
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
        .await?,
    )
  }
}

/// Body of [`SqliteStore::record_scan`]; runs on the connection thread inside
/// one `IMMEDIATE` transaction so the cooldown check and insert are atomic.
fn insert_scan(
  conn: &mut rusqlite::Connection,
  school_id: i64,
  rfid_code: String,
  scanned_at: NaiveDateTime,
  now: NaiveDateTime,
) -> Result<AttendanceRecord> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let student_id: i64 = tx
    .query_row(
      "SELECT id FROM students WHERE school_id = ?1 AND rfid_code = ?2",
      rusqlite::params![school_id, rfid_code],
      |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| gatelog_core::Error::UnknownRfid {
      school_id,
      rfid: rfid_code.clone(),
    })?;

  let last_scan: Option<String> = tx.query_row(
    "SELECT MAX(scanned_at) FROM attendance_logs WHERE student_id = ?1",
    rusqlite::params![student_id],
    |row| row.get(0),
  )?;
  let last_scan = last_scan.as_deref().map(decode_dt).transpose()?;
  check_cooldown(last_scan, scanned_at)?;

  let day = scanned_at.date().format("%Y-%m-%d").to_string();
  let todays: Vec<RawRecord> = {
    let mut stmt = tx.prepare(&format!(
      "SELECT {RECORD_COLUMNS} FROM attendance_logs
       WHERE student_id = ?1 AND substr(scanned_at, 1, 10) = ?2
       ORDER BY scanned_at"
    ))?;
    let rows = stmt
      .query_map(rusqlite::params![student_id, day], RawRecord::from_row)?
      .collect::<rusqlite::Result<_>>()?;
    rows
  };
  let todays = todays
    .into_iter()
    .map(RawRecord::into_record)
    .collect::<Result<Vec<_>>>()?;

  let direction = infer_direction(&todays);

  tx.execute(
    "INSERT INTO attendance_logs (
       student_id, school_id, rfid_code, scanned_at, direction,
       created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
    rusqlite::params![
      student_id,
      school_id,
      rfid_code,
      encode_dt(scanned_at),
      direction.as_str(),
      encode_dt(now),
    ],
  )?;
  let id = tx.last_insert_rowid();
  tx.commit()?;

  Ok(AttendanceRecord {
    id,
    student_id,
    school_id,
    rfid_code,
    scanned_at,
    direction,
    created_at: now,
    updated_at: now,
  })
}

/// Body of [`SqliteStore::ensure_archive_table`]. A compatible table that
/// already exists still gets any missing indexes.
fn create_archive_table(
  conn: &mut rusqlite::Connection,
  name: &str,
  table_ddl: &str,
  index_ddl: &str,
) -> Result<bool> {
  let mut columns: Vec<String> = {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt
      .query_map([name], |row| row.get(0))?
      .collect::<rusqlite::Result<_>>()?;
    rows
  };

  if !columns.is_empty() {
    columns.sort();
    if columns.iter().map(String::as_str).eq(ARCHIVE_COLUMNS) {
      conn.execute_batch(index_ddl)?;
      return Ok(false);
    }
    return Err(Error::IncompatibleArchiveTable { table: name.to_owned(), columns });
  }

  let tx = conn.transaction()?;
  tx.execute_batch(table_ddl)?;
  tx.commit()?;
  Ok(true)
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Schools and students ──────────────────────────────────────────────

  async fn add_school(&self, name: String) -> Result<School> {
    let now_str = encode_dt(now_local());
    let name_in = name.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO schools (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
          rusqlite::params![name_in, now_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(School { id, name })
  }

  async fn find_school(&self, pattern: &str) -> Result<Option<School>> {
    // SQLite's lower() only folds ASCII, so match on this side.
    let schools = self.list_schools().await?;
    Ok(schools.into_iter().find(|s| s.matches(pattern)))
  }

  async fn list_schools(&self) -> Result<Vec<School>> {
    let schools = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id, name FROM schools ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| Ok(School { id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(schools)
  }

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    self.get_school(input.school_id).await?;
    let now_str = encode_dt(now_local());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (
             school_id, first_name, last_name, rfid_code, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![
            input.school_id,
            input.first_name,
            input.last_name,
            input.rfid_code,
            now_str,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
          rusqlite::params![id],
          RawStudent::from_row,
        )?)
      })
      .await?;

    raw.into_student()
  }

  // ── Live table ────────────────────────────────────────────────────────

  async fn record_scan(
    &self,
    school_id: i64,
    rfid_code: String,
    scanned_at: NaiveDateTime,
  ) -> Result<AttendanceRecord> {
    let scanned_at = scanned_at.trunc_subsecs(0);
    let now        = now_local();

    self
      .conn
      .call(move |conn| Ok(insert_scan(conn, school_id, rfid_code, scanned_at, now)))
      .await?
  }

  async fn oldest_scan_before(
    &self,
    cutoff: NaiveDateTime,
    school_id: Option<i64>,
  ) -> Result<Option<AttendanceRecord>> {
    let mut sql =
      format!("SELECT {RECORD_COLUMNS} FROM attendance_logs WHERE scanned_at < ?");
    let mut values = vec![Value::Text(encode_dt(cutoff))];
    if let Some(id) = school_id {
      sql.push_str(" AND school_id = ?");
      values.push(Value::Integer(id));
    }
    sql.push_str(" ORDER BY scanned_at ASC, id ASC LIMIT 1");

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, params_from_iter(values), RawRecord::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn scan_batch(
    &self,
    window: &ScanWindow,
    after_id: i64,
    limit: usize,
  ) -> Result<Vec<AttendanceRecord>> {
    let (filter, mut values) = window_filter(window);
    values.push(Value::Integer(after_id));
    values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    let sql = format!(
      "SELECT {RECORD_COLUMNS} FROM attendance_logs
       WHERE {filter} AND id > ?
       ORDER BY id ASC
       LIMIT ?"
    );

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(values), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn count_live(&self, window: &ScanWindow) -> Result<u64> {
    let (filter, values) = window_filter(window);
    let sql = format!("SELECT COUNT(*) FROM attendance_logs WHERE {filter}");

    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?))
      .await?;

    Ok(count.unsigned_abs())
  }

  // ── Archive tables ────────────────────────────────────────────────────

  async fn ensure_archive_table(&self, table: &ArchiveTable) -> Result<bool> {
    let name = table.name().to_owned();
    let table_ddl = archive_table_ddl(table);
    let index_ddl = archive_index_ddl(table);

    let created = self
      .conn
      .call(move |conn| Ok(create_archive_table(conn, &name, &table_ddl, &index_ddl)))
      .await??;

    if created {
      tracing::debug!("created archive table {table}");
    }
    Ok(created)
  }

  async fn move_batch(&self, table: &ArchiveTable, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
      return Ok(0);
    }

    let name = table.name().to_owned();
    let ids  = ids.to_vec();

    let (inserted, deleted) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        let mut deleted  = 0;

        // One statement per chunk keeps each under SQLite's bound-parameter
        // limit; the whole batch still commits or rolls back together.
        for chunk in ids.chunks(MOVE_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          inserted += tx.execute(
            &format!(
              "INSERT INTO \"{name}\" ({RECORD_COLUMNS})
               SELECT {RECORD_COLUMNS} FROM attendance_logs
               WHERE id IN ({placeholders})"
            ),
            params_from_iter(chunk.iter()),
          )?;
          deleted += tx.execute(
            &format!("DELETE FROM attendance_logs WHERE id IN ({placeholders})"),
            params_from_iter(chunk.iter()),
          )?;
        }

        // Dropping an uncommitted transaction rolls it back.
        if inserted == deleted {
          tx.commit()?;
        }
        Ok((inserted, deleted))
      })
      .await?;

    if inserted != deleted {
      tracing::warn!("rolled back batch into {table}: {inserted} copied, {deleted} deleted");
      return Err(Error::BatchMismatch { table: table.to_string(), inserted, deleted });
    }
    Ok(deleted as u64)
  }

  async fn count_archived(&self, table: &ArchiveTable) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.name());

    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;

    Ok(count.unsigned_abs())
  }

  async fn list_archive_tables(&self) -> Result<Vec<ArchiveTable>> {
    let names: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          r"SELECT name FROM sqlite_master
            WHERE type = 'table' AND name LIKE 'attendance\_logs\_%' ESCAPE '\'
            ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      names
        .iter()
        .filter_map(|name| ArchiveTable::parse(name).ok())
        .collect(),
    )
  }
}
