//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use gatelog_core::{
  ArchiveError,
  archive_table::{ArchiveTable, SchoolPrefix},
  archiver::SchoolYearArchiver,
  attendance::{Direction, NewAttendanceRecord},
  school::{NewStudent, School, Student},
  school_year::SchoolYear,
  store::{AttendanceStore, ScanWindow},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(y, m, d)
    .unwrap()
    .and_hms_opt(h, min, s)
    .unwrap()
}

fn now() -> NaiveDateTime { at(2025, 9, 10, 7, 0, 0) }

async fn school_with_student(s: &SqliteStore, name: &str, rfid: &str) -> (School, Student) {
  let school = s.add_school(name.into()).await.unwrap();
  let student = s
    .add_student(NewStudent {
      school_id:  school.id,
      first_name: "Juan".into(),
      last_name:  "Dela Cruz".into(),
      rfid_code:  Some(rfid.into()),
    })
    .await
    .unwrap();
  (school, student)
}

async fn import(
  s: &SqliteStore,
  student: &Student,
  times: impl IntoIterator<Item = NaiveDateTime>,
) -> Vec<i64> {
  let records = times
    .into_iter()
    .map(|t| NewAttendanceRecord {
      student_id: student.id,
      school_id:  student.school_id,
      rfid_code:  student.rfid_code.clone().unwrap_or_default(),
      scanned_at: t,
      direction:  Direction::In,
    })
    .collect();
  s.import_records(records).await.unwrap()
}

/// `n` scans one minute apart starting at `start`.
fn minutes(start: NaiveDateTime, n: i64) -> impl Iterator<Item = NaiveDateTime> {
  (0..n).map(move |i| start + TimeDelta::minutes(i))
}

async fn live_count(s: &SqliteStore) -> i64 {
  s.query_i64("SELECT COUNT(*) FROM attendance_logs").await.unwrap()
}

// ─── Schools and scans ───────────────────────────────────────────────────────

#[tokio::test]
async fn find_school_is_case_insensitive_and_first_by_id() {
  let s = store().await;
  let first = s.add_school("Baybay National HS".into()).await.unwrap();
  s.add_school("Baybay Central School".into()).await.unwrap();

  let found = s.find_school("BAYBAY").await.unwrap().unwrap();
  assert_eq!(found, first);
  assert!(s.find_school("nowhere").await.unwrap().is_none());
  assert_eq!(s.list_schools().await.unwrap().len(), 2);
}

#[tokio::test]
async fn find_school_folds_non_ascii_case() {
  let s = store().await;
  let school = s.add_school("Parañaque National HS".into()).await.unwrap();

  assert_eq!(s.find_school("PARAÑAQUE").await.unwrap(), Some(school.clone()));
  assert_eq!(s.find_school("parañaque nat").await.unwrap(), Some(school));
}

#[tokio::test]
async fn add_student_requires_existing_school() {
  let s = store().await;
  let err = s
    .add_student(NewStudent {
      school_id:  42,
      first_name: "No".into(),
      last_name:  "School".into(),
      rfid_code:  None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SchoolNotFound(42)));
}

#[tokio::test]
async fn record_scan_alternates_direction_and_throttles() {
  let s = store().await;
  let (school, student) = school_with_student(&s, "BUNHS", "RF-001").await;

  let morning = at(2025, 9, 10, 7, 15, 0);
  let first = s.record_scan(school.id, "RF-001".into(), morning).await.unwrap();
  assert_eq!(first.direction, Direction::In);
  assert_eq!(first.student_id, student.id);

  let throttled = s
    .record_scan(school.id, "RF-001".into(), morning + TimeDelta::minutes(2))
    .await
    .unwrap_err();
  assert!(matches!(
    throttled,
    Error::Core(gatelog_core::Error::ScanThrottled { last_scan }) if last_scan == morning
  ));

  let afternoon = s
    .record_scan(school.id, "RF-001".into(), at(2025, 9, 10, 16, 30, 0))
    .await
    .unwrap();
  assert_eq!(afternoon.direction, Direction::Out);

  let next_day = s
    .record_scan(school.id, "RF-001".into(), at(2025, 9, 11, 7, 10, 0))
    .await
    .unwrap();
  assert_eq!(next_day.direction, Direction::In);
}

#[tokio::test]
async fn record_scan_rejects_unknown_rfid() {
  let s = store().await;
  let (school, _) = school_with_student(&s, "BUNHS", "RF-001").await;
  let other = s.add_school("Other".into()).await.unwrap();

  for (school_id, rfid) in [(school.id, "RF-999"), (other.id, "RF-001")] {
    let err = s.record_scan(school_id, rfid.into(), now()).await.unwrap_err();
    assert!(matches!(err, Error::Core(gatelog_core::Error::UnknownRfid { .. })));
  }
  assert_eq!(live_count(&s).await, 0);
}

#[tokio::test]
async fn oldest_scan_before_is_strict_and_scoped() {
  let s = store().await;
  let (a, student_a) = school_with_student(&s, "Alpha", "RF-A").await;
  let (_, student_b) = school_with_student(&s, "Beta", "RF-B").await;
  import(&s, &student_b, [at(2021, 1, 1, 8, 0, 0)]).await;
  import(&s, &student_a, [at(2023, 3, 1, 8, 0, 0), at(2025, 6, 1, 0, 0, 0)]).await;

  let cutoff = at(2025, 6, 1, 0, 0, 0);
  let any = s.oldest_scan_before(cutoff, None).await.unwrap().unwrap();
  assert_eq!(any.student_id, student_b.id);

  let scoped = s.oldest_scan_before(cutoff, Some(a.id)).await.unwrap().unwrap();
  assert_eq!(scoped.scanned_at, at(2023, 3, 1, 8, 0, 0));

  assert!(
    s.oldest_scan_before(at(2021, 1, 1, 8, 0, 0), None)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn scan_batch_pages_by_id_within_window() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  let inside = import(&s, &student, minutes(at(2023, 8, 1, 8, 0, 0), 5)).await;
  import(&s, &student, [at(2024, 6, 1, 0, 0, 0), at(2023, 5, 31, 23, 59, 59)]).await;
  let edge = import(&s, &student, [at(2024, 5, 31, 23, 59, 59)]).await;

  let window = ScanWindow::new(SchoolYear::new(2023).unwrap(), None);
  assert_eq!(s.count_live(&window).await.unwrap(), 6);

  let page1 = s.scan_batch(&window, i64::MIN, 4).await.unwrap();
  let ids1: Vec<i64> = page1.iter().map(|r| r.id).collect();
  assert_eq!(ids1, inside[..4].to_vec());

  let page2 = s.scan_batch(&window, ids1[3], 4).await.unwrap();
  let ids2: Vec<i64> = page2.iter().map(|r| r.id).collect();
  assert_eq!(ids2, vec![inside[4], edge[0]]);
}

// ─── Archive tables ──────────────────────────────────────────────────────────

#[tokio::test]
async fn archive_table_has_indexes_but_no_foreign_keys() {
  let s = store().await;
  let table = ArchiveTable::new(&SchoolYear::new(2023).unwrap(), &SchoolPrefix::none()).unwrap();

  assert!(s.ensure_archive_table(&table).await.unwrap());
  assert!(!s.ensure_archive_table(&table).await.unwrap());

  let indexes = s
    .query_i64(
      "SELECT COUNT(*) FROM sqlite_master
       WHERE type = 'index' AND tbl_name = 'attendance_logs_2023'",
    )
    .await
    .unwrap();
  assert_eq!(indexes, 5);

  let fks = s
    .query_i64("SELECT COUNT(*) FROM pragma_foreign_key_list('attendance_logs_2023')")
    .await
    .unwrap();
  assert_eq!(fks, 0);
  let live_fks = s
    .query_i64("SELECT COUNT(*) FROM pragma_foreign_key_list('attendance_logs')")
    .await
    .unwrap();
  assert_eq!(live_fks, 2);

  assert_eq!(s.list_archive_tables().await.unwrap(), vec![table.clone()]);
  assert_eq!(s.count_archived(&table).await.unwrap(), 0);
}

#[tokio::test]
async fn incompatible_existing_table_is_refused() {
  let s = store().await;
  s.exec_raw("CREATE TABLE attendance_logs_2019 (note TEXT)").await.unwrap();
  let table = ArchiveTable::parse("attendance_logs_2019").unwrap();

  let err = s.ensure_archive_table(&table).await.unwrap_err();
  assert!(matches!(err, Error::IncompatibleArchiveTable { ref columns, .. } if columns == &["note"]));
}

#[tokio::test]
async fn existing_table_without_indexes_gets_them() {
  let s = store().await;
  s.exec_raw(
    "CREATE TABLE attendance_logs_2020 (
       id INTEGER PRIMARY KEY, student_id INTEGER NOT NULL, school_id INTEGER NOT NULL,
       rfid_code TEXT NOT NULL, scanned_at TEXT NOT NULL, direction TEXT NOT NULL,
       created_at TEXT NOT NULL, updated_at TEXT NOT NULL
     )",
  )
  .await
  .unwrap();
  let table = ArchiveTable::parse("attendance_logs_2020").unwrap();

  assert!(!s.ensure_archive_table(&table).await.unwrap());
  let indexes = s
    .query_i64(
      "SELECT COUNT(*) FROM sqlite_master
       WHERE type = 'index' AND tbl_name = 'attendance_logs_2020'",
    )
    .await
    .unwrap();
  assert_eq!(indexes, 5);
}

#[tokio::test]
async fn move_batch_copies_rows_verbatim() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  let ids = import(&s, &student, minutes(at(2023, 9, 4, 7, 0, 0), 3)).await;
  let window = ScanWindow::new(SchoolYear::new(2023).unwrap(), None);
  let before = s.scan_batch(&window, i64::MIN, 10).await.unwrap();

  let table = ArchiveTable::new(&window.school_year, &SchoolPrefix::none()).unwrap();
  s.ensure_archive_table(&table).await.unwrap();
  assert_eq!(s.move_batch(&table, &ids[..2]).await.unwrap(), 2);
  assert_eq!(s.move_batch(&table, &ids[..2]).await.unwrap(), 0);

  assert_eq!(s.count_archived(&table).await.unwrap(), 2);
  assert_eq!(live_count(&s).await, 1);

  let same = s
    .query_i64(&format!(
      "SELECT COUNT(*) FROM attendance_logs_2023 a
       WHERE a.id = {} AND a.scanned_at = '{}' AND a.rfid_code = '{}'
         AND a.direction = 'in' AND a.school_id = {}",
      before[0].id,
      before[0].scanned_at.format("%Y-%m-%d %H:%M:%S"),
      before[0].rfid_code,
      before[0].school_id,
    ))
    .await
    .unwrap();
  assert_eq!(same, 1);
}

// ─── Archiver end to end ─────────────────────────────────────────────────────

#[tokio::test]
async fn archives_past_school_years_in_batches() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  import(&s, &student, minutes(at(2023, 11, 2, 6, 0, 0), 2500)).await;
  import(&s, &student, minutes(at(2024, 6, 3, 6, 0, 0), 10)).await;
  import(&s, &student, [at(2025, 5, 31, 23, 59, 59)]).await;
  import(&s, &student, minutes(at(2025, 6, 2, 6, 0, 0), 7)).await;

  let archiver = SchoolYearArchiver::new(s.clone());
  let report = archiver.run(now(), None).await.unwrap();

  assert_eq!(report.current_year.start_year(), 2025);
  assert_eq!(report.cutoff, at(2025, 6, 1, 0, 0, 0));
  assert_eq!(report.brackets.len(), 2);

  let y2023 = &report.brackets[0];
  assert_eq!(y2023.table.name(), "attendance_logs_2023");
  assert_eq!(y2023.window_start, at(2023, 6, 1, 0, 0, 0));
  assert_eq!(y2023.window_end, at(2024, 5, 31, 23, 59, 59));
  assert_eq!(y2023.rows_moved, 2500);
  assert_eq!(y2023.batches, 3);

  let y2024 = &report.brackets[1];
  assert_eq!(y2024.table.name(), "attendance_logs_2024");
  assert_eq!(y2024.rows_moved, 11);

  assert_eq!(live_count(&s).await, 7);
  assert_eq!(
    s.query_i64("SELECT COUNT(*) FROM attendance_logs WHERE scanned_at < '2025-06-01 00:00:00'")
      .await
      .unwrap(),
    0
  );
  assert!(
    s.query_i64("SELECT COUNT(*) FROM sqlite_master WHERE name = 'attendance_logs_2025'")
      .await
      .unwrap()
      == 0
  );

  let again = archiver.run(now(), None).await.unwrap();
  assert!(again.is_noop());
  assert_eq!(again.total_rows(), 0);
}

#[tokio::test]
async fn batch_larger_than_parameter_limit_moves_in_one_transaction() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  import(&s, &student, minutes(at(2023, 11, 2, 6, 0, 0), 33_000)).await;

  let report = SchoolYearArchiver::new(s.clone())
    .with_batch_size(50_000)
    .run(now(), None)
    .await
    .unwrap();

  assert_eq!(report.brackets.len(), 1);
  assert_eq!(report.brackets[0].rows_moved, 33_000);
  assert_eq!(report.brackets[0].batches, 1);
  assert_eq!(live_count(&s).await, 0);
  assert_eq!(s.count_archived(&report.brackets[0].table).await.unwrap(), 33_000);
}

#[tokio::test]
async fn archived_rows_survive_school_deletion() {
  let s = store().await;
  let (school, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  import(&s, &student, minutes(at(2022, 8, 1, 7, 0, 0), 4)).await;

  SchoolYearArchiver::new(s.clone()).run(now(), None).await.unwrap();
  s.exec_raw(&format!("DELETE FROM schools WHERE id = {}", school.id))
    .await
    .unwrap();

  let table = ArchiveTable::parse("attendance_logs_2022").unwrap();
  assert_eq!(s.count_archived(&table).await.unwrap(), 4);
  assert_eq!(
    s.query_i64("SELECT COUNT(*) FROM students").await.unwrap(),
    0
  );
}

#[tokio::test]
async fn school_scoped_run_only_touches_that_school() {
  let s = store().await;
  let (_, bunhs_kid) = school_with_student(&s, "BUNHS", "RF-B").await;
  let (_, other_kid) = school_with_student(&s, "Central Elementary", "RF-C").await;
  import(&s, &bunhs_kid, minutes(at(2024, 2, 1, 7, 0, 0), 3)).await;
  import(&s, &other_kid, minutes(at(2024, 2, 1, 7, 0, 0), 5)).await;

  let report = SchoolYearArchiver::new(s.clone())
    .run(now(), Some("bunhs"))
    .await
    .unwrap();

  assert_eq!(report.brackets.len(), 2);
  assert_eq!(report.brackets[0].table.name(), "attendance_logs_bunhs_2023");
  assert_eq!(report.brackets[1].table.name(), "attendance_logs_bunhs_2024");
  assert_eq!(report.total_rows(), 3);
  assert_eq!(live_count(&s).await, 5);

  let tables: Vec<String> = s
    .list_archive_tables()
    .await
    .unwrap()
    .iter()
    .map(|t| t.name().to_owned())
    .collect();
  assert_eq!(tables, vec!["attendance_logs_bunhs_2023", "attendance_logs_bunhs_2024"]);
}

#[tokio::test]
async fn unknown_school_creates_nothing() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  import(&s, &student, [at(2022, 8, 1, 7, 0, 0)]).await;

  let err = SchoolYearArchiver::new(s.clone())
    .run(now(), Some("atlantis"))
    .await
    .unwrap_err();

  assert!(matches!(err, ArchiveError::SchoolNotFound(_)));
  assert!(s.list_archive_tables().await.unwrap().is_empty());
  assert_eq!(live_count(&s).await, 1);
}

#[tokio::test]
async fn failed_batch_rolls_back_and_rerun_resumes() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  let ids = import(&s, &student, minutes(at(2023, 9, 1, 6, 0, 0), 2500)).await;

  let table = ArchiveTable::parse("attendance_logs_2023").unwrap();
  s.ensure_archive_table(&table).await.unwrap();
  s.exec_raw(&format!(
    "CREATE TRIGGER fail_second_batch BEFORE INSERT ON attendance_logs_2023
     WHEN NEW.id = {}
     BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
    ids[1500]
  ))
  .await
  .unwrap();

  let archiver = SchoolYearArchiver::new(s.clone());
  let err = archiver.run(now(), None).await.unwrap_err();
  match err {
    ArchiveError::ArchiveTransactionFailed {
      table,
      batches_committed,
      rows_archived,
      ..
    } => {
      assert_eq!(table, "attendance_logs_2023");
      assert_eq!(batches_committed, 1);
      assert_eq!(rows_archived, 1000);
    }
    other => panic!("unexpected error: {other}"),
  }

  // The failed batch is neither archived nor removed.
  assert_eq!(s.count_archived(&table).await.unwrap(), 1000);
  assert_eq!(live_count(&s).await, 1500);

  s.exec_raw("DROP TRIGGER fail_second_batch").await.unwrap();
  let report = archiver.run(now(), None).await.unwrap();

  assert_eq!(report.brackets[0].rows_moved, 1500);
  assert!(!report.brackets[0].created);
  assert_eq!(s.count_archived(&table).await.unwrap(), 2500);
  assert_eq!(live_count(&s).await, 0);
  assert_eq!(
    s.query_i64(&format!(
      "SELECT COUNT(DISTINCT id) FROM attendance_logs_2023 WHERE id BETWEEN {} AND {}",
      ids[0],
      ids[2499]
    ))
    .await
    .unwrap(),
    2500
  );
}

#[tokio::test]
async fn dry_run_leaves_database_untouched() {
  let s = store().await;
  let (_, student) = school_with_student(&s, "BUNHS", "RF-1").await;
  import(&s, &student, minutes(at(2022, 12, 1, 7, 0, 0), 1200)).await;

  let plan = SchoolYearArchiver::new(s.clone())
    .plan(now(), None)
    .await
    .unwrap();

  assert!(plan.dry_run);
  assert_eq!(plan.brackets.len(), 3);
  assert_eq!(plan.brackets[0].rows_moved, 1200);
  assert_eq!(plan.brackets[0].batches, 2);
  assert!(s.list_archive_tables().await.unwrap().is_empty());
  assert_eq!(live_count(&s).await, 1200);
}
