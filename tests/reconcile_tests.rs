use chrono::NaiveDateTime;
use punchsync::clients::cloud::{CloudClient, PushOutcome};
use punchsync::clients::device::{DeviceClient, DeviceSession};
use punchsync::core::checkpoint::CheckpointStore;
use punchsync::core::conflict::resolve_conflicts;
use punchsync::core::identity::{IdentityMapper, UNMAPPED_KEY};
use punchsync::core::ingest::{poll_cloud, poll_device};
use punchsync::core::runner::{CycleOptions, Step, push_with_roster, run_cycle};
use punchsync::core::sync::push_unsynced;
use punchsync::db::initialize::init_db;
use punchsync::db::pool::DbPool;
use punchsync::db::queries::{EventFilter, count_rows, load_events};
use punchsync::errors::{AppError, AppResult};
use punchsync::models::event::{CloudAttendance, CloudEntry, Event, RawPunch};
use punchsync::models::origin::Origin;
use punchsync::models::punch_kind::PunchKind;
use punchsync::utils::time::{is_epoch, parse_timestamp};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn t(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

fn open_db(dir: &tempfile::TempDir) -> DbPool {
    let path = dir.path().join("ledger.sqlite");
    let pool = DbPool::new(&path.to_string_lossy()).unwrap();
    init_db(&pool.conn).unwrap();
    pool
}

fn all_events(pool: &DbPool) -> Vec<Event> {
    load_events(&pool.conn, &EventFilter::default()).unwrap()
}

#[derive(Clone, Default)]
struct MockDevice {
    punches: Vec<RawPunch>,
    roster: HashMap<i64, String>,
    fail_fetch: bool,
    released: Rc<Cell<u32>>,
}

impl MockDevice {
    fn with(punches: &[(i64, &str)]) -> Self {
        Self {
            punches: punches.iter().map(|(k, s)| RawPunch::new(*k, t(s))).collect(),
            roster: HashMap::from([(7, "Ann".to_string())]),
            ..Default::default()
        }
    }
}

struct MockSession(MockDevice);

impl DeviceClient for MockDevice {
    fn connect(&self) -> AppResult<Box<dyn DeviceSession>> {
        Ok(Box::new(MockSession(self.clone())))
    }
}

impl DeviceSession for MockSession {
    fn fetch_punches(&mut self) -> AppResult<Vec<RawPunch>> {
        if self.0.fail_fetch {
            return Err(AppError::DeviceConnection("socket closed".into()));
        }
        Ok(self.0.punches.clone())
    }

    fn fetch_roster(&mut self) -> AppResult<HashMap<i64, String>> {
        Ok(self.0.roster.clone())
    }

    fn release(&mut self) -> AppResult<()> {
        self.0.released.set(self.0.released.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
struct MockCloud {
    attendance: Vec<CloudAttendance>,
    roster: BTreeSet<String>,
    auth_fails: bool,
    reject: HashSet<String>,
    push_auth_fails: bool,
    pushed: RefCell<Vec<(String, NaiveDateTime, PunchKind)>>,
}

impl MockCloud {
    fn roster(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }
}

impl CloudClient for MockCloud {
    fn get_access_token(&self) -> AppResult<String> {
        if self.auth_fails {
            return Err(AppError::Auth("invalid_code".into()));
        }
        Ok("tok".into())
    }

    fn fetch_roster(&self, _token: &str) -> AppResult<BTreeSet<String>> {
        Ok(self.roster.clone())
    }

    fn fetch_attendance(&self, _token: &str, _since: &NaiveDateTime) -> AppResult<Vec<CloudAttendance>> {
        Ok(self.attendance.clone())
    }

    fn push_event(
        &self,
        _token: &str,
        employee_id: &str,
        time: &NaiveDateTime,
        kind: PunchKind,
    ) -> AppResult<PushOutcome> {
        if self.push_auth_fails {
            return Err(AppError::Auth("token expired".into()));
        }
        if self.reject.contains(employee_id) {
            return Ok(PushOutcome::Rejected(400, "invalid employee".into()));
        }
        self.pushed
            .borrow_mut()
            .push((employee_id.to_string(), *time, kind));
        Ok(PushOutcome::Accepted)
    }
}

fn check_in(employee: &str, at: &str) -> CloudAttendance {
    CloudAttendance {
        employee_id: employee.to_string(),
        entries: vec![CloudEntry {
            check_in: Some(t(at)),
            check_out: None,
        }],
    }
}

// ---------------------------------------------------------------------------
// Device ingestion
// ---------------------------------------------------------------------------

#[test]
fn device_poll_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-02 17:00:00")]);

    let first = poll_device(&mut pool.conn, &device, "t1").unwrap();
    assert_eq!(first.inserted, 2);

    let second = poll_device(&mut pool.conn, &device, "t1").unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.candidates, 0);
    assert_eq!(second.inserted, 0);

    assert_eq!(count_rows(&pool.conn, "attendance_logs").unwrap(), 2);
    assert_eq!(count_rows(&pool.conn, "raw_device_logs").unwrap(), 2);
}

#[test]
fn alternation_continues_across_polls() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);

    poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-02 09:00:00")]), "t1").unwrap();
    poll_device(
        &mut pool.conn,
        &MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-02 17:00:00")]),
        "t1",
    )
    .unwrap();

    let kinds: Vec<PunchKind> = all_events(&pool).iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![PunchKind::CheckIn, PunchKind::CheckOut]);
}

#[test]
fn display_name_comes_from_roster() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00"), (8, "2025-06-02 09:01:00")]);

    poll_device(&mut pool.conn, &device, "t1").unwrap();

    let names: Vec<String> = all_events(&pool).into_iter().map(|e| e.display_name).collect();
    assert_eq!(names, vec!["Ann", "Unknown"]);
}

#[test]
fn checkpoint_only_moves_forward() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);

    let r = poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-02 09:00:00")]), "t1").unwrap();
    assert_eq!(r.high_water, Some(t("2025-06-02 09:00:00")));

    // empty poll
    poll_device(&mut pool.conn, &MockDevice::with(&[]), "t1").unwrap();
    // punch older than the mark is filtered out
    let old = poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-01 08:00:00")]), "t1").unwrap();
    assert_eq!(old.candidates, 0);

    let store = CheckpointStore::new(&pool.conn);
    assert_eq!(store.read("device"), t("2025-06-02 09:00:00"));
}

#[test]
fn failed_fetch_releases_device_and_keeps_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);

    let mut device = MockDevice::with(&[(7, "2025-06-02 09:00:00")]);
    device.fail_fetch = true;

    assert!(poll_device(&mut pool.conn, &device, "t1").is_err());
    assert_eq!(device.released.get(), 1);
    assert!(is_epoch(&CheckpointStore::new(&pool.conn).read("device")));

    device.fail_fetch = false;
    poll_device(&mut pool.conn, &device, "t1").unwrap();
    assert_eq!(device.released.get(), 2);
}

// ---------------------------------------------------------------------------
// Cloud ingestion
// ---------------------------------------------------------------------------

#[test]
fn unmapped_cloud_employee_is_recorded_under_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    let cloud = MockCloud {
        attendance: vec![check_in("EMP-404", "2025-06-02 09:00:00")],
        ..Default::default()
    };

    let report = poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();
    assert_eq!(report.unmapped, 1);
    assert_eq!(report.inserted, 1);

    let rows = all_events(&pool);
    assert_eq!(rows[0].employee_key, UNMAPPED_KEY);
    assert_eq!(rows[0].display_name, "EMP-404");
    assert_eq!(rows[0].origin, Origin::CloudPlatform);
    assert!(rows[0].synced);
}

#[test]
fn cloud_poll_twice_inserts_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    let cloud = MockCloud {
        attendance: vec![CloudAttendance {
            employee_id: "EMP-7".into(),
            entries: vec![CloudEntry {
                check_in: Some(t("2025-06-02 09:00:00")),
                check_out: Some(t("2025-06-02 17:00:00")),
            }],
        }],
        ..Default::default()
    };

    assert_eq!(poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap().inserted, 2);
    let again = poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 2);
    assert_eq!(count_rows(&pool.conn, "raw_cloud_logs").unwrap(), 2);
    assert_eq!(
        CheckpointStore::new(&pool.conn).read("cloud"),
        t("2025-06-02 17:00:00")
    );
}

#[test]
fn unmapped_employees_at_the_same_instant_are_both_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    let cloud = MockCloud {
        attendance: vec![
            check_in("EMP-A", "2025-06-02 09:00:00"),
            check_in("EMP-B", "2025-06-02 09:00:00"),
        ],
        ..Default::default()
    };

    let report = poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();
    assert_eq!(report.unmapped, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.fenced, 1);
    assert_eq!(count_rows(&pool.conn, "attendance_logs").unwrap(), 1);
    assert_eq!(count_rows(&pool.conn, "raw_cloud_logs").unwrap(), 2);

    let employees: Vec<String> = pool
        .conn
        .prepare("SELECT cloud_employee_id FROM raw_cloud_logs ORDER BY cloud_employee_id")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(employees, vec!["EMP-A", "EMP-B"]);

    let again = poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();
    assert_eq!(again.duplicates, 2);
    assert_eq!(count_rows(&pool.conn, "raw_cloud_logs").unwrap(), 2);
}

#[test]
fn device_punch_already_reported_by_cloud_is_fenced() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    let cloud = MockCloud {
        attendance: vec![check_in("EMP-7", "2025-06-02 09:00:00")],
        ..Default::default()
    };
    poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();

    let report =
        poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-02 09:00:00")]), "t1").unwrap();
    assert_eq!(report.fenced, 1);
    assert_eq!(count_rows(&pool.conn, "attendance_logs").unwrap(), 1);

    // fenced punches are not revisited
    let again =
        poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-02 09:00:00")]), "t1").unwrap();
    assert_eq!(again.candidates, 0);
}

// ---------------------------------------------------------------------------
// Conflict resolution
// ---------------------------------------------------------------------------

#[test]
fn device_copy_within_window_is_retired() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    poll_device(
        &mut pool.conn,
        &MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-03 09:00:00")]),
        "t1",
    )
    .unwrap();
    let cloud = MockCloud {
        attendance: vec![
            check_in("EMP-7", "2025-06-02 09:00:20"),
            // 40 minutes off: a different punch
            check_in("EMP-7", "2025-06-03 09:40:00"),
        ],
        ..Default::default()
    };
    poll_cloud(&mut pool.conn, &cloud, "tok", 30).unwrap();

    let report = resolve_conflicts(&mut pool.conn, chrono::Duration::seconds(1800)).unwrap();
    assert_eq!(report.retired.len(), 1);
    assert_eq!(report.retired[0].skew_secs, 20);

    let rows = all_events(&pool);
    let summary: Vec<(String, Origin)> = rows.iter().map(|e| (e.time_str(), e.origin)).collect();
    assert_eq!(
        summary,
        vec![
            ("2025-06-02 09:00:20".to_string(), Origin::CloudPlatform),
            ("2025-06-03 09:00:00".to_string(), Origin::Device),
            ("2025-06-03 09:40:00".to_string(), Origin::CloudPlatform),
        ]
    );

    // a second pass finds nothing left to merge
    let again = resolve_conflicts(&mut pool.conn, chrono::Duration::seconds(1800)).unwrap();
    assert!(again.retired.is_empty());
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[test]
fn rows_are_pushed_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    poll_device(
        &mut pool.conn,
        &MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-02 17:00:00")]),
        "t1",
    )
    .unwrap();

    let cloud = MockCloud {
        roster: MockCloud::roster(&["EMP-7"]),
        ..Default::default()
    };

    let first = push_with_roster(&pool.conn, &cloud, "tok").unwrap();
    assert_eq!(first.pushed, 2);

    let second = push_with_roster(&pool.conn, &cloud, "tok").unwrap();
    assert_eq!(second.pending, 0);

    let pushed = cloud.pushed.borrow();
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[0].0, "EMP-7");
    assert_eq!(pushed[0].2, PunchKind::CheckIn);
    assert_eq!(pushed[1].2, PunchKind::CheckOut);
}

#[test]
fn unknown_or_rejected_rows_stay_unsynced() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-8", 8).unwrap();

    // 7 has no mapping: pushed by display name "Ann", which the roster lacks
    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00"), (8, "2025-06-02 09:05:00")]);
    poll_device(&mut pool.conn, &device, "t1").unwrap();

    let cloud = MockCloud {
        roster: MockCloud::roster(&["EMP-8", "EMP-9"]),
        reject: HashSet::from(["EMP-8".to_string()]),
        ..Default::default()
    };
    let roster = cloud.roster.clone();
    let report = push_unsynced(&pool.conn, &cloud, "tok", &roster).unwrap();
    assert_eq!(report.not_in_roster, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.pushed, 0);

    let unsynced = EventFilter {
        unsynced_only: true,
        ..Default::default()
    };
    assert_eq!(load_events(&pool.conn, &unsynced).unwrap().len(), 2);
}

#[test]
fn row_that_cannot_be_marked_synced_does_not_stop_the_push() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    let device = MockDevice::with(&[
        (7, "2025-06-02 09:00:00"),
        (7, "2025-06-02 12:00:00"),
        (7, "2025-06-02 17:00:00"),
    ]);
    poll_device(&mut pool.conn, &device, "t1").unwrap();

    let first_id = all_events(&pool)[0].id;
    pool.conn
        .execute_batch(&format!(
            "CREATE TRIGGER refuse_sync BEFORE UPDATE OF synced ON attendance_logs
             WHEN OLD.id = {first_id}
             BEGIN SELECT RAISE(ABORT, 'disk I/O'); END;"
        ))
        .unwrap();

    let cloud = MockCloud {
        roster: MockCloud::roster(&["EMP-7"]),
        ..Default::default()
    };
    let report = push_with_roster(&pool.conn, &cloud, "tok").unwrap();
    assert_eq!(report.pending, 3);
    assert_eq!(report.pushed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(cloud.pushed.borrow().len(), 3);

    let unsynced = EventFilter {
        unsynced_only: true,
        ..Default::default()
    };
    let left = load_events(&pool.conn, &unsynced).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, first_id);

    // once the ledger accepts the update the row is settled
    pool.conn.execute_batch("DROP TRIGGER refuse_sync;").unwrap();
    let retry = push_with_roster(&pool.conn, &cloud, "tok").unwrap();
    assert_eq!(retry.pending, 1);
    assert_eq!(retry.pushed, 1);
    assert!(load_events(&pool.conn, &unsynced).unwrap().is_empty());
}

#[test]
fn empty_roster_and_auth_failure_abort_the_push() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();
    poll_device(&mut pool.conn, &MockDevice::with(&[(7, "2025-06-02 09:00:00")]), "t1").unwrap();

    let empty = MockCloud::default();
    assert!(push_with_roster(&pool.conn, &empty, "tok").is_err());

    let expired = MockCloud {
        roster: MockCloud::roster(&["EMP-7"]),
        push_auth_fails: true,
        ..Default::default()
    };
    let err = push_with_roster(&pool.conn, &expired, "tok").unwrap_err();
    assert!(err.is_auth());
}

// ---------------------------------------------------------------------------
// Full cycle
// ---------------------------------------------------------------------------

fn options() -> CycleOptions {
    CycleOptions {
        device_label: "t1".into(),
        lookback_days: 30,
        conflict_window: chrono::Duration::seconds(1800),
    }
}

#[test]
fn cycle_merges_and_pushes() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-02 17:00:00")]);
    let cloud = MockCloud {
        attendance: vec![check_in("EMP-7", "2025-06-02 09:00:20")],
        roster: MockCloud::roster(&["EMP-7"]),
        ..Default::default()
    };

    let report = run_cycle(&mut pool.conn, &device, &cloud, &options());
    assert!(report.device.is_done());
    assert!(report.cloud.is_done());
    match &report.resolve {
        Step::Done(r) => assert_eq!(r.retired.len(), 1),
        other => panic!("resolve: {:?}", other),
    }
    match &report.push {
        // only the device Check-Out was still unsynced
        Step::Done(p) => assert_eq!(p.pushed, 1),
        other => panic!("push: {:?}", other),
    }
    assert_eq!(device.released.get(), 1);
}

type LedgerRow = (i64, i64, String, PunchKind, bool, Origin);

fn ledger(pool: &DbPool) -> Vec<LedgerRow> {
    all_events(pool)
        .into_iter()
        .map(|e| {
            let at = e.time_str();
            (e.id, e.employee_key, at, e.kind, e.synced, e.origin)
        })
        .collect()
}

#[test]
fn second_cycle_on_same_input_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);
    IdentityMapper::new(&pool.conn).upsert("EMP-7", 7).unwrap();

    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00"), (7, "2025-06-02 17:00:00")]);
    let cloud = MockCloud {
        attendance: vec![check_in("EMP-7", "2025-06-02 09:00:20")],
        roster: MockCloud::roster(&["EMP-7"]),
        ..Default::default()
    };

    run_cycle(&mut pool.conn, &device, &cloud, &options());
    let after_first = ledger(&pool);
    assert_eq!(after_first.len(), 2);

    let report = run_cycle(&mut pool.conn, &device, &cloud, &options());
    assert!(report.device.is_done());
    assert!(report.cloud.is_done());
    match &report.push {
        Step::Done(p) => assert_eq!(p.pending, 0),
        other => panic!("push: {:?}", other),
    }

    assert_eq!(ledger(&pool), after_first);
    assert_eq!(cloud.pushed.borrow().len(), 1);
}

#[test]
fn auth_failure_skips_cloud_steps_but_not_device() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);

    let device = MockDevice::with(&[(7, "2025-06-02 09:00:00")]);
    let cloud = MockCloud {
        auth_fails: true,
        ..Default::default()
    };

    let report = run_cycle(&mut pool.conn, &device, &cloud, &options());
    assert!(report.device.is_done());
    assert!(matches!(report.cloud, Step::Skipped(_)));
    assert!(report.resolve.is_done());
    assert!(matches!(report.push, Step::Skipped(_)));
    assert!(cloud.pushed.borrow().is_empty());
}

#[test]
fn device_failure_does_not_stop_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = open_db(&dir);

    let mut device = MockDevice::with(&[(7, "2025-06-02 09:00:00")]);
    device.fail_fetch = true;
    let cloud = MockCloud {
        attendance: vec![check_in("EMP-1", "2025-06-02 09:00:00")],
        roster: MockCloud::roster(&["EMP-1"]),
        ..Default::default()
    };

    let report = run_cycle(&mut pool.conn, &device, &cloud, &options());
    assert!(matches!(report.device, Step::Failed(_)));
    assert!(report.cloud.is_done());
    assert!(report.push.is_done());
    assert_eq!(device.released.get(), 1);
}
