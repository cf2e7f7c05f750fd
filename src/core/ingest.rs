//! Poll pipelines: pull from a source, infer/resolve, absorb, advance checkpoint.

use crate::clients::cloud::CloudClient;
use crate::clients::device::{DeviceClient, SessionGuard};
use crate::core::checkpoint::CheckpointStore;
use crate::core::dedup::{InsertOutcome, absorb};
use crate::core::identity::{IdentityMapper, UNMAPPED_KEY};
use crate::core::status::infer_batch;
use crate::db::log::ttlog_or_warn;
use crate::db::queries::exists_in_raw_device;
use crate::errors::AppResult;
use crate::models::event::Candidate;
use crate::models::origin::Origin;
use crate::models::punch_kind::PunchKind;
use crate::utils::time::{format_timestamp, is_epoch, now_local};
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Punches delivered by the source.
    pub fetched: usize,
    /// Punches that survived the checkpoint / raw-ledger filter.
    pub candidates: usize,
    pub inserted: usize,
    pub fenced: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Cloud employees with no device mapping (recorded under key 0).
    pub unmapped: usize,
    /// Checkpoint after the poll.
    pub high_water: Option<NaiveDateTime>,
}

impl PollReport {
    pub fn summary(&self) -> String {
        format!(
            "fetched {}, new {}, inserted {}, fenced {}, duplicates {}, failed {}, unmapped {}",
            self.fetched,
            self.candidates,
            self.inserted,
            self.fenced,
            self.duplicates,
            self.failed,
            self.unmapped
        )
    }
}

/// Highest absorbed time strictly before the earliest failure, so a failed
/// event is always re-fetched by the next poll.
pub fn advance_target(results: &[(NaiveDateTime, bool)]) -> Option<NaiveDateTime> {
    let first_failure = results.iter().filter(|(_, ok)| !ok).map(|(t, _)| *t).min();

    results
        .iter()
        .filter(|(t, ok)| *ok && first_failure.is_none_or(|f| *t < f))
        .map(|(t, _)| *t)
        .max()
}

fn absorb_all(
    conn: &mut Connection,
    candidates: Vec<Candidate>,
    report: &mut PollReport,
) -> Vec<(NaiveDateTime, bool)> {
    let mut results = Vec::with_capacity(candidates.len());

    for c in candidates {
        match absorb(conn, &c) {
            Ok(InsertOutcome::Inserted(id)) => {
                report.inserted += 1;
                tracing::info!(id, "inserted: {}", c.describe());
                results.push((c.event_time, true));
            }
            Ok(InsertOutcome::Fenced) => {
                report.fenced += 1;
                tracing::debug!("already in ledger, raw row recorded: {}", c.describe());
                results.push((c.event_time, true));
            }
            Ok(InsertOutcome::Duplicate) => {
                report.duplicates += 1;
                results.push((c.event_time, true));
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!(error = %e, "insert failed: {}", c.describe());
                results.push((c.event_time, false));
            }
        }
    }

    results
}

fn advance_checkpoint(
    conn: &Connection,
    origin: Origin,
    results: &[(NaiveDateTime, bool)],
    report: &mut PollReport,
) {
    let store = CheckpointStore::new(conn);
    let source = origin.checkpoint_source();

    if let Some(target) = advance_target(results) {
        match store.write(source, &target) {
            Ok(hw) => report.high_water = Some(hw),
            Err(e) => {
                // events are stored; the next poll re-scans and dedup absorbs them
                tracing::warn!(source, error = %e, "checkpoint write failed");
            }
        }
    }

    if report.high_water.is_none() {
        report.high_water = store.try_read(source).ok().flatten();
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

pub fn poll_device(
    conn: &mut Connection,
    device: &dyn DeviceClient,
    label: &str,
) -> AppResult<PollReport> {
    let checkpoint = CheckpointStore::new(conn).read(Origin::Device.checkpoint_source());

    let mut session = SessionGuard::new(device.connect()?);
    let roster = session.fetch_roster()?;
    let punches = session.fetch_punches()?;
    if let Err(e) = session.release() {
        tracing::warn!(error = %e, "device release failed");
    }

    let mut report = PollReport {
        fetched: punches.len(),
        ..Default::default()
    };

    let mut fresh = Vec::new();
    for p in punches {
        if p.event_time <= checkpoint {
            continue;
        }
        if exists_in_raw_device(conn, p.employee_key, &p.event_time)? {
            continue;
        }
        fresh.push(p);
    }
    report.candidates = fresh.len();

    let seed: &Connection = &*conn;
    let candidates: Vec<Candidate> = infer_batch(seed, fresh)?
        .into_iter()
        .map(|(p, kind)| {
            let name = roster
                .get(&p.employee_key)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_NAME);
            Candidate::device(&p, name, kind, label)
        })
        .collect();

    let results = absorb_all(conn, candidates, &mut report);
    advance_checkpoint(conn, Origin::Device, &results, &mut report);

    tracing::info!(
        since = %format_timestamp(&checkpoint),
        "device poll: {}",
        report.summary()
    );
    ttlog_or_warn(conn, "poll_device", label, &report.summary());
    Ok(report)
}

// ---------------------------------------------------------------------------
// Cloud
// ---------------------------------------------------------------------------

/// Start of the cloud fetch window.
pub fn cloud_since(checkpoint: NaiveDateTime, lookback_days: i64) -> NaiveDateTime {
    if is_epoch(&checkpoint) {
        now_local() - Duration::days(lookback_days)
    } else {
        checkpoint
    }
}

pub fn poll_cloud(
    conn: &mut Connection,
    cloud: &dyn CloudClient,
    token: &str,
    lookback_days: i64,
) -> AppResult<PollReport> {
    let checkpoint = CheckpointStore::new(conn).read(Origin::CloudPlatform.checkpoint_source());
    let since = cloud_since(checkpoint, lookback_days);

    let attendance = cloud.fetch_attendance(token, &since)?;

    let mut report = PollReport::default();
    let mut candidates = Vec::new();
    {
        let mapper = IdentityMapper::new(conn);
        for emp in &attendance {
            let key = mapper.resolve(&emp.employee_id);
            if key == UNMAPPED_KEY {
                report.unmapped += 1;
                tracing::warn!(
                    cloud_employee_id = %emp.employee_id,
                    "no device mapping, recording under key 0"
                );
            }

            for entry in &emp.entries {
                let halves = [
                    (entry.check_in, PunchKind::CheckIn),
                    (entry.check_out, PunchKind::CheckOut),
                ];
                for (time, kind) in halves {
                    if let Some(t) = time {
                        candidates.push(Candidate::cloud(key, &emp.employee_id, t, kind));
                    }
                }
            }
        }
    }
    // day-granular window: re-delivered entries are left to the dedup fence
    report.fetched = candidates.len();
    report.candidates = candidates.len();

    let results = absorb_all(conn, candidates, &mut report);
    advance_checkpoint(conn, Origin::CloudPlatform, &results, &mut report);

    tracing::info!(since = %format_timestamp(&since), "cloud poll: {}", report.summary());
    ttlog_or_warn(conn, "poll_cloud", "cloud", &report.summary());
    Ok(report)
}
