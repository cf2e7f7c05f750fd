//! One reconciliation cycle: device poll → cloud poll → resolve → push.
//!
//! Polls are critical: a failure is logged and the cycle continues.
//! Resolve is optional: a failure stops the cycle before the push.
//! An authentication failure skips every cloud step of this invocation.

use crate::clients::cloud::CloudClient;
use crate::clients::device::DeviceClient;
use crate::core::conflict::{ResolveReport, resolve_conflicts};
use crate::core::ingest::{PollReport, poll_cloud, poll_device};
use crate::core::sync::{PushReport, push_unsynced};
use crate::db::log::ttlog_or_warn;
use crate::errors::{AppError, AppResult};
use chrono::Duration;
use rusqlite::Connection;

#[derive(Debug)]
pub enum Step<T> {
    Done(T),
    Failed(String),
    Skipped(String),
}

impl<T> Step<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }

    fn from_result(name: &str, r: AppResult<T>) -> Self {
        match r {
            Ok(v) => Step::Done(v),
            Err(e) => {
                tracing::error!(
                    step = name,
                    transient = e.is_transient(),
                    error = %e,
                    "step failed"
                );
                Step::Failed(e.to_string())
            }
        }
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub device: Step<PollReport>,
    pub cloud: Step<PollReport>,
    pub resolve: Step<ResolveReport>,
    pub push: Step<PushReport>,
}

#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub device_label: String,
    pub lookback_days: i64,
    pub conflict_window: Duration,
}

pub fn run_cycle(
    conn: &mut Connection,
    device: &dyn DeviceClient,
    cloud: &dyn CloudClient,
    opts: &CycleOptions,
) -> CycleReport {
    tracing::info!("running: device poll");
    let device_step = Step::from_result(
        "poll_device",
        poll_device(conn, device, &opts.device_label),
    );

    tracing::info!("running: cloud poll");
    let token = cloud.get_access_token();
    let (cloud_step, token) = match token {
        Ok(token) => {
            let r = poll_cloud(conn, cloud, &token, opts.lookback_days);
            let auth_failed = matches!(&r, Err(e) if e.is_auth());
            let step = Step::from_result("poll_cloud", r);
            (step, if auth_failed { None } else { Some(token) })
        }
        Err(e) => {
            let step = if e.is_auth() {
                tracing::error!(error = %e, "authentication failed, cloud steps skipped");
                Step::Skipped(format!("authentication failed: {}", e))
            } else {
                Step::<PollReport>::from_result("poll_cloud", Err(e))
            };
            (step, None)
        }
    };

    tracing::info!("running: resolve");
    let resolve_step = Step::from_result("resolve", resolve_conflicts(conn, opts.conflict_window));
    if !resolve_step.is_done() {
        tracing::warn!("resolve failed, stopping the cycle");
        return finish(conn, CycleReport {
            device: device_step,
            cloud: cloud_step,
            resolve: resolve_step,
            push: Step::Skipped("resolve failed".into()),
        });
    }

    let push_step = match token {
        None => Step::Skipped("no cloud access token".into()),
        Some(token) => {
            tracing::info!("running: push");
            Step::from_result("push", push_with_roster(conn, cloud, &token))
        }
    };

    finish(conn, CycleReport {
        device: device_step,
        cloud: cloud_step,
        resolve: resolve_step,
        push: push_step,
    })
}

/// Roster snapshot, then push. Shared by `run` and `push`.
pub fn push_with_roster(
    conn: &Connection,
    cloud: &dyn CloudClient,
    token: &str,
) -> AppResult<PushReport> {
    let roster = cloud.fetch_roster(token)?;
    if roster.is_empty() {
        return Err(AppError::Other("no employees fetched from cloud, push aborted".into()));
    }
    let report = push_unsynced(conn, cloud, token, &roster)?;
    ttlog_or_warn(
        conn,
        "push",
        "cloud",
        &format!(
            "pending {}, pushed {}, not in roster {}, rejected {}, failed {}",
            report.pending, report.pushed, report.not_in_roster, report.rejected, report.failed
        ),
    );
    Ok(report)
}

fn finish(conn: &Connection, report: CycleReport) -> CycleReport {
    let label = |done: bool| if done { "ok" } else { "not ok" };
    ttlog_or_warn(
        conn,
        "run",
        "cycle",
        &format!(
            "device {}, cloud {}, resolve {}, push {}",
            label(report.device.is_done()),
            label(report.cloud.is_done()),
            label(report.resolve.is_done()),
            label(report.push.is_done()),
        ),
    );
    report
}
