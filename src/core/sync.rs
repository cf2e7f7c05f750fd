//! Outbound propagation of unsynced canonical rows to the HR platform.

use crate::clients::cloud::{CloudClient, PushOutcome};
use crate::core::identity::IdentityMapper;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::event::Event;
use rusqlite::Connection;
use std::collections::BTreeSet;

pub struct SyncTracker<'c> {
    conn: &'c Connection,
}

impl<'c> SyncTracker<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// `synced = 0` rows, oldest first.
    pub fn fetch_unsynced(&self) -> AppResult<Vec<Event>> {
        queries::fetch_unsynced(self.conn)
    }

    /// Idempotent: returns false when the row was already synced (or is gone).
    pub fn mark_synced(&self, id: i64) -> AppResult<bool> {
        Ok(queries::mark_synced(self.conn, id)?)
    }

    /// Cloud-side id for a row: the reverse mapping, else the display name.
    pub fn cloud_id_for(&self, event: &Event) -> AppResult<String> {
        let mapped = IdentityMapper::new(self.conn).reverse(event.employee_key)?;
        Ok(mapped.unwrap_or_else(|| event.display_name.trim().to_string()))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub pending: usize,
    pub pushed: usize,
    pub not_in_roster: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Push every unsynced row whose employee is in `roster`.
///
/// Any per-row failure leaves the row unsynced and moves on. Only an auth
/// failure stops the batch, and it is returned.
pub fn push_unsynced(
    conn: &Connection,
    client: &dyn CloudClient,
    token: &str,
    roster: &BTreeSet<String>,
) -> AppResult<PushReport> {
    if roster.is_empty() {
        return Err(AppError::Other("empty cloud roster, push aborted".into()));
    }

    let tracker = SyncTracker::new(conn);
    let rows = tracker.fetch_unsynced()?;
    let mut report = PushReport {
        pending: rows.len(),
        ..Default::default()
    };

    for ev in &rows {
        let cloud_id = match tracker.cloud_id_for(ev) {
            Ok(id) => id,
            Err(e) => {
                report.failed += 1;
                tracing::error!(id = ev.id, error = %e, "cloud id lookup failed, skipped");
                continue;
            }
        };
        if !roster.contains(&cloud_id) {
            tracing::warn!(id = ev.id, cloud_id = %cloud_id, "employee not in cloud roster, skipped");
            report.not_in_roster += 1;
            continue;
        }

        match client.push_event(token, &cloud_id, &ev.event_time, ev.kind) {
            Ok(PushOutcome::Accepted) => match tracker.mark_synced(ev.id) {
                Ok(_) => {
                    report.pushed += 1;
                    tracing::info!(
                        id = ev.id,
                        cloud_id = %cloud_id,
                        kind = ev.kind.pk_as_str(),
                        at = %ev.time_str(),
                        "event pushed"
                    );
                }
                Err(e) => {
                    // accepted upstream; stays unsynced and goes out again next run
                    report.failed += 1;
                    tracing::error!(id = ev.id, cloud_id = %cloud_id, error = %e, "pushed but not marked synced");
                }
            },
            Ok(PushOutcome::Rejected(status, body)) => {
                report.rejected += 1;
                tracing::error!(id = ev.id, cloud_id = %cloud_id, status, body = %body, "push rejected");
            }
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                report.failed += 1;
                tracing::error!(id = ev.id, cloud_id = %cloud_id, error = %e, "push failed");
            }
        }
    }

    Ok(report)
}
