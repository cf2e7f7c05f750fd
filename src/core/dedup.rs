//! Existence fences and the atomic canonical + raw write.
//!
//! Device punches fence on (employee, time): their kind is only inferred.
//! Cloud entries fence on (employee, time, kind) in the canonical ledger and
//! on (cloud employee id, time, kind) in the raw one, so unmapped employees
//! sharing key 0 each keep a raw row.
//! Check and writes share one IMMEDIATE transaction, so two pollers can never
//! both pass the check; the UNIQUE constraints catch anything that slips by.

use crate::db::queries::{
    exists_in_canonical, exists_in_raw_cloud, exists_in_raw_cloud_for, exists_in_raw_device,
    insert_event, insert_raw,
};
use crate::errors::{AppError, AppResult, is_constraint_violation};
use crate::models::event::{Candidate, RawDetail};
use crate::models::origin::Origin;
use crate::models::punch_kind::PunchKind;
use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Written to both ledgers; carries the canonical id.
    Inserted(i64),
    /// Event already represented in the canonical ledger (a cloud row at the
    /// same instant, or another unmapped employee under key 0): only the raw
    /// ledger was written, so re-polls skip it.
    Fenced,
    /// Already absorbed; nothing written.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Insert,
    FenceOnly,
    Skip,
}

fn decide(
    conn: &Connection,
    employee_key: i64,
    event_time: &NaiveDateTime,
    origin: Origin,
    kind: Option<PunchKind>,
    cloud_employee_id: Option<&str>,
) -> AppResult<Decision> {
    match origin {
        Origin::Device => {
            if exists_in_raw_device(conn, employee_key, event_time)? {
                Ok(Decision::Skip)
            } else if exists_in_canonical(conn, employee_key, event_time, None)? {
                Ok(Decision::FenceOnly)
            } else {
                Ok(Decision::Insert)
            }
        }
        Origin::CloudPlatform => {
            let kind = kind.ok_or_else(|| {
                AppError::InvalidPunchKind("cloud events must carry a punch kind".into())
            })?;
            let in_raw = match cloud_employee_id {
                Some(id) => exists_in_raw_cloud_for(conn, id, event_time, kind)?,
                None => exists_in_raw_cloud(conn, employee_key, event_time, kind)?,
            };
            if in_raw {
                Ok(Decision::Skip)
            } else if exists_in_canonical(conn, employee_key, event_time, Some(kind))? {
                Ok(Decision::FenceOnly)
            } else {
                Ok(Decision::Insert)
            }
        }
    }
}

/// Read-only fence: would this event be written to the canonical ledger?
pub fn should_insert(
    conn: &Connection,
    employee_key: i64,
    event_time: &NaiveDateTime,
    origin: Origin,
    kind: Option<PunchKind>,
) -> AppResult<bool> {
    Ok(decide(conn, employee_key, event_time, origin, kind, None)? == Decision::Insert)
}

/// Fence + write in one transaction. A UNIQUE violation means another
/// writer got there first: rolled back and reported as `Duplicate`.
/// A cloud entry whose canonical row collides (two unmapped employees at one
/// instant) still gets its raw row and is reported as `Fenced`.
pub fn absorb(conn: &mut Connection, c: &Candidate) -> AppResult<InsertOutcome> {
    let origin = c.origin();
    let cloud_employee_id = match &c.raw {
        RawDetail::Cloud { cloud_employee_id } => Some(cloud_employee_id.as_str()),
        RawDetail::Device { .. } => None,
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let decision = decide(
        &tx,
        c.employee_key,
        &c.event_time,
        origin,
        Some(c.kind),
        cloud_employee_id,
    )?;

    let written = match decision {
        Decision::Skip => return Ok(InsertOutcome::Duplicate),
        Decision::FenceOnly => insert_raw(&tx, c).map(|_| InsertOutcome::Fenced),
        Decision::Insert => insert_event(&tx, c)
            .and_then(|id| insert_raw(&tx, c).map(|_| InsertOutcome::Inserted(id))),
    };

    match written {
        Ok(outcome) => {
            tx.commit()?;
            Ok(outcome)
        }
        Err(e) if is_constraint_violation(&e) => {
            // rolls back the partial write
            drop(tx);
            let violation = AppError::DataIntegrityViolation(e.to_string());
            tracing::debug!(
                employee_key = c.employee_key,
                origin = origin.to_db_str(),
                error = %violation,
                "canonical row already present"
            );
            if cloud_employee_id.is_some() && decision == Decision::Insert {
                return fence_raw_only(conn, c);
            }
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

fn fence_raw_only(conn: &mut Connection, c: &Candidate) -> AppResult<InsertOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match insert_raw(&tx, c) {
        Ok(()) => {
            tx.commit()?;
            Ok(InsertOutcome::Fenced)
        }
        Err(e) if is_constraint_violation(&e) => Ok(InsertOutcome::Duplicate),
        Err(e) => Err(e.into()),
    }
}
