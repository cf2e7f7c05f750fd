//! Check-In / Check-Out inference by alternation.
//!
//! The terminal reports only "employee X punched at T". Each employee's kind
//! toggles from the last known one; the first punch of a batch is seeded
//! from the ledger (no history ⇒ Check-In). Pure alternation: a double tap
//! yields a Check-Out one second after the Check-In.

use crate::db::queries::last_kind_for;
use crate::errors::AppResult;
use crate::models::event::RawPunch;
use crate::models::punch_kind::PunchKind;
use rusqlite::Connection;
use std::collections::HashMap;

/// Where the tracker finds an employee's most recent kind.
pub trait LastKindSource {
    fn last_kind(&self, employee_key: i64) -> AppResult<Option<PunchKind>>;
}

impl LastKindSource for Connection {
    fn last_kind(&self, employee_key: i64) -> AppResult<Option<PunchKind>> {
        Ok(last_kind_for(self, employee_key)?)
    }
}

impl LastKindSource for HashMap<i64, PunchKind> {
    fn last_kind(&self, employee_key: i64) -> AppResult<Option<PunchKind>> {
        Ok(self.get(&employee_key).copied())
    }
}

/// Per-batch memory of the last assigned kind. Never persisted.
pub struct StatusTracker<'s, S: LastKindSource + ?Sized> {
    seed: &'s S,
    last: HashMap<i64, PunchKind>,
}

impl<'s, S: LastKindSource + ?Sized> StatusTracker<'s, S> {
    pub fn new(seed: &'s S) -> Self {
        Self {
            seed,
            last: HashMap::new(),
        }
    }

    /// Kind for the employee's next punch; the seed is consulted once.
    pub fn assign(&mut self, employee_key: i64) -> AppResult<PunchKind> {
        let previous = match self.last.get(&employee_key) {
            Some(k) => Some(*k),
            None => self.seed.last_kind(employee_key)?,
        };
        let kind = PunchKind::next_after(previous);
        self.last.insert(employee_key, kind);
        Ok(kind)
    }
}

/// Sort by (employee, time) and assign kinds. The sort is stable, so equal
/// timestamps for one employee keep their delivery order.
/// A seed lookup failure aborts the whole batch.
pub fn infer_batch<S: LastKindSource + ?Sized>(
    seed: &S,
    mut punches: Vec<RawPunch>,
) -> AppResult<Vec<(RawPunch, PunchKind)>> {
    punches.sort_by(|a, b| {
        a.employee_key
            .cmp(&b.employee_key)
            .then(a.event_time.cmp(&b.event_time))
    });

    let mut tracker = StatusTracker::new(seed);
    let mut out = Vec::with_capacity(punches.len());
    for p in punches {
        let kind = tracker.assign(p.employee_key)?;
        out.push((p, kind));
    }
    Ok(out)
}
