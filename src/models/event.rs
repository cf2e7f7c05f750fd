use super::{origin::Origin, punch_kind::PunchKind};
use crate::utils::time::{TIMESTAMP_FMT, format_timestamp};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Canonical ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,                   // ⇔ attendance_logs.id (AUTOINCREMENT, never reused)
    pub employee_key: i64,         // ⇔ attendance_logs.employee_key (device namespace, 0 = unmapped)
    pub display_name: String,      // ⇔ attendance_logs.display_name
    pub event_time: NaiveDateTime, // ⇔ attendance_logs.event_time (TEXT "YYYY-MM-DD HH:MM:SS")
    pub kind: PunchKind,           // ⇔ attendance_logs.punch_kind (0 | 1)
    pub synced: bool,              // ⇔ attendance_logs.synced
    pub origin: Origin,            // ⇔ attendance_logs.origin ('device' | 'cloud')
    pub created_at: String,        // ⇔ attendance_logs.created_at (ISO8601)
}

impl Event {
    pub fn time_str(&self) -> String {
        self.event_time.format(TIMESTAMP_FMT).to_string()
    }
}

/// A punch as delivered by the terminal: no kind, no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPunch {
    pub employee_key: i64,
    pub event_time: NaiveDateTime,
}

impl RawPunch {
    pub fn new(employee_key: i64, event_time: NaiveDateTime) -> Self {
        Self {
            employee_key,
            event_time,
        }
    }
}

/// One employee's block in a cloud attendance payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAttendance {
    pub employee_id: String,
    pub entries: Vec<CloudEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudEntry {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
}

/// Origin-specific columns written to the raw ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDetail {
    Device { label: String },
    Cloud { cloud_employee_id: String },
}

/// An event about to go through the dedup layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub employee_key: i64,
    pub display_name: String,
    pub event_time: NaiveDateTime,
    pub kind: PunchKind,
    pub raw: RawDetail,
}

impl Candidate {
    pub fn device(
        punch: &RawPunch,
        display_name: &str,
        kind: PunchKind,
        label: &str,
    ) -> Self {
        Self {
            employee_key: punch.employee_key,
            display_name: display_name.to_string(),
            event_time: punch.event_time,
            kind,
            raw: RawDetail::Device {
                label: label.to_string(),
            },
        }
    }

    pub fn cloud(
        employee_key: i64,
        cloud_employee_id: &str,
        event_time: NaiveDateTime,
        kind: PunchKind,
    ) -> Self {
        Self {
            employee_key,
            // cloud rows are pushed back by id, so the id doubles as name
            display_name: cloud_employee_id.to_string(),
            event_time,
            kind,
            raw: RawDetail::Cloud {
                cloud_employee_id: cloud_employee_id.to_string(),
            },
        }
    }

    pub fn origin(&self) -> Origin {
        match self.raw {
            RawDetail::Device { .. } => Origin::Device,
            RawDetail::Cloud { .. } => Origin::CloudPlatform,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "User {} ({}) {} at {}",
            self.employee_key,
            self.display_name,
            self.kind.pk_as_str(),
            format_timestamp(&self.event_time)
        )
    }
}
