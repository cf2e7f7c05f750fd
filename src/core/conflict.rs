//! Cross-source conflict resolution.
//!
//! A device row and a cloud row for the same employee and kind, at most
//! `window` apart, describe one physical punch: the device copy is retired.
//!
//! Matching is greedy and one-to-one. Device rows are visited by ascending
//! id; for each, the employee's cloud rows are tried by ascending id and the
//! first unused one within the window wins. Not a globally optimal matching:
//! with three or more candidates the survivors depend on this scan order.

use crate::db::log::ttlog_or_warn;
use crate::db::queries::{delete_event, load_by_origin};
use crate::errors::AppResult;
use crate::models::event::Event;
use crate::models::origin::Origin;
use chrono::Duration;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;

pub const DEFAULT_WINDOW_SECS: i64 = 1800;

/// A device row retired in favour of a cloud row.
#[derive(Debug, Clone)]
pub struct Retirement {
    pub device: Event,
    pub cloud_id: i64,
    pub skew_secs: i64,
}

#[derive(Debug, Default)]
pub struct ResolveReport {
    pub device_rows: usize,
    pub cloud_rows: usize,
    pub retired: Vec<Retirement>,
}

/// Pure planning step. Inputs must be in ledger (id) order.
pub fn plan_retirements(device: &[Event], cloud: &[Event], window: Duration) -> Vec<Retirement> {
    // employee → indexes into `cloud`, id order preserved
    let mut by_employee: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, z) in cloud.iter().enumerate() {
        by_employee.entry(z.employee_key).or_default().push(i);
    }

    let mut cloud_used = vec![false; cloud.len()];
    let mut out = Vec::new();

    for d in device {
        let Some(candidates) = by_employee.get(&d.employee_key) else {
            continue;
        };

        for &ci in candidates {
            if cloud_used[ci] {
                continue;
            }
            let z = &cloud[ci];
            if z.kind != d.kind {
                continue;
            }

            let skew = z.event_time - d.event_time;
            if skew.abs() <= window {
                cloud_used[ci] = true;
                out.push(Retirement {
                    device: d.clone(),
                    cloud_id: z.id,
                    skew_secs: skew.num_seconds(),
                });
                break;
            }
        }
    }

    out
}

/// Load both origins, plan, and delete the retired device rows in one
/// transaction.
pub fn resolve_conflicts(conn: &mut Connection, window: Duration) -> AppResult<ResolveReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let device = load_by_origin(&tx, Origin::Device)?;
    let cloud = load_by_origin(&tx, Origin::CloudPlatform)?;
    let retired = plan_retirements(&device, &cloud, window);

    for r in &retired {
        delete_event(&tx, r.device.id)?;
        tracing::info!(
            device_id = r.device.id,
            cloud_id = r.cloud_id,
            employee_key = r.device.employee_key,
            kind = r.device.kind.pk_as_str(),
            skew_secs = r.skew_secs,
            "retired device row in favour of cloud row"
        );
    }

    tx.commit()?;

    ttlog_or_warn(
        conn,
        "resolve",
        "attendance_logs",
        &format!(
            "retired {} of {} device rows ({} cloud rows)",
            retired.len(),
            device.len(),
            cloud.len()
        ),
    );

    Ok(ResolveReport {
        device_rows: device.len(),
        cloud_rows: cloud.len(),
        retired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::punch_kind::PunchKind;
    use crate::utils::time::parse_timestamp;

    fn ev(id: i64, emp: i64, at: &str, kind: PunchKind, origin: Origin) -> Event {
        Event {
            id,
            employee_key: emp,
            display_name: String::new(),
            event_time: parse_timestamp(at).unwrap(),
            kind,
            synced: origin.initially_synced(),
            origin,
            created_at: String::new(),
        }
    }

    fn window() -> Duration {
        Duration::seconds(DEFAULT_WINDOW_SECS)
    }

    #[test]
    fn twenty_seconds_apart_is_one_punch() {
        let d = vec![ev(1, 5, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::Device)];
        let z = vec![ev(2, 5, "2025-06-02 09:00:20", PunchKind::CheckIn, Origin::CloudPlatform)];

        let plan = plan_retirements(&d, &z, window());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].device.id, 1);
        assert_eq!(plan[0].cloud_id, 2);
        assert_eq!(plan[0].skew_secs, 20);
    }

    #[test]
    fn beyond_window_both_survive() {
        let d = vec![ev(1, 5, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::Device)];
        let z = vec![ev(2, 5, "2025-06-02 09:30:01", PunchKind::CheckIn, Origin::CloudPlatform)];
        assert!(plan_retirements(&d, &z, window()).is_empty());
    }

    #[test]
    fn window_edge_is_inclusive() {
        let d = vec![ev(1, 5, "2025-06-02 09:30:00", PunchKind::CheckIn, Origin::Device)];
        let z = vec![ev(2, 5, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::CloudPlatform)];
        assert_eq!(plan_retirements(&d, &z, window()).len(), 1);
    }

    #[test]
    fn kind_and_employee_must_match() {
        let d = vec![
            ev(1, 5, "2025-06-02 09:00:00", PunchKind::CheckOut, Origin::Device),
            ev(2, 6, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::Device),
        ];
        let z = vec![ev(3, 5, "2025-06-02 09:00:05", PunchKind::CheckIn, Origin::CloudPlatform)];
        assert!(plan_retirements(&d, &z, window()).is_empty());
    }

    #[test]
    fn cloud_row_is_used_once_first_device_row_wins() {
        let d = vec![
            ev(1, 5, "2025-06-02 09:10:00", PunchKind::CheckIn, Origin::Device),
            ev(2, 5, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::Device),
        ];
        let z = vec![ev(3, 5, "2025-06-02 09:01:00", PunchKind::CheckIn, Origin::CloudPlatform)];

        let plan = plan_retirements(&d, &z, window());
        // id 2 is closer, but id 1 is scanned first
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].device.id, 1);
    }

    #[test]
    fn second_cloud_row_takes_second_device_row() {
        let d = vec![
            ev(1, 5, "2025-06-02 09:00:00", PunchKind::CheckIn, Origin::Device),
            ev(2, 5, "2025-06-02 09:05:00", PunchKind::CheckIn, Origin::Device),
        ];
        let z = vec![
            ev(3, 5, "2025-06-02 09:04:00", PunchKind::CheckIn, Origin::CloudPlatform),
            ev(4, 5, "2025-06-02 09:01:00", PunchKind::CheckIn, Origin::CloudPlatform),
        ];

        let plan = plan_retirements(&d, &z, window());
        let pairs: Vec<(i64, i64)> = plan.iter().map(|r| (r.device.id, r.cloud_id)).collect();
        assert_eq!(pairs, vec![(1, 3), (2, 4)]);
    }
}
