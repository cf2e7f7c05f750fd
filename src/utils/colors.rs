/// ANSI color helper utilities for terminal output.
use crate::models::punch_kind::PunchKind;

pub const RESET: &str = "\x1b[0m";

pub const GREY: &str = "\x1b[90m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check-In → green, Check-Out → red
pub fn color_for_kind(kind: PunchKind) -> &'static str {
    match kind {
        PunchKind::CheckIn => GREEN,
        PunchKind::CheckOut => RED,
    }
}

/// "yes" in green once pushed, "no" in yellow while pending.
pub fn colorize_synced(synced: bool) -> String {
    if synced {
        format!("{GREEN}yes{RESET}")
    } else {
        format!("{YELLOW}no{RESET}")
    }
}

/// Unmapped employees (key 0) are greyed out.
pub fn colorize_employee(key: i64, width: usize) -> String {
    if key == 0 {
        format!("{GREY}{:>width$}{RESET}", key, width = width)
    } else {
        format!("{:>width$}", key, width = width)
    }
}
