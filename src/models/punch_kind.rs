use serde::Serialize;

/// Logical status of a punch. The terminal never tells us which one it is;
/// the cloud platform always does.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum PunchKind {
    CheckIn,
    CheckOut,
}

impl PunchKind {
    pub fn pk_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "checkin" | "in" => Some(Self::CheckIn),
            "checkout" | "out" => Some(Self::CheckOut),
            _ => None,
        }
    }

    pub fn pk_as_str(&self) -> &'static str {
        match self {
            PunchKind::CheckIn => "Check-In",
            PunchKind::CheckOut => "Check-Out",
        }
    }

    /// Convert enum → DB integer (0 = in, 1 = out)
    pub fn to_db_int(&self) -> i64 {
        match self {
            PunchKind::CheckIn => 0,
            PunchKind::CheckOut => 1,
        }
    }

    /// Convert DB integer → enum
    pub fn from_db_int(v: i64) -> Option<Self> {
        match v {
            0 => Some(PunchKind::CheckIn),
            1 => Some(PunchKind::CheckOut),
            _ => None,
        }
    }

    /// Alternation step.
    pub fn flipped(&self) -> Self {
        match self {
            PunchKind::CheckIn => PunchKind::CheckOut,
            PunchKind::CheckOut => PunchKind::CheckIn,
        }
    }

    /// Kind of the punch that follows `last` (no history ⇒ CheckIn).
    pub fn next_after(last: Option<PunchKind>) -> Self {
        match last {
            Some(k) => k.flipped(),
            None => PunchKind::CheckIn,
        }
    }

    pub fn is_in(&self) -> bool {
        matches!(self, PunchKind::CheckIn)
    }
}
