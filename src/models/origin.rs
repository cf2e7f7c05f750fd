use serde::Serialize;

/// Upstream system that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    Device,
    CloudPlatform,
}

impl Origin {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Origin::Device => "device",
            Origin::CloudPlatform => "cloud",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "device" => Some(Origin::Device),
            "cloud" => Some(Origin::CloudPlatform),
            _ => None,
        }
    }

    /// Checkpoint key used by the poller of this origin.
    pub fn checkpoint_source(&self) -> &'static str {
        self.to_db_str()
    }

    /// Device rows still need pushing; cloud rows are already authoritative.
    pub fn initially_synced(&self) -> bool {
        matches!(self, Origin::CloudPlatform)
    }
}
