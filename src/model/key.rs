//! Historian key

use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite record key ordered by timestamp, then point identifier.
///
/// Field order matters: the derived `Ord` compares `timestamp` first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistorianKey {
    /// Tick count (100ns units in the historian's clock)
    pub timestamp: u64,
    /// Measurement point identifier
    pub point_id: u64,
}

impl HistorianKey {
    /// Smallest possible key
    pub const MIN: HistorianKey = HistorianKey {
        timestamp: 0,
        point_id: 0,
    };

    /// Largest possible key
    pub const MAX: HistorianKey = HistorianKey {
        timestamp: u64::MAX,
        point_id: u64::MAX,
    };

    pub fn new(timestamp: u64, point_id: u64) -> Self {
        Self {
            timestamp,
            point_id,
        }
    }

    /// First key at the given timestamp
    pub fn lower_bound(timestamp: u64) -> Self {
        Self::new(timestamp, 0)
    }

    /// Last key at the given timestamp
    pub fn upper_bound(timestamp: u64) -> Self {
        Self::new(timestamp, u64::MAX)
    }
}

impl fmt::Display for HistorianKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.timestamp, self.point_id)
    }
}
