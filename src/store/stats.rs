//! Store statistics: an ambient, non-spec read-only snapshot useful for
//! operators and demos, not part of the store's public API.

use std::fmt;

use crate::store::index::SnapshotInfo;

/// A point-in-time snapshot of database size and shape.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub num_keys: usize,
    pub num_segments: usize,
    pub total_bytes: u64,
    pub active_segment_id: u64,
    pub oldest_segment_id: u64,
}

impl StoreStats {
    pub(crate) fn from_snapshot(snapshot: SnapshotInfo, total_bytes: u64) -> Self {
        StoreStats {
            num_keys: snapshot.num_keys,
            num_segments: snapshot.num_segments,
            total_bytes,
            active_segment_id: snapshot.active_segment_id,
            oldest_segment_id: snapshot.oldest_segment_id,
        }
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn total_kb(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Keys: {}", self.num_keys)?;
        writeln!(f, "  Segments: {}", self.num_segments)?;
        writeln!(f, "  Total size: {:.2} MB", self.total_mb())?;
        writeln!(f, "  Active segment: {}", self.active_segment_id)?;
        write!(f, "  Oldest segment: {}", self.oldest_segment_id)
    }
}
