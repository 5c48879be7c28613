use std::sync::Arc;

use arc_swap::ArcSwapOption;
use js5watch_proto::ResetRecord;

/// Most recent reset, shared between the monitor and status readers.
///
/// Records are replaced whole, never modified, so a reader always sees a complete record.
#[derive(Clone)]
pub struct LastReset(Arc<ArcSwapOption<ResetRecord>>);

impl LastReset {
    pub fn new() -> Self {
        Self(Arc::new(ArcSwapOption::empty()))
    }

    /// Snapshot of the latest record, or `None` before the monitor has loaded history
    pub fn get(&self) -> Option<Arc<ResetRecord>> {
        self.0.load_full()
    }

    pub fn publish(&self, record: ResetRecord) {
        self.0.store(Some(Arc::new(record)));
    }
}

impl Default for LastReset {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn readers_keep_superseded_snapshot() {
        let cell = LastReset::new();
        assert!(cell.get().is_none());
        let first = ResetRecord::first(Utc.timestamp_opt(1_000, 0).unwrap());
        cell.publish(first.clone());
        let held = cell.get().unwrap();
        cell.publish(first.following(Utc.timestamp_opt(5_000, 0).unwrap()));
        assert_eq!(*held, first);
        assert_eq!(cell.clone().get().unwrap().uptime_seconds, 4_000);
    }
}
