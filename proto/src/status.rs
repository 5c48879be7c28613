//! Reset history as reported to status readers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confirmed restart of the JS5 cluster
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResetRecord {
    /// When the reset was observed
    pub reset_time: DateTime<Utc>,
    /// `reset_time` in whole seconds since the Unix epoch
    #[serde(rename = "last_reset_time_unix")]
    pub reset_time_unix: i64,
    /// Seconds between the previous reset and this one
    #[serde(rename = "last_server_uptime")]
    pub uptime_seconds: i64,
}

impl ResetRecord {
    /// Record standing in for history when none has been stored yet
    pub fn first(now: DateTime<Utc>) -> Self {
        Self {
            reset_time: now,
            reset_time_unix: now.timestamp(),
            uptime_seconds: 0,
        }
    }

    /// Record for a reset observed at `now`, following `self`
    pub fn following(&self, now: DateTime<Utc>) -> Self {
        let reset_time_unix = now.timestamp();
        Self {
            reset_time: now,
            reset_time_unix,
            uptime_seconds: reset_time_unix - self.reset_time_unix,
        }
    }
}
