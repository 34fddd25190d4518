//! Frame timestamps: accepted either as milliseconds or a wall-clock instant.
//!
//! Both representations must round-trip through [`Timestamp::to_date`]. An
//! `Instant` carries no epoch of its own, so the first time one is observed
//! we anchor it against a `SystemTime` snapshot and use that anchor to
//! convert any `Instant` back to calendar time.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

static ANCHOR: OnceLock<(Instant, SystemTime)> = OnceLock::new();

fn anchor() -> (Instant, SystemTime) {
    *ANCHOR.get_or_init(|| (Instant::now(), SystemTime::now()))
}

/// A frame's timestamp, in whichever form the caller had on hand.
#[derive(Debug, Clone, Copy)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch.
    Millis(u64),
    /// A wall-clock instant, converted to epoch millis via the process anchor.
    Instant(Instant),
}

impl Timestamp {
    /// Stamp the current wall-clock time.
    pub fn now() -> Self {
        Timestamp::Instant(Instant::now())
    }

    /// Construct from epoch milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Timestamp::Millis(ms)
    }

    /// Convert to epoch milliseconds.
    pub fn to_millis(&self) -> u64 {
        match self {
            Timestamp::Millis(ms) => *ms,
            Timestamp::Instant(instant) => {
                let (anchor_instant, anchor_system) = anchor();
                let system_time = if *instant >= anchor_instant {
                    anchor_system + (*instant - anchor_instant)
                } else {
                    anchor_system - (anchor_instant - *instant)
                };
                system_time
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64
            }
        }
    }

    /// Convert to a calendar date-time, for logging and round-trip checks.
    pub fn to_date(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.to_millis() as i64).unwrap_or_else(Utc::now)
    }
}
