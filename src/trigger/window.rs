//! Rolling timestamp windows
//!
//! Rate and error-count triggers look back over the recent record stream.
//! A [`RollingWindow`] keeps the host timestamps of those records, sorted,
//! and is pruned to the engine's retention period on every evaluation.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Convert fractional seconds to a chrono duration (microsecond precision)
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

/// Sorted queue of timestamps
#[derive(Debug, Clone, Default)]
pub struct RollingWindow {
    stamps: VecDeque<DateTime<Utc>>,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a timestamp, keeping the queue sorted
    pub fn push(&mut self, ts: DateTime<Utc>) {
        match self.stamps.back() {
            Some(last) if ts < *last => {
                let idx = self.stamps.partition_point(|s| *s <= ts);
                self.stamps.insert(idx, ts);
            }
            _ => self.stamps.push_back(ts),
        }
    }

    /// Drop every timestamp strictly older than `cutoff`
    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.stamps.front().is_some_and(|s| *s < cutoff) {
            self.stamps.pop_front();
        }
    }

    /// Number of timestamps at or after `start`
    pub fn count_since(&self, start: DateTime<Utc>) -> usize {
        self.stamps.len() - self.stamps.partition_point(|s| *s < start)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}
