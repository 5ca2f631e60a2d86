//! Point-in-time pool counters

use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of a [`ConnectionPool`](super::ConnectionPool)
///
/// `max_size` is the configured cap on connections handed out at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    idle: usize,
    active: usize,
    /// Callers blocked in `get`
    waiting: usize,
    max_size: usize,
}

impl PoolStats {
    pub(crate) fn new(idle: usize, active: usize, waiting: usize, max_size: usize) -> Self {
        Self {
            idle,
            active,
            waiting,
            max_size,
        }
    }

    /// Open connections owned by the pool, idle or handed out
    pub fn total(&self) -> usize {
        self.idle + self.active
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Connections `get` can still hand out before callers start waiting
    pub fn available(&self) -> usize {
        self.max_size.saturating_sub(self.active)
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} active, {} idle, {} waiting",
            self.active, self.max_size, self.idle, self.waiting
        )
    }
}
