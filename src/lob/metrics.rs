use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how LOBs of one session used temporary files.
#[derive(Default, Debug)]
pub struct LobMetrics {
    files_created: AtomicU64,
    files_released: AtomicU64,
    promotions: AtomicU64,
    demotions: AtomicU64,
}

/// Snapshot of [`LobMetrics`] at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LobMetricsSnapshot {
    /// Temporary files created, including replacement files.
    pub files_created: u64,
    /// Temporary files closed and deleted.
    pub files_released: u64,
    /// Memory to file transitions.
    pub promotions: u64,
    /// File to memory transitions.
    pub demotions: u64,
}

impl LobMetricsSnapshot {
    /// Returns the number of temporary files still open.
    pub fn live_files(&self) -> i64 {
        self.files_created as i64 - self.files_released as i64
    }
}

impl LobMetrics {
    /// Creates a snapshot of the current counters.
    pub fn snapshot(&self) -> LobMetricsSnapshot {
        LobMetricsSnapshot {
            files_created: self.files_created.load(Ordering::Relaxed),
            files_released: self.files_released.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_file_created(&self) {
        self.files_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_released(&self) {
        self.files_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }
}
