use portable_atomic::{AtomicU64, Ordering};

/// A point-in-time view of an allocator's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocatorStats {
    /// Segments successfully reserved from the counter store.
    pub reloads: u64,
    /// Reload attempts that failed and were retried.
    pub failed_reloads: u64,
    /// Identifiers currently waiting in the buffer.
    pub buffered: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

impl Counters {
    pub(crate) fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, buffered: usize) -> AllocatorStats {
        AllocatorStats {
            reloads: self.reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
            buffered,
        }
    }
}
