//! Trigger latency statistics.

/// O(1) round-trip latency statistics.
///
/// Updated per trigger with no allocation. Provides min/max/avg for
/// request-to-response latency reporting.
#[derive(Debug, Clone)]
pub struct TriggerStats {
    /// Total completed round trips.
    pub count: u64,
    /// Last round-trip latency [ns].
    pub last_ns: u64,
    /// Minimum round-trip latency [ns].
    pub min_ns: u64,
    /// Maximum round-trip latency [ns].
    pub max_ns: u64,
    /// Running sum for average computation.
    pub sum_ns: u64,
    /// Triggers that hit their deadline instead of completing.
    pub timeouts: u64,
}

impl TriggerStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            count: 0,
            last_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            timeouts: 0,
        }
    }

    /// Record a completed round trip. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, latency_ns: u64) {
        self.count += 1;
        self.last_ns = latency_ns;
        if latency_ns < self.min_ns {
            self.min_ns = latency_ns;
        }
        if latency_ns > self.max_ns {
            self.max_ns = latency_ns;
        }
        self.sum_ns += latency_ns;
    }

    /// Record a trigger that timed out.
    #[inline]
    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    /// Average round-trip latency [ns] (returns 0 if nothing recorded).
    #[inline]
    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum_ns / self.count
        }
    }
}

impl Default for TriggerStats {
    fn default() -> Self {
        Self::new()
    }
}
