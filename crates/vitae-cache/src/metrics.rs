//! Metrics and reporting for blob cache operations.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Blob cache metrics (thread-safe counters, shared by clone).
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Reads served from the local cache
    pub hits: Arc<AtomicU64>,
    /// Reads that found nothing usable locally
    pub misses: Arc<AtomicU64>,
    /// Blobs fetched from the aggregator
    pub downloads: Arc<AtomicU64>,
    /// Entries removed to stay within the byte budget
    pub evictions: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.downloads.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub downloads: u64,
    pub evictions: u64,
}

impl MetricsSnapshot {
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served locally.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Blob Cache Report".to_string());
        lines.push("=".repeat(40));
        lines.push(format!("  Hits:            {}", self.hits));
        lines.push(format!("  Misses:          {}", self.misses));
        lines.push(format!("  Downloads:       {}", self.downloads));
        lines.push(format!("  Evictions:       {}", self.evictions));
        lines.push(format!("  Hit Rate:        {:.1}%", self.hit_rate() * 100.0));
        lines.join("\n")
    }
}
