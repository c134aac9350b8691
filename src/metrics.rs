//! Cache telemetry bookkeeping.
//!
//! Metrics export is owned by the service lifecycle collaborator; this module
//! only accumulates counters and hands out point-in-time snapshots.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use chrono::{DateTime, Utc};
// self
use crate::_prelude::*;

/// Thread-safe metrics accumulator shared across the cache components.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	cache_hits: AtomicU64,
	authority_fallbacks: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
}
impl CacheMetrics {
	/// Create a new shared metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record reads served from the advisory store.
	pub fn record_hits(&self, count: u64) {
		self.cache_hits.fetch_add(count, Ordering::Relaxed);
	}

	/// Record reads that fell back to the authoritative store.
	pub fn record_fallbacks(&self, count: u64) {
		self.authority_fallbacks.fetch_add(count, Ordering::Relaxed);
	}

	/// Record a completed refresh cycle.
	pub fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a refresh cycle that failed to load or write.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> CacheMetricsSnapshot {
		CacheMetricsSnapshot {
			captured_at: Utc::now(),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			authority_fallbacks: self.authority_fallbacks.load(Ordering::Relaxed),
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of the cache telemetry counters.
#[derive(Clone, Copy, Debug)]
pub struct CacheMetricsSnapshot {
	/// Wall-clock timestamp of the capture.
	pub captured_at: DateTime<Utc>,
	/// Count of reads served from the advisory store.
	pub cache_hits: u64,
	/// Count of reads that fell back to the authoritative store.
	pub authority_fallbacks: u64,
	/// Count of completed refresh cycles.
	pub refresh_successes: u64,
	/// Count of refresh cycles that failed.
	pub refresh_errors: u64,
}
impl CacheMetricsSnapshot {
	/// Ratio of advisory-store hits over all reads.
	pub fn hit_rate(&self) -> f64 {
		let total = self.cache_hits + self.authority_fallbacks;

		if total == 0 { 0.0 } else { self.cache_hits as f64 / total as f64 }
	}
}
