//! Cache configuration and validation.
//!
//! Every component receives its knobs from a [`CacheConfig`] at construction;
//! there is no process-wide configuration state.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Default soft-freshness window for detail records.
pub const DEFAULT_DETAIL_EXPIRE: Duration = Duration::from_secs(10 * 60);
/// Default soft-freshness window for list records.
pub const DEFAULT_LIST_EXPIRE: Duration = Duration::from_secs(20 * 60);
/// Default multiplier applied to the soft window to derive the payload TTL.
pub const DEFAULT_PAYLOAD_TTL_FACTOR: u32 = 3;
/// Default jitter subtracted from soft-expiry TTLs to decorrelate refreshes.
pub const DEFAULT_EXPIRE_JITTER: Duration = Duration::from_secs(30);
/// Default upper bound on nodes visited while assembling a topology tree.
pub const DEFAULT_TOPOLOGY_SCAN_CAP: u64 = 10_000;
/// Default number of background refresh workers.
pub const DEFAULT_REFRESH_WORKERS: usize = 8;
/// Default depth of the refresh proposal queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1_024;
/// Default hard deadline for one refresh cycle; doubles as the distributed
/// lock TTL.
pub const DEFAULT_REFRESH_DEADLINE: Duration = Duration::from_secs(30);

/// Soft-freshness windows declared by one entity kind.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct KindTtl {
	/// Soft-expiry marker TTL for detail records of this kind.
	#[serde(default = "default_detail_expire")]
	pub detail_expire: Duration,
	/// Soft-expiry marker TTL for list records of this kind.
	#[serde(default = "default_list_expire")]
	pub list_expire: Duration,
}
impl Default for KindTtl {
	fn default() -> Self {
		Self { detail_expire: DEFAULT_DETAIL_EXPIRE, list_expire: DEFAULT_LIST_EXPIRE }
	}
}

/// Background refresh engine sizing and deadlines.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Number of worker tasks draining the refresh queue.
	#[serde(default = "default_workers")]
	pub workers: usize,
	/// Bounded capacity of the refresh proposal queue.
	#[serde(default = "default_queue_depth")]
	pub queue_depth: usize,
	/// Hard deadline for one refresh cycle and TTL of the distributed lock.
	#[serde(default = "default_refresh_deadline")]
	pub refresh_deadline: Duration,
}
impl EngineConfig {
	/// Validate engine sizing against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.workers == 0 || self.workers > 64 {
			return Err(Error::InputInvalid {
				field: "engine.workers",
				reason: "Must be between 1 and 64.".into(),
			});
		}
		if self.queue_depth < self.workers {
			return Err(Error::InputInvalid {
				field: "engine.queue_depth",
				reason: "Must be at least the worker count.".into(),
			});
		}
		if self.refresh_deadline < Duration::from_secs(1) {
			return Err(Error::InputInvalid {
				field: "engine.refresh_deadline",
				reason: "Must be at least 1 second.".into(),
			});
		}

		Ok(())
	}
}
impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			workers: DEFAULT_REFRESH_WORKERS,
			queue_depth: DEFAULT_QUEUE_DEPTH,
			refresh_deadline: DEFAULT_REFRESH_DEADLINE,
		}
	}
}

/// Top-level configuration for the cache service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
	/// Freshness windows for the business kind.
	#[serde(default)]
	pub biz: KindTtl,
	/// Freshness windows for the set kind.
	#[serde(default)]
	pub set: KindTtl,
	/// Freshness windows for the module kind.
	#[serde(default)]
	pub module: KindTtl,
	/// Freshness windows shared by every custom hierarchy level.
	#[serde(default)]
	pub custom: KindTtl,
	/// Freshness windows for the host kind.
	#[serde(default)]
	pub host: KindTtl,
	/// Multiplier applied to a soft window to derive the payload TTL, so
	/// stale-but-usable content outlives its freshness marker.
	#[serde(default = "default_payload_ttl_factor")]
	pub payload_ttl_factor: u32,
	/// Maximum random jitter subtracted from soft-expiry TTLs.
	#[serde(default = "default_expire_jitter")]
	pub expire_jitter: Duration,
	/// Upper bound on nodes visited while assembling one topology tree.
	#[serde(default = "default_topology_scan_cap")]
	pub topology_scan_cap: u64,
	/// Refresh engine sizing.
	#[serde(default)]
	pub engine: EngineConfig,
}
impl CacheConfig {
	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if !(2..=5).contains(&self.payload_ttl_factor) {
			return Err(Error::InputInvalid {
				field: "payload_ttl_factor",
				reason: "Must be between 2 and 5.".into(),
			});
		}
		if self.topology_scan_cap == 0 {
			return Err(Error::InputInvalid {
				field: "topology_scan_cap",
				reason: "Must be greater than zero.".into(),
			});
		}

		for (field, ttl) in [
			("biz", &self.biz),
			("set", &self.set),
			("module", &self.module),
			("custom", &self.custom),
			("host", &self.host),
		] {
			if ttl.detail_expire.is_zero() || ttl.list_expire.is_zero() {
				return Err(Error::InputInvalid {
					field: "kind_ttl",
					reason: format!("Freshness windows for '{field}' must be greater than zero."),
				});
			}
			if self.expire_jitter >= ttl.detail_expire || self.expire_jitter >= ttl.list_expire {
				return Err(Error::InputInvalid {
					field: "expire_jitter",
					reason: format!("Must be smaller than every freshness window ('{field}' is not)."),
				});
			}
		}

		self.engine.validate()
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			biz: KindTtl::default(),
			set: KindTtl::default(),
			module: KindTtl::default(),
			custom: KindTtl::default(),
			host: KindTtl::default(),
			payload_ttl_factor: DEFAULT_PAYLOAD_TTL_FACTOR,
			expire_jitter: DEFAULT_EXPIRE_JITTER,
			topology_scan_cap: DEFAULT_TOPOLOGY_SCAN_CAP,
			engine: EngineConfig::default(),
		}
	}
}

fn default_detail_expire() -> Duration {
	DEFAULT_DETAIL_EXPIRE
}

fn default_list_expire() -> Duration {
	DEFAULT_LIST_EXPIRE
}

fn default_payload_ttl_factor() -> u32 {
	DEFAULT_PAYLOAD_TTL_FACTOR
}

fn default_expire_jitter() -> Duration {
	DEFAULT_EXPIRE_JITTER
}

fn default_topology_scan_cap() -> u64 {
	DEFAULT_TOPOLOGY_SCAN_CAP
}

fn default_workers() -> usize {
	DEFAULT_REFRESH_WORKERS
}

fn default_queue_depth() -> usize {
	DEFAULT_QUEUE_DEPTH
}

fn default_refresh_deadline() -> Duration {
	DEFAULT_REFRESH_DEADLINE
}
