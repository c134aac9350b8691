//! Deterministic naming of cache records.
//!
//! Each entity kind owns a key namespace; detail, list, lock, and soft-expiry
//! records are distinguished by suffixes. Key shapes are stable within a
//! deployment but carry no compatibility promise across deployments.

// self
use crate::{
	_prelude::*,
	config::{CacheConfig, KindTtl},
};

const NAMESPACE: &str = "cmdb:cache";

/// Fixed prefix of host snapshot records, written by the snapshot collector.
pub const SNAPSHOT_PREFIX: &str = "cmdb:snapshot:host";

/// Key of a host telemetry snapshot.
pub fn snapshot_key(host_id: i64) -> String {
	format!("{SNAPSHOT_PREFIX}:{host_id}")
}

/// Key of the inner-ip to host-id relation, maintained by the event
/// collaborator.
pub fn host_ip_key(cloud_id: i64, ip: &str) -> String {
	format!("{NAMESPACE}:host:ip:{cloud_id}:{ip}")
}

/// Key of the topology-rank record listing custom level object ids in order.
pub fn topology_rank_key() -> String {
	format!("{NAMESPACE}:topology:rank")
}

/// Lock key paired with the topology-rank record.
pub fn topology_rank_lock_key() -> String {
	format!("{NAMESPACE}:topology:rank_lock")
}

/// Soft-expiry key paired with the topology-rank record.
pub fn topology_rank_expire_key() -> String {
	format!("{NAMESPACE}:topology:rank_expire")
}

/// Key builders and freshness windows for one entity kind.
///
/// Pure functions over the configured namespace; custom hierarchy levels get
/// one key space per object id.
#[derive(Clone, Debug)]
pub struct KeySpace {
	namespace: Arc<str>,
	detail_expire: Duration,
	list_expire: Duration,
	payload_ttl_factor: u32,
	expire_jitter: Duration,
}
impl KeySpace {
	/// Key space of the business kind.
	pub fn biz(config: &CacheConfig) -> Self {
		Self::with_namespace(format!("{NAMESPACE}:biz"), config.biz, config)
	}

	/// Key space of the set kind.
	pub fn set(config: &CacheConfig) -> Self {
		Self::with_namespace(format!("{NAMESPACE}:set"), config.set, config)
	}

	/// Key space of the module kind.
	pub fn module(config: &CacheConfig) -> Self {
		Self::with_namespace(format!("{NAMESPACE}:module"), config.module, config)
	}

	/// Key space of the host kind.
	pub fn host(config: &CacheConfig) -> Self {
		Self::with_namespace(format!("{NAMESPACE}:host"), config.host, config)
	}

	/// Key space of one custom hierarchy level.
	pub fn custom(object_id: &str, config: &CacheConfig) -> Self {
		Self::with_namespace(format!("{NAMESPACE}:custom:{object_id}"), config.custom, config)
	}

	fn with_namespace(namespace: String, ttl: KindTtl, config: &CacheConfig) -> Self {
		Self {
			namespace: Arc::from(namespace),
			detail_expire: ttl.detail_expire,
			list_expire: ttl.list_expire,
			payload_ttl_factor: config.payload_ttl_factor,
			expire_jitter: config.expire_jitter,
		}
	}

	/// Key of an entity's detail record.
	pub fn detail_key(&self, id: i64) -> String {
		format!("{}:detail:{id}", self.namespace)
	}

	/// Lock key paired with an entity's detail record.
	pub fn detail_lock_key(&self, id: i64) -> String {
		format!("{}:detail_lock:{id}", self.namespace)
	}

	/// Soft-expiry key paired with an entity's detail record.
	pub fn detail_expire_key(&self, id: i64) -> String {
		format!("{}:detail_expire:{id}", self.namespace)
	}

	/// Key of the per-business list record; the business kind itself uses the
	/// global list under business id 0.
	pub fn list_key(&self, biz_id: i64) -> String {
		format!("{}:list:{biz_id}", self.namespace)
	}

	/// Lock key paired with a per-business list record.
	pub fn list_lock_key(&self, biz_id: i64) -> String {
		format!("{}:list_lock:{biz_id}", self.namespace)
	}

	/// Soft-expiry key paired with a per-business list record.
	pub fn list_expire_key(&self, biz_id: i64) -> String {
		format!("{}:list_expire:{biz_id}", self.namespace)
	}

	/// Soft-freshness window of detail records.
	pub fn detail_expire(&self) -> Duration {
		self.detail_expire
	}

	/// Soft-freshness window of list records.
	pub fn list_expire(&self) -> Duration {
		self.list_expire
	}

	/// Payload TTL of detail records; longer than the soft window so stale
	/// content stays readable while refresh runs.
	pub fn detail_payload_ttl(&self) -> Duration {
		self.detail_expire * self.payload_ttl_factor
	}

	/// Payload TTL of list records.
	pub fn list_payload_ttl(&self) -> Duration {
		self.list_expire * self.payload_ttl_factor
	}

	/// Maximum random jitter subtracted from soft-expiry marker TTLs.
	pub fn expire_jitter(&self) -> Duration {
		self.expire_jitter
	}
}
