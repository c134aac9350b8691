//! Host cache operations and point-in-time host snapshots.

// std
use std::collections::HashMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	authority::HostSource,
	cache::entity::EntityCache,
	key,
	store::AdvisoryStore,
};

/// Upper bound on ids accepted by one batch operation.
pub const MAX_ID_BATCH: usize = 500;
/// Upper bound on one page of host results.
pub const MAX_PAGE_LIMIT: u64 = 500;

/// Options for resolving a host by its inner ip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostByInnerIpOption {
	/// Inner ip of the host.
	pub ip: String,
	/// Cloud area the ip belongs to.
	pub cloud_id: i64,
}
impl HostByInnerIpOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.ip.is_empty() {
			return Err(Error::InputInvalid { field: "ip", reason: "Must not be empty.".into() });
		}
		if self.cloud_id < 0 {
			return Err(Error::InputInvalid {
				field: "cloud_id",
				reason: "Must not be negative.".into(),
			});
		}

		Ok(())
	}
}

/// Paging window of a host listing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Page {
	/// Offset of the first returned host.
	#[serde(default)]
	pub start: u64,
	/// Number of hosts to return.
	pub limit: u64,
}

/// Options for paging over hosts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListHostsPageOption {
	/// Restrict the listing to one business when set.
	#[serde(default)]
	pub biz_id: Option<i64>,
	/// Paging window.
	pub page: Page,
	/// Top-level detail fields to keep; empty keeps everything.
	#[serde(default)]
	pub fields: Vec<String>,
}
impl ListHostsPageOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.page.limit == 0 || self.page.limit > MAX_PAGE_LIMIT {
			return Err(Error::InputInvalid {
				field: "page.limit",
				reason: format!("Must be between 1 and {MAX_PAGE_LIMIT}."),
			});
		}
		if let Some(biz_id) = self.biz_id
			&& biz_id <= 0
		{
			return Err(Error::InputInvalid {
				field: "biz_id",
				reason: "Must be a positive business id.".into(),
			});
		}

		Ok(())
	}
}

/// Options for fetching host snapshots in batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotBatchOption {
	/// Hosts to fetch snapshots for; may be empty.
	pub host_ids: Vec<i64>,
}
impl SnapshotBatchOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.host_ids.len() > MAX_ID_BATCH {
			return Err(Error::InputInvalid {
				field: "host_ids",
				reason: format!("At most {MAX_ID_BATCH} ids per batch."),
			});
		}

		Ok(())
	}
}

/// Read-through host cache.
///
/// Detail reads share the common entity shapes; the inner-ip relation and the
/// paged listing are host-specific.
#[derive(Clone)]
pub struct HostCache {
	cache: EntityCache,
	source: Arc<dyn HostSource>,
	store: Arc<dyn AdvisoryStore>,
}
impl std::fmt::Debug for HostCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HostCache").finish_non_exhaustive()
	}
}
impl HostCache {
	/// Assemble the host cache.
	pub fn new(
		cache: EntityCache,
		source: Arc<dyn HostSource>,
		store: Arc<dyn AdvisoryStore>,
	) -> Self {
		Self { cache, source, store }
	}

	/// Underlying entity cache, also the change-stream application surface.
	pub fn cache(&self) -> &EntityCache {
		&self.cache
	}

	/// Fetch one host's detail document by id.
	pub async fn get_by_id(&self, host_id: i64) -> Result<String> {
		self.cache.get_one(host_id).await
	}

	/// Fetch one host's detail document by inner ip.
	///
	/// The ip → id relation is advisory; any gap degrades to the authoritative
	/// ip lookup.
	#[tracing::instrument(skip(self, opt), fields(ip = %opt.ip, cloud_id = opt.cloud_id))]
	pub async fn get_by_inner_ip(&self, opt: &HostByInnerIpOption) -> Result<String> {
		opt.validate()?;

		let relation_key = key::host_ip_key(opt.cloud_id, &opt.ip);

		match self.store.get(&relation_key).await {
			Ok(Some(raw)) => match raw.parse::<i64>() {
				Ok(host_id) => return self.cache.get_one(host_id).await,
				Err(_) => {
					tracing::warn!(key = %relation_key, "ip relation record is malformed; falling back to authority");
				},
			},
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(key = %relation_key, error = %err, "ip relation read failed; falling back to authority");
			},
		}

		self.source.host_by_inner_ip(opt.cloud_id, &opt.ip).await
	}

	/// Fetch detail documents for many hosts; order is not preserved and
	/// unknown hosts are omitted.
	pub async fn list_by_ids(&self, ids: &[i64], fields: &[String]) -> Result<Vec<String>> {
		self.cache.list_by_ids(ids, fields).await
	}

	/// Page over hosts: the authoritative store drives counting and paging,
	/// the cache only hydrates details.
	#[tracing::instrument(skip(self, opt), fields(start = opt.page.start, limit = opt.page.limit))]
	pub async fn list_with_page(&self, opt: &ListHostsPageOption) -> Result<(u64, Vec<String>)> {
		opt.validate()?;

		let (count, ids) = self.source.list_host_page(opt).await?;

		if ids.is_empty() {
			return Ok((count, Vec::new()));
		}

		let details = self.cache.list_by_ids(&ids, &opt.fields).await?;

		Ok((count, details))
	}
}

/// Point-in-time host telemetry served directly from the advisory store.
///
/// There is no authoritative fallback: a missing snapshot is an empty string,
/// a store failure surfaces as [`Error::Snapshot`].
#[derive(Clone)]
pub struct HostSnapshot {
	store: Arc<dyn AdvisoryStore>,
}
impl std::fmt::Debug for HostSnapshot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HostSnapshot").finish_non_exhaustive()
	}
}
impl HostSnapshot {
	/// Wrap an advisory store handle.
	pub fn new(store: Arc<dyn AdvisoryStore>) -> Self {
		Self { store }
	}

	/// Fetch one host's snapshot payload; empty when absent.
	pub async fn get_one(&self, host_id: i64) -> Result<String> {
		match self.store.get(&key::snapshot_key(host_id)).await {
			Ok(snapshot) => Ok(snapshot.unwrap_or_default()),
			Err(err) => {
				tracing::warn!(host_id, error = %err, "host snapshot read failed");

				Err(Error::Snapshot(err.to_string()))
			},
		}
	}

	/// Fetch snapshots for many hosts; every miss materializes as an empty
	/// string so the mapping always covers the requested ids.
	pub async fn get_batch(&self, opt: &SnapshotBatchOption) -> Result<HashMap<i64, String>> {
		opt.validate()?;

		if opt.host_ids.is_empty() {
			return Ok(HashMap::new());
		}

		let keys: Vec<String> = opt.host_ids.iter().map(|&id| key::snapshot_key(id)).collect();
		let values = match self.store.mget(&keys).await {
			Ok(values) => values,
			Err(err) => {
				tracing::warn!(error = %err, "host snapshot batch read failed");

				return Err(Error::Snapshot(err.to_string()));
			},
		};
		let snapshots = opt
			.host_ids
			.iter()
			.zip(values)
			.map(|(&id, value)| (id, value.unwrap_or_default()))
			.collect();

		Ok(snapshots)
	}
}
