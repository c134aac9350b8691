//! Cache service surface consumed by the transport collaborator.
//!
//! One method per inbound operation; options arrive already decoded, results
//! go back as raw JSON strings, string lists, count+list pairs, or structured
//! trees. Error-code mapping stays with the transport.

// std
use std::collections::HashMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	authority::{CustomLevelSource, DetailSource, HostSource},
	cache::{custom::CustomLevelCache, entity::EntityCache},
	config::CacheConfig,
	host::{
		HostByInnerIpOption, HostCache, HostSnapshot, ListHostsPageOption, MAX_ID_BATCH,
		SnapshotBatchOption,
	},
	key::KeySpace,
	metrics::{CacheMetrics, CacheMetricsSnapshot},
	refresh::engine::RefreshEngine,
	store::AdvisoryStore,
	topology::{
		KIND_BIZ, KIND_MODULE, KIND_SET, SearchNodePathOption, SearchTreeOption, TopologyNode,
		TopologyPathNode, TopologyView,
	},
};

/// Options for listing entities of one family by id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListWithIdOption {
	/// Entity ids to fetch.
	pub ids: Vec<i64>,
	/// Top-level detail fields to keep; empty keeps everything.
	#[serde(default)]
	pub fields: Vec<String>,
}
impl ListWithIdOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.ids.is_empty() {
			return Err(Error::InputInvalid { field: "ids", reason: "Must not be empty.".into() });
		}
		if self.ids.len() > MAX_ID_BATCH {
			return Err(Error::InputInvalid {
				field: "ids",
				reason: format!("At most {MAX_ID_BATCH} ids per request."),
			});
		}
		if self.ids.iter().any(|&id| id <= 0) {
			return Err(Error::InputInvalid {
				field: "ids",
				reason: "Every id must be positive.".into(),
			});
		}

		Ok(())
	}
}

/// Options for fetching one custom hierarchy instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomLayerOption {
	/// Object id of the hierarchy level.
	pub object_id: String,
	/// Instance id within the level.
	pub inst_id: i64,
}
impl CustomLayerOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.object_id.is_empty()
			|| matches!(self.object_id.as_str(), KIND_BIZ | KIND_SET | KIND_MODULE | "host")
		{
			return Err(Error::InputInvalid {
				field: "object_id",
				reason: "Must name a custom hierarchy level.".into(),
			});
		}

		ensure_id("inst_id", self.inst_id)
	}
}

/// Builder wiring stores, authority sources, and configuration into a
/// [`CacheService`].
#[derive(Default)]
pub struct CacheServiceBuilder {
	config: Option<CacheConfig>,
	store: Option<Arc<dyn AdvisoryStore>>,
	business_source: Option<Arc<dyn DetailSource>>,
	set_source: Option<Arc<dyn DetailSource>>,
	module_source: Option<Arc<dyn DetailSource>>,
	custom_source: Option<Arc<dyn CustomLevelSource>>,
	host_source: Option<Arc<dyn HostSource>>,
}
impl std::fmt::Debug for CacheServiceBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CacheServiceBuilder").field("config", &self.config).finish_non_exhaustive()
	}
}
impl CacheServiceBuilder {
	/// Create a builder with no wiring.
	pub fn new() -> Self {
		Self::default()
	}

	/// Override the default configuration.
	pub fn config(mut self, config: CacheConfig) -> Self {
		self.config = Some(config);

		self
	}

	/// Advisory store handle shared by every component.
	pub fn advisory_store(mut self, store: Arc<dyn AdvisoryStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Authoritative source of the business family.
	pub fn business_source(mut self, source: Arc<dyn DetailSource>) -> Self {
		self.business_source = Some(source);

		self
	}

	/// Authoritative source of the set family.
	pub fn set_source(mut self, source: Arc<dyn DetailSource>) -> Self {
		self.set_source = Some(source);

		self
	}

	/// Authoritative source of the module family.
	pub fn module_source(mut self, source: Arc<dyn DetailSource>) -> Self {
		self.module_source = Some(source);

		self
	}

	/// Authoritative source of the custom hierarchy levels.
	pub fn custom_source(mut self, source: Arc<dyn CustomLevelSource>) -> Self {
		self.custom_source = Some(source);

		self
	}

	/// Authoritative source of the host family.
	pub fn host_source(mut self, source: Arc<dyn HostSource>) -> Self {
		self.host_source = Some(source);

		self
	}

	/// Validate the wiring, spawn the refresh engine, and assemble the
	/// service.
	///
	/// Must be called within a Tokio runtime.
	pub fn build(self) -> Result<CacheService> {
		let config = self.config.unwrap_or_default();

		config.validate()?;

		let store = self.store.ok_or_else(|| missing("advisory_store"))?;
		let business_source = self.business_source.ok_or_else(|| missing("business_source"))?;
		let set_source = self.set_source.ok_or_else(|| missing("set_source"))?;
		let module_source = self.module_source.ok_or_else(|| missing("module_source"))?;
		let custom_source = self.custom_source.ok_or_else(|| missing("custom_source"))?;
		let host_source = self.host_source.ok_or_else(|| missing("host_source"))?;
		let config = Arc::new(config);
		let metrics = CacheMetrics::new();
		let engine = RefreshEngine::spawn(store.clone(), metrics.clone(), &config.engine);
		let business = EntityCache::new(
			KeySpace::biz(&config),
			store.clone(),
			engine.clone(),
			business_source,
			metrics.clone(),
		);
		let set = EntityCache::new(
			KeySpace::set(&config),
			store.clone(),
			engine.clone(),
			set_source,
			metrics.clone(),
		);
		let module = EntityCache::new(
			KeySpace::module(&config),
			store.clone(),
			engine.clone(),
			module_source,
			metrics.clone(),
		);
		let custom = CustomLevelCache::new(
			config.clone(),
			store.clone(),
			engine.clone(),
			custom_source,
			metrics.clone(),
		);
		let host_details: Arc<dyn DetailSource> = host_source.clone();
		let host_entity = EntityCache::new(
			KeySpace::host(&config),
			store.clone(),
			engine.clone(),
			host_details,
			metrics.clone(),
		);
		let host = HostCache::new(host_entity, host_source, store.clone());
		let snapshot = HostSnapshot::new(store);
		let topology = TopologyView::new(
			business.clone(),
			set.clone(),
			module.clone(),
			custom.clone(),
			config.topology_scan_cap,
		);

		Ok(CacheService { business, set, module, custom, host, snapshot, topology, metrics })
	}
}

/// The read-through cache service: every inbound operation in one place.
#[derive(Clone, Debug)]
pub struct CacheService {
	business: EntityCache,
	set: EntityCache,
	module: EntityCache,
	custom: CustomLevelCache,
	host: HostCache,
	snapshot: HostSnapshot,
	topology: TopologyView,
	metrics: Arc<CacheMetrics>,
}
impl CacheService {
	/// Create a [`CacheServiceBuilder`].
	pub fn builder() -> CacheServiceBuilder {
		CacheServiceBuilder::new()
	}

	/// Assemble the full topology tree of one business.
	pub async fn search_topology_tree(&self, opt: &SearchTreeOption) -> Result<TopologyNode> {
		self.topology.search_topology_tree(opt).await
	}

	/// Resolve a topology node's ancestor path up to its business.
	pub async fn search_topology_node_path(
		&self,
		opt: &SearchNodePathOption,
	) -> Result<Vec<TopologyPathNode>> {
		self.topology.search_node_path(opt).await
	}

	/// Fetch one host's detail document by inner ip.
	pub async fn get_host_by_inner_ip(&self, opt: &HostByInnerIpOption) -> Result<String> {
		self.host.get_by_inner_ip(opt).await
	}

	/// Fetch one host's detail document by id.
	pub async fn get_host_by_id(&self, host_id: i64) -> Result<String> {
		ensure_id("host_id", host_id)?;

		self.host.get_by_id(host_id).await
	}

	/// Fetch detail documents for many hosts.
	pub async fn list_hosts_by_ids(&self, opt: &ListWithIdOption) -> Result<Vec<String>> {
		opt.validate()?;

		self.host.list_by_ids(&opt.ids, &opt.fields).await
	}

	/// Page over hosts; returns the total count and one page of details.
	pub async fn list_hosts_paged(&self, opt: &ListHostsPageOption) -> Result<(u64, Vec<String>)> {
		self.host.list_with_page(opt).await
	}

	/// Fetch one host's telemetry snapshot; empty when absent.
	pub async fn get_host_snapshot(&self, host_id: i64) -> Result<String> {
		ensure_id("host_id", host_id)?;

		self.snapshot.get_one(host_id).await
	}

	/// Fetch telemetry snapshots for many hosts.
	pub async fn batch_get_host_snapshot(
		&self,
		opt: &SnapshotBatchOption,
	) -> Result<HashMap<i64, String>> {
		self.snapshot.get_batch(opt).await
	}

	/// Fetch detail documents for many businesses.
	pub async fn list_business_by_ids(&self, opt: &ListWithIdOption) -> Result<Vec<String>> {
		opt.validate()?;

		self.business.list_by_ids(&opt.ids, &opt.fields).await
	}

	/// Fetch detail documents for many modules.
	pub async fn list_modules_by_ids(&self, opt: &ListWithIdOption) -> Result<Vec<String>> {
		opt.validate()?;

		self.module.list_by_ids(&opt.ids, &opt.fields).await
	}

	/// Fetch detail documents for many sets.
	pub async fn list_sets_by_ids(&self, opt: &ListWithIdOption) -> Result<Vec<String>> {
		opt.validate()?;

		self.set.list_by_ids(&opt.ids, &opt.fields).await
	}

	/// Fetch one business's detail document.
	pub async fn get_business(&self, biz_id: i64) -> Result<String> {
		ensure_id("biz_id", biz_id)?;

		self.business.get_one(biz_id).await
	}

	/// Fetch one set's detail document.
	pub async fn get_set(&self, set_id: i64) -> Result<String> {
		ensure_id("set_id", set_id)?;

		self.set.get_one(set_id).await
	}

	/// Fetch one module's detail document.
	pub async fn get_module(&self, module_id: i64) -> Result<String> {
		ensure_id("module_id", module_id)?;

		self.module.get_one(module_id).await
	}

	/// Fetch one custom hierarchy instance's detail document.
	pub async fn get_custom_layer(&self, opt: &CustomLayerOption) -> Result<String> {
		opt.validate()?;

		self.custom.level(&opt.object_id).get_one(opt.inst_id).await
	}

	/// Business family cache, exposed for the change-stream collaborator.
	pub fn business_cache(&self) -> &EntityCache {
		&self.business
	}

	/// Set family cache, exposed for the change-stream collaborator.
	pub fn set_cache(&self) -> &EntityCache {
		&self.set
	}

	/// Module family cache, exposed for the change-stream collaborator.
	pub fn module_cache(&self) -> &EntityCache {
		&self.module
	}

	/// Custom-level cache, exposed for the change-stream collaborator.
	pub fn custom_cache(&self) -> &CustomLevelCache {
		&self.custom
	}

	/// Host cache, exposed for the change-stream collaborator.
	pub fn host_cache(&self) -> &HostCache {
		&self.host
	}

	/// Point-in-time telemetry counters.
	pub fn metrics(&self) -> CacheMetricsSnapshot {
		self.metrics.snapshot()
	}
}

fn ensure_id(field: &'static str, id: i64) -> Result<()> {
	if id <= 0 {
		return Err(Error::InputInvalid { field, reason: "Must be a positive id.".into() });
	}

	Ok(())
}

fn missing(field: &'static str) -> Error {
	Error::InputInvalid { field, reason: "Must be supplied before build.".into() }
}
