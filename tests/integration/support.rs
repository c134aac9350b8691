//! Mock authority sources and a service harness over the in-process store.

// std
use std::{
	collections::HashMap,
	future::Future,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use async_trait::async_trait;
use cmdb_cache::{
	CacheService, Error, Result,
	authority::{BaseTuple, CustomLevelSource, DetailSource, HostSource},
	config::CacheConfig,
	host::ListHostsPageOption,
	store::{AdvisoryStore, MemoryStore, StoreError, StoreResult},
};
use serde_json::{Value, json};

/// Authoritative fixture for one entity family, with call counting.
#[derive(Default)]
pub struct MockSource {
	resource: &'static str,
	details: Mutex<HashMap<i64, String>>,
	base: Mutex<HashMap<i64, Vec<BaseTuple>>>,
	detail_loads: AtomicUsize,
	batch_requests: Mutex<Vec<Vec<i64>>>,
	base_loads: AtomicUsize,
}
impl MockSource {
	pub fn new(resource: &'static str) -> Arc<Self> {
		Arc::new(Self { resource, ..Self::default() })
	}

	/// Register an entity; its base tuple joins the list keyed by `biz_id`.
	pub fn insert(&self, id: i64, name: &str, biz_id: i64, parent_id: Option<i64>) {
		let mut detail = json!({ "id": id, "name": name, "biz_id": biz_id });

		if let Some(parent_id) = parent_id {
			detail["parent_id"] = json!(parent_id);
		}

		self.insert_raw(id, &detail.to_string());
		self.base
			.lock()
			.unwrap()
			.entry(biz_id)
			.or_default()
			.push(BaseTuple { id, name: name.to_owned() });
	}

	/// Register a raw detail document without touching any base list.
	pub fn insert_raw(&self, id: i64, detail: &str) {
		self.details.lock().unwrap().insert(id, detail.to_owned());
	}

	pub fn detail_loads(&self) -> usize {
		self.detail_loads.load(Ordering::SeqCst)
	}

	pub fn batch_requests(&self) -> Vec<Vec<i64>> {
		self.batch_requests.lock().unwrap().clone()
	}

	pub fn base_loads(&self) -> usize {
		self.base_loads.load(Ordering::SeqCst)
	}

	fn detail(&self, id: i64) -> Result<String> {
		self.details
			.lock()
			.unwrap()
			.get(&id)
			.cloned()
			.ok_or(Error::NotFound { resource: self.resource, id: id.to_string() })
	}
}
#[async_trait]
impl DetailSource for MockSource {
	async fn load_detail(&self, id: i64) -> Result<String> {
		self.detail_loads.fetch_add(1, Ordering::SeqCst);

		self.detail(id)
	}

	async fn load_details(&self, ids: &[i64], fields: &[String]) -> Result<Vec<String>> {
		self.batch_requests.lock().unwrap().push(ids.to_vec());

		let details = self.details.lock().unwrap();
		let mut loaded = Vec::new();

		for id in ids {
			if let Some(detail) = details.get(id) {
				loaded.push(project(detail, fields));
			}
		}

		Ok(loaded)
	}

	async fn load_base_list(&self, biz_id: i64) -> Result<Vec<BaseTuple>> {
		self.base_loads.fetch_add(1, Ordering::SeqCst);

		Ok(self.base.lock().unwrap().get(&biz_id).cloned().unwrap_or_default())
	}
}

/// Authoritative fixture for custom hierarchy levels plus the rank.
#[derive(Default)]
pub struct MockCustomSource {
	levels: Mutex<HashMap<String, Arc<MockSource>>>,
	rank: Mutex<Vec<String>>,
}
impl MockCustomSource {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn set_rank(&self, rank: &[&str]) {
		*self.rank.lock().unwrap() = rank.iter().map(|level| (*level).to_owned()).collect();
	}

	pub fn level(&self, object_id: &str) -> Arc<MockSource> {
		self.levels
			.lock()
			.unwrap()
			.entry(object_id.to_owned())
			.or_insert_with(|| MockSource::new("custom"))
			.clone()
	}
}
#[async_trait]
impl CustomLevelSource for MockCustomSource {
	fn level_source(&self, object_id: &str) -> Arc<dyn DetailSource> {
		self.level(object_id)
	}

	async fn load_rank(&self) -> Result<Vec<String>> {
		Ok(self.rank.lock().unwrap().clone())
	}
}

/// Authoritative fixture for hosts: detail loads plus ip lookup and paging.
#[derive(Default)]
pub struct MockHostSource {
	inner: MockSource,
	by_ip: Mutex<HashMap<(i64, String), i64>>,
}
impl MockHostSource {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { inner: MockSource { resource: "host", ..MockSource::default() }, ..Self::default() })
	}

	pub fn insert(&self, id: i64, name: &str, biz_id: i64) {
		self.inner.insert(id, name, biz_id, None);
	}

	pub fn bind_ip(&self, cloud_id: i64, ip: &str, host_id: i64) {
		self.by_ip.lock().unwrap().insert((cloud_id, ip.to_owned()), host_id);
	}

	pub fn detail_loads(&self) -> usize {
		self.inner.detail_loads()
	}
}
#[async_trait]
impl DetailSource for MockHostSource {
	async fn load_detail(&self, id: i64) -> Result<String> {
		self.inner.load_detail(id).await
	}

	async fn load_details(&self, ids: &[i64], fields: &[String]) -> Result<Vec<String>> {
		self.inner.load_details(ids, fields).await
	}

	async fn load_base_list(&self, biz_id: i64) -> Result<Vec<BaseTuple>> {
		self.inner.load_base_list(biz_id).await
	}
}
#[async_trait]
impl HostSource for MockHostSource {
	async fn host_by_inner_ip(&self, cloud_id: i64, ip: &str) -> Result<String> {
		let host_id = self
			.by_ip
			.lock()
			.unwrap()
			.get(&(cloud_id, ip.to_owned()))
			.copied()
			.ok_or(Error::NotFound { resource: "host", id: ip.to_owned() })?;

		self.inner.detail(host_id)
	}

	async fn list_host_page(&self, opt: &ListHostsPageOption) -> Result<(u64, Vec<i64>)> {
		let mut ids: Vec<i64> = self.inner.details.lock().unwrap().keys().copied().collect();

		ids.sort_unstable();

		let count = ids.len() as u64;
		let page = ids
			.into_iter()
			.skip(opt.page.start as usize)
			.take(opt.page.limit as usize)
			.collect();

		Ok((count, page))
	}
}

/// Advisory store wrapper with an injectable outage.
pub struct FlakyStore {
	inner: Arc<MemoryStore>,
	broken: AtomicBool,
}
impl FlakyStore {
	pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
		Arc::new(Self { inner, broken: AtomicBool::new(false) })
	}

	pub fn set_broken(&self, broken: bool) {
		self.broken.store(broken, Ordering::SeqCst);
	}

	fn check(&self) -> StoreResult<()> {
		if self.broken.load(Ordering::SeqCst) {
			return Err(StoreError::Backend("injected outage".into()));
		}

		Ok(())
	}
}
#[async_trait]
impl AdvisoryStore for FlakyStore {
	async fn get(&self, key: &str) -> StoreResult<Option<String>> {
		self.check()?;
		self.inner.get(key).await
	}

	async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
		self.check()?;
		self.inner.mget(keys).await
	}

	async fn exists(&self, key: &str) -> StoreResult<bool> {
		self.check()?;
		self.inner.exists(key).await
	}

	async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
		self.check()?;
		self.inner.set(key, value, ttl).await
	}

	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
		self.check()?;
		self.inner.set_nx(key, value, ttl).await
	}

	async fn del(&self, key: &str) -> StoreResult<()> {
		self.check()?;
		self.inner.del(key).await
	}

	async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
		self.check()?;
		self.inner.del_if_eq(key, expected).await
	}
}

/// Fully wired service over mock sources and a [`MemoryStore`].
pub struct Harness {
	pub config: CacheConfig,
	pub store: Arc<MemoryStore>,
	pub flaky: Arc<FlakyStore>,
	pub service: CacheService,
	pub business: Arc<MockSource>,
	pub set: Arc<MockSource>,
	pub module: Arc<MockSource>,
	pub custom: Arc<MockCustomSource>,
	pub host: Arc<MockHostSource>,
}

pub fn harness() -> Harness {
	harness_with(CacheConfig::default())
}

pub fn harness_with(config: CacheConfig) -> Harness {
	let _ = tracing_subscriber::fmt::try_init();

	let store = MemoryStore::new();
	let flaky = FlakyStore::new(store.clone());
	let business = MockSource::new("business");
	let set = MockSource::new("set");
	let module = MockSource::new("module");
	let custom = MockCustomSource::new();
	let host = MockHostSource::new();
	let service = CacheService::builder()
		.config(config.clone())
		.advisory_store(flaky.clone())
		.business_source(business.clone())
		.set_source(set.clone())
		.module_source(module.clone())
		.custom_source(custom.clone())
		.host_source(host.clone())
		.build()
		.expect("harness wiring is complete");

	Harness { config, store, flaky, service, business, set, module, custom, host }
}

/// Poll an async condition until it holds, or fail the test.
pub async fn wait_for<F, Fut>(what: &str, condition: F)
where
	F: Fn() -> Fut,
	Fut: Future<Output = bool>,
{
	for _ in 0..100 {
		if condition().await {
			return;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	panic!("timed out waiting for {what}");
}

/// Give the background workers a moment to drain the queue.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(50)).await;
}

fn project(detail: &str, fields: &[String]) -> String {
	if fields.is_empty() {
		return detail.to_owned();
	}

	let value: Value = serde_json::from_str(detail).expect("fixture details are valid JSON");
	let mut projected = serde_json::Map::new();

	if let Value::Object(object) = value {
		for (key, value) in object {
			if fields.contains(&key) {
				projected.insert(key, value);
			}
		}
	}

	Value::Object(projected).to_string()
}
