//! Read-through cache for one entity family.

// self
use crate::{
	_prelude::*,
	authority::{BaseTuple, DetailSource},
	cache::project::project_fields,
	key::KeySpace,
	metrics::CacheMetrics,
	refresh::engine::{RefreshEngine, RefreshSpec},
	store::{AdvisoryStore, StoreError, StoreResult},
};

/// Read-through cache over one entity family (business, set, module, one
/// custom level, or host).
///
/// Every read fires a non-blocking refresh proposal, then serves from the
/// advisory store; any miss or store error degrades to a synchronous
/// authoritative load. The reader path never writes the cache; the scheduled
/// refresh covers it.
#[derive(Clone)]
pub struct EntityCache {
	keys: KeySpace,
	store: Arc<dyn AdvisoryStore>,
	engine: Arc<RefreshEngine>,
	source: Arc<dyn DetailSource>,
	metrics: Arc<CacheMetrics>,
}
impl std::fmt::Debug for EntityCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EntityCache").field("keys", &self.keys).finish_non_exhaustive()
	}
}
impl EntityCache {
	/// Assemble a cache for one entity family.
	pub fn new(
		keys: KeySpace,
		store: Arc<dyn AdvisoryStore>,
		engine: Arc<RefreshEngine>,
		source: Arc<dyn DetailSource>,
		metrics: Arc<CacheMetrics>,
	) -> Self {
		Self { keys, store, engine, source, metrics }
	}

	/// Key space of this family.
	pub fn keys(&self) -> &KeySpace {
		&self.keys
	}

	/// Fetch one entity's detail document.
	#[tracing::instrument(skip(self))]
	pub async fn get_one(&self, id: i64) -> Result<String> {
		self.propose_detail_refresh(id);

		let key = self.keys.detail_key(id);

		match self.store.exists(&key).await {
			Ok(true) => match self.store.get(&key).await {
				Ok(Some(detail)) => {
					self.metrics.record_hits(1);

					return Ok(detail);
				},
				// Expired between the existence probe and the read.
				Ok(None) => {},
				Err(err) => {
					tracing::warn!(key = %key, error = %err, "cache read failed; falling back to authority");
				},
			},
			Ok(false) => {},
			Err(err) => {
				tracing::warn!(key = %key, error = %err, "existence probe failed; falling back to authority");
			},
		}

		self.metrics.record_fallbacks(1);
		self.source.load_detail(id).await
	}

	/// Fetch detail documents for many entities, optionally projected onto
	/// `fields`.
	///
	/// The result order interleaves cache hits before authoritative loads;
	/// callers must not rely on input order. Entities missing from both tiers
	/// are omitted, so the result may be shorter than `ids`.
	#[tracing::instrument(skip_all, fields(count = ids.len()))]
	pub async fn list_by_ids(&self, ids: &[i64], fields: &[String]) -> Result<Vec<String>> {
		for &id in ids {
			self.propose_detail_refresh(id);
		}

		let keys: Vec<String> = ids.iter().map(|&id| self.keys.detail_key(id)).collect();
		let cached = match self.store.mget(&keys).await {
			Ok(cached) => cached,
			Err(err) => {
				tracing::warn!(error = %err, "batch cache read failed; loading all from authority");
				self.metrics.record_fallbacks(ids.len() as u64);

				return self.source.load_details(ids, fields).await;
			},
		};
		let mut all = Vec::with_capacity(ids.len());
		let mut missing = Vec::new();

		for (idx, value) in cached.into_iter().enumerate() {
			match value {
				Some(detail) => all.push(project_fields(&detail, fields)),
				None => missing.push(ids[idx]),
			}
		}

		self.metrics.record_hits(all.len() as u64);

		if !missing.is_empty() {
			self.metrics.record_fallbacks(missing.len() as u64);

			let loaded = self.source.load_details(&missing, fields).await?;

			all.extend(loaded);
		}

		Ok(all)
	}

	/// Fetch the `{id, name}` tuples of this family belonging to a business.
	#[tracing::instrument(skip(self))]
	pub async fn list_of_biz(&self, biz_id: i64) -> Result<Vec<BaseTuple>> {
		self.propose_list_refresh(biz_id);

		if let Some(list) = self.cached_base_list(biz_id).await {
			self.metrics.record_hits(1);

			return Ok(list);
		}

		self.metrics.record_fallbacks(1);
		self.source.load_base_list(biz_id).await
	}

	/// Install a detail payload supplied by the change-stream collaborator;
	/// the freshness marker is written after the payload.
	pub async fn apply_detail(&self, id: i64, payload: &str) -> StoreResult<()> {
		self.store.set(&self.keys.detail_key(id), payload, self.keys.detail_payload_ttl()).await?;
		self.store.set(&self.keys.detail_expire_key(id), "1", self.keys.detail_expire()).await
	}

	/// Drop a detail record and its freshness marker; the marker goes first so
	/// a half-applied invalidation still triggers refresh.
	pub async fn invalidate_detail(&self, id: i64) -> StoreResult<()> {
		self.store.del(&self.keys.detail_expire_key(id)).await?;
		self.store.del(&self.keys.detail_key(id)).await
	}

	/// Install a list record supplied by the change-stream collaborator.
	pub async fn apply_base_list(
		&self,
		biz_id: i64,
		tuples: &[BaseTuple],
	) -> StoreResult<()> {
		let record = serde_json::to_string(tuples)
			.map_err(|err| StoreError::Backend(err.to_string()))?;

		self.store.set(&self.keys.list_key(biz_id), &record, self.keys.list_payload_ttl()).await?;
		self.store.set(&self.keys.list_expire_key(biz_id), "1", self.keys.list_expire()).await
	}

	/// Drop a list record and its freshness marker.
	pub async fn invalidate_base_list(&self, biz_id: i64) -> StoreResult<()> {
		self.store.del(&self.keys.list_expire_key(biz_id)).await?;
		self.store.del(&self.keys.list_key(biz_id)).await
	}

	/// Read the list record and hydrate tuples from the detail records it
	/// names. Any gap or store failure degrades to the authoritative path.
	async fn cached_base_list(&self, biz_id: i64) -> Option<Vec<BaseTuple>> {
		let list_key = self.keys.list_key(biz_id);
		let record = match self.store.get(&list_key).await {
			Ok(Some(record)) => record,
			Ok(None) => return None,
			Err(err) => {
				tracing::warn!(key = %list_key, error = %err, "list record read failed");

				return None;
			},
		};
		let tuples: Vec<BaseTuple> = match serde_json::from_str(&record) {
			Ok(tuples) => tuples,
			Err(err) => {
				tracing::warn!(key = %list_key, error = %err, "list record is malformed");

				return None;
			},
		};

		if tuples.is_empty() {
			return Some(Vec::new());
		}

		let detail_keys: Vec<String> =
			tuples.iter().map(|tuple| self.keys.detail_key(tuple.id)).collect();
		let details = match self.store.mget(&detail_keys).await {
			Ok(details) => details,
			Err(err) => {
				tracing::warn!(key = %list_key, error = %err, "list hydration read failed");

				return None;
			},
		};
		let mut hydrated = Vec::with_capacity(tuples.len());

		for (tuple, detail) in tuples.iter().zip(details) {
			let detail = detail?;

			match serde_json::from_str::<BaseTuple>(&detail) {
				Ok(base) => hydrated.push(base),
				Err(err) => {
					tracing::warn!(id = tuple.id, error = %err, "detail record is malformed");

					return None;
				},
			}
		}

		Some(hydrated)
	}

	fn propose_detail_refresh(&self, id: i64) {
		let source = self.source.clone();

		self.engine.try_refresh_detail(RefreshSpec {
			main_key: self.keys.detail_key(id),
			lock_key: self.keys.detail_lock_key(id),
			expire_key: self.keys.detail_expire_key(id),
			expire: self.keys.detail_expire(),
			payload_ttl: self.keys.detail_payload_ttl(),
			jitter: self.keys.expire_jitter(),
			load: Box::new(move || Box::pin(async move { source.load_detail(id).await })),
		});
	}

	fn propose_list_refresh(&self, biz_id: i64) {
		let source = self.source.clone();

		self.engine.try_refresh_list(RefreshSpec {
			main_key: self.keys.list_key(biz_id),
			lock_key: self.keys.list_lock_key(biz_id),
			expire_key: self.keys.list_expire_key(biz_id),
			expire: self.keys.list_expire(),
			payload_ttl: self.keys.list_payload_ttl(),
			jitter: self.keys.expire_jitter(),
			load: Box::new(move || {
				Box::pin(async move {
					let tuples = source.load_base_list(biz_id).await?;

					Ok(serde_json::to_string(&tuples)?)
				})
			}),
		});
	}
}
