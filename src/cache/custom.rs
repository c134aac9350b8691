//! Caching for user-defined hierarchy levels and the topology rank.

// self
use crate::{
	_prelude::*,
	authority::CustomLevelSource,
	cache::entity::EntityCache,
	config::CacheConfig,
	key::{self, KeySpace},
	metrics::CacheMetrics,
	refresh::engine::{RefreshEngine, RefreshSpec},
	store::AdvisoryStore,
};

/// Cache over every custom hierarchy level, plus the topology-rank record.
///
/// Levels are identified by object id; a per-level [`EntityCache`] is
/// assembled on demand from cheap handle clones.
#[derive(Clone)]
pub struct CustomLevelCache {
	config: Arc<CacheConfig>,
	store: Arc<dyn AdvisoryStore>,
	engine: Arc<RefreshEngine>,
	source: Arc<dyn CustomLevelSource>,
	metrics: Arc<CacheMetrics>,
}
impl std::fmt::Debug for CustomLevelCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CustomLevelCache").finish_non_exhaustive()
	}
}
impl CustomLevelCache {
	/// Assemble the custom-level cache.
	pub fn new(
		config: Arc<CacheConfig>,
		store: Arc<dyn AdvisoryStore>,
		engine: Arc<RefreshEngine>,
		source: Arc<dyn CustomLevelSource>,
		metrics: Arc<CacheMetrics>,
	) -> Self {
		Self { config, store, engine, source, metrics }
	}

	/// Entity cache scoped to one hierarchy level.
	pub fn level(&self, object_id: &str) -> EntityCache {
		EntityCache::new(
			KeySpace::custom(object_id, &self.config),
			self.store.clone(),
			self.engine.clone(),
			self.source.level_source(object_id),
			self.metrics.clone(),
		)
	}

	/// Fetch the level object ids ordered from business down to set.
	#[tracing::instrument(skip(self))]
	pub async fn rank(&self) -> Result<Vec<String>> {
		self.propose_rank_refresh();

		match self.store.get(&key::topology_rank_key()).await {
			Ok(Some(rank)) => {
				self.metrics.record_hits(1);

				return Ok(split_rank(&rank));
			},
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(error = %err, "topology rank read failed; falling back to authority");
			},
		}

		self.metrics.record_fallbacks(1);
		self.source.load_rank().await
	}

	fn propose_rank_refresh(&self) {
		let source = self.source.clone();
		let expire = self.config.custom.list_expire;

		self.engine.try_refresh_list(RefreshSpec {
			main_key: key::topology_rank_key(),
			lock_key: key::topology_rank_lock_key(),
			expire_key: key::topology_rank_expire_key(),
			expire,
			payload_ttl: expire * self.config.payload_ttl_factor,
			jitter: self.config.expire_jitter,
			load: Box::new(move || {
				Box::pin(async move { Ok(source.load_rank().await?.join(",")) })
			}),
		});
	}
}

fn split_rank(raw: &str) -> Vec<String> {
	raw.split(',').filter(|level| !level.is_empty()).map(str::to_owned).collect()
}
