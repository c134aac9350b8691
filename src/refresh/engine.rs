//! Background refresh engine.
//!
//! Refresh proposals are non-blocking to the reader: they pass the in-process
//! single-flight gate, enter a bounded queue, and run on a fixed pool of
//! workers. Every distributed step is best-effort; a failed refresh is logged
//! and the reader keeps whatever copy it was served.

// std
use std::{future::Future, pin::Pin};
// crates.io
use rand::Rng;
use tokio::{
	sync::{Mutex, mpsc},
	time,
};
// self
use crate::{
	_prelude::*,
	config::EngineConfig,
	metrics::CacheMetrics,
	refresh::lock::RefreshingLock,
	store::AdvisoryStore,
};

/// Future resolving to a freshly loaded payload.
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;
/// Deferred authoritative load carried by a refresh proposal.
pub type LoadFn = Box<dyn FnOnce() -> LoadFuture + Send>;

/// One refresh proposal: the record keys, its freshness windows, and the
/// authoritative load that produces the new payload.
pub struct RefreshSpec {
	/// Payload record key.
	pub main_key: String,
	/// Distributed lock key paired with the payload record.
	pub lock_key: String,
	/// Soft-expiry marker key paired with the payload record.
	pub expire_key: String,
	/// TTL of the soft-expiry marker.
	pub expire: Duration,
	/// TTL of the payload record; outlives `expire` so stale content stays
	/// readable while refresh runs.
	pub payload_ttl: Duration,
	/// Maximum random jitter subtracted from the marker TTL to decorrelate
	/// refresh cycles.
	pub jitter: Duration,
	/// Authoritative load producing the serialized payload.
	pub load: LoadFn,
}
impl std::fmt::Debug for RefreshSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RefreshSpec")
			.field("main_key", &self.main_key)
			.field("lock_key", &self.lock_key)
			.field("expire_key", &self.expire_key)
			.field("expire", &self.expire)
			.field("payload_ttl", &self.payload_ttl)
			.field("jitter", &self.jitter)
			.finish_non_exhaustive()
	}
}

struct RefreshJob {
	op: &'static str,
	spec: RefreshSpec,
}

/// Coalesces and executes refresh work for the whole process.
///
/// Owns the only pieces of process-wide state: the worker pool and the
/// in-process single-flight gate.
#[derive(Clone)]
pub struct RefreshEngine {
	shared: Arc<EngineShared>,
	queue: mpsc::Sender<RefreshJob>,
}
impl std::fmt::Debug for RefreshEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RefreshEngine")
			.field("identity", &self.shared.identity)
			.field("deadline", &self.shared.deadline)
			.finish_non_exhaustive()
	}
}
impl RefreshEngine {
	/// Spawn the worker pool and return the engine handle.
	///
	/// Must be called within a Tokio runtime.
	pub fn spawn(
		store: Arc<dyn AdvisoryStore>,
		metrics: Arc<CacheMetrics>,
		config: &EngineConfig,
	) -> Arc<Self> {
		let (tx, rx) = mpsc::channel(config.queue_depth);
		let shared = Arc::new(EngineShared {
			store,
			lock: RefreshingLock::new(),
			metrics,
			identity: replica_identity(),
			deadline: config.refresh_deadline,
		});
		let rx = Arc::new(Mutex::new(rx));

		for worker in 0..config.workers {
			let shared = shared.clone();
			let rx = rx.clone();

			tokio::spawn(async move {
				loop {
					let job = { rx.lock().await.recv().await };

					match job {
						Some(job) => shared.run(job).await,
						None => break,
					}
				}

				tracing::debug!(worker, "refresh worker stopped");
			});
		}

		Arc::new(Self { shared, queue: tx })
	}

	/// Propose a refresh of a detail record; returns immediately.
	pub fn try_refresh_detail(&self, spec: RefreshSpec) {
		self.submit("detail", spec);
	}

	/// Propose a refresh of a list record; returns immediately.
	pub fn try_refresh_list(&self, spec: RefreshSpec) {
		self.submit("list", spec);
	}

	/// Identity written into distributed lock records by this replica.
	pub fn identity(&self) -> &str {
		&self.shared.identity
	}

	fn submit(&self, op: &'static str, spec: RefreshSpec) {
		if !self.shared.lock.try_acquire(&spec.lock_key) {
			return;
		}

		let lock_key = spec.lock_key.clone();

		if self.queue.try_send(RefreshJob { op, spec }).is_err() {
			self.shared.lock.release(&lock_key);

			tracing::debug!(op, key = %lock_key, "refresh queue full; dropping proposal");
		}
	}
}

struct EngineShared {
	store: Arc<dyn AdvisoryStore>,
	lock: RefreshingLock,
	metrics: Arc<CacheMetrics>,
	identity: String,
	deadline: Duration,
}
impl EngineShared {
	async fn run(&self, job: RefreshJob) {
		let op = job.op;
		let lock_key = job.spec.lock_key.clone();

		if time::timeout(self.deadline, self.cycle(job)).await.is_err() {
			tracing::warn!(
				op,
				key = %lock_key,
				deadline = ?self.deadline,
				"refresh cycle exceeded its deadline; distributed lock left to expire"
			);
		}

		self.lock.release(&lock_key);
	}

	async fn cycle(&self, job: RefreshJob) {
		let RefreshJob { op, spec } = job;

		// Someone refreshed this entry recently enough.
		match self.store.exists(&spec.expire_key).await {
			Ok(true) => return,
			Ok(false) => {},
			Err(err) => {
				tracing::warn!(op, key = %spec.main_key, error = %err, "soft-expiry probe failed; skipping refresh");

				return;
			},
		}

		// Claim the distributed slot; contention means another replica is on it.
		match self.store.set_nx(&spec.lock_key, &self.identity, self.deadline).await {
			Ok(true) => {},
			Ok(false) => {
				tracing::debug!(op, key = %spec.main_key, "distributed lock held elsewhere; skipping refresh");

				return;
			},
			Err(err) => {
				tracing::warn!(op, key = %spec.main_key, error = %err, "distributed lock acquire failed; skipping refresh");

				return;
			},
		}

		match (spec.load)().await {
			Ok(payload) => {
				// The marker goes in strictly after the payload so a reader
				// that sees the marker also sees the new payload.
				let stored = match self.store.set(&spec.main_key, &payload, spec.payload_ttl).await
				{
					Ok(()) =>
						match self
							.store
							.set(&spec.expire_key, "1", jittered(spec.expire, spec.jitter))
							.await
						{
							Ok(()) => true,
							Err(err) => {
								tracing::warn!(op, key = %spec.expire_key, error = %err, "soft-expiry write failed");

								false
							},
						},
					Err(err) => {
						tracing::warn!(op, key = %spec.main_key, error = %err, "payload write failed");

						false
					},
				};

				if stored {
					self.metrics.record_refresh_success();
				} else {
					self.metrics.record_refresh_error();
				}
			},
			Err(err) => {
				tracing::warn!(op, key = %spec.main_key, error = %err, "authoritative load failed; keeping cached copy");

				self.metrics.record_refresh_error();
			},
		}

		match self.store.del_if_eq(&spec.lock_key, &self.identity).await {
			Ok(_) => {},
			Err(err) => {
				tracing::warn!(op, key = %spec.lock_key, error = %err, "distributed lock release failed; it will expire by TTL");
			},
		}
	}
}

fn replica_identity() -> String {
	let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "replica".into());
	let suffix: u32 = rand::rng().random();

	format!("{host}:{}:{suffix:08x}", std::process::id())
}

fn jittered(expire: Duration, max: Duration) -> Duration {
	if max.is_zero() || max >= expire {
		return expire;
	}

	let mut rng = rand::rng();
	let jitter = rng.random_range(0.0..=max.as_secs_f64());

	expire - Duration::from_secs_f64(jitter)
}
