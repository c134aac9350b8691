//! Advisory key/value store abstraction and its backends.
//!
//! The advisory store is a cache tier with Redis-compatible semantics; it may
//! lose data without correctness impact. Not-found is `Ok(None)`, transport
//! failures are [`StoreError`] and never reach callers of the read-through API.

// std
use std::{
	collections::HashMap,
	sync::{Mutex, PoisonError},
};
// crates.io
use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Compare-and-delete used for distributed lock release: the key is removed
/// only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
	return redis.call("del", KEYS[1])
else
	return 0
end
"#;

/// Result alias for advisory-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Transport-level advisory store failure.
///
/// Always recoverable from the caller's point of view: the read-through layer
/// degrades to the authoritative store, the refresh engine logs and gives up
/// for the round.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error(transparent)]
	Redis(#[from] redis::RedisError),
	#[error("Advisory store failure: {0}")]
	Backend(String),
}

/// Advisory key/value store operations used by the cache layer.
#[async_trait]
pub trait AdvisoryStore: Send + Sync {
	/// Fetch a string value; `None` when the key is absent.
	async fn get(&self, key: &str) -> StoreResult<Option<String>>;

	/// Fetch many string values, one slot per key, misses as `None`.
	async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

	/// Whether the key currently exists.
	async fn exists(&self, key: &str) -> StoreResult<bool>;

	/// Write a value with a TTL, replacing any previous value.
	async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

	/// Write a value with a TTL only if the key is absent; returns whether the
	/// write happened.
	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

	/// Delete a key; absent keys are not an error.
	async fn del(&self, key: &str) -> StoreResult<()>;

	/// Delete a key only while it holds the expected value; returns whether
	/// the delete happened.
	async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool>;
}

/// Redis-backed advisory store.
#[derive(Clone, Debug)]
pub struct RedisStore {
	client: redis::Client,
}
impl RedisStore {
	/// Wrap a configured Redis client.
	pub fn new(client: redis::Client) -> Self {
		Self { client }
	}

	async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
		Ok(self.client.get_multiplexed_async_connection().await?)
	}
}
#[async_trait]
impl AdvisoryStore for RedisStore {
	async fn get(&self, key: &str) -> StoreResult<Option<String>> {
		let mut conn = self.connection().await?;
		let value: Option<String> = conn.get(key).await?;

		Ok(value)
	}

	async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
		if keys.is_empty() {
			return Ok(Vec::new());
		}

		let mut conn = self.connection().await?;
		let values: Vec<redis::Value> = conn.mget(keys).await?;
		// A slot holding a non-string value reads as a miss instead of
		// failing the whole batch.
		let values = values
			.iter()
			.enumerate()
			.map(|(idx, value)| match redis::from_redis_value::<Option<String>>(value) {
				Ok(value) => value,
				Err(err) => {
					tracing::warn!(key = %keys[idx], error = %err, "non-string cache value read as a miss");

					None
				},
			})
			.collect();

		Ok(values)
	}

	async fn exists(&self, key: &str) -> StoreResult<bool> {
		let mut conn = self.connection().await?;
		let exists: bool = conn.exists(key).await?;

		Ok(exists)
	}

	async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
		let mut conn = self.connection().await?;

		conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;

		Ok(())
	}

	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
		let mut conn = self.connection().await?;
		let written: Option<String> = redis::cmd("SET")
			.arg(key)
			.arg(value)
			.arg("NX")
			.arg("EX")
			.arg(ttl.as_secs().max(1))
			.query_async(&mut conn)
			.await?;

		Ok(written.is_some())
	}

	async fn del(&self, key: &str) -> StoreResult<()> {
		let mut conn = self.connection().await?;

		conn.del::<_, ()>(key).await?;

		Ok(())
	}

	async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
		let mut conn = self.connection().await?;
		let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
			.key(key)
			.arg(expected)
			.invoke_async(&mut conn)
			.await?;

		Ok(deleted == 1)
	}
}

/// In-process advisory store with lazy TTL eviction.
///
/// Backs integration tests and local development; production deployments use
/// [`RedisStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, MemoryEntry>>,
}
impl MemoryStore {
	/// Create an empty store.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	fn live(entries: &mut HashMap<String, MemoryEntry>, key: &str) -> Option<String> {
		match entries.get(key) {
			Some(entry) if !entry.expired() => Some(entry.value.clone()),
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}
}

#[derive(Clone, Debug)]
struct MemoryEntry {
	value: String,
	expires_at: Instant,
}
impl MemoryEntry {
	fn expired(&self) -> bool {
		Instant::now() >= self.expires_at
	}
}

#[async_trait]
impl AdvisoryStore for MemoryStore {
	async fn get(&self, key: &str) -> StoreResult<Option<String>> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		Ok(Self::live(&mut entries, key))
	}

	async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		Ok(keys.iter().map(|key| Self::live(&mut entries, key)).collect())
	}

	async fn exists(&self, key: &str) -> StoreResult<bool> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		Ok(Self::live(&mut entries, key).is_some())
	}

	async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		entries.insert(key.to_owned(), MemoryEntry {
			value: value.to_owned(),
			expires_at: Instant::now() + ttl,
		});

		Ok(())
	}

	async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		if Self::live(&mut entries, key).is_some() {
			return Ok(false);
		}

		entries.insert(key.to_owned(), MemoryEntry {
			value: value.to_owned(),
			expires_at: Instant::now() + ttl,
		});

		Ok(true)
	}

	async fn del(&self, key: &str) -> StoreResult<()> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		entries.remove(key);

		Ok(())
	}

	async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		if Self::live(&mut entries, key).as_deref() == Some(expected) {
			entries.remove(key);

			return Ok(true);
		}

		Ok(false)
	}
}
