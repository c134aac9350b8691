//! Authoritative document-store contracts.
//!
//! The driver for the document store lives with an external collaborator;
//! the cache layer only consumes these traits. Implementations must be usable
//! concurrently and report [`Error::NotFound`] / [`Error::DbSelect`].

// crates.io
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
// self
use crate::{_prelude::*, host::ListHostsPageOption};

/// Minimal `{id, name}` projection of an entity used in list records.
///
/// Deserializes from a full detail document as well; unknown fields are
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTuple {
	/// Entity identifier.
	pub id: i64,
	/// Display name.
	pub name: String,
}

/// Authoritative loads for one entity family.
#[async_trait]
pub trait DetailSource: Send + Sync + 'static {
	/// Load the full detail document of one entity as a JSON string.
	async fn load_detail(&self, id: i64) -> Result<String>;

	/// Load detail documents for many entities, projected onto `fields` when
	/// non-empty. Entities that do not exist are omitted.
	async fn load_details(&self, ids: &[i64], fields: &[String]) -> Result<Vec<String>>;

	/// Load the ordered `{id, name}` tuples of this family belonging to a
	/// business (`SELECT id, name WHERE biz_id = …`); the business family
	/// itself is listed globally under business id 0.
	async fn load_base_list(&self, biz_id: i64) -> Result<Vec<BaseTuple>>;
}

/// Authoritative loads for the user-defined hierarchy levels between business
/// and set.
#[async_trait]
pub trait CustomLevelSource: Send + Sync + 'static {
	/// Detail source scoped to one hierarchy level.
	fn level_source(&self, object_id: &str) -> Arc<dyn DetailSource>;

	/// Load the level object ids ordered from business down to set.
	async fn load_rank(&self) -> Result<Vec<String>>;
}

/// Authoritative loads for the host family beyond the common detail shapes.
#[async_trait]
pub trait HostSource: DetailSource {
	/// Load the detail document of the host bound to an inner ip within a
	/// cloud area.
	async fn host_by_inner_ip(&self, cloud_id: i64, ip: &str) -> Result<String>;

	/// Count hosts matching the option and load one page of host ids.
	async fn list_host_page(&self, opt: &ListHostsPageOption) -> Result<(u64, Vec<i64>)>;
}
