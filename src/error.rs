//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the CMDB cache crate.
///
/// Only these variants ever reach a caller; advisory-store failures are
/// handled inside the cache layer and degrade to authoritative fallback
/// (see [`crate::store::StoreError`]).
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Serde(#[from] serde_json::Error),

	#[error("Validation failed for {field}: {reason}")]
	InputInvalid { field: &'static str, reason: String },
	#[error("{resource} '{id}' does not exist in the authoritative store.")]
	NotFound { resource: &'static str, id: String },
	#[error("Authoritative store query failed: {0}")]
	DbSelect(String),
	#[error("Topology scan visited {visited} nodes, exceeding the cap of {cap}; narrow the query.")]
	OverHead { visited: u64, cap: u64 },
	#[error("Host snapshot read failed: {0}")]
	Snapshot(String),
}
impl Error {
	/// Shorthand for a [`Error::NotFound`] carrying a numeric identifier.
	pub fn not_found(resource: &'static str, id: i64) -> Self {
		Self::NotFound { resource, id: id.to_string() }
	}
}
