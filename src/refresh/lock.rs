//! In-process single-flight gate for refresh work.

// std
use std::{
	collections::HashSet,
	sync::{Mutex, PoisonError},
};
// self
use crate::_prelude::*;

/// Set of identities currently being refreshed in this process.
///
/// For any key, at most one caller holds the gate between a successful
/// [`try_acquire`](Self::try_acquire) and its paired
/// [`release`](Self::release). Clones share the underlying set.
#[derive(Clone, Debug, Default)]
pub struct RefreshingLock {
	refreshing: Arc<Mutex<HashSet<String>>>,
}
impl RefreshingLock {
	/// Create an empty gate.
	pub fn new() -> Self {
		Self::default()
	}

	/// Atomically mark `key` as refreshing; returns whether the caller became
	/// the sole refresher in this process.
	pub fn try_acquire(&self, key: &str) -> bool {
		let mut refreshing = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);

		refreshing.insert(key.to_owned())
	}

	/// Remove `key` from the refreshing set; releasing an unheld key is a
	/// no-op.
	pub fn release(&self, key: &str) {
		let mut refreshing = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);

		refreshing.remove(key);
	}
}
