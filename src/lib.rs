//! Read-through CMDB topology cache with coalesced background refresh, soft
//! expiry, and graceful advisory-store degradation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod authority;
pub mod cache;
pub mod config;
pub mod host;
pub mod key;
pub mod metrics;
pub mod refresh;
pub mod store;
pub mod topology;

mod error;
mod service;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use crate::{Error, Result};
}
pub use crate::{
	error::{Error, Result},
	service::{CacheService, CacheServiceBuilder, CustomLayerOption, ListWithIdOption},
};
