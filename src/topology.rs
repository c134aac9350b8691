//! Business topology views built from the entity caches.
//!
//! A topology tree descends business → custom levels in rank order → set →
//! module. Assembly visits every node once and is bounded by a configurable
//! scan cap so a pathological business cannot run the request unbounded.

// std
use std::collections::HashMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::{custom::CustomLevelCache, entity::EntityCache},
};

/// Kind tag of business nodes.
pub const KIND_BIZ: &str = "biz";
/// Kind tag of set nodes.
pub const KIND_SET: &str = "set";
/// Kind tag of module nodes.
pub const KIND_MODULE: &str = "module";

/// Options for assembling one business's topology tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchTreeOption {
	/// Business to assemble the tree for.
	pub biz_id: i64,
}
impl SearchTreeOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.biz_id <= 0 {
			return Err(Error::InputInvalid {
				field: "biz_id",
				reason: "Must be a positive business id.".into(),
			});
		}

		Ok(())
	}
}

/// Options for resolving a topology node's ancestor path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchNodePathOption {
	/// Business the node belongs to.
	pub biz_id: i64,
	/// Node kind: `set`, `module`, or a custom level object id.
	pub kind: String,
	/// Node instance id.
	pub inst_id: i64,
}
impl SearchNodePathOption {
	/// Validate the option before any store access.
	pub fn validate(&self) -> Result<()> {
		if self.biz_id <= 0 {
			return Err(Error::InputInvalid {
				field: "biz_id",
				reason: "Must be a positive business id.".into(),
			});
		}
		if self.inst_id <= 0 {
			return Err(Error::InputInvalid {
				field: "inst_id",
				reason: "Must be a positive instance id.".into(),
			});
		}
		if self.kind.is_empty() {
			return Err(Error::InputInvalid { field: "kind", reason: "Must not be empty.".into() });
		}
		if self.kind == KIND_BIZ {
			return Err(Error::InputInvalid {
				field: "kind",
				reason: "A business has no ancestors.".into(),
			});
		}

		Ok(())
	}
}

/// One node of an assembled topology tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyNode {
	/// Node kind tag (`biz`, `set`, `module`, or a custom level object id).
	pub kind: String,
	/// Node instance id.
	pub id: i64,
	/// Display name.
	pub name: String,
	/// Child nodes, one level down.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<TopologyNode>,
}

/// One ancestor on a node's path towards its business.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyPathNode {
	/// Ancestor kind tag.
	pub kind: String,
	/// Ancestor instance id.
	pub id: i64,
	/// Display name.
	pub name: String,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
	id: i64,
	name: String,
	#[serde(default)]
	parent_id: Option<i64>,
}

/// Assembles topology trees and ancestor paths from the entity caches.
#[derive(Clone)]
pub struct TopologyView {
	biz: EntityCache,
	set: EntityCache,
	module: EntityCache,
	custom: CustomLevelCache,
	scan_cap: u64,
}
impl std::fmt::Debug for TopologyView {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TopologyView").field("scan_cap", &self.scan_cap).finish_non_exhaustive()
	}
}
impl TopologyView {
	/// Assemble a view over the given family caches.
	pub fn new(
		biz: EntityCache,
		set: EntityCache,
		module: EntityCache,
		custom: CustomLevelCache,
		scan_cap: u64,
	) -> Self {
		Self { biz, set, module, custom, scan_cap }
	}

	/// Assemble the full topology tree of one business.
	///
	/// Fails with [`Error::OverHead`] as soon as the cumulative number of
	/// visited nodes exceeds the scan cap.
	#[tracing::instrument(skip(self, opt), fields(biz_id = opt.biz_id))]
	pub async fn search_topology_tree(&self, opt: &SearchTreeOption) -> Result<TopologyNode> {
		opt.validate()?;

		let mut visited = 0u64;
		let mut root = self.node_of(&self.biz, KIND_BIZ, opt.biz_id).await?;

		self.charge(&mut visited, 1)?;

		let customs = custom_levels(&self.custom.rank().await?);
		let mut levels = Vec::with_capacity(customs.len() + 2);

		for object_id in &customs {
			let cache = self.custom.level(object_id);
			let infos = self.level_infos(&cache, opt.biz_id, &mut visited).await?;

			levels.push((object_id.clone(), infos));
		}

		levels
			.push((KIND_SET.to_owned(), self.level_infos(&self.set, opt.biz_id, &mut visited).await?));
		levels.push((
			KIND_MODULE.to_owned(),
			self.level_infos(&self.module, opt.biz_id, &mut visited).await?,
		));

		// Assemble bottom-up: each pass groups the level's nodes under their
		// parent ids and adopts the children grouped by the pass below.
		let mut lower: HashMap<i64, Vec<TopologyNode>> = HashMap::new();

		for (kind, infos) in levels.into_iter().rev() {
			let mut grouped: HashMap<i64, Vec<TopologyNode>> = HashMap::new();
			let mut orphans = 0usize;

			for info in infos {
				let node = TopologyNode {
					kind: kind.clone(),
					id: info.id,
					name: info.name,
					children: lower.remove(&info.id).unwrap_or_default(),
				};

				match info.parent_id {
					Some(parent) => grouped.entry(parent).or_default().push(node),
					None => orphans += 1,
				}
			}

			orphans += lower.values().map(Vec::len).sum::<usize>();

			if orphans != 0 {
				tracing::debug!(kind = %kind, orphans, "skipped nodes without a resolvable parent");
			}

			lower = grouped;
		}

		root.children = lower.remove(&opt.biz_id).unwrap_or_default();

		if !lower.is_empty() {
			tracing::debug!(
				stranded = lower.values().map(Vec::len).sum::<usize>(),
				"skipped top-level nodes not parented to the business"
			);
		}

		Ok(root)
	}

	/// Resolve the ordered ancestor path of a node, from its immediate parent
	/// up to and including the business; the node itself is excluded.
	#[tracing::instrument(skip(self, opt), fields(kind = %opt.kind, inst_id = opt.inst_id))]
	pub async fn search_node_path(&self, opt: &SearchNodePathOption) -> Result<Vec<TopologyPathNode>> {
		opt.validate()?;

		let customs = custom_levels(&self.custom.rank().await?);
		let mut ancestors: Vec<String> = Vec::with_capacity(customs.len() + 2);

		match opt.kind.as_str() {
			KIND_MODULE => {
				ancestors.push(KIND_SET.to_owned());
				ancestors.extend(customs.iter().rev().cloned());
			},
			KIND_SET => ancestors.extend(customs.iter().rev().cloned()),
			object_id => {
				let position =
					customs.iter().position(|level| level == object_id).ok_or_else(|| {
						Error::InputInvalid {
							field: "kind",
							reason: format!("Unknown custom level '{object_id}'."),
						}
					})?;

				ancestors.extend(customs[..position].iter().rev().cloned());
			},
		}

		ancestors.push(KIND_BIZ.to_owned());

		let start = self.info_of(&self.cache_for(&opt.kind), &opt.kind, opt.inst_id).await?;
		let mut parent_id = start.parent_id.ok_or_else(|| {
			Error::DbSelect(format!("{} {} carries no parent reference", opt.kind, opt.inst_id))
		})?;
		let mut path = Vec::with_capacity(ancestors.len());

		for kind in &ancestors {
			let info = self.info_of(&self.cache_for(kind), kind, parent_id).await?;

			path.push(TopologyPathNode { kind: kind.clone(), id: info.id, name: info.name });

			if kind == KIND_BIZ {
				break;
			}

			parent_id = info.parent_id.ok_or_else(|| {
				Error::DbSelect(format!("{kind} {} carries no parent reference", info.id))
			})?;
		}

		Ok(path)
	}

	fn cache_for(&self, kind: &str) -> EntityCache {
		match kind {
			KIND_BIZ => self.biz.clone(),
			KIND_SET => self.set.clone(),
			KIND_MODULE => self.module.clone(),
			object_id => self.custom.level(object_id),
		}
	}

	async fn node_of(&self, cache: &EntityCache, kind: &str, id: i64) -> Result<TopologyNode> {
		let info = self.info_of(cache, kind, id).await?;

		Ok(TopologyNode { kind: kind.to_owned(), id: info.id, name: info.name, children: Vec::new() })
	}

	async fn info_of(&self, cache: &EntityCache, kind: &str, id: i64) -> Result<NodeInfo> {
		let detail = cache.get_one(id).await?;

		serde_json::from_str(&detail)
			.map_err(|err| Error::DbSelect(format!("{kind} {id} detail is malformed: {err}")))
	}

	async fn level_infos(
		&self,
		cache: &EntityCache,
		biz_id: i64,
		visited: &mut u64,
	) -> Result<Vec<NodeInfo>> {
		let tuples = cache.list_of_biz(biz_id).await?;

		self.charge(visited, tuples.len() as u64)?;

		if tuples.is_empty() {
			return Ok(Vec::new());
		}

		let ids: Vec<i64> = tuples.iter().map(|tuple| tuple.id).collect();
		let details = cache.list_by_ids(&ids, &node_fields()).await?;
		let mut infos = Vec::with_capacity(details.len());

		for detail in &details {
			match serde_json::from_str::<NodeInfo>(detail) {
				Ok(info) => infos.push(info),
				Err(err) => {
					tracing::warn!(error = %err, "skipping malformed node detail");
				},
			}
		}

		Ok(infos)
	}

	fn charge(&self, visited: &mut u64, count: u64) -> Result<()> {
		*visited += count;

		if *visited > self.scan_cap {
			return Err(Error::OverHead { visited: *visited, cap: self.scan_cap });
		}

		Ok(())
	}
}

fn custom_levels(rank: &[String]) -> Vec<String> {
	rank.iter()
		.filter(|level| !matches!(level.as_str(), KIND_BIZ | KIND_SET | KIND_MODULE))
		.cloned()
		.collect()
}

fn node_fields() -> Vec<String> {
	["id", "name", "parent_id"].map(str::to_owned).to_vec()
}
