//! Topology tree assembly, ancestor paths, and the scan cap.

// crates.io
use cmdb_cache::{
	Error,
	config::CacheConfig,
	topology::{SearchNodePathOption, SearchTreeOption, TopologyNode},
};
// self
use crate::support::{Harness, harness, harness_with};

/// Business 2 with one custom level: 2 provinces, 2 sets, 3 modules.
fn seed_demo_topology(h: &Harness) {
	h.custom.set_rank(&["biz", "province", "set"]);
	h.business.insert(2, "demo", 0, None);

	let province = h.custom.level("province");

	province.insert(10, "north", 2, Some(2));
	province.insert(11, "south", 2, Some(2));
	h.set.insert(20, "gateway", 2, Some(10));
	h.set.insert(21, "storage", 2, Some(11));
	h.module.insert(30, "nginx", 2, Some(20));
	h.module.insert(31, "redis", 2, Some(20));
	h.module.insert(32, "mongo", 2, Some(21));
}

fn child<'a>(node: &'a TopologyNode, id: i64) -> &'a TopologyNode {
	node.children
		.iter()
		.find(|child| child.id == id)
		.unwrap_or_else(|| panic!("node {} has no child {id}", node.id))
}

#[tokio::test]
async fn tree_descends_biz_custom_set_module() {
	let h = harness();

	seed_demo_topology(&h);

	let opt = SearchTreeOption { biz_id: 2 };
	let tree = h.service.search_topology_tree(&opt).await.expect("tree assembly");

	assert_eq!((tree.kind.as_str(), tree.id, tree.name.as_str()), ("biz", 2, "demo"));
	assert_eq!(tree.children.len(), 2, "two provinces under the business");

	let north = child(&tree, 10);

	assert_eq!(north.kind, "province");

	let gateway = child(north, 20);

	assert_eq!(gateway.kind, "set");
	assert_eq!(gateway.children.len(), 2, "nginx and redis under gateway");
	assert_eq!(child(gateway, 30).kind, "module");

	let south = child(&tree, 11);
	let storage = child(south, 21);

	assert_eq!(storage.children.len(), 1);
	assert_eq!(child(storage, 32).name, "mongo");
}

#[tokio::test]
async fn tree_without_custom_levels_parents_sets_to_biz() {
	let h = harness();

	h.custom.set_rank(&["biz", "set"]);
	h.business.insert(2, "demo", 0, None);
	h.set.insert(20, "gateway", 2, Some(2));
	h.module.insert(30, "nginx", 2, Some(20));

	let tree = h.service.search_topology_tree(&SearchTreeOption { biz_id: 2 }).await.unwrap();

	assert_eq!(tree.children.len(), 1);
	assert_eq!(child(child(&tree, 20), 30).name, "nginx");
}

#[tokio::test]
async fn oversized_business_fails_with_over_head() {
	let mut config = CacheConfig::default();

	config.topology_scan_cap = 10;

	let h = harness_with(config);

	h.custom.set_rank(&["biz", "set"]);
	h.business.insert(2, "demo", 0, None);
	h.set.insert(20, "gateway", 2, Some(2));

	for module_id in 0..11 {
		h.module.insert(100 + module_id, "worker", 2, Some(20));
	}

	match h.service.search_topology_tree(&SearchTreeOption { biz_id: 2 }).await {
		Err(Error::OverHead { visited, cap }) => {
			assert_eq!(cap, 10);
			assert!(visited > cap);
		},
		other => panic!("expected OverHead, got {other:?}"),
	}
}

#[tokio::test]
async fn small_business_stays_under_the_cap() {
	let mut config = CacheConfig::default();

	config.topology_scan_cap = 10;

	let h = harness_with(config);

	h.custom.set_rank(&["biz", "set"]);
	h.business.insert(2, "demo", 0, None);
	h.set.insert(20, "gateway", 2, Some(2));

	for module_id in 0..5 {
		h.module.insert(100 + module_id, "worker", 2, Some(20));
	}

	let tree = h.service.search_topology_tree(&SearchTreeOption { biz_id: 2 }).await.unwrap();
	let gateway = child(&tree, 20);

	assert_eq!(gateway.children.len(), 5, "five module leaves survive");
	assert!(gateway.children.iter().all(|module| module.children.is_empty()));
}

#[tokio::test]
async fn nodes_without_a_resolvable_parent_are_skipped() {
	let h = harness();

	h.custom.set_rank(&["biz", "set"]);
	h.business.insert(2, "demo", 0, None);
	h.set.insert(20, "gateway", 2, Some(2));
	h.module.insert(30, "nginx", 2, Some(20));
	h.module.insert(31, "orphan", 2, Some(999));

	let tree = h.service.search_topology_tree(&SearchTreeOption { biz_id: 2 }).await.unwrap();
	let gateway = child(&tree, 20);

	assert_eq!(gateway.children.len(), 1, "the orphan is dropped, not re-parented");
	assert_eq!(child(gateway, 30).name, "nginx");
}

#[tokio::test]
async fn module_path_climbs_to_the_business() {
	let h = harness();

	seed_demo_topology(&h);

	let opt = SearchNodePathOption { biz_id: 2, kind: "module".into(), inst_id: 30 };
	let path = h.service.search_topology_node_path(&opt).await.expect("node path");
	let shape: Vec<(&str, i64)> =
		path.iter().map(|node| (node.kind.as_str(), node.id)).collect();

	assert_eq!(shape, vec![("set", 20), ("province", 10), ("biz", 2)]);
	assert!(path.iter().all(|node| node.id != 30), "the node itself is excluded");
}

#[tokio::test]
async fn custom_instance_path_is_just_the_business() {
	let h = harness();

	seed_demo_topology(&h);

	let opt = SearchNodePathOption { biz_id: 2, kind: "province".into(), inst_id: 11 };
	let path = h.service.search_topology_node_path(&opt).await.unwrap();

	assert_eq!(path.len(), 1);
	assert_eq!((path[0].kind.as_str(), path[0].id, path[0].name.as_str()), ("biz", 2, "demo"));
}

#[tokio::test]
async fn set_path_passes_through_custom_levels() {
	let h = harness();

	seed_demo_topology(&h);

	let opt = SearchNodePathOption { biz_id: 2, kind: "set".into(), inst_id: 21 };
	let path = h.service.search_topology_node_path(&opt).await.unwrap();
	let shape: Vec<(&str, i64)> =
		path.iter().map(|node| (node.kind.as_str(), node.id)).collect();

	assert_eq!(shape, vec![("province", 11), ("biz", 2)]);
}

#[tokio::test]
async fn biz_nodes_are_rejected_for_path_lookup() {
	let h = harness();
	let opt = SearchNodePathOption { biz_id: 2, kind: "biz".into(), inst_id: 2 };

	assert!(matches!(
		h.service.search_topology_node_path(&opt).await,
		Err(Error::InputInvalid { field: "kind", .. })
	));
}
