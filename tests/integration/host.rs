//! Host lookups, paged listing, and snapshot reads.

// std
use std::time::Duration;
// crates.io
use cmdb_cache::{
	Error, ListWithIdOption,
	host::{HostByInnerIpOption, ListHostsPageOption, Page, SnapshotBatchOption},
	key,
	store::AdvisoryStore,
};
// self
use crate::support::harness;

#[tokio::test]
async fn host_by_id_reads_through() {
	let h = harness();

	h.host.insert(5, "node-5", 2);

	let detail = h.service.get_host_by_id(5).await.unwrap();

	assert!(detail.contains(r#""name":"node-5""#));
}

#[tokio::test]
async fn host_by_inner_ip_uses_the_relation_record() {
	let h = harness();

	h.host.insert(5, "node-5", 2);
	h.store
		.set(&key::host_ip_key(0, "192.168.1.7"), "5", Duration::from_secs(60))
		.await
		.unwrap();

	let opt = HostByInnerIpOption { ip: "192.168.1.7".into(), cloud_id: 0 };
	let detail = h.service.get_host_by_inner_ip(&opt).await.unwrap();

	assert!(detail.contains(r#""id":5"#));
}

#[tokio::test]
async fn host_by_inner_ip_falls_back_without_a_relation() {
	let h = harness();

	h.host.insert(5, "node-5", 2);
	h.host.bind_ip(0, "192.168.1.7", 5);

	let opt = HostByInnerIpOption { ip: "192.168.1.7".into(), cloud_id: 0 };
	let detail = h.service.get_host_by_inner_ip(&opt).await.unwrap();

	assert!(detail.contains(r#""name":"node-5""#));
}

#[tokio::test]
async fn paged_listing_counts_all_and_hydrates_one_page() {
	let h = harness();

	for host_id in 1..=7 {
		h.host.insert(host_id, "node", 2);
	}

	let opt = ListHostsPageOption {
		biz_id: None,
		page: Page { start: 2, limit: 2 },
		fields: vec!["id".into()],
	};
	let (count, details) = h.service.list_hosts_paged(&opt).await.unwrap();

	assert_eq!(count, 7);
	assert_eq!(details.len(), 2);
	assert!(details.contains(&r#"{"id":3}"#.to_owned()));
	assert!(details.contains(&r#"{"id":4}"#.to_owned()));
}

#[tokio::test]
async fn host_batch_shapes_match_the_id_list() {
	let h = harness();

	h.host.insert(1, "a", 2);
	h.host.insert(2, "b", 2);

	let opt = ListWithIdOption { ids: vec![1, 2, 9], fields: Vec::new() };
	let details = h.service.list_hosts_by_ids(&opt).await.unwrap();

	assert_eq!(details.len(), 2, "unknown hosts are omitted");
}

#[tokio::test]
async fn snapshot_reads_are_advisory_only() {
	let h = harness();

	h.store.set(&key::snapshot_key(5), r#"{"cpu":0.4}"#, Duration::from_secs(60)).await.unwrap();

	assert_eq!(h.service.get_host_snapshot(5).await.unwrap(), r#"{"cpu":0.4}"#);
	assert_eq!(h.service.get_host_snapshot(6).await.unwrap(), "", "misses read as empty");
	assert_eq!(h.host.detail_loads(), 0, "snapshots never touch the authority");
}

#[tokio::test]
async fn snapshot_batch_materializes_misses_as_empty_strings() {
	let h = harness();

	h.store.set(&key::snapshot_key(1), "s1", Duration::from_secs(60)).await.unwrap();

	let opt = SnapshotBatchOption { host_ids: vec![1, 2] };
	let snapshots = h.service.batch_get_host_snapshot(&opt).await.unwrap();

	assert_eq!(snapshots.len(), 2);
	assert_eq!(snapshots[&1], "s1");
	assert_eq!(snapshots[&2], "");
}

#[tokio::test]
async fn snapshot_outage_surfaces_as_snapshot_failure() {
	let h = harness();

	h.flaky.set_broken(true);

	assert!(matches!(h.service.get_host_snapshot(5).await, Err(Error::Snapshot(_))));

	let opt = SnapshotBatchOption { host_ids: vec![1, 2] };

	assert!(matches!(h.service.batch_get_host_snapshot(&opt).await, Err(Error::Snapshot(_))));
}

#[tokio::test]
async fn empty_snapshot_batch_returns_an_empty_map() {
	let h = harness();
	let opt = SnapshotBatchOption { host_ids: Vec::new() };

	assert!(h.service.batch_get_host_snapshot(&opt).await.unwrap().is_empty());
}
