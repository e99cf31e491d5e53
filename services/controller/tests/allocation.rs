//! Allocation and activation flows against the in-memory store.

use std::sync::Arc;

use uuid::Uuid;

use fleet_controller::node::{Agent, HistoryEventType, Node, NodeState, NodeType};
use fleet_controller::provisioner::{Provisioner, ProvisionerError};
use fleet_controller::repository::NodeRepository;
use fleet_controller::store::MemoryStore;
use fleet_provision::{
    ApplicationId, Capacity, ClusterId, ClusterSpec, ClusterType, Flavor, NodeFlavors,
    NodeResources, ProvisionError,
};

fn default_resources() -> NodeResources {
    NodeResources::new(2.0, 8.0, 100.0, 2.0)
}

fn application() -> ApplicationId {
    ApplicationId::new("media", "photos", "default")
}

fn search_cluster() -> ClusterSpec {
    ClusterSpec::request(ClusterType::Content, ClusterId::new("search"), "7.1")
}

/// A repository with `count` ready tenant nodes named host1..hostN.
async fn fleet_with_ready_nodes(count: usize) -> NodeRepository {
    let repository = NodeRepository::new(Arc::new(MemoryStore::new()));
    for i in 1..=count {
        let node = Node::create(
            Uuid::new_v4(),
            format!("host{i}"),
            None,
            Flavor::synthetic(default_resources()),
            NodeType::Tenant,
        );
        repository.add_nodes(vec![node], Agent::System).await.unwrap();
    }
    let hostnames: Vec<String> = (1..=count).map(|i| format!("host{i}")).collect();
    let hostnames: Vec<&str> = hostnames.iter().map(String::as_str).collect();
    repository
        .set_dirty(&hostnames, Agent::System, "initial wipe")
        .await
        .unwrap();
    repository
        .set_ready(&hostnames, Agent::System, "validated")
        .await
        .unwrap();
    repository
}

#[tokio::test]
async fn prepare_and_activate_assigns_nodes_with_sequential_indices() {
    let repository = fleet_with_ready_nodes(4).await;
    let provisioner = Provisioner::new(repository.clone());

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    assert_eq!(plan.len(), 2);

    provisioner.activate(&application(), plan).await.unwrap();

    let active = repository.list_in_state(NodeState::Active).await.unwrap();
    assert_eq!(active.len(), 2);
    let mut indices: Vec<u32> = active
        .iter()
        .map(|node| node.allocation.as_ref().unwrap().membership.index)
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1]);

    for node in &active {
        assert_eq!(node.allocation.as_ref().unwrap().owner, application());
        assert!(node.history.at(HistoryEventType::Reserved).is_some());
        assert!(node.history.at(HistoryEventType::Activated).is_some());
    }

    // The rest of the fleet is untouched.
    assert_eq!(
        repository.list_in_state(NodeState::Ready).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn shrinking_a_cluster_releases_the_oldest_member() {
    let repository = fleet_with_ready_nodes(3).await;
    let provisioner = Provisioner::new(repository.clone());

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(3, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner.activate(&application(), plan).await.unwrap();

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner.activate(&application(), plan).await.unwrap();

    // The member with the lowest index was assigned first, so it is the one
    // released; it goes inactive, not back to ready, until re-validation.
    let inactive = repository.list_in_state(NodeState::Inactive).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].allocation.as_ref().unwrap().membership.index, 0);

    let active = repository.list_in_state(NodeState::Active).await.unwrap();
    let mut indices: Vec<u32> = active
        .iter()
        .map(|node| node.allocation.as_ref().unwrap().membership.index)
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn membership_indices_survive_a_controller_restart() {
    let repository = fleet_with_ready_nodes(4).await;
    let provisioner = Provisioner::new(repository.clone());

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(3, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner.activate(&application(), plan).await.unwrap();

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner.activate(&application(), plan).await.unwrap();

    // A fresh provisioner over the same store: counters are rebuilt from
    // the persisted records, indices 0..2 are history and stay unused.
    let restarted = Provisioner::new(repository.clone());
    let plan = restarted
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(3, Some(default_resources())),
        )
        .await
        .unwrap();
    restarted.activate(&application(), plan).await.unwrap();

    let active = repository.list_in_state(NodeState::Active).await.unwrap();
    let mut indices: Vec<u32> = active
        .iter()
        .map(|node| node.allocation.as_ref().unwrap().membership.index)
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 2, 3], "released index 0 is never reused");
}

#[tokio::test]
async fn retired_hostnames_keep_their_slot_with_membership_marked() {
    let repository = fleet_with_ready_nodes(2).await;
    let provisioner =
        Provisioner::new(repository.clone()).with_retired(["host1".to_string()]);

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    assert_eq!(plan.len(), 2, "retirement is advisory, the slot stays");

    provisioner.activate(&application(), plan).await.unwrap();

    let host1 = repository.get("host1").await.unwrap().unwrap();
    assert!(host1.allocation.as_ref().unwrap().membership.retired);
    let host2 = repository.get("host2").await.unwrap().unwrap();
    assert!(!host2.allocation.as_ref().unwrap().membership.retired);
}

#[tokio::test]
async fn capacity_exhaustion_surfaces_shape_and_cluster() {
    let repository = fleet_with_ready_nodes(1).await;
    let provisioner = Provisioner::new(repository);

    let request = NodeResources::new(64.0, 512.0, 4000.0, 10.0);
    let err = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(1, Some(request)),
        )
        .await
        .unwrap_err();

    match err {
        ProvisionerError::Provision(ProvisionError::CapacityExhausted { resources, cluster }) => {
            assert!(resources.contains("memory: 512 Gb"), "got: {resources}");
            assert!(cluster.contains("content/search"), "got: {cluster}");
        }
        other => panic!("expected capacity exhaustion, got {other}"),
    }
}

#[tokio::test]
async fn best_effort_allocation_stops_short_without_erroring() {
    let repository = fleet_with_ready_nodes(2).await;
    let provisioner = Provisioner::new(repository).with_capacity_constrained(false);

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(5, Some(default_resources())).with_can_fail(false),
        )
        .await
        .unwrap();
    assert_eq!(plan.len(), 2);
}

#[tokio::test]
async fn stale_plan_is_rejected_without_partial_activation() {
    let repository = fleet_with_ready_nodes(2).await;
    let provisioner = Provisioner::new(repository.clone());

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();

    // One planned node leaves the pool before activation commits.
    repository
        .set_dirty(&["host1"], Agent::Operator, "pulled for maintenance")
        .await
        .unwrap();

    let err = provisioner
        .activate(&application(), plan)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionerError::NodeNotActivatable { .. }));

    // Nothing was committed: host2 is still ready, nothing is active.
    assert!(repository
        .list_in_state(NodeState::Active)
        .await
        .unwrap()
        .is_empty());
    let host2 = repository.get("host2").await.unwrap().unwrap();
    assert_eq!(host2.state, NodeState::Ready);
}

#[tokio::test]
async fn configured_flavors_bin_pack_by_smallest_sufficient_shape() {
    let catalog = NodeFlavors::new([
        Flavor::configured("d-2-8-100", NodeResources::new(2.0, 8.0, 100.0, 2.0)),
        Flavor::configured("d-8-32-500", NodeResources::new(8.0, 32.0, 500.0, 4.0)),
    ]);

    let repository = NodeRepository::new(Arc::new(MemoryStore::new()));
    for (hostname, flavor_name) in [("host1", "d-8-32-500"), ("host2", "d-2-8-100")] {
        let node = Node::create(
            Uuid::new_v4(),
            hostname,
            None,
            catalog.get(flavor_name).unwrap().clone(),
            NodeType::Tenant,
        );
        repository.add_nodes(vec![node], Agent::System).await.unwrap();
    }
    repository
        .set_dirty(&["host1", "host2"], Agent::System, "initial wipe")
        .await
        .unwrap();
    repository
        .set_ready(&["host1", "host2"], Agent::System, "validated")
        .await
        .unwrap();

    let provisioner = Provisioner::new(repository.clone());
    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(1, Some(NodeResources::new(1.0, 4.0, 50.0, 1.0))),
        )
        .await
        .unwrap();

    // Both catalog shapes satisfy the request; host2's smaller one wins.
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].hostname, "host2");
}

#[tokio::test]
async fn reallocating_does_not_disturb_other_applications() {
    let repository = fleet_with_ready_nodes(4).await;
    let provisioner = Provisioner::new(repository.clone());

    let other_application = ApplicationId::new("media", "mail", "default");
    let plan = provisioner
        .prepare(
            &other_application,
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner
        .activate(&other_application, plan)
        .await
        .unwrap();

    let plan = provisioner
        .prepare(
            &application(),
            &search_cluster(),
            &Capacity::from_count(2, Some(default_resources())),
        )
        .await
        .unwrap();
    provisioner.activate(&application(), plan).await.unwrap();

    // Both applications hold two active nodes each.
    let active = repository.list_in_state(NodeState::Active).await.unwrap();
    assert_eq!(active.len(), 4);
    let owned_by_other = active
        .iter()
        .filter(|node| node.allocation.as_ref().unwrap().owner == other_application)
        .count();
    assert_eq!(owned_by_other, 2);
}
