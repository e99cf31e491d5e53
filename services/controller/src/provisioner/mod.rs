//! Capacity allocation and activation.
//!
//! [`Provisioner`] is the inbound boundary for applications: `prepare`
//! computes an allocation plan from a store snapshot without holding any
//! locks beyond a provisioner-level mutex (which serializes concurrent
//! requests so two allocations for the same cluster cannot interleave index
//! assignment), and `activate` commits a plan as one multi-node store
//! transaction. A store conflict means a concurrent commit won the race;
//! callers retry the whole prepare-plus-activate sequence.

mod allocator;

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use fleet_provision::{
    ApplicationId, Capacity, ClusterId, ClusterSpec, ClusterType, HostSpec, ProvisionError,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::node::{Agent, Allocation, Node, NodeState};
use crate::repository::{NodeRepository, RepositoryError};
use crate::store::{NodeWrite, StoreError};

pub use allocator::AllocationPool;

/// Errors from preparing or activating an allocation.
#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A plan entry references a node that is not in an activatable state,
    /// e.g. because the plan went stale before activation.
    #[error("node {hostname} cannot be activated from state {state}")]
    NodeNotActivatable { hostname: String, state: NodeState },

    /// A plan entry without cluster membership cannot be activated.
    #[error("host spec for {0} carries no cluster membership")]
    MissingMembership(String),
}

impl From<StoreError> for ProvisionerError {
    fn from(err: StoreError) -> Self {
        Self::Repository(RepositoryError::Store(err))
    }
}

#[derive(Default)]
struct ProvisionerState {
    /// Index counters remembered across prepares, per owning application,
    /// so counters stay monotone even for plans that were never activated.
    next_indices: HashMap<ApplicationId, HashMap<(ClusterType, ClusterId), u32>>,
}

/// Allocation boundary over the node repository.
pub struct Provisioner {
    repository: NodeRepository,
    fail_on_out_of_capacity: bool,
    to_retire: HashSet<String>,
    state: Mutex<ProvisionerState>,
}

impl Provisioner {
    pub fn new(repository: NodeRepository) -> Self {
        Self {
            repository,
            fail_on_out_of_capacity: true,
            to_retire: HashSet::new(),
            state: Mutex::new(ProvisionerState::default()),
        }
    }

    /// Degrade to best-effort allocation instead of erroring on exhaustion.
    pub fn with_capacity_constrained(self, fail_on_out_of_capacity: bool) -> Self {
        Self {
            fail_on_out_of_capacity,
            ..self
        }
    }

    /// Flag hostnames whose memberships should come back marked retired.
    pub fn with_retired(self, hostnames: impl IntoIterator<Item = String>) -> Self {
        Self {
            to_retire: hostnames.into_iter().collect(),
            ..self
        }
    }

    /// Compute an allocation plan for one cluster. Read-mostly: the store is
    /// only read for its current snapshot, and nothing is committed.
    #[instrument(skip(self, capacity), fields(application = %application, cluster = %cluster))]
    pub async fn prepare(
        &self,
        application: &ApplicationId,
        cluster: &ClusterSpec,
        capacity: &Capacity,
    ) -> Result<Vec<HostSpec>, ProvisionerError> {
        let mut state = self.state.lock().await;
        let nodes = self.repository.list().await?;

        let mut pool =
            AllocationPool::from_nodes(&nodes, application, self.fail_on_out_of_capacity)
                .with_retired(self.to_retire.iter().cloned());
        if let Some(remembered) = state.next_indices.get(application) {
            pool.seed_next_indices(remembered);
        }

        let plan = pool.prepare(cluster, capacity)?;
        state
            .next_indices
            .insert(application.clone(), pool.next_indices());

        info!(nodes = plan.len(), "Prepared allocation");
        Ok(plan)
    }

    /// Commit a prepared plan: planned nodes become active with their
    /// memberships, and nodes previously active for the same clusters but
    /// absent from the plan are released to inactive. One store
    /// transaction; observers never see a cluster partially re-allocated.
    #[instrument(skip(self, plan), fields(application = %application))]
    pub async fn activate(
        &self,
        application: &ApplicationId,
        plan: Vec<HostSpec>,
    ) -> Result<Vec<Node>, ProvisionerError> {
        let _state = self.state.lock().await;
        let now = Utc::now();
        let nodes = self.repository.list().await?;
        let by_hostname: HashMap<&str, &Node> = nodes
            .iter()
            .map(|node| (node.hostname.as_str(), node))
            .collect();

        let planned: HashSet<&str> = plan.iter().map(|spec| spec.hostname.as_str()).collect();
        let mut planned_clusters: HashSet<(ClusterType, ClusterId)> = HashSet::new();
        let mut writes = Vec::with_capacity(plan.len());

        for spec in &plan {
            let membership = spec
                .membership
                .as_ref()
                .ok_or_else(|| ProvisionerError::MissingMembership(spec.hostname.clone()))?;
            planned_clusters.insert((
                membership.cluster.cluster_type,
                membership.cluster.id.clone(),
            ));

            let node = *by_hostname
                .get(spec.hostname.as_str())
                .ok_or_else(|| StoreError::NotFound(spec.hostname.clone()))?;
            let allocation = Allocation::new(application.clone(), membership.clone());

            match node.state {
                NodeState::Ready => {
                    // The reserved hop is folded into the same commit; the
                    // store only ever shows ready -> active.
                    let activated = node
                        .clone()
                        .with_allocation(allocation)
                        .recording(NodeState::Reserved, now, Agent::Application)
                        .recording(NodeState::Active, now, Agent::Application)
                        .with_state(NodeState::Active);
                    writes.push(NodeWrite::when_in(activated, NodeState::Ready));
                }
                NodeState::Reserved | NodeState::Active | NodeState::Inactive => {
                    let activated = node
                        .clone()
                        .with_allocation(allocation)
                        .recording(NodeState::Active, now, Agent::Application)
                        .with_state(NodeState::Active);
                    writes.push(NodeWrite::when_in(activated, node.state));
                }
                state => {
                    return Err(ProvisionerError::NodeNotActivatable {
                        hostname: spec.hostname.clone(),
                        state,
                    });
                }
            }
        }

        // Release previously held nodes the new plan no longer needs.
        for node in &nodes {
            if node.state != NodeState::Active || planned.contains(node.hostname.as_str()) {
                continue;
            }
            let Some(allocation) = &node.allocation else {
                continue;
            };
            let cluster = &allocation.membership.cluster;
            if allocation.owner == *application
                && planned_clusters.contains(&(cluster.cluster_type, cluster.id.clone()))
            {
                let released = node
                    .clone()
                    .recording(NodeState::Inactive, now, Agent::Application)
                    .with_state(NodeState::Inactive);
                writes.push(NodeWrite::when_in(released, NodeState::Active));
            }
        }

        let activated = writes.len();
        let committed = self.repository.write_all(writes).await?;
        info!(writes = activated, "Activated allocation");
        Ok(committed)
    }
}
