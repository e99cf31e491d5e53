//! Capacity allocation: bin-packing capacity requests onto free hosts while
//! keeping per-cluster membership indices stable.
//!
//! [`AllocationPool`] is an explicit owned value — free hosts bucketed by
//! resource shape, the current allocation of every cluster group, and the
//! index counters — so the computation is pure and deterministic: no store
//! access happens here. Committing a prepared plan is the activation step's
//! job.

use std::collections::{BTreeMap, HashMap, HashSet};

use fleet_provision::{
    ApplicationId, Capacity, ClusterId, ClusterMembership, ClusterSpec, ClusterType, Flavor,
    Group, HostSpec, NodeResources, ProvisionError,
};

use crate::node::{Node, NodeState};

/// Index counters are keyed per cluster, not per group: indices must be
/// unique across all groups of a cluster.
type ClusterKey = (ClusterType, ClusterId);

/// Free and allocated capacity for one fleet.
#[derive(Debug, Clone, Default)]
pub struct AllocationPool {
    /// Free hosts of each resource shape. BTreeMap iteration order is the
    /// allocation preference order, so scanning visits the smallest
    /// sufficient bucket first.
    free: BTreeMap<NodeResources, Vec<String>>,
    allocations: HashMap<ClusterSpec, Vec<HostSpec>>,
    /// Next membership index per cluster. Only ever increases.
    next_index: HashMap<ClusterKey, u32>,
    /// Hostnames flagged to retire: kept in the plan, membership marked.
    to_retire: HashSet<String>,
    start_index: u32,
    /// When set, requests are taken verbatim and exhaustion is an error;
    /// when unset, unneeded counts are clamped to what exists.
    fail_on_out_of_capacity: bool,
}

impl AllocationPool {
    pub fn new(fail_on_out_of_capacity: bool) -> Self {
        Self {
            fail_on_out_of_capacity,
            ..Self::default()
        }
    }

    /// Rebuild pool state from a store snapshot, scoped to one owning
    /// application. Ready nodes form the free pool; the application's
    /// reserved and active nodes keep their allocations; index counters
    /// resume past the highest index any of its allocated records carries,
    /// including inactive and failed ones, so indices never regress across
    /// process restarts.
    pub fn from_nodes(
        nodes: &[Node],
        application: &ApplicationId,
        fail_on_out_of_capacity: bool,
    ) -> Self {
        let mut pool = Self::new(fail_on_out_of_capacity);
        for node in nodes {
            if node.state == NodeState::Ready {
                pool.add_free(node.flavor.resources(), node.hostname.clone());
                continue;
            }
            let Some(allocation) = &node.allocation else {
                continue;
            };
            if allocation.owner != *application {
                continue;
            }
            let membership = &allocation.membership;
            let key = (
                membership.cluster.cluster_type,
                membership.cluster.id.clone(),
            );
            let next = pool.next_index.entry(key).or_insert(0);
            *next = (*next).max(membership.index + 1);

            if matches!(node.state, NodeState::Reserved | NodeState::Active) {
                pool.allocations
                    .entry(membership.cluster.clone())
                    .or_default()
                    .push(HostSpec {
                        hostname: node.hostname.clone(),
                        aliases: Vec::new(),
                        flavor: Some(node.flavor.clone()),
                        requested_resources: None,
                        membership: Some(membership.clone()),
                        version: None,
                    });
            }
        }
        for members in pool.allocations.values_mut() {
            members.sort_by_key(|spec| spec.membership.as_ref().map_or(0, |m| m.index));
        }
        pool
    }

    pub fn with_start_index(self, start_index: u32) -> Self {
        Self {
            start_index,
            ..self
        }
    }

    pub fn with_retired(self, hostnames: impl IntoIterator<Item = String>) -> Self {
        Self {
            to_retire: hostnames.into_iter().collect(),
            ..self
        }
    }

    pub fn add_free(&mut self, resources: NodeResources, hostname: impl Into<String>) {
        self.free.entry(resources).or_default().push(hostname.into());
    }

    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Per-cluster index counters, for carrying monotonicity across pool
    /// rebuilds.
    pub fn next_indices(&self) -> HashMap<(ClusterType, ClusterId), u32> {
        self.next_index.clone()
    }

    /// Merge remembered counters in; the larger value wins on each key.
    pub fn seed_next_indices(&mut self, indices: &HashMap<(ClusterType, ClusterId), u32>) {
        for (key, &index) in indices {
            let next = self.next_index.entry(key.clone()).or_insert(0);
            *next = (*next).max(index);
        }
    }

    /// Nodes currently allocated to any group of this cluster.
    fn allocated_to(&self, cluster: &ClusterSpec) -> usize {
        self.allocations
            .iter()
            .filter(|(spec, _)| {
                spec.cluster_type == cluster.cluster_type && spec.id == cluster.id
            })
            .map(|(_, members)| members.len())
            .sum()
    }

    /// Produce an ordered list of host specs satisfying the request,
    /// reusing compatible members already allocated to the cluster and
    /// drawing the rest from the free pool.
    pub fn prepare(
        &mut self,
        cluster: &ClusterSpec,
        capacity: &Capacity,
    ) -> Result<Vec<HostSpec>, ProvisionError> {
        if cluster.group.is_some() && capacity.groups > 1 {
            return Err(ProvisionError::ConflictingRequest(
                "cannot both specify a group and ask for groups to be created".to_string(),
            ));
        }

        let count = if capacity.required || self.fail_on_out_of_capacity {
            capacity.node_count
        } else {
            capacity
                .node_count
                .min((self.free_count() + self.allocated_to(cluster)) as u32)
        };
        let groups = capacity.groups.min(count);

        let mut plan: Vec<HostSpec> = Vec::new();
        if groups <= 1 {
            let group = cluster.group.unwrap_or(Group::new(0));
            plan.extend(self.allocate_group(
                &cluster.clone().with_group(group),
                capacity.resources.as_ref(),
                count as usize,
                self.start_index,
                capacity.can_fail,
            )?);
        } else {
            for index in 0..groups {
                let start = plan.len() as u32;
                plan.extend(self.allocate_group(
                    &cluster.clone().with_group(Group::new(index)),
                    capacity.resources.as_ref(),
                    (count / groups) as usize,
                    start,
                    capacity.can_fail,
                )?);
            }
        }

        for spec in plan.iter_mut() {
            if self.to_retire.contains(&spec.hostname) {
                *spec = spec.clone().retired();
            }
        }
        Ok(plan)
    }

    fn allocate_group(
        &mut self,
        group_cluster: &ClusterSpec,
        requested: Option<&NodeResources>,
        target: usize,
        start_index: u32,
        can_fail: bool,
    ) -> Result<Vec<HostSpec>, ProvisionError> {
        let mut members = self.allocations.remove(group_cluster).unwrap_or_default();

        // Members whose shape no longer matches the request are evicted;
        // their capacity returns to the free pool under their own resources.
        if let Some(requested) = requested {
            let mut kept = Vec::with_capacity(members.len());
            for member in members {
                match member.flavor.as_ref().map(Flavor::resources) {
                    Some(resources) if !resources.compatible_with(requested) => {
                        self.add_free(resources, member.hostname);
                    }
                    _ => kept.push(member),
                }
            }
            members = kept;
        }

        let key = (group_cluster.cluster_type, group_cluster.id.clone());
        let mut next_index = self.next_index.get(&key).copied().unwrap_or(start_index);

        while members.len() < target {
            let Some((resources, hostname)) = self.take_smallest_satisfying(requested) else {
                if can_fail {
                    return Err(ProvisionError::CapacityExhausted {
                        resources: requested
                            .map_or_else(|| "unspecified resources".to_string(), ToString::to_string),
                        cluster: group_cluster.to_string(),
                    });
                }
                break;
            };
            let membership = ClusterMembership::new(group_cluster.clone(), next_index);
            next_index += 1;
            members.push(HostSpec {
                hostname,
                aliases: Vec::new(),
                flavor: Some(Flavor::synthetic(resources)),
                requested_resources: requested.copied(),
                membership: Some(membership),
                version: None,
            });
        }
        self.next_index.insert(key, next_index);

        // Shrink from the front: the oldest-assigned members are released
        // first, and their capacity returns to the free pool.
        while members.len() > target {
            let removed = members.remove(0);
            if let Some(resources) = removed.flavor.as_ref().map(Flavor::resources) {
                self.add_free(resources, removed.hostname);
            }
        }

        self.allocations
            .insert(group_cluster.clone(), members.clone());
        Ok(members)
    }

    /// Pop one host from the smallest bucket that satisfies the request.
    fn take_smallest_satisfying(
        &mut self,
        requested: Option<&NodeResources>,
    ) -> Option<(NodeResources, String)> {
        let resources = self
            .free
            .iter()
            .filter(|(_, hosts)| !hosts.is_empty())
            .map(|(resources, _)| *resources)
            .find(|resources| requested.is_none_or(|request| resources.satisfies(request)))?;

        let hosts = self.free.get_mut(&resources)?;
        let hostname = hosts.remove(0);
        if hosts.is_empty() {
            self.free.remove(&resources);
        }
        Some((resources, hostname))
    }
}
