//! Node records and node typing.
//!
//! A [`Node`] is an immutable snapshot of one machine or container node in
//! the fleet. Changes are expressed with `with_*` methods that produce a new
//! value, which is then committed through the store's compare-and-write
//! primitive; nothing here mutates in place.

mod history;
mod state;
mod status;

use chrono::{DateTime, Utc};
use fleet_provision::{ApplicationId, ClusterMembership, ClusterSpec, Flavor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use history::{History, HistoryEvent, HistoryEventType};
pub use state::NodeState;
pub use status::{Report, ReportType, Reports, Status};

/// Who initiated a change to a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    System,
    Operator,
    Application,
}

/// Fleet node categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Physical or virtual machine capable of running container nodes.
    Host,
    /// Tenant node, standalone or carved out of a host.
    Tenant,
    /// Edge routing node, externally managed.
    Proxy,
    /// Config server node.
    Config,
    /// Controller node.
    Controller,
}

impl NodeType {
    /// True for types that can have child nodes provisioned on them.
    pub fn is_host(self) -> bool {
        matches!(self, Self::Host)
    }

    /// True for types in the self-service pool that the failed-node expirer
    /// may recycle automatically. Proxy, config, and controller nodes are
    /// operator-managed and stay failed until someone intervenes.
    pub fn is_auto_recyclable(self) -> bool {
        matches!(self, Self::Tenant | Self::Host)
    }
}

/// A node's assignment to an application cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub owner: ApplicationId,
    pub membership: ClusterMembership,
}

impl Allocation {
    pub fn new(owner: ApplicationId, membership: ClusterMembership) -> Self {
        Self { owner, membership }
    }
}

/// A node record: identity, attributes, lifecycle state, status, and the
/// current allocation if any.
///
/// A node with a parent hostname is a container whose resources are carved
/// from the parent host's flavor; the parent must exist in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub hostname: String,
    pub parent_hostname: Option<String>,
    pub node_type: NodeType,
    pub flavor: Flavor,
    pub state: NodeState,
    pub status: Status,
    pub allocation: Option<Allocation>,
    pub history: History,
}

impl Node {
    /// A freshly provisioned node.
    pub fn create(
        id: Uuid,
        hostname: impl Into<String>,
        parent_hostname: Option<String>,
        flavor: Flavor,
        node_type: NodeType,
    ) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            parent_hostname,
            node_type,
            flavor,
            state: NodeState::Provisioned,
            status: Status::default(),
            allocation: None,
            history: History::default(),
        }
    }

    /// A copy in the given state. Legality of the transition is the
    /// repository's concern, not this record's.
    pub fn with_state(self, state: NodeState) -> Self {
        Self { state, ..self }
    }

    pub fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    pub fn with_allocation(self, allocation: Allocation) -> Self {
        Self {
            allocation: Some(allocation),
            ..self
        }
    }

    pub fn without_allocation(self) -> Self {
        Self {
            allocation: None,
            ..self
        }
    }

    pub fn with_flavor(self, flavor: Flavor) -> Self {
        Self { flavor, ..self }
    }

    /// A copy with a transition into `state` recorded in its history.
    pub fn recording(self, state: NodeState, at: DateTime<Utc>, agent: Agent) -> Self {
        let history = self.history.clone().with_event(HistoryEvent {
            event_type: HistoryEventType::for_state(state),
            at,
            agent,
        });
        Self { history, ..self }
    }

    pub fn is_child_of(&self, parent: &str) -> bool {
        self.parent_hostname.as_deref() == Some(parent)
    }

    /// The cluster this node is allocated to, if any.
    pub fn allocated_cluster(&self) -> Option<&ClusterSpec> {
        self.allocation
            .as_ref()
            .map(|allocation| &allocation.membership.cluster)
    }
}
