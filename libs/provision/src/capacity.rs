//! Capacity requests.

use serde::{Deserialize, Serialize};

use crate::NodeResources;

/// A request for capacity for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    /// Requested node count.
    pub node_count: u32,
    /// Requested resource shape. `None` means "use the default shape".
    pub resources: Option<NodeResources>,
    /// Requested group count. Never more groups than nodes are created.
    pub groups: u32,
    /// Reject the request entirely if it cannot be met.
    pub required: bool,
    /// When false, under-allocate silently instead of erroring.
    pub can_fail: bool,
}

impl Capacity {
    pub fn from_count(node_count: u32, resources: Option<NodeResources>) -> Self {
        Self {
            node_count,
            resources,
            groups: 1,
            required: false,
            can_fail: true,
        }
    }

    pub fn with_groups(self, groups: u32) -> Self {
        Self { groups, ..self }
    }

    pub fn with_required(self, required: bool) -> Self {
        Self { required, ..self }
    }

    pub fn with_can_fail(self, can_fail: bool) -> Self {
        Self { can_fail, ..self }
    }
}
