//! Host specifications: the outcome of allocation for one slot.

use serde::{Deserialize, Serialize};

use crate::{ClusterMembership, Flavor, NodeResources};

/// One allocated slot: a hostname with the flavor it was drawn as and its
/// role in the cluster. Produced by the allocator, consumed by activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSpec {
    pub hostname: String,
    pub aliases: Vec<String>,
    pub flavor: Option<Flavor>,
    /// The shape the request asked for, when it was specified.
    pub requested_resources: Option<NodeResources>,
    pub membership: Option<ClusterMembership>,
    pub version: Option<String>,
}

impl HostSpec {
    pub fn new(
        hostname: impl Into<String>,
        flavor: Option<Flavor>,
        membership: Option<ClusterMembership>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            aliases: Vec::new(),
            flavor,
            requested_resources: None,
            membership,
            version: None,
        }
    }

    /// A copy with the membership marked retired. A spec without membership
    /// is returned unchanged.
    pub fn retired(self) -> Self {
        Self {
            membership: self.membership.map(ClusterMembership::retire),
            ..self
        }
    }
}
