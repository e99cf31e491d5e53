//! Cluster identity and membership.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The kind of service a cluster runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Stateful content cluster holding tenant data.
    Content,
    /// Stateless serving container cluster.
    Container,
    /// Administrative cluster.
    Admin,
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Container => write!(f, "container"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Application-scoped cluster identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group index within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(u32);

impl Group {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cluster specification.
///
/// Two specs are allocation-equivalent when type, id, and group match; the
/// version does not participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub cluster_type: ClusterType,
    pub id: ClusterId,
    pub group: Option<Group>,
    pub version: String,
}

impl ClusterSpec {
    /// A request for a cluster without a specific group.
    pub fn request(cluster_type: ClusterType, id: ClusterId, version: impl Into<String>) -> Self {
        Self {
            cluster_type,
            id,
            group: None,
            version: version.into(),
        }
    }

    pub fn with_group(self, group: Group) -> Self {
        Self {
            group: Some(group),
            ..self
        }
    }
}

impl PartialEq for ClusterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.cluster_type == other.cluster_type && self.id == other.id && self.group == other.group
    }
}

impl Eq for ClusterSpec {}

impl Hash for ClusterSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cluster_type.hash(state);
        self.id.hash(state);
        self.group.hash(state);
    }
}

impl fmt::Display for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster_type, self.id)?;
        if let Some(group) = self.group {
            write!(f, "/{group}")?;
        }
        Ok(())
    }
}

/// A node's assigned role within a cluster group: cluster identity plus a
/// sequential index and a retired flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMembership {
    pub cluster: ClusterSpec,
    pub index: u32,
    pub retired: bool,
}

impl ClusterMembership {
    pub fn new(cluster: ClusterSpec, index: u32) -> Self {
        Self {
            cluster,
            index,
            retired: false,
        }
    }

    /// A copy of this membership marked retired. Retirement is advisory,
    /// consumed by rebalancing downstream.
    pub fn retire(self) -> Self {
        Self {
            retired: true,
            ..self
        }
    }
}
