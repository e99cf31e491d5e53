//! # fleet-provision
//!
//! Value types describing hardware capacity and capacity requests for the
//! fleet control plane.
//!
//! ## Design Principles
//!
//! - Everything here is an immutable value: resources, flavors, cluster
//!   specs, and host specs are replaced wholly, never mutated in place
//! - The ordering on [`NodeResources`] is the allocation preference order,
//!   so sorted collections visit the smallest sufficient shape first
//! - All values round-trip through serde (node records are persisted as
//!   serialized documents)

mod application;
mod capacity;
mod cluster;
mod error;
mod flavor;
mod host_spec;
mod resources;
mod zone;

pub use application::ApplicationId;
pub use capacity::Capacity;
pub use cluster::{ClusterId, ClusterMembership, ClusterSpec, ClusterType, Group};
pub use error::ProvisionError;
pub use flavor::{Flavor, NodeFlavors};
pub use host_spec::HostSpec;
pub use resources::{DiskSpeed, NodeResources, StorageType};
pub use zone::{Environment, SystemName, Zone};
