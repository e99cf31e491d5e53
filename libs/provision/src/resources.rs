//! Hardware resource shapes and the ordering used for bin-packing.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Disk speed class offered by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskSpeed {
    Fast,
    Slow,
}

impl fmt::Display for DiskSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

/// Where a node's disk lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Local,
    Remote,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// The hardware resources of a node, or the shape of a capacity request.
///
/// Ordering is the allocation preference order: memory, then disk, then
/// vcpu, ascending (remaining fields are tie-breakers to keep the order
/// total). Iterating a sorted collection therefore visits the smallest
/// sufficient shape first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeResources {
    pub vcpu: f64,
    pub memory_gb: f64,
    pub disk_gb: f64,
    pub bandwidth_gbps: f64,
    pub disk_speed: DiskSpeed,
    pub storage_type: StorageType,
}

impl NodeResources {
    /// A shape with fast local disk, the common case.
    pub fn new(vcpu: f64, memory_gb: f64, disk_gb: f64, bandwidth_gbps: f64) -> Self {
        Self {
            vcpu,
            memory_gb,
            disk_gb,
            bandwidth_gbps,
            disk_speed: DiskSpeed::Fast,
            storage_type: StorageType::Local,
        }
    }

    pub fn with_disk_gb(self, disk_gb: f64) -> Self {
        Self { disk_gb, ..self }
    }

    pub fn with_disk_speed(self, disk_speed: DiskSpeed) -> Self {
        Self { disk_speed, ..self }
    }

    pub fn with_storage_type(self, storage_type: StorageType) -> Self {
        Self { storage_type, ..self }
    }

    /// True if this offers at least the requested amount on every numeric
    /// dimension, with matching disk speed and storage type.
    pub fn satisfies(&self, request: &NodeResources) -> bool {
        self.vcpu >= request.vcpu
            && self.memory_gb >= request.memory_gb
            && self.disk_gb >= request.disk_gb
            && self.bandwidth_gbps >= request.bandwidth_gbps
            && self.disk_speed == request.disk_speed
            && self.storage_type == request.storage_type
    }

    /// True if this has the same shape as `other`, disregarding disk size.
    ///
    /// Used to decide whether an existing allocation can be kept rather
    /// than replaced.
    pub fn compatible_with(&self, other: &NodeResources) -> bool {
        self.vcpu == other.vcpu
            && self.memory_gb == other.memory_gb
            && self.bandwidth_gbps == other.bandwidth_gbps
            && self.disk_speed == other.disk_speed
            && self.storage_type == other.storage_type
    }
}

impl PartialEq for NodeResources {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NodeResources {}

impl PartialOrd for NodeResources {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeResources {
    fn cmp(&self, other: &Self) -> Ordering {
        self.memory_gb
            .total_cmp(&other.memory_gb)
            .then_with(|| self.disk_gb.total_cmp(&other.disk_gb))
            .then_with(|| self.vcpu.total_cmp(&other.vcpu))
            .then_with(|| self.bandwidth_gbps.total_cmp(&other.bandwidth_gbps))
            .then_with(|| self.disk_speed.cmp(&other.disk_speed))
            .then_with(|| self.storage_type.cmp(&other.storage_type))
    }
}

impl fmt::Display for NodeResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[vcpu: {}, memory: {} Gb, disk: {} Gb, bandwidth: {} Gbps, disk speed: {}, storage type: {}]",
            self.vcpu, self.memory_gb, self.disk_gb, self.bandwidth_gbps, self.disk_speed, self.storage_type
        )
    }
}
