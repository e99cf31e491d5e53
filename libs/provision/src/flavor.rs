//! Node flavors: configured catalog entries and synthetic container shapes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{NodeResources, ProvisionError};

/// A host or node flavor.
///
/// Configured flavors come from the zone's hardware inventory and are
/// identified by name; synthetic flavors wrap an arbitrary resource shape
/// and describe containers carved dynamically out of a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flavor {
    Configured {
        name: String,
        resources: NodeResources,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disk_override_gb: Option<f64>,
    },
    Synthetic {
        resources: NodeResources,
    },
}

impl Flavor {
    pub fn configured(name: impl Into<String>, resources: NodeResources) -> Self {
        Self::Configured {
            name: name.into(),
            resources,
            disk_override_gb: None,
        }
    }

    pub fn synthetic(resources: NodeResources) -> Self {
        Self::Synthetic { resources }
    }

    /// The flavor name if configured, or the resource spec string otherwise.
    pub fn name(&self) -> String {
        match self {
            Self::Configured { name, .. } => name.clone(),
            Self::Synthetic { resources } => resources.to_string(),
        }
    }

    /// The effective resources, with any disk override applied.
    pub fn resources(&self) -> NodeResources {
        match self {
            Self::Configured {
                resources,
                disk_override_gb,
                ..
            } => disk_override_gb.map_or(*resources, |disk| resources.with_disk_gb(disk)),
            Self::Synthetic { resources } => *resources,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }

    /// Override the disk size. Only legal on configured flavors.
    pub fn with_disk_override(self, disk_gb: f64) -> Result<Self, ProvisionError> {
        match self {
            Self::Configured { name, resources, .. } => Ok(Self::Configured {
                name,
                resources,
                disk_override_gb: Some(disk_gb),
            }),
            Self::Synthetic { .. } => Err(ProvisionError::IncompatibleOverride(
                "cannot override a synthetic flavor".to_string(),
            )),
        }
    }

    /// Replace this flavor's resources. A synthetic flavor takes any shape;
    /// a configured flavor only accepts a disk-size change.
    pub fn with_resources(self, new: NodeResources) -> Result<Self, ProvisionError> {
        match &self {
            Self::Synthetic { .. } => Ok(Self::Synthetic { resources: new }),
            Self::Configured { .. } => {
                if self.resources().with_disk_gb(new.disk_gb) != new {
                    return Err(ProvisionError::IncompatibleOverride(format!(
                        "can only override disk size of configured flavor '{}'",
                        self.name()
                    )));
                }
                self.with_disk_override(new.disk_gb)
            }
        }
    }
}

/// Configured flavors compare by name and override; synthetic flavors by
/// resources.
impl PartialEq for Flavor {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Configured {
                    name: a,
                    disk_override_gb: oa,
                    ..
                },
                Self::Configured {
                    name: b,
                    disk_override_gb: ob,
                    ..
                },
            ) => a == b && oa.map(f64::to_bits) == ob.map(f64::to_bits),
            (Self::Synthetic { resources: a }, Self::Synthetic { resources: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Flavor {}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured {
                name,
                disk_override_gb,
                ..
            } => match disk_override_gb {
                Some(disk) => write!(f, "flavor '{name}' with disk override {disk} Gb"),
                None => write!(f, "flavor '{name}'"),
            },
            Self::Synthetic { resources } => write!(f, "{resources}"),
        }
    }
}

/// The configured flavor catalog for a zone.
#[derive(Debug, Clone, Default)]
pub struct NodeFlavors {
    flavors: HashMap<String, Flavor>,
}

impl NodeFlavors {
    pub fn new(flavors: impl IntoIterator<Item = Flavor>) -> Self {
        Self {
            flavors: flavors
                .into_iter()
                .map(|flavor| (flavor.name(), flavor))
                .collect(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&Flavor> {
        self.flavors.get(name)
    }

    pub fn get(&self, name: &str) -> Result<&Flavor, ProvisionError> {
        self.find(name)
            .ok_or_else(|| ProvisionError::UnknownFlavor(name.to_string()))
    }
}
