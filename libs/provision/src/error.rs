//! Provisioning error taxonomy.

use thiserror::Error;

/// Errors surfaced by capacity allocation and flavor resolution.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The request asked for more capacity than is available and was not
    /// allowed to degrade to a partial allocation.
    #[error("insufficient capacity for {resources} in cluster {cluster}")]
    CapacityExhausted { resources: String, cluster: String },

    /// Mutually exclusive request parameters were combined. Rejected before
    /// any allocation work starts.
    #[error("conflicting request: {0}")]
    ConflictingRequest(String),

    /// A flavor override that cannot be expressed: anything but a disk-size
    /// change, or any override of a synthetic flavor. Configuration error,
    /// never retried.
    #[error("incompatible flavor override: {0}")]
    IncompatibleOverride(String),

    /// A flavor name with no entry in the configured catalog.
    #[error("unknown flavor '{0}'")]
    UnknownFlavor(String),

    /// A zone field that could not be parsed.
    #[error("invalid zone value '{0}'")]
    InvalidZone(String),
}
