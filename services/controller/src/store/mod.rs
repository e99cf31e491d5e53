//! The node record store boundary.
//!
//! Transactional key-value storage keyed by hostname, with compare-and-swap
//! semantics on the node's lifecycle state. Multi-node writes commit
//! atomically: an allocation-plus-activation sequence is observed as a
//! single transition, never as a partially re-allocated cluster.
//!
//! Backends: [`MemoryStore`] for tests and single-process deployments,
//! [`PostgresStore`] for a shared fleet.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::node::{Node, NodeState};

pub use memory::MemoryStore;
pub use postgres::{PostgresStore, PostgresStoreConfig};

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A compare-and-write lost its race: the stored record did not match
    /// the precondition. Recoverable by re-reading and retrying the whole
    /// operation.
    #[error("write conflict on {hostname}: {detail}")]
    Conflict { hostname: String, detail: String },

    /// No record for the hostname.
    #[error("no such node: {0}")]
    NotFound(String),

    /// Record failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Precondition for one node write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional upsert.
    None,
    /// The record must not exist yet.
    Absent,
    /// The stored record must currently be in this state.
    InState(NodeState),
}

/// One node write with its precondition.
#[derive(Debug, Clone)]
pub struct NodeWrite {
    pub node: Node,
    pub precondition: Precondition,
}

impl NodeWrite {
    pub fn unconditional(node: Node) -> Self {
        Self {
            node,
            precondition: Precondition::None,
        }
    }

    pub fn absent(node: Node) -> Self {
        Self {
            node,
            precondition: Precondition::Absent,
        }
    }

    pub fn when_in(node: Node, state: NodeState) -> Self {
        Self {
            node,
            precondition: Precondition::InState(state),
        }
    }
}

/// The store boundary. Backing technology is external to the core; all the
/// core relies on is read, list, and all-or-nothing conditional writes.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn read(&self, hostname: &str) -> Result<Option<Node>, StoreError>;

    async fn list(&self) -> Result<Vec<Node>, StoreError>;

    /// Commit every write or none of them. Returns the committed snapshots.
    async fn write_all(&self, writes: Vec<NodeWrite>) -> Result<Vec<Node>, StoreError>;

    /// Commit a single write.
    async fn write(&self, write: NodeWrite) -> Result<Node, StoreError> {
        let mut committed = self.write_all(vec![write]).await?;
        committed
            .pop()
            .ok_or_else(|| StoreError::NotFound("empty commit".to_string()))
    }
}
