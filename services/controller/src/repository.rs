//! The node repository: the authoritative hostname → record mapping and the
//! rules for moving nodes between lifecycle states.
//!
//! Every transition is one compare-and-write against the store, conditioned
//! on the state the node was read in, and carries the acting agent and a
//! reason. Illegal transitions are rejected before any store access.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::node::{Agent, Node, NodeState};
use crate::store::{NodeStore, NodeWrite, StoreError};

/// Repository operation errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested transition is not in the lifecycle state machine.
    #[error("illegal transition for {hostname}: {from} -> {to}")]
    IllegalTransition {
        hostname: String,
        from: NodeState,
        to: NodeState,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared handle on the node record store with lifecycle rules applied.
#[derive(Clone)]
pub struct NodeRepository {
    store: Arc<dyn NodeStore>,
}

impl NodeRepository {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Register freshly provisioned nodes. Fails if any hostname exists.
    pub async fn add_nodes(
        &self,
        nodes: Vec<Node>,
        agent: Agent,
    ) -> Result<Vec<Node>, RepositoryError> {
        let now = Utc::now();
        let writes = nodes
            .into_iter()
            .map(|node| {
                let node = node.recording(NodeState::Provisioned, now, agent);
                NodeWrite::absent(node)
            })
            .collect();
        Ok(self.store.write_all(writes).await?)
    }

    pub async fn get(&self, hostname: &str) -> Result<Option<Node>, RepositoryError> {
        Ok(self.store.read(hostname).await?)
    }

    pub async fn list(&self) -> Result<Vec<Node>, RepositoryError> {
        Ok(self.store.list().await?)
    }

    pub async fn list_in_state(&self, state: NodeState) -> Result<Vec<Node>, RepositoryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|node| node.state == state)
            .collect())
    }

    /// Child nodes provisioned on the given host.
    pub async fn children_of(&self, hostname: &str) -> Result<Vec<Node>, RepositoryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|node| node.is_child_of(hostname))
            .collect())
    }

    /// Write a node record unconditionally on state (used for status
    /// updates such as attaching reports; the state itself must not change).
    pub async fn write(&self, node: Node) -> Result<Node, RepositoryError> {
        let state = node.state;
        Ok(self.store.write(NodeWrite::when_in(node, state)).await?)
    }

    /// Raw conditional multi-node commit. Used by activation, which builds
    /// its own transition chain.
    pub async fn write_all(&self, writes: Vec<NodeWrite>) -> Result<Vec<Node>, RepositoryError> {
        Ok(self.store.write_all(writes).await?)
    }

    /// Move nodes to `dirty`, deallocating them. The health-check
    /// collaborator promotes them back to `ready` once re-validation passes.
    pub async fn set_dirty(
        &self,
        hostnames: &[&str],
        agent: Agent,
        reason: &str,
    ) -> Result<Vec<Node>, RepositoryError> {
        let mut moved = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            moved.push(
                self.transition(hostname, NodeState::Dirty, agent, reason, |node| {
                    node.without_allocation()
                })
                .await?,
            );
        }
        Ok(moved)
    }

    /// Move re-validated nodes into the available pool.
    pub async fn set_ready(
        &self,
        hostnames: &[&str],
        agent: Agent,
        reason: &str,
    ) -> Result<Vec<Node>, RepositoryError> {
        let mut moved = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            moved.push(
                self.transition(hostname, NodeState::Ready, agent, reason, |node| node)
                    .await?,
            );
        }
        Ok(moved)
    }

    /// Fail a node, incrementing its fail count. The allocation is kept so
    /// the expirer can see what the node was doing when it failed.
    pub async fn fail(
        &self,
        hostname: &str,
        agent: Agent,
        reason: &str,
    ) -> Result<Node, RepositoryError> {
        self.transition(hostname, NodeState::Failed, agent, reason, |node| {
            let status = node.status.clone().with_increased_fail_count();
            node.with_status(status)
        })
        .await
    }

    /// Park a node pending operator attention.
    pub async fn park(
        &self,
        hostname: &str,
        agent: Agent,
        reason: &str,
    ) -> Result<Node, RepositoryError> {
        self.transition(hostname, NodeState::Parked, agent, reason, |node| node)
            .await
    }

    async fn transition(
        &self,
        hostname: &str,
        to: NodeState,
        agent: Agent,
        reason: &str,
        mutate: impl FnOnce(Node) -> Node,
    ) -> Result<Node, RepositoryError> {
        let node = self
            .get(hostname)
            .await?
            .ok_or_else(|| StoreError::NotFound(hostname.to_string()))?;
        let from = node.state;
        if !from.allows(to) {
            return Err(RepositoryError::IllegalTransition {
                hostname: hostname.to_string(),
                from,
                to,
            });
        }

        let next = mutate(node)
            .with_state(to)
            .recording(to, Utc::now(), agent);
        let committed = self.store.write(NodeWrite::when_in(next, from)).await?;

        info!(
            hostname = %hostname,
            from = %from,
            to = %to,
            agent = ?agent,
            reason = %reason,
            "Node state changed"
        );
        Ok(committed)
    }
}
