//! In-memory node store.
//!
//! Used by the test suites and by single-process deployments without a
//! database. Writes hold one lock across validation and application, which
//! gives the same all-or-nothing, serialized-writer semantics the Postgres
//! backend gets from transactions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::node::Node;

use super::{NodeStore, NodeWrite, Precondition, StoreError};

/// Node records keyed by hostname, ordered for deterministic listing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn read(&self, hostname: &str) -> Result<Option<Node>, StoreError> {
        let nodes = self.nodes.lock().expect("node store mutex poisoned");
        Ok(nodes.get(hostname).cloned())
    }

    async fn list(&self) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.lock().expect("node store mutex poisoned");
        Ok(nodes.values().cloned().collect())
    }

    async fn write_all(&self, writes: Vec<NodeWrite>) -> Result<Vec<Node>, StoreError> {
        let mut nodes = self.nodes.lock().expect("node store mutex poisoned");

        // Validate every precondition before touching anything.
        for write in &writes {
            let hostname = &write.node.hostname;
            let current = nodes.get(hostname);
            match (write.precondition, current) {
                (Precondition::None, _) => {}
                (Precondition::Absent, None) => {}
                (Precondition::Absent, Some(_)) => {
                    return Err(StoreError::Conflict {
                        hostname: hostname.clone(),
                        detail: "record already exists".to_string(),
                    });
                }
                (Precondition::InState(expected), Some(node)) if node.state == expected => {}
                (Precondition::InState(expected), Some(node)) => {
                    return Err(StoreError::Conflict {
                        hostname: hostname.clone(),
                        detail: format!("expected state {expected}, found {}", node.state),
                    });
                }
                (Precondition::InState(expected), None) => {
                    return Err(StoreError::Conflict {
                        hostname: hostname.clone(),
                        detail: format!("expected state {expected}, found no record"),
                    });
                }
            }
        }

        let mut committed = Vec::with_capacity(writes.len());
        for write in writes {
            nodes.insert(write.node.hostname.clone(), write.node.clone());
            committed.push(write.node);
        }
        Ok(committed)
    }
}
