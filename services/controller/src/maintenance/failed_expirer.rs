//! Failed-node expiry: decide, per failed node, whether it is safely
//! recyclable or must be parked for human intervention.
//!
//! The wait before acting depends on the zone: short in test and CD zones
//! so capacity turns over fast, multi-day in production to leave room for
//! data recovery. Nodes in stateless container clusters recycle on a short
//! threshold everywhere — there is no data to recover, and holding capacity
//! hostage for a transient application fault helps nobody.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use fleet_provision::{ClusterType, Environment, SystemName, Zone};

use crate::node::{Agent, HistoryEventType, Node, NodeState};
use crate::repository::{NodeRepository, RepositoryError};
use crate::store::StoreError;

/// Give up on automatic recycling after this many failures.
const MAX_ALLOWED_FAILURES: u32 = 5;

/// Resolved expiry thresholds for one zone.
#[derive(Debug, Clone)]
pub struct FailedExpirerPolicy {
    /// Wait before a failed node becomes a candidate for recycling.
    pub default_expiry: Duration,
    /// Wait for nodes allocated to stateless container clusters, in every
    /// environment.
    pub container_expiry: Duration,
    /// Fail counts at or above this park the node instead of recycling it.
    pub max_allowed_failures: u32,
}

impl FailedExpirerPolicy {
    pub fn for_zone(zone: &Zone) -> Self {
        let default_expiry = if zone.system == SystemName::Cd {
            Duration::minutes(30)
        } else {
            match zone.environment {
                Environment::Dev | Environment::Test | Environment::Staging => Duration::hours(1),
                Environment::Prod => Duration::days(4),
            }
        };
        Self {
            default_expiry,
            container_expiry: Duration::hours(1),
            max_allowed_failures: MAX_ALLOWED_FAILURES,
        }
    }
}

/// What one expiry pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub recycled: BTreeSet<String>,
    pub parked: BTreeSet<String>,
}

impl ExpiryOutcome {
    pub fn is_empty(&self) -> bool {
        self.recycled.is_empty() && self.parked.is_empty()
    }
}

/// The failed-node expirer.
pub struct FailedExpirer {
    repository: NodeRepository,
    policy: FailedExpirerPolicy,
}

impl FailedExpirer {
    pub fn new(repository: NodeRepository, zone: &Zone) -> Self {
        Self {
            repository,
            policy: FailedExpirerPolicy::for_zone(zone),
        }
    }

    pub fn with_policy(repository: NodeRepository, policy: FailedExpirerPolicy) -> Self {
        Self { repository, policy }
    }

    /// One expiry pass over every failed node.
    ///
    /// Idempotent: nodes already transitioned out of `failed` are left
    /// alone, and a write race lost to a concurrent transition no-ops. A
    /// single node's write failure is logged and does not abort the scan.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ExpiryOutcome, RepositoryError> {
        let mut outcome = ExpiryOutcome::default();
        let nodes = self.repository.list().await?;

        for node in &nodes {
            if node.state != NodeState::Failed || !node.node_type.is_auto_recyclable() {
                continue;
            }
            if !self.expired(node, now) {
                continue;
            }
            match self.dispose(node, &nodes, &mut outcome).await {
                Ok(()) => {}
                Err(RepositoryError::Store(StoreError::Conflict { .. })) => {
                    debug!(
                        hostname = %node.hostname,
                        "Node changed state concurrently; leaving it alone"
                    );
                }
                Err(e) => {
                    warn!(hostname = %node.hostname, error = %e, "Failed to expire node");
                }
            }
        }

        if !outcome.is_empty() {
            info!(
                recycled = outcome.recycled.len(),
                parked = outcome.parked.len(),
                "Failed-node expiry pass complete"
            );
        }
        Ok(outcome)
    }

    /// Whether the node has been failed long enough to act on. A failed
    /// node without an allocation holds no data and is expired immediately.
    fn expired(&self, node: &Node, now: DateTime<Utc>) -> bool {
        let Some(allocation) = &node.allocation else {
            return true;
        };
        let expiry = if allocation.membership.cluster.cluster_type == ClusterType::Container
            && node.status.fail_count >= 1
        {
            self.policy.container_expiry
        } else {
            self.policy.default_expiry
        };
        match node.history.at(HistoryEventType::Failed) {
            Some(failed_at) => now - failed_at >= expiry,
            None => true,
        }
    }

    async fn dispose(
        &self,
        node: &Node,
        all: &[Node],
        outcome: &mut ExpiryOutcome,
    ) -> Result<(), RepositoryError> {
        let hardware_issue = node.status.reports.has_hard_fail();
        if hardware_issue || node.status.fail_count >= self.policy.max_allowed_failures {
            // A host is only parked once every child on it is failed or
            // parked; until then it stays failed so its other tenants are
            // not disturbed.
            if node.node_type.is_host() {
                let unparked: Vec<&str> = all
                    .iter()
                    .filter(|child| child.is_child_of(&node.hostname))
                    .filter(|child| !matches!(child.state, NodeState::Failed | NodeState::Parked))
                    .map(|child| child.hostname.as_str())
                    .collect();
                if !unparked.is_empty() {
                    info!(
                        hostname = %node.hostname,
                        unparked_children = ?unparked,
                        "Not parking failed host; children still in service"
                    );
                    return Ok(());
                }
            }
            let reason = if hardware_issue {
                "hardware issue"
            } else {
                "too many failures"
            };
            self.repository
                .park(&node.hostname, Agent::System, reason)
                .await?;
            outcome.parked.insert(node.hostname.clone());
        } else {
            self.repository
                .set_dirty(&[node.hostname.as_str()], Agent::System, "expired failed node")
                .await?;
            outcome.recycled.insert(node.hostname.clone());
        }
        Ok(())
    }
}
