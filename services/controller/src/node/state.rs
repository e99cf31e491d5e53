//! The node lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a node.
///
/// The steady recycle loop is provisioned → ready → reserved → active →
/// inactive → dirty → ready. Any in-service state can branch to failed;
/// failed resolves to dirty (recycled) or parked (quarantined pending
/// operator attention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Provisioned,
    Ready,
    Reserved,
    Active,
    Inactive,
    Dirty,
    Failed,
    Parked,
}

impl NodeState {
    /// Whether a transition from this state to `next` is legal.
    ///
    /// `ready` is reachable only from `dirty` (or directly from
    /// `provisioned`): an allocated node never re-enters the available pool
    /// without re-validation. `parked` exits only by manual action.
    pub fn allows(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Provisioned, Dirty | Ready | Failed)
                | (Ready, Reserved | Dirty | Failed)
                | (Reserved, Active | Dirty | Failed)
                | (Active, Inactive | Failed)
                | (Inactive, Active | Dirty | Failed)
                | (Dirty, Ready | Failed)
                | (Failed, Dirty | Parked)
                | (Parked, Dirty | Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Provisioned => "provisioned",
            Self::Ready => "ready",
            Self::Reserved => "reserved",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Dirty => "dirty",
            Self::Failed => "failed",
            Self::Parked => "parked",
        };
        write!(f, "{name}")
    }
}
