//! Pods: the workload requests placed by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{NodeName, PodId};
use crate::resources::ResourceList;

/// Placement status of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PodStatus {
    /// Waiting in the queue for a node.
    Pending,
    /// Bound to a node at the given simulated instant.
    Bound {
        /// The node the pod was bound to.
        node: NodeName,
        /// Simulated time of the bind.
        at: DateTime<Utc>,
    },
}

/// A workload request: a named resource demand with a priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Unique pod identity.
    pub id: PodId,
    /// Human-readable name, used in logs.
    pub name: String,
    /// Resource demand, per dimension.
    pub demand: ResourceList,
    /// Scheduling priority. Higher values are scheduled first.
    pub priority: i32,
    /// Simulated time the pod was submitted. `None` until submission.
    pub created_at: Option<DateTime<Utc>>,
    /// Current placement status.
    pub status: PodStatus,
}

impl Pod {
    /// Create a pending pod with a fresh identity.
    pub fn new(name: impl Into<String>, demand: ResourceList, priority: i32) -> Self {
        Self {
            id: PodId::new(),
            name: name.into(),
            demand,
            priority,
            created_at: None,
            status: PodStatus::Pending,
        }
    }

    /// Whether the pod has been bound to a node.
    pub const fn is_bound(&self) -> bool {
        matches!(self.status, PodStatus::Bound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::CPU;

    #[test]
    fn new_pod_is_pending_and_unstamped() {
        let pod = Pod::new("web-0", ResourceList::new().with(CPU, 500), 3);
        assert_eq!(pod.status, PodStatus::Pending);
        assert!(pod.created_at.is_none());
        assert!(!pod.is_bound());
    }

    #[test]
    fn bound_status_is_bound() {
        let mut pod = Pod::new("web-0", ResourceList::new(), 0);
        pod.status = PodStatus::Bound {
            node: NodeName::from("node-a"),
            at: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert!(pod.is_bound());
    }

    #[test]
    fn status_serializes_with_phase_tag() {
        let json = serde_json::to_value(&PodStatus::Pending).ok();
        assert_eq!(json, Some(serde_json::json!({ "phase": "pending" })));
    }
}
