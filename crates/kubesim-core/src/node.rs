//! Node resource ledger.
//!
//! A [`Node`] tracks its capacity and the pods bound to it. The available
//! vector is kept in step with every bind, so for every dimension the sum of
//! assigned demand never exceeds capacity: [`Node::bind`] rejects any pod
//! that does not fit.
//!
//! The scheduler never sees a `Node` directly; it works on immutable
//! [`NodeSnapshot`] values taken once per tick.

use chrono::{DateTime, Utc};
use kubesim_types::{NodeName, Pod, PodId, PodStatus, ResourceList};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Errors that can occur when mutating a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The pod's demand exceeds the node's available capacity.
    #[error("pod {pod} does not fit on node {node}: demand {demand}, available {available}")]
    InsufficientCapacity {
        /// The node that rejected the pod.
        node: NodeName,
        /// Name of the rejected pod.
        pod: String,
        /// The pod's demand.
        demand: ResourceList,
        /// The node's available capacity at the time of the bind.
        available: ResourceList,
    },

    /// The assigned total would overflow the integer range.
    #[error("allocation overflow on node {node}")]
    AllocationOverflow {
        /// The node whose ledger overflowed.
        node: NodeName,
    },
}

/// A simulated machine with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: NodeName,
    capacity: ResourceList,
    allocated: ResourceList,
    pods: Vec<Pod>,
}

impl Node {
    /// Create an empty node with the given capacity.
    pub const fn new(name: NodeName, capacity: ResourceList) -> Self {
        Self {
            name,
            capacity,
            allocated: ResourceList::new(),
            pods: Vec::new(),
        }
    }

    /// The node's name.
    pub const fn name(&self) -> &NodeName {
        &self.name
    }

    /// Total capacity.
    pub const fn capacity(&self) -> &ResourceList {
        &self.capacity
    }

    /// Sum of the demand of every bound pod.
    pub const fn allocated(&self) -> &ResourceList {
        &self.allocated
    }

    /// Capacity not yet claimed by bound pods.
    pub fn available(&self) -> ResourceList {
        self.capacity.saturating_sub(&self.allocated)
    }

    /// Pods bound to this node, in bind order.
    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }

    /// Whether the pod's demand is covered by available capacity in every
    /// dimension.
    pub fn fits(&self, pod: &Pod) -> bool {
        self.available().covers(&pod.demand)
    }

    /// Bind a pod to this node at the given simulated time.
    ///
    /// The pod is stamped [`PodStatus::Bound`] and added to the node.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::InsufficientCapacity`] if the pod does not fit.
    /// The node is unchanged on error.
    pub fn bind(&mut self, clock: Clock, mut pod: Pod) -> Result<(), NodeError> {
        if !self.fits(&pod) {
            return Err(NodeError::InsufficientCapacity {
                node: self.name.clone(),
                pod: pod.name,
                demand: pod.demand,
                available: self.available(),
            });
        }

        let allocated = self.allocated.checked_add(&pod.demand).ok_or_else(|| {
            NodeError::AllocationOverflow {
                node: self.name.clone(),
            }
        })?;

        pod.status = PodStatus::Bound {
            node: self.name.clone(),
            at: clock.instant(),
        };
        self.allocated = allocated;
        self.pods.push(pod);
        Ok(())
    }

    /// Take an immutable view of the node for scheduling.
    pub fn snapshot(&self, clock: Clock) -> NodeSnapshot {
        NodeSnapshot {
            name: self.name.clone(),
            capacity: self.capacity.clone(),
            allocated: self.allocated.clone(),
            available: self.available(),
            pods: self.pods.iter().map(|pod| pod.id).collect(),
            taken_at: clock.instant(),
        }
    }
}

/// Immutable view of a node as of a particular tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// The node's name.
    pub name: NodeName,
    /// Total capacity.
    pub capacity: ResourceList,
    /// Demand claimed by bound pods.
    pub allocated: ResourceList,
    /// Capacity still free.
    pub available: ResourceList,
    /// Pods bound to the node, in bind order.
    pub pods: Vec<PodId>,
    /// Simulated time the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl NodeSnapshot {
    /// Whether the pod's demand fits this snapshot's available capacity.
    pub fn fits(&self, pod: &Pod) -> bool {
        self.available.covers(&pod.demand)
    }
}
