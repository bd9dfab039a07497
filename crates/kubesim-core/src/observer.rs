//! Per-tick observation hooks.
//!
//! A [`TickObserver`] is called after every completed tick with the tick's
//! summary and the current state. Observers are one-way sinks: they cannot
//! influence the run and must not block it.
//!
//! [`ClusterMetrics`] is a serializable picture of the whole simulation
//! (clock, nodes, bound pods, queue) for observers that export state.

use chrono::{DateTime, Utc};
use kubesim_types::{Pod, PodId};
use serde::{Deserialize, Serialize};

use crate::node::NodeSnapshot;
use crate::tick::{SimulationState, TickSummary};

/// Callback invoked after each tick completes.
pub trait TickObserver: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// An observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl TickObserver for NoOpObserver {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// A pending pod as seen in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The pod's identity.
    pub pod: PodId,
    /// The pod's name.
    pub name: String,
    /// Scheduling priority.
    pub priority: i32,
    /// Arrival sequence number.
    pub arrival: u64,
    /// Times the pod has been placed back.
    pub requeues: u32,
}

/// Serializable snapshot of the whole simulation after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// Tick number.
    pub tick: u64,
    /// Simulated time of the tick.
    pub clock: DateTime<Utc>,
    /// Every node, sorted by name.
    pub nodes: Vec<NodeSnapshot>,
    /// Every bound pod.
    pub pods: Vec<Pod>,
    /// Pending pods, in pop order.
    pub queue: Vec<QueueEntry>,
}

impl ClusterMetrics {
    /// Capture the state after the tick described by `summary`.
    pub fn capture(summary: &TickSummary, state: &SimulationState) -> Self {
        Self {
            tick: summary.tick,
            clock: summary.clock.instant(),
            nodes: state.snapshot_nodes(summary.clock),
            pods: state.bound_pods().cloned().collect(),
            queue: state
                .queue
                .iter()
                .map(|queued| QueueEntry {
                    pod: queued.pod.id,
                    name: queued.pod.name.clone(),
                    priority: queued.pod.priority,
                    arrival: queued.arrival,
                    requeues: queued.requeues,
                })
                .collect(),
        }
    }
}
