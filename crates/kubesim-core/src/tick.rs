//! Tick cycle: the per-tick work of the simulation.
//!
//! Each tick runs these steps, in order:
//!
//! 1. **Snapshot** -- take a view of every node, sorted by name.
//! 2. **Submit** -- ask each submitter for new pods, stamp them with the
//!    tick's clock, and push them onto the queue.
//! 3. **Pop** -- take one pod from the queue. An empty queue ends the tick.
//! 4. **Schedule** -- ask the scheduler for a node.
//! 5. **Requeue** -- if no node fits, place the pod back and end the tick.
//! 6. **Bind** -- otherwise bind the pod to the chosen node.
//!
//! At most one pod is dequeued per tick. Only an empty queue and a pod that
//! does not fit are handled here; every other failure ends the run.

use std::collections::BTreeMap;

use kubesim_types::{NodeName, Pod, PodId};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::node::{Node, NodeError, NodeSnapshot};
use crate::queue::{PodQueue, QueueError};
use crate::scheduler::{ScheduleOutcome, Scheduler};
use crate::submitter::{Submitter, SubmitterError};

/// Errors that end the simulation during a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A submitter failed.
    #[error("submit error: {source}")]
    Submitter {
        /// The underlying submitter error.
        #[from]
        source: SubmitterError,
    },

    /// A bind was rejected by the chosen node.
    #[error("bind error: {source}")]
    Bind {
        /// The underlying node error.
        #[from]
        source: NodeError,
    },

    /// The scheduler selected a node that is not in the cluster.
    #[error("no node named {node}")]
    UnknownNode {
        /// The missing node.
        node: NodeName,
    },
}

/// What happened to the pod taken from the queue this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The queue was empty; nothing was attempted.
    Idle,
    /// The pod was bound to a node.
    Bound {
        /// The bound pod.
        pod: PodId,
        /// The node it was bound to.
        node: NodeName,
    },
    /// No node fitted; the pod was placed back in the queue.
    Requeued {
        /// The requeued pod.
        pod: PodId,
        /// How many times the pod has now been requeued.
        requeues: u32,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// The simulated time of this tick.
    pub clock: Clock,
    /// Pods submitted this tick.
    pub submitted: usize,
    /// Outcome of the placement attempt.
    pub placement: Placement,
    /// Pods still pending after the tick.
    pub pending: usize,
}

/// The mutable cluster state the tick cycle operates on.
///
/// Nodes are keyed by name so iteration, and therefore snapshot order, is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    /// Every node, keyed by name.
    pub nodes: BTreeMap<NodeName, Node>,
    /// Pending pods.
    pub queue: PodQueue,
    /// The scheduling engine.
    pub scheduler: Scheduler,
}

impl SimulationState {
    /// Build state from a set of nodes and a scheduler.
    pub fn new(nodes: impl IntoIterator<Item = Node>, scheduler: Scheduler) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|node| (node.name().clone(), node))
                .collect(),
            queue: PodQueue::new(),
            scheduler,
        }
    }

    /// Snapshot every node as of `clock`, sorted by node name.
    pub fn snapshot_nodes(&self, clock: Clock) -> Vec<NodeSnapshot> {
        self.nodes.values().map(|node| node.snapshot(clock)).collect()
    }

    /// Every bound pod, grouped by node in node-name order.
    pub fn bound_pods(&self) -> impl Iterator<Item = &Pod> {
        self.nodes.values().flat_map(Node::pods).filter(|pod| pod.is_bound())
    }
}

/// Execute one tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError`] if a submitter fails or a bind is rejected.
pub fn run_tick(
    state: &mut SimulationState,
    tick: u64,
    clock: Clock,
    submitters: &mut [Box<dyn Submitter>],
) -> Result<TickSummary, TickError> {
    debug!(tick, clock = %clock, "Tick started");

    // --- Snapshot ---
    let snapshots = state.snapshot_nodes(clock);

    // --- Submit ---
    let submitted = submit(state, clock, &snapshots, submitters)?;

    // --- Pop ---
    let queued = match state.queue.pop() {
        Ok(queued) => queued,
        Err(QueueError::Empty) => {
            trace!(tick, "Queue empty, no placement");
            return Ok(summary(state, tick, clock, submitted, Placement::Idle));
        }
    };

    debug!(tick, pod = %queued.pod.name, priority = queued.pod.priority, "Trying to schedule pod");

    // --- Schedule ---
    let placement = match state.scheduler.schedule(&queued.pod, &snapshots) {
        ScheduleOutcome::DoesNotFit { pod } => {
            // --- Requeue ---
            debug!(tick, pod = %queued.pod.name, "Pod does not fit in any node");
            let requeues = queued.requeues.saturating_add(1);
            state.queue.place_back(queued);
            Placement::Requeued { pod, requeues }
        }
        ScheduleOutcome::Selected {
            node,
            score,
            feasible,
        } => {
            // --- Bind ---
            debug!(tick, pod = %queued.pod.name, node = %node, score, feasible, "Selected node");
            let pod = queued.pod.id;
            bind(state, clock, queued.pod, &node)?;
            Placement::Bound { pod, node }
        }
    };

    Ok(summary(state, tick, clock, submitted, placement))
}

fn bind(
    state: &mut SimulationState,
    clock: Clock,
    pod: Pod,
    node: &NodeName,
) -> Result<(), TickError> {
    let target = state
        .nodes
        .get_mut(node)
        .ok_or_else(|| TickError::UnknownNode { node: node.clone() })?;
    target.bind(clock, pod)?;
    Ok(())
}

fn submit(
    state: &mut SimulationState,
    clock: Clock,
    snapshots: &[NodeSnapshot],
    submitters: &mut [Box<dyn Submitter>],
) -> Result<usize, TickError> {
    let mut submitted: usize = 0;
    for submitter in submitters.iter_mut() {
        let pods = submitter.submit(&clock, snapshots)?;
        for mut pod in pods {
            pod.created_at = Some(clock.instant());
            trace!(submitter = submitter.name(), pod = ?pod, "Submit");
            debug!(submitter = submitter.name(), pod = %pod.name, "Submit");
            state.queue.push(pod);
            submitted = submitted.saturating_add(1);
        }
    }
    Ok(submitted)
}

fn summary(
    state: &SimulationState,
    tick: u64,
    clock: Clock,
    submitted: usize,
    placement: Placement,
) -> TickSummary {
    TickSummary {
        tick,
        clock,
        submitted,
        placement,
        pending: state.queue.len(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use chrono::TimeDelta;
    use kubesim_types::{CPU, PodStatus, ResourceList};

    use super::*;
    use crate::submitter::ScriptedSubmitter;

    fn t0() -> Clock {
        Clock::parse_rfc3339("2019-01-01T00:00:00Z").unwrap()
    }

    fn node(name: &str, cpu: u64) -> Node {
        Node::new(NodeName::from(name), ResourceList::new().with(CPU, cpu))
    }

    fn pod(name: &str, priority: i32, cpu: u64) -> Pod {
        Pod::new(name, ResourceList::new().with(CPU, cpu), priority)
    }

    struct FailingSubmitter;

    impl Submitter for FailingSubmitter {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn submit(&mut self, _clock: &Clock, _nodes: &[NodeSnapshot]) -> Result<Vec<Pod>, SubmitterError> {
            Err(SubmitterError::Failed {
                name: String::from("failing"),
                message: String::from("boom"),
            })
        }
    }

    #[test]
    fn empty_queue_is_idle_tick() {
        let mut state = SimulationState::new([node("a", 4)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> = Vec::new();

        let summary = run_tick(&mut state, 1, t0(), &mut submitters).unwrap();
        assert_eq!(summary.placement, Placement::Idle);
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.pending, 0);
    }

    #[test]
    fn submitted_pods_are_stamped_with_tick_clock() {
        let mut state = SimulationState::new([node("a", 1)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> = vec![Box::new(ScriptedSubmitter::new([
            vec![pod("big-1", 0, 5), pod("big-2", 0, 5)],
        ]))];

        let clock = t0().advance(TimeDelta::seconds(30)).unwrap();
        let summary = run_tick(&mut state, 1, clock, &mut submitters).unwrap();

        assert_eq!(summary.submitted, 2);
        assert!(state.queue.iter().all(|q| q.pod.created_at == Some(clock.instant())));
    }

    #[test]
    fn one_placement_attempt_per_tick() {
        let mut state = SimulationState::new([node("a", 4)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> = vec![Box::new(ScriptedSubmitter::new([
            vec![pod("p1", 0, 1), pod("p2", 0, 1), pod("p3", 0, 1)],
        ]))];

        let summary = run_tick(&mut state, 1, t0(), &mut submitters).unwrap();
        assert!(matches!(summary.placement, Placement::Bound { .. }));
        assert_eq!(summary.pending, 2);
        assert_eq!(state.bound_pods().count(), 1);
    }

    #[test]
    fn submitters_run_in_registration_order() {
        let mut state = SimulationState::new([node("a", 4)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> = vec![
            Box::new(ScriptedSubmitter::new([vec![pod("first", 0, 5)]])),
            Box::new(ScriptedSubmitter::new([vec![pod("second", 0, 5)]])),
        ];

        run_tick(&mut state, 1, t0(), &mut submitters).unwrap();
        let order: Vec<&str> = state.queue.iter().map(|q| q.pod.name.as_str()).collect();
        // "first" was popped, did not fit, and went behind "second".
        assert_eq!(order, vec!["second", "first"]);
    }

    #[test]
    fn bind_goes_to_selected_node() {
        let mut state = SimulationState::new([node("a", 2), node("b", 8)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> =
            vec![Box::new(ScriptedSubmitter::new([vec![pod("p", 0, 2)]]))];

        let summary = run_tick(&mut state, 1, t0(), &mut submitters).unwrap();
        let Placement::Bound { node, .. } = summary.placement else {
            panic!("expected a bind, got {:?}", summary.placement);
        };
        assert_eq!(node.as_str(), "b");

        let bound = state.bound_pods().next().unwrap();
        assert_eq!(
            bound.status,
            PodStatus::Bound {
                node: NodeName::from("b"),
                at: t0().instant()
            }
        );
    }

    #[test]
    fn does_not_fit_requeues_instead_of_failing() {
        let mut state = SimulationState::new([node("a", 1)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> =
            vec![Box::new(ScriptedSubmitter::new([vec![pod("big", 0, 2)]]))];

        let first = run_tick(&mut state, 1, t0(), &mut submitters).unwrap();
        let second = run_tick(&mut state, 2, t0(), &mut submitters).unwrap();

        assert!(matches!(first.placement, Placement::Requeued { requeues: 1, .. }));
        assert!(matches!(second.placement, Placement::Requeued { requeues: 2, .. }));
        assert_eq!(second.pending, 1);
    }

    #[test]
    fn submitter_failure_is_fatal() {
        let mut state = SimulationState::new([node("a", 1)], Scheduler::default());
        let mut submitters: Vec<Box<dyn Submitter>> = vec![Box::new(FailingSubmitter)];

        let result = run_tick(&mut state, 1, t0(), &mut submitters);
        assert!(matches!(result, Err(TickError::Submitter { .. })));
    }

    #[test]
    fn bind_to_missing_node_is_an_error() {
        let mut state = SimulationState::new([node("a", 4)], Scheduler::default());

        let result = bind(&mut state, t0(), pod("p", 0, 1), &NodeName::from("ghost"));

        assert!(matches!(result, Err(TickError::UnknownNode { ref node }) if node.as_str() == "ghost"));
        assert_eq!(state.bound_pods().count(), 0);
    }

    #[test]
    fn bind_rejected_by_node_is_an_error() {
        let mut state = SimulationState::new([node("a", 1)], Scheduler::default());

        let result = bind(&mut state, t0(), pod("p", 0, 2), &NodeName::from("a"));

        assert!(matches!(result, Err(TickError::Bind { .. })));
    }

    #[test]
    fn snapshots_are_sorted_by_name() {
        let state = SimulationState::new(
            [node("node-c", 1), node("node-a", 1), node("node-b", 1)],
            Scheduler::default(),
        );
        let names: Vec<String> = state
            .snapshot_nodes(t0())
            .into_iter()
            .map(|s| s.name.to_string())
            .collect();
        assert_eq!(names, vec!["node-a", "node-b", "node-c"]);
    }
}
