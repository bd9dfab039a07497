//! Scheduling decisions: filter feasible nodes, then pick one.
//!
//! [`Scheduler::schedule`] is a pure function of the pod and the node
//! snapshots handed to it. It never mutates a node; applying the decision
//! is a separate bind performed by the tick loop.
//!
//! Selection is a deterministic total order: highest score first, ties
//! broken by the lexicographically smallest node name. The same pod and
//! snapshots always yield the same node, whatever order the snapshots are
//! passed in.

use kubesim_types::{NodeName, Pod, PodId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::node::NodeSnapshot;

/// Per-dimension score scale (per-mille of capacity).
const SCORE_SCALE: u128 = 1000;

/// How feasible nodes are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Prefer the node with the most capacity left after placement
    /// (spreads load).
    #[default]
    LeastAllocated,
    /// Prefer the node with the least capacity left after placement
    /// (packs load).
    MostAllocated,
}

/// Result of a scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A feasible node was chosen.
    Selected {
        /// The chosen node.
        node: NodeName,
        /// The winning score.
        score: u64,
        /// Number of nodes that passed the filter.
        feasible: usize,
    },
    /// No node has enough available capacity for the pod.
    DoesNotFit {
        /// The pod that could not be placed.
        pod: PodId,
    },
}

/// The filter-then-score scheduling engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    strategy: ScoringStrategy,
}

impl Scheduler {
    /// Create a scheduler with the given scoring strategy.
    pub const fn new(strategy: ScoringStrategy) -> Self {
        Self { strategy }
    }

    /// The scoring strategy in use.
    pub const fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Choose a node for `pod` among `nodes`.
    pub fn schedule(&self, pod: &Pod, nodes: &[NodeSnapshot]) -> ScheduleOutcome {
        let mut feasible: usize = 0;
        let mut best: Option<(u64, &NodeName)> = None;

        for node in nodes.iter().filter(|node| node.fits(pod)) {
            feasible = feasible.saturating_add(1);
            let score = self.score(pod, node);
            trace!(pod = %pod.name, node = %node.name, score, "Scored node");

            let better = match best {
                None => true,
                Some((best_score, best_name)) => {
                    score > best_score || (score == best_score && node.name < *best_name)
                }
            };
            if better {
                best = Some((score, &node.name));
            }
        }

        match best {
            Some((score, name)) => ScheduleOutcome::Selected {
                node: name.clone(),
                score,
                feasible,
            },
            None => ScheduleOutcome::DoesNotFit { pod: pod.id },
        }
    }

    /// Score a feasible node: sum over its capacity dimensions of the
    /// per-mille share left free (or used) after placing the pod.
    fn score(self, pod: &Pod, node: &NodeSnapshot) -> u64 {
        let total: u128 = node
            .capacity
            .iter()
            .filter(|(_, capacity)| *capacity > 0)
            .map(|(dim, capacity)| {
                let free_after = node.available.get(dim).saturating_sub(pod.demand.get(dim));
                let free_share = u128::from(free_after)
                    .saturating_mul(SCORE_SCALE)
                    .checked_div(u128::from(capacity))
                    .unwrap_or(0)
                    .min(SCORE_SCALE);
                match self.strategy {
                    ScoringStrategy::LeastAllocated => free_share,
                    ScoringStrategy::MostAllocated => SCORE_SCALE.saturating_sub(free_share),
                }
            })
            .fold(0, u128::saturating_add);
        u64::try_from(total).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};
    use kubesim_types::{CPU, MEMORY, ResourceList};

    use super::*;

    fn snapshot(name: &str, capacity: ResourceList, available: ResourceList) -> NodeSnapshot {
        NodeSnapshot {
            name: NodeName::from(name),
            allocated: capacity.saturating_sub(&available),
            capacity,
            available,
            pods: Vec::new(),
            taken_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn cpu(amount: u64) -> ResourceList {
        ResourceList::new().with(CPU, amount)
    }

    fn selected(outcome: &ScheduleOutcome) -> Option<&str> {
        match outcome {
            ScheduleOutcome::Selected { node, .. } => Some(node.as_str()),
            ScheduleOutcome::DoesNotFit { .. } => None,
        }
    }

    #[test]
    fn no_feasible_node_does_not_fit() {
        let pod = Pod::new("big", cpu(8), 0);
        let nodes = vec![snapshot("a", cpu(4), cpu(4)), snapshot("b", cpu(4), cpu(2))];
        let outcome = Scheduler::default().schedule(&pod, &nodes);
        assert_eq!(outcome, ScheduleOutcome::DoesNotFit { pod: pod.id });
    }

    #[test]
    fn empty_cluster_does_not_fit() {
        let pod = Pod::new("p", cpu(1), 0);
        let outcome = Scheduler::default().schedule(&pod, &[]);
        assert!(matches!(outcome, ScheduleOutcome::DoesNotFit { .. }));
    }

    #[test]
    fn filter_excludes_nodes_that_do_not_fit() {
        let pod = Pod::new("p", cpu(3), 0);
        // "a" has the most capacity overall but not enough available.
        let nodes = vec![snapshot("a", cpu(16), cpu(2)), snapshot("b", cpu(4), cpu(4))];
        let outcome = Scheduler::default().schedule(&pod, &nodes);
        assert_eq!(selected(&outcome), Some("b"));
        assert!(matches!(outcome, ScheduleOutcome::Selected { feasible: 1, .. }));
    }

    #[test]
    fn least_allocated_prefers_emptier_node() {
        let pod = Pod::new("p", cpu(1), 0);
        let nodes = vec![snapshot("a", cpu(4), cpu(2)), snapshot("b", cpu(4), cpu(4))];
        let outcome = Scheduler::new(ScoringStrategy::LeastAllocated).schedule(&pod, &nodes);
        assert_eq!(selected(&outcome), Some("b"));
    }

    #[test]
    fn most_allocated_prefers_fuller_node() {
        let pod = Pod::new("p", cpu(1), 0);
        let nodes = vec![snapshot("a", cpu(4), cpu(2)), snapshot("b", cpu(4), cpu(4))];
        let outcome = Scheduler::new(ScoringStrategy::MostAllocated).schedule(&pod, &nodes);
        assert_eq!(selected(&outcome), Some("a"));
    }

    #[test]
    fn ties_break_on_smallest_node_name() {
        let pod = Pod::new("p", cpu(1), 0);
        let nodes = vec![
            snapshot("node-c", cpu(4), cpu(4)),
            snapshot("node-a", cpu(4), cpu(4)),
            snapshot("node-b", cpu(4), cpu(4)),
        ];
        let outcome = Scheduler::default().schedule(&pod, &nodes);
        assert_eq!(selected(&outcome), Some("node-a"));
    }

    #[test]
    fn decision_is_deterministic_and_order_independent() {
        let pod = Pod::new(
            "p",
            ResourceList::new().with(CPU, 500).with(MEMORY, 256),
            0,
        );
        let both = |c: u64, m: u64| ResourceList::new().with(CPU, c).with(MEMORY, m);
        let mut nodes = vec![
            snapshot("x", both(4000, 4096), both(2000, 4096)),
            snapshot("y", both(4000, 4096), both(4000, 2048)),
            snapshot("z", both(2000, 8192), both(1000, 8192)),
        ];

        let scheduler = Scheduler::default();
        let first = scheduler.schedule(&pod, &nodes);
        for _ in 0..10 {
            assert_eq!(scheduler.schedule(&pod, &nodes), first);
        }
        nodes.reverse();
        assert_eq!(scheduler.schedule(&pod, &nodes), first);
    }

    #[test]
    fn zero_capacity_dimensions_do_not_score() {
        let pod = Pod::new("p", cpu(1), 0);
        let with_gpu_slot = snapshot(
            "a",
            cpu(4).with("gpu", 0),
            cpu(4).with("gpu", 0),
        );
        let outcome = Scheduler::default().schedule(&pod, &[with_gpu_slot]);
        assert!(matches!(
            outcome,
            ScheduleOutcome::Selected { score: 750, .. }
        ));
    }
}
