//! Priority queue of pending pods.
//!
//! Pods are retrieved in descending priority order. Within one priority
//! tier they are retrieved first-in first-out by arrival. A pod that could
//! not be scheduled is returned with [`PodQueue::place_back`], which puts it
//! at the tail of its own tier: behind every pod already waiting at that
//! priority, still ahead of every lower-priority pod.
//!
//! Each tier is a [`VecDeque`]; the tiers live in a [`BTreeMap`] keyed by
//! reversed priority so the first tier is always the highest.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};

use kubesim_types::Pod;

/// Errors that can occur when taking from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// There are no pending pods.
    #[error("pod queue is empty")]
    Empty,
}

/// A pod held by the queue, with its queueing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPod {
    /// The pending pod.
    pub pod: Pod,
    /// Arrival sequence number assigned on the first push.
    pub arrival: u64,
    /// Number of times the pod has been placed back.
    pub requeues: u32,
}

/// Priority queue of pending pods.
#[derive(Debug, Clone, Default)]
pub struct PodQueue {
    tiers: BTreeMap<Reverse<i32>, VecDeque<QueuedPod>>,
    next_arrival: u64,
    len: usize,
}

impl PodQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            tiers: BTreeMap::new(),
            next_arrival: 0,
            len: 0,
        }
    }

    /// Enqueue a newly submitted pod behind every pod of equal priority.
    ///
    /// Returns the arrival sequence number assigned to it.
    pub fn push(&mut self, pod: Pod) -> u64 {
        let arrival = self.next_arrival;
        self.next_arrival = self.next_arrival.saturating_add(1);
        self.enqueue(QueuedPod {
            pod,
            arrival,
            requeues: 0,
        });
        arrival
    }

    /// Remove the highest-priority, earliest pod.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] if no pods are pending.
    pub fn pop(&mut self) -> Result<QueuedPod, QueueError> {
        let mut tier = self.tiers.first_entry().ok_or(QueueError::Empty)?;
        let queued = tier.get_mut().pop_front().ok_or(QueueError::Empty)?;
        if tier.get().is_empty() {
            tier.remove();
        }
        self.len = self.len.saturating_sub(1);
        Ok(queued)
    }

    /// Return a pod that could not be scheduled to the tail of its tier.
    ///
    /// Its arrival number is kept and its requeue count incremented.
    pub fn place_back(&mut self, mut queued: QueuedPod) {
        queued.requeues = queued.requeues.saturating_add(1);
        self.enqueue(queued);
    }

    /// Number of pending pods.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no pods are pending.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over pending pods in the order they would be popped.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedPod> {
        self.tiers.values().flatten()
    }

    fn enqueue(&mut self, queued: QueuedPod) {
        self.tiers
            .entry(Reverse(queued.pod.priority))
            .or_default()
            .push_back(queued);
        self.len = self.len.saturating_add(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kubesim_types::ResourceList;

    use super::*;

    fn pod(name: &str, priority: i32) -> Pod {
        Pod::new(name, ResourceList::new(), priority)
    }

    fn drain_names(queue: &mut PodQueue) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(queued) = queue.pop() {
            names.push(queued.pod.name);
        }
        names
    }

    #[test]
    fn pop_on_empty_queue_is_an_error() {
        let mut queue = PodQueue::new();
        assert_eq!(queue.pop(), Err(QueueError::Empty));
        assert!(queue.is_empty());
    }

    #[test]
    fn pops_in_descending_priority() {
        let mut queue = PodQueue::new();
        queue.push(pod("low", 1));
        queue.push(pod("high", 10));
        queue.push(pod("negative", -5));
        queue.push(pod("mid", 5));
        assert_eq!(drain_names(&mut queue), vec!["high", "mid", "low", "negative"]);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = PodQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.push(pod(name, 3));
        }
        assert_eq!(drain_names(&mut queue), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn place_back_goes_behind_its_tier() {
        let mut queue = PodQueue::new();
        queue.push(pod("A", 5));
        queue.push(pod("B", 5));

        let a = queue.pop().unwrap();
        assert_eq!(a.pod.name, "A");
        queue.place_back(a);

        assert_eq!(drain_names(&mut queue), vec!["B", "A"]);
    }

    #[test]
    fn place_back_stays_ahead_of_lower_priority() {
        let mut queue = PodQueue::new();
        queue.push(pod("A", 5));
        queue.push(pod("B", 5));
        queue.push(pod("low", 1));

        let a = queue.pop().unwrap();
        queue.place_back(a);

        assert_eq!(drain_names(&mut queue), vec!["B", "A", "low"]);
    }

    #[test]
    fn later_push_lands_behind_placed_back_pod() {
        let mut queue = PodQueue::new();
        queue.push(pod("A", 5));
        let a = queue.pop().unwrap();
        queue.place_back(a);
        queue.push(pod("C", 5));

        assert_eq!(drain_names(&mut queue), vec!["A", "C"]);
    }

    #[test]
    fn place_back_keeps_arrival_and_counts_requeues() {
        let mut queue = PodQueue::new();
        let arrival = queue.push(pod("A", 0));
        queue.push(pod("B", 0));

        let a = queue.pop().unwrap();
        queue.place_back(a);
        let b = queue.pop().unwrap();
        queue.place_back(b);
        let a = queue.pop().unwrap();

        assert_eq!(a.pod.name, "A");
        assert_eq!(a.arrival, arrival);
        assert_eq!(a.requeues, 1);
    }

    #[test]
    fn len_tracks_push_pop_and_place_back() {
        let mut queue = PodQueue::new();
        queue.push(pod("a", 1));
        queue.push(pod("b", 2));
        assert_eq!(queue.len(), 2);

        let b = queue.pop().unwrap();
        assert_eq!(queue.len(), 1);
        queue.place_back(b);
        assert_eq!(queue.len(), 2);

        let order: Vec<&str> = queue.iter().map(|q| q.pod.name.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
