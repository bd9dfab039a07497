//! Tick observer that reports cluster state through `tracing`.
//!
//! Every tick emits a one-line summary at `info`; the full
//! [`ClusterMetrics`] snapshot is serialized to JSON and logged at `debug`.

use kubesim_core::observer::{ClusterMetrics, TickObserver};
use kubesim_core::tick::{Placement, SimulationState, TickSummary};
use tracing::{debug, info, warn};

/// Observer that logs every tick.
#[derive(Debug, Default)]
pub struct LogObserver {
    ticks_logged: u64,
}

impl LogObserver {
    /// Create a new log observer.
    pub const fn new() -> Self {
        Self { ticks_logged: 0 }
    }

    /// Number of ticks observed so far.
    pub const fn ticks_logged(&self) -> u64 {
        self.ticks_logged
    }
}

impl TickObserver for LogObserver {
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        self.ticks_logged = self.ticks_logged.saturating_add(1);

        match &summary.placement {
            Placement::Bound { pod, node } => info!(
                tick = summary.tick,
                clock = %summary.clock,
                submitted = summary.submitted,
                pending = summary.pending,
                pod = %pod,
                node = %node,
                "Pod bound"
            ),
            Placement::Requeued { pod, requeues } => info!(
                tick = summary.tick,
                clock = %summary.clock,
                submitted = summary.submitted,
                pending = summary.pending,
                pod = %pod,
                requeues,
                "Pod requeued"
            ),
            Placement::Idle => debug!(tick = summary.tick, clock = %summary.clock, "Queue empty"),
        }

        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        match serde_json::to_string(&ClusterMetrics::capture(summary, state)) {
            Ok(json) => debug!(tick = summary.tick, metrics = %json, "Cluster metrics"),
            Err(e) => warn!(tick = summary.tick, error = %e, "Failed to serialize cluster metrics"),
        }
    }
}
