//! Simulation loop runner.
//!
//! [`KubeSim`] owns the cluster state and the registered submitters and
//! drives the tick loop with [`KubeSim::run`]:
//!
//! - **Time source**: a background [`Ticker`] produces one clock value per
//!   tick over a channel of capacity one.
//! - **Stop**: the loop races each tick against a [`StopSignal`]; the same
//!   signal stops the time source, which is joined before `run` returns.
//! - **Bounded runs**: stop after `max_ticks` when configured.
//! - **Observation**: a [`TickObserver`] is called after every tick.
//!
//! All cluster mutation happens on the task that awaits `run`. Every tick
//! runs inside the [`Span`] the simulator was constructed with.

use chrono::TimeDelta;
use tracing::{Instrument, Span, debug, info, warn};

use crate::clock::Clock;
use crate::config::{ConfigError, SimulationConfig};
use crate::observer::TickObserver;
use crate::operator::{SimulationEndReason, StopSignal};
use crate::scheduler::Scheduler;
use crate::submitter::Submitter;
use crate::tick::{self, Placement, SimulationState, TickError, TickSummary};
use crate::ticker::{Ticker, TickerError};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// The time source failed.
    #[error("time source error: {source}")]
    Ticker {
        /// The underlying time source error.
        #[from]
        source: TickerError,
    },

    /// The time source stopped producing ticks without reporting an error.
    #[error("time source closed unexpectedly")]
    TimeSourceClosed,

    /// The loop has already run to completion; a stopped simulation cannot
    /// be restarted.
    #[error("simulation already stopped")]
    AlreadyStopped,
}

/// Lifecycle state of the simulation loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopStatus {
    /// Constructed, not yet run.
    #[default]
    Idle,
    /// The tick loop is executing.
    Running,
    /// The tick loop has exited.
    Stopped,
}

/// Result of the simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Pods bound during the run.
    pub bound: u64,
    /// Placement attempts that ended in a requeue.
    pub requeued: u64,
}

/// The cluster simulator.
pub struct KubeSim {
    state: SimulationState,
    submitters: Vec<Box<dyn Submitter>>,
    start: Clock,
    tick: TimeDelta,
    max_ticks: u64,
    span: Span,
    status: LoopStatus,
}

impl core::fmt::Debug for KubeSim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KubeSim")
            .field("state", &self.state)
            .field(
                "submitters",
                &self.submitters.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("start", &self.start)
            .field("tick", &self.tick)
            .field("max_ticks", &self.max_ticks)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl KubeSim {
    /// Create a simulator over `state`, starting at `start` and advancing
    /// by `tick`. Every tick is logged inside `span`.
    pub const fn new(state: SimulationState, start: Clock, tick: TimeDelta, span: Span) -> Self {
        Self {
            state,
            submitters: Vec::new(),
            start,
            tick,
            max_ticks: 0,
            span,
            status: LoopStatus::Idle,
        }
    }

    /// Create a simulator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the start clock, tick, or nodes are invalid.
    pub fn from_config(config: &SimulationConfig, span: Span) -> Result<Self, ConfigError> {
        let nodes = config.build_nodes()?;
        for node in &nodes {
            debug!(node = %node.name(), capacity = %node.capacity(), "Node created");
            if node.capacity().is_empty() {
                warn!(node = %node.name(), "Node has no capacity, no pod will fit");
            }
        }
        let state = SimulationState::new(nodes, config.build_scheduler());
        let sim = Self::new(state, config.start_clock()?, config.tick_duration()?, span)
            .with_max_ticks(config.simulation.max_ticks);
        Ok(sim)
    }

    /// Stop after `max_ticks` ticks (0 = unlimited).
    #[must_use]
    pub const fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Register a submitter. Submitters are invoked in registration order.
    pub fn add_submitter(&mut self, submitter: Box<dyn Submitter>) {
        self.submitters.push(submitter);
    }

    /// The current cluster state.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// The scheduling engine.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.state.scheduler
    }

    /// The loop's lifecycle state.
    pub const fn status(&self) -> LoopStatus {
        self.status
    }

    /// Run the tick loop until stopped, bounded, or failed.
    ///
    /// A simulator runs once; `Stopped` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::AlreadyStopped`] if the loop has already run,
    /// or another [`RunnerError`] if a tick fails (submitter failure,
    /// rejected bind) or the time source fails.
    pub async fn run(
        &mut self,
        stop: StopSignal,
        observer: &mut dyn TickObserver,
    ) -> Result<SimulationResult, RunnerError> {
        if self.status == LoopStatus::Stopped {
            warn!("Run requested on a stopped simulation");
            return Err(RunnerError::AlreadyStopped);
        }
        let span = self.span.clone();
        self.status = LoopStatus::Running;
        let result = self.run_loop(stop, observer).instrument(span).await;
        self.status = LoopStatus::Stopped;
        result
    }

    async fn run_loop(
        &mut self,
        mut stop: StopSignal,
        observer: &mut dyn TickObserver,
    ) -> Result<SimulationResult, RunnerError> {
        info!(
            start = %self.start,
            tick_seconds = self.tick.num_seconds(),
            nodes = self.state.nodes.len(),
            submitters = self.submitters.len(),
            max_ticks = self.max_ticks,
            strategy = ?self.scheduler().strategy(),
            "Simulation starting"
        );

        let mut ticker = Ticker::spawn(self.start, self.tick, stop.clone());
        let mut result = SimulationResult {
            end_reason: SimulationEndReason::MaxTicksReached,
            final_summary: None,
            total_ticks: 0,
            bound: 0,
            requeued: 0,
        };

        let outcome: Result<SimulationEndReason, Option<RunnerError>> = loop {
            let next = tokio::select! {
                biased;
                reason = stop.stopped() => {
                    info!(reason = %reason, "Stop requested");
                    break Ok(SimulationEndReason::Stopped(reason));
                }
                next = ticker.next() => next,
            };
            let Some(clock) = next else {
                break Err(None);
            };

            let tick = result.total_ticks.saturating_add(1);
            let summary = match tick::run_tick(&mut self.state, tick, clock, &mut self.submitters) {
                Ok(summary) => summary,
                Err(err) => break Err(Some(err.into())),
            };

            result.total_ticks = tick;
            match summary.placement {
                Placement::Bound { .. } => result.bound = result.bound.saturating_add(1),
                Placement::Requeued { .. } => result.requeued = result.requeued.saturating_add(1),
                Placement::Idle => {}
            }
            observer.on_tick(&summary, &self.state);
            result.final_summary = Some(summary);

            if self.max_ticks > 0 && tick >= self.max_ticks {
                info!(tick, max_ticks = self.max_ticks, "Tick limit reached");
                break Ok(SimulationEndReason::MaxTicksReached);
            }
        };

        let joined = ticker.shutdown().await;

        match outcome {
            Ok(end_reason) => {
                joined?;
                result.end_reason = end_reason;
                Ok(result)
            }
            Err(Some(err)) => {
                if let Err(join_err) = joined {
                    warn!(error = %join_err, "Time source failed during shutdown");
                }
                Err(err)
            }
            Err(None) => Err(joined.err().map_or(RunnerError::TimeSourceClosed, RunnerError::from)),
        }
    }
}

/// Log the simulation end.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        bound = result.bound,
        requeued = result.requeued,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            clock = %summary.clock,
            pending = summary.pending,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}
