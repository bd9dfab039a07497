//! Simulated clock, scheduling queue, and tick loop for the cluster simulator.
//!
//! This crate owns the discrete-event loop that drives the simulation: on
//! every tick, submitters add pods to the queue, the head of the queue is
//! scheduled onto a node, and observers see the result.
//!
//! # Modules
//!
//! - [`clock`] -- Immutable simulated time value.
//! - [`config`] -- Configuration loading from `kubesim-config.yaml`.
//! - [`node`] -- Node capacity ledger and read-only snapshots.
//! - [`observer`] -- [`TickObserver`] trait and [`ClusterMetrics`].
//! - [`operator`] -- Stop handle and signal for cancelling a run.
//! - [`queue`] -- Priority queue of pending pods.
//! - [`runner`] -- [`KubeSim`] and the async tick loop.
//! - [`scheduler`] -- Filter and score placement.
//! - [`submitter`] -- [`Submitter`] trait and [`ScriptedSubmitter`].
//! - [`tick`] -- One tick of the simulation.
//! - [`ticker`] -- Background time source.
//!
//! [`TickObserver`]: observer::TickObserver
//! [`ClusterMetrics`]: observer::ClusterMetrics
//! [`KubeSim`]: runner::KubeSim
//! [`Submitter`]: submitter::Submitter
//! [`ScriptedSubmitter`]: submitter::ScriptedSubmitter

pub mod clock;
pub mod config;
pub mod node;
pub mod observer;
pub mod operator;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod submitter;
pub mod tick;
pub mod ticker;
