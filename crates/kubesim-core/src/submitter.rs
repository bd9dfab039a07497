//! Submitter trait and scripted implementation.
//!
//! At the start of every tick the loop asks each registered [`Submitter`]
//! for new pods. The [`Submitter`] trait abstracts how workloads are
//! generated -- a random workload model, a replayed trace, or a test script.
//!
//! [`ScriptedSubmitter`] replays a fixed list of per-tick batches, which is
//! enough to exercise the loop end-to-end in tests and demos.

use std::collections::VecDeque;

use kubesim_types::Pod;

use crate::clock::Clock;
use crate::node::NodeSnapshot;

/// Errors a submitter can report. Any error ends the simulation.
#[derive(Debug, thiserror::Error)]
pub enum SubmitterError {
    /// The submitter failed to produce its workload.
    #[error("submitter {name} failed: {message}")]
    Failed {
        /// Name of the failing submitter.
        name: String,
        /// Description of the failure.
        message: String,
    },
}

/// A source of new pods.
///
/// The loop calls [`submit`] once per tick, in registration order, with the
/// current clock and a snapshot of every node sorted by name. The returned
/// pods are stamped with the clock and enqueued.
///
/// [`submit`]: Submitter::submit
pub trait Submitter: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Produce the pods to submit at this tick.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitterError`] if the submitter cannot continue. The
    /// simulation stops and the error is returned to its caller.
    fn submit(&mut self, clock: &Clock, nodes: &[NodeSnapshot]) -> Result<Vec<Pod>, SubmitterError>;
}

/// A submitter that replays a fixed sequence of batches, one per tick.
///
/// Once the script is exhausted it submits nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSubmitter {
    batches: VecDeque<Vec<Pod>>,
}

impl ScriptedSubmitter {
    /// Create a submitter from per-tick batches. Batch `i` is submitted on
    /// the `i`-th tick.
    pub fn new(batches: impl IntoIterator<Item = Vec<Pod>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    /// Number of batches not yet submitted.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl Submitter for ScriptedSubmitter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn submit(&mut self, _clock: &Clock, _nodes: &[NodeSnapshot]) -> Result<Vec<Pod>, SubmitterError> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
