//! Background time source.
//!
//! The ticker owns a producer task that emits successive [`Clock`] values
//! into a channel of capacity one. The producer blocks until the loop has
//! taken the previous value, so it is never more than one tick ahead and
//! ticks arrive strictly in order with none skipped or repeated.
//!
//! The producer exits when the [`StopSignal`] fires or when the receiving
//! side is dropped. [`Ticker::shutdown`] joins it.

use chrono::TimeDelta;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::clock::{Clock, ClockError};
use crate::operator::StopSignal;

/// Errors reported by the time source when it is joined.
#[derive(Debug, thiserror::Error)]
pub enum TickerError {
    /// The clock could not be advanced any further.
    #[error("time source clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The producer task panicked or was aborted.
    #[error("time source task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}

/// Handle to the background time source.
#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<Clock>,
    producer: JoinHandle<Result<(), ClockError>>,
}

impl Ticker {
    /// Spawn the producer task, starting at `start` and stepping by `tick`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(start: Clock, tick: TimeDelta, stop: StopSignal) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let producer = tokio::spawn(produce(start, tick, tx, stop));
        Self { rx, producer }
    }

    /// Receive the next tick. `None` once the producer has exited.
    pub async fn next(&mut self) -> Option<Clock> {
        self.rx.recv().await
    }

    /// Stop receiving and wait for the producer to exit.
    ///
    /// # Errors
    ///
    /// Returns [`TickerError`] if the producer ended with a clock error or
    /// its task failed.
    pub async fn shutdown(self) -> Result<(), TickerError> {
        let Self { rx, producer } = self;
        drop(rx);
        producer.await??;
        debug!("Time source stopped");
        Ok(())
    }
}

async fn produce(
    mut clock: Clock,
    tick: TimeDelta,
    tx: mpsc::Sender<Clock>,
    mut stop: StopSignal,
) -> Result<(), ClockError> {
    loop {
        tokio::select! {
            biased;
            reason = stop.stopped() => {
                trace!(reason = %reason, "Time source observed stop");
                return Ok(());
            }
            sent = tx.send(clock) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
        clock = clock.advance(tick)?;
    }
}
