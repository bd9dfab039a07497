//! Simulated clock.
//!
//! The clock is an immutable simulated instant. Advancing it produces a new
//! value one tick later; the old value is never mutated. The simulation loop
//! receives one clock value per tick from the [`ticker`](crate::ticker).
//!
//! # Design Principles
//!
//! - Clock values are `Copy` and carry no shared state.
//! - Advancing uses checked arithmetic: an instant past the range of
//!   [`DateTime<Utc>`] is an error, never a wraparound.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Advancing would move the instant out of the representable range.
    #[error("clock overflow: cannot advance {instant} by {delta}")]
    Overflow {
        /// The instant being advanced.
        instant: DateTime<Utc>,
        /// The requested step.
        delta: TimeDelta,
    },

    /// A configured start instant could not be parsed.
    #[error("invalid start clock {raw:?}: {source}")]
    InvalidStart {
        /// The raw configured value.
        raw: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },
}

/// A single simulated instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clock {
    instant: DateTime<Utc>,
}

impl Clock {
    /// Create a clock at the given instant.
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Create a clock at the current wall-clock time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Create a clock from an RFC 3339 timestamp.
    ///
    /// An empty string yields the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidStart`] if the string is not RFC 3339.
    pub fn parse_rfc3339(raw: &str) -> Result<Self, ClockError> {
        if raw.trim().is_empty() {
            return Ok(Self::now());
        }
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|parsed| Self::new(parsed.with_timezone(&Utc)))
            .map_err(|source| ClockError::InvalidStart {
                raw: raw.to_owned(),
                source,
            })
    }

    /// Return a new clock `delta` later than this one.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the resulting instant is out of
    /// range.
    pub fn advance(&self, delta: TimeDelta) -> Result<Self, ClockError> {
        self.instant
            .checked_add_signed(delta)
            .map(Self::new)
            .ok_or(ClockError::Overflow {
                instant: self.instant,
                delta,
            })
    }

    /// The simulated instant.
    pub const fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl core::fmt::Display for Clock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.instant.to_rfc3339())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t0() -> Clock {
        Clock::parse_rfc3339("2019-01-01T00:00:00Z").unwrap()
    }

    #[test]
    fn advance_returns_new_value() {
        let start = t0();
        let next = start.advance(TimeDelta::seconds(10)).unwrap();
        assert_eq!(start, t0());
        assert_eq!(next.instant().signed_duration_since(start.instant()), TimeDelta::seconds(10));
    }

    #[test]
    fn repeated_advance_is_monotonic() {
        let mut clock = t0();
        let mut seen = vec![clock];
        for _ in 0..4 {
            clock = clock.advance(TimeDelta::seconds(10)).unwrap();
            seen.push(clock);
        }
        let offsets: Vec<i64> = seen
            .iter()
            .map(|c| c.instant().signed_duration_since(t0().instant()).num_seconds())
            .collect();
        assert_eq!(offsets, vec![0, 10, 20, 30, 40]);
        assert!(seen.windows(2).all(|w| w.first() <= w.get(1)));
    }

    #[test]
    fn advance_past_max_is_an_error() {
        let clock = Clock::new(DateTime::<Utc>::MAX_UTC);
        let result = clock.advance(TimeDelta::seconds(1));
        assert!(matches!(result, Err(ClockError::Overflow { .. })));
    }

    #[test]
    fn parse_accepts_offsets() {
        let clock = Clock::parse_rfc3339("2019-01-01T09:00:00+09:00").unwrap();
        assert_eq!(clock, t0());
    }

    #[test]
    fn parse_rejects_garbage() {
        let result = Clock::parse_rfc3339("yesterday");
        assert!(matches!(result, Err(ClockError::InvalidStart { .. })));
    }

    #[test]
    fn empty_start_uses_wall_clock() {
        let before = Utc::now();
        let clock = Clock::parse_rfc3339("").unwrap();
        assert!(clock.instant() >= before);
    }

    #[test]
    fn display_is_rfc3339() {
        assert_eq!(t0().to_string(), "2019-01-01T00:00:00+00:00");
    }
}
