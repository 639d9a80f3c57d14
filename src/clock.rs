//! Clock abstraction used to stamp recipe versions.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Clock abstraction so version stamps can be faked in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render a stamp the way it travels on the wire: RFC 3339, UTC, millisecond precision.
pub fn format_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Produce the next version token.
///
/// The result is strictly later than `previous` at millisecond precision, even when the clock
/// has not moved (or moved backwards) since the previous write.
pub fn next_stamp(clock: &dyn Clock, previous: Option<&str>) -> String {
    let now = clock.now();
    let previous_millis = previous
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|p| p.timestamp_millis());

    match previous_millis {
        Some(prev) if now.timestamp_millis() <= prev => DateTime::from_timestamp_millis(prev + 1)
            .map(format_stamp)
            .unwrap_or_else(|| format_stamp(now)),
        _ => format_stamp(now),
    }
}
