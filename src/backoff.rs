//! Delay schedule between retry attempts.
//!
//! Retry indices are 1-based: `delay(1)` is the pause before the first retry, and `delay(0)`
//! (the initial call) is always zero. Exponential delays double per retry and saturate at the
//! configured cap.
//!
//! ```rust
//! use std::time::Duration;
//! use pantry::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_millis(300))
//!     .unwrap();
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(3), Duration::from_millis(300));
//! ```

use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Upper bound applied when no explicit cap is configured.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::MaxMustBePositive => write!(f, "max must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

/// Randomization applied on top of the computed delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    Constant,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    schedule: Schedule,
    base: Duration,
    max: Duration,
    jitter: Jitter,
}

impl Backoff {
    /// Same pause before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { schedule: Schedule::Constant, base: delay, max: delay.max(MAX_BACKOFF), jitter: Jitter::None }
    }

    /// `base * 2^(retry - 1)`, capped.
    pub fn exponential(base: Duration) -> Self {
        Self { schedule: Schedule::Exponential, base, max: MAX_BACKOFF, jitter: Jitter::None }
    }

    /// Cap every delay at `max`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if max < self.base {
            return Err(BackoffError::MaxLessThanBase { base: self.base, max });
        }
        self.max = max;
        Ok(self)
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Un-jittered delay before retry number `retry`.
    pub fn base_delay(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let raw = match self.schedule {
            Schedule::Constant => self.base,
            Schedule::Exponential => {
                let exponent = retry.saturating_sub(1).min(u32::MAX as usize) as u32;
                let nanos = self.base.as_nanos().saturating_mul(2u128.saturating_pow(exponent));
                let capped = nanos.min(self.max.as_nanos());
                let secs = u64::try_from(capped / NANOS_PER_SEC).unwrap_or(u64::MAX);
                Duration::new(secs, (capped % NANOS_PER_SEC) as u32)
            }
        };
        raw.min(self.max)
    }

    /// Delay before retry number `retry`, with jitter applied.
    pub fn delay(&self, retry: usize) -> Duration {
        self.delay_with_rng(retry, &mut rand::rng())
    }

    /// Like [`delay`](Self::delay) with a caller-supplied RNG.
    pub fn delay_with_rng<R: Rng>(&self, retry: usize, rng: &mut R) -> Duration {
        let delay = self.base_delay(retry);
        match self.jitter {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                if millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rng.random_range(0..=millis))
                }
            }
        }
    }
}
