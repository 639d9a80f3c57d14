//! Artificial latency and failure injection for the recipe store.
//!
//! Every store operation awaits [`FaultPolicy::inject`] before it reads or mutates anything,
//! so an injected failure can never leave a partial write behind. Production wiring uses
//! [`RandomFaults`]; tests use [`NoFaults`] or a scripted policy of their own.

use crate::{Sleeper, StoreError, TokioSleeper};
use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The store operation about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListRecipes,
    GetRecipe,
    CreateRecipe,
    UpdateRecipe,
    DeleteRecipe,
    ListFavorites,
    AddFavorite,
    RemoveFavorite,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ListRecipes => "list_recipes",
            Operation::GetRecipe => "get_recipe",
            Operation::CreateRecipe => "create_recipe",
            Operation::UpdateRecipe => "update_recipe",
            Operation::DeleteRecipe => "delete_recipe",
            Operation::ListFavorites => "list_favorites",
            Operation::AddFavorite => "add_favorite",
            Operation::RemoveFavorite => "remove_favorite",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, Operation::ListRecipes | Operation::GetRecipe | Operation::ListFavorites)
    }

    /// User-facing message of the transient error raised for this operation.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::ListRecipes | Operation::GetRecipe | Operation::ListFavorites => {
                "Server Error: Load Failed, Please Try Again"
            }
            Operation::CreateRecipe => "Server Error: Create Failed, Please Try Again",
            Operation::UpdateRecipe => "Server Error: Update Failed, Please Try Again",
            Operation::DeleteRecipe => "Server Error: Delete Failed, Please Try Again",
            Operation::AddFavorite => "Server Error: Add Favorite Failed, Please Try Again",
            Operation::RemoveFavorite => "Server Error: Remove Favorite Failed, Please Try Again",
        }
    }

    pub fn transient(self) -> StoreError {
        StoreError::Transient(self.failure_message().to_string())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pluggable delay + failure strategy applied ahead of every store operation.
#[async_trait]
pub trait FaultPolicy: Send + Sync + fmt::Debug {
    /// Wait out any injected latency, then either let `op` proceed or fail it.
    async fn inject(&self, op: Operation) -> Result<(), StoreError>;
}

/// No latency, no failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

#[async_trait]
impl FaultPolicy for NoFaults {
    async fn inject(&self, _op: Operation) -> Result<(), StoreError> {
        Ok(())
    }
}

/// No latency; every mutation fails, reads pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFail;

#[async_trait]
impl FaultPolicy for AlwaysFail {
    async fn inject(&self, op: Operation) -> Result<(), StoreError> {
        if op.is_read() {
            Ok(())
        } else {
            Err(op.transient())
        }
    }
}

/// Errors produced while configuring [`RandomFaults`].
#[derive(Debug, Clone, PartialEq)]
pub enum FaultConfigError {
    FailureRateOutOfRange(f64),
    DelayRangeInverted { min: Duration, max: Duration },
}

impl fmt::Display for FaultConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultConfigError::FailureRateOutOfRange(rate) => {
                write!(f, "failure rate must be within [0, 1] (got {rate})")
            }
            FaultConfigError::DelayRangeInverted { min, max } => {
                write!(f, "min delay ({min:?}) must not exceed max delay ({max:?})")
            }
        }
    }
}

impl std::error::Error for FaultConfigError {}

/// Uniform latency in `[min_delay, max_delay]` followed by a coin flip with `failure_rate`.
///
/// Reads are delayed but never failed unless `fail_reads` is set.
#[derive(Clone)]
pub struct RandomFaults {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
    fail_reads: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RandomFaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomFaults")
            .field("min_delay", &self.min_delay)
            .field("max_delay", &self.max_delay)
            .field("failure_rate", &self.failure_rate)
            .field("fail_reads", &self.fail_reads)
            .finish_non_exhaustive()
    }
}

impl RandomFaults {
    pub fn builder() -> RandomFaultsBuilder {
        RandomFaultsBuilder::default()
    }

    /// Draw the latency and the failure decision for one call of `op`.
    pub fn roll<R: Rng>(&self, op: Operation, rng: &mut R) -> (Duration, bool) {
        let min = u64::try_from(self.min_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(rng.random_range(min..=max));
        let eligible = self.fail_reads || !op.is_read();
        let fail = eligible && rng.random_bool(self.failure_rate);
        (delay, fail)
    }
}

#[async_trait]
impl FaultPolicy for RandomFaults {
    async fn inject(&self, op: Operation) -> Result<(), StoreError> {
        let (delay, fail) = self.roll(op, &mut rand::rng());
        self.sleeper.sleep(delay).await;
        if fail {
            tracing::warn!(operation = %op, delay_ms = delay.as_millis() as u64, "injected failure");
            return Err(op.transient());
        }
        Ok(())
    }
}

pub struct RandomFaultsBuilder {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
    fail_reads: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RandomFaultsBuilder {
    /// 300ms to 1.2s of latency, 20% of mutations fail.
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(1200),
            failure_rate: 0.2,
            fail_reads: false,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl RandomFaultsBuilder {
    pub fn delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    pub fn fail_reads(mut self, fail_reads: bool) -> Self {
        self.fail_reads = fail_reads;
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<RandomFaults, FaultConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(FaultConfigError::FailureRateOutOfRange(self.failure_rate));
        }
        if self.min_delay > self.max_delay {
            return Err(FaultConfigError::DelayRangeInverted {
                min: self.min_delay,
                max: self.max_delay,
            });
        }
        Ok(RandomFaults {
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            failure_rate: self.failure_rate,
            fail_reads: self.fail_reads,
            sleeper: self.sleeper,
        })
    }
}
