//! Runtime settings for the server and the client.
//!
//! Both structs deserialize with every field optional, so a partial JSON document or an empty
//! environment yields the documented defaults. [`ServerConfig::from_env`] and
//! [`ClientConfig::from_env`] read `PANTRY_*` variables on top of those defaults.

use crate::backoff::BackoffError;
use crate::client::RecipeClient;
use crate::faults::{FaultConfigError, FaultPolicy, NoFaults, RandomFaults};
use crate::retry::BuildError;
use crate::{ApiError, Backoff, Jitter, RetryPolicy, RetryScope};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidVar { key: String, reason: String },
    #[error(transparent)]
    Retry(#[from] BuildError),
    #[error(transparent)]
    Backoff(#[from] BackoffError),
    #[error(transparent)]
    Faults(#[from] FaultConfigError),
    #[error("could not build client: {0}")]
    Client(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Turns fault injection off entirely.
    pub faults_enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub failure_rate: f64,
    pub fail_reads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 4000)),
            faults_enabled: true,
            min_delay_ms: 300,
            max_delay_ms: 1200,
            failure_rate: 0.2,
            fail_reads: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind: load("PANTRY_BIND", defaults.bind)?,
            faults_enabled: load("PANTRY_FAULTS", defaults.faults_enabled)?,
            min_delay_ms: load("PANTRY_MIN_DELAY_MS", defaults.min_delay_ms)?,
            max_delay_ms: load("PANTRY_MAX_DELAY_MS", defaults.max_delay_ms)?,
            failure_rate: load("PANTRY_FAILURE_RATE", defaults.failure_rate)?,
            fail_reads: load("PANTRY_FAIL_READS", defaults.fail_reads)?,
        })
    }

    pub fn fault_policy(&self) -> Result<Arc<dyn FaultPolicy>, ConfigError> {
        if !self.faults_enabled {
            return Ok(Arc::new(NoFaults));
        }
        let faults = RandomFaults::builder()
            .delay(Duration::from_millis(self.min_delay_ms), Duration::from_millis(self.max_delay_ms))
            .failure_rate(self.failure_rate)
            .fail_reads(self.fail_reads)
            .build()?;
        Ok(Arc::new(faults))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter: bool,
    pub retry_scope: RetryScope,
    pub toast_duration_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            timeout_ms: 5000,
            max_attempts: 3,
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
            jitter: false,
            retry_scope: RetryScope::Conservative,
            toast_duration_ms: 3000,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: load("PANTRY_URL", defaults.base_url)?,
            timeout_ms: load("PANTRY_TIMEOUT_MS", defaults.timeout_ms)?,
            max_attempts: load("PANTRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base_ms: load("PANTRY_BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            backoff_max_ms: load("PANTRY_BACKOFF_MAX_MS", defaults.backoff_max_ms)?,
            jitter: load("PANTRY_JITTER", defaults.jitter)?,
            retry_scope: load("PANTRY_RETRY_SCOPE", defaults.retry_scope)?,
            toast_duration_ms: load("PANTRY_TOAST_MS", defaults.toast_duration_ms)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    pub fn backoff(&self) -> Result<Backoff, ConfigError> {
        let jitter = if self.jitter { Jitter::Full } else { Jitter::None };
        let backoff = Backoff::exponential(Duration::from_millis(self.backoff_base_ms))
            .with_max(Duration::from_millis(self.backoff_max_ms))?
            .with_jitter(jitter);
        Ok(backoff)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let policy = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .backoff(self.backoff()?)
            .scope(self.retry_scope)
            .build()?;
        Ok(policy)
    }

    pub fn client(&self) -> Result<RecipeClient, ConfigError> {
        let client = RecipeClient::new(&self.base_url, self.timeout(), self.retry_policy()?)?;
        Ok(client)
    }
}

fn load<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::InvalidVar { key: key.to_string(), reason: e.to_string() }
        }),
        Err(env::VarError::NotPresent) => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
        Err(e) => Err(ConfigError::InvalidVar { key: key.to_string(), reason: e.to_string() }),
    }
}
