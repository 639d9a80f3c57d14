//! Retry policy for outbound recipe API calls.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Eligibility depends on the HTTP method and the failure, see [`RetryScope::allows`].
//!   Network failures and timeouts are retried; 5xx (and 429) responses only for idempotent
//!   methods; client errors, cancellations and undecodable bodies never.
//! - Under [`RetryScope::Conservative`] a `DELETE` is never retried.
//! - Backoff computes the pause per retry; the sleeper applies it (production uses
//!   `TokioSleeper`, tests inject `InstantSleeper`/`TrackingSleeper`).
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - The error returned after exhaustion is the last one observed.
//! - The sleeper is called exactly once between consecutive attempts.

use crate::{ApiError, Backoff, Sleeper, TokioSleeper};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which methods may be retried at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryScope {
    /// Every method except `DELETE`.
    #[default]
    Conservative,
    /// Every method, `DELETE` included.
    Permissive,
}

impl RetryScope {
    /// Decide whether `error`, observed for a request with `method`, warrants another attempt.
    pub fn allows(self, method: &Method, error: &ApiError) -> bool {
        if self == RetryScope::Conservative && *method == Method::DELETE {
            return false;
        }
        match error {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Status { status, .. } => {
                is_idempotent(method) && ((500..=599).contains(status) || *status == 429)
            }
            ApiError::Cancelled | ApiError::Decode(_) | ApiError::Request(_) => false,
        }
    }
}

impl fmt::Display for RetryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryScope::Conservative => write!(f, "conservative"),
            RetryScope::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for RetryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RetryScope::Conservative),
            "permissive" => Ok(RetryScope::Permissive),
            other => Err(format!("unknown retry scope `{other}` (expected conservative|permissive)")),
        }
    }
}

/// Idempotent per RFC 9110: safe to send twice.
pub fn is_idempotent(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE, Method::PUT, Method::DELETE]
        .contains(method)
}

/// Retry policy combining attempt budget, backoff, scope and sleeper.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    scope: RetryScope,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("scope", &self.scope)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn scope(&self) -> RetryScope {
        self.scope
    }

    pub fn should_retry(&self, method: &Method, error: &ApiError) -> bool {
        self.scope.allows(method, error)
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt budget runs out.
    ///
    /// The closure receives the 0-based attempt index.
    pub async fn execute<T, Fut, Op>(&self, method: &Method, operation: Op) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>> + Send,
        Op: FnMut(usize) -> Fut + Send,
    {
        self.execute_cancellable(method, None, operation).await
    }

    /// Like [`execute`](Self::execute), but a fired `cancel` token also cuts a backoff pause
    /// short with [`ApiError::Cancelled`].
    pub async fn execute_cancellable<T, Fut, Op>(
        &self,
        method: &Method,
        cancel: Option<&CancellationToken>,
        mut operation: Op,
    ) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>> + Send,
        Op: FnMut(usize) -> Fut + Send,
    {
        let mut attempt = 0;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.should_retry(method, &error) {
                tracing::debug!(%method, attempt = attempt + 1, %error, "not retrying");
                return Err(error);
            }
            if attempt + 1 >= self.max_attempts {
                tracing::warn!(%method, attempts = self.max_attempts, %error, "retries exhausted");
                return Err(error);
            }

            // 1-indexed: the first retry waits delay(1)
            let delay = self.backoff.delay(attempt + 1);
            tracing::warn!(
                %method,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                %error,
                "request failed, retrying"
            );
            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(%method, attempt = attempt + 1, "cancelled during backoff");
                        return Err(ApiError::Cancelled);
                    }
                    _ = self.sleeper.sleep(delay) => {}
                },
                None => self.sleeper.sleep(delay).await,
            }
            attempt += 1;
        }
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// `max_attempts` must be > 0.
    InvalidMaxAttempts(usize),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidMaxAttempts(n) => {
                write!(f, "max_attempts must be > 0 (got {})", n)
            }
        }
    }
}

impl std::error::Error for BuildError {}

pub struct RetryPolicyBuilder {
    max_attempts: usize,
    backoff: Backoff,
    scope: RetryScope,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicyBuilder {
    /// Defaults: 3 attempts, exponential backoff from 100ms, conservative scope.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(Duration::from_millis(100)),
            scope: RetryScope::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn scope(mut self, scope: RetryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<RetryPolicy, BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            scope: self.scope,
            sleeper: self.sleeper,
        })
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use crate::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(code: u16) -> ApiError {
        ApiError::Status { status: code, body: ErrorBody::default() }
    }

    fn network() -> ApiError {
        ApiError::Network("connection refused".into())
    }

    #[test]
    fn conservative_scope_never_retries_delete() {
        let scope = RetryScope::Conservative;
        assert!(!scope.allows(&Method::DELETE, &network()));
        assert!(!scope.allows(&Method::DELETE, &status(500)));
        assert!(RetryScope::Permissive.allows(&Method::DELETE, &status(500)));
        assert!(RetryScope::Permissive.allows(&Method::DELETE, &network()));
    }

    #[test]
    fn server_errors_retry_only_idempotent_methods() {
        let scope = RetryScope::Conservative;
        assert!(scope.allows(&Method::GET, &status(500)));
        assert!(scope.allows(&Method::PUT, &status(503)));
        assert!(scope.allows(&Method::GET, &status(429)));
        assert!(!scope.allows(&Method::POST, &status(500)));
    }

    #[test]
    fn network_and_timeouts_retry_any_method() {
        let scope = RetryScope::Conservative;
        assert!(scope.allows(&Method::POST, &network()));
        assert!(scope.allows(&Method::GET, &ApiError::Timeout(Duration::from_secs(5))));
    }

    #[test]
    fn client_errors_and_cancellation_never_retry() {
        let scope = RetryScope::Permissive;
        for code in [400, 403, 404, 409, 422] {
            assert!(!scope.allows(&Method::GET, &status(code)), "{code}");
        }
        assert!(!scope.allows(&Method::GET, &ApiError::Cancelled));
        assert!(!scope.allows(&Method::GET, &ApiError::Decode("eof".into())));
    }

    #[test]
    fn scope_parses_from_str() {
        assert_eq!("Permissive".parse::<RetryScope>(), Ok(RetryScope::Permissive));
        assert_eq!(" conservative ".parse::<RetryScope>(), Ok(RetryScope::Conservative));
        assert!("aggressive".parse::<RetryScope>().is_err());
    }

    #[tokio::test]
    async fn network_failure_retried_up_to_budget() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .backoff(Backoff::exponential(Duration::from_millis(100)))
            .with_sleeper(sleeper.clone())
            .build()
            .expect("builder");

        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = policy
            .execute(&Method::GET, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(network()) }
            })
            .await;

        assert_eq!(result, Err(network()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy =
            RetryPolicy::builder().max_attempts(3).with_sleeper(InstantSleeper).build().unwrap();

        let result = policy
            .execute(&Method::PUT, |attempt| async move {
                if attempt < 2 {
                    Err(status(500))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn not_found_returns_immediately() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder().with_sleeper(sleeper.clone()).build().unwrap();

        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = policy
            .execute(&Method::PUT, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status(404)) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn single_attempt_budget_never_sleeps() {
        let sleeper = TrackingSleeper::new();
        let policy =
            RetryPolicy::builder().max_attempts(1).with_sleeper(sleeper.clone()).build().unwrap();

        let result: Result<(), _> = policy.execute(&Method::GET, |_| async { Err(network()) }).await;

        assert!(result.is_err());
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_backoff_short() {
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .backoff(Backoff::constant(Duration::from_secs(10)))
            .build()
            .unwrap();
        let token = CancellationToken::new();
        tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            }
        });

        let start = tokio::time::Instant::now();
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = policy
            .execute_cancellable(&Method::GET, Some(&token), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(network()) }
            })
            .await;

        assert_eq!(result, Err(ApiError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancelled_token_before_backoff_returns_at_once() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder().with_sleeper(sleeper.clone()).build().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<(), _> = policy
            .execute_cancellable(&Method::GET, Some(&token), |_| async { Err(network()) })
            .await;

        assert_eq!(result, Err(ApiError::Cancelled));
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = RetryPolicy::builder().max_attempts(0).build();
        assert!(matches!(err, Err(BuildError::InvalidMaxAttempts(0))));
    }
}
