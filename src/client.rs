//! Resilient HTTP client for the recipe store.
//!
//! Each call runs under the configured [`RetryPolicy`]; every attempt is bounded by the
//! per-call timeout and, for handles made with [`RecipeClient::with_cancellation`], aborted as
//! soon as the token fires. Failures come back as [`ApiError`], ready for
//! [`Toaster::handle_error`](crate::toast::Toaster::handle_error).

use crate::error::ErrorBody;
use crate::model::{DeleteResponse, FavoriteRequest, FavoritesResponse, Recipe, RecipeInput, RecipeUpdate};
use crate::{ApiError, RetryPolicy};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct RecipeClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: Arc<RetryPolicy>,
    cancel: Option<CancellationToken>,
}

impl RecipeClient {
    /// `base_url` must be an absolute http(s) URL, e.g. `http://localhost:4000`.
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::Request(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Request(format!("{base_url}: unsupported scheme")));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry: Arc::new(retry),
            cancel: None,
        })
    }

    /// A handle sharing this client's connection pool whose calls abort when `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self { cancel: Some(token), ..self.clone() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn list_recipes(&self, search: Option<&str>) -> Result<Vec<Recipe>, ApiError> {
        let query: Vec<(&str, &str)> = search.map(|s| ("search", s)).into_iter().collect();
        self.send(Method::GET, "/recipes", &query, None::<&()>).await
    }

    pub async fn get_recipe(&self, id: &str) -> Result<Recipe, ApiError> {
        self.send(Method::GET, &format!("/recipes/{id}"), &[], None::<&()>).await
    }

    pub async fn create_recipe(&self, input: &RecipeInput) -> Result<Recipe, ApiError> {
        self.send(Method::POST, "/recipes", &[], Some(input)).await
    }

    pub async fn update_recipe(&self, id: &str, update: &RecipeUpdate) -> Result<Recipe, ApiError> {
        self.send(Method::PUT, &format!("/recipes/{id}"), &[], Some(update)).await
    }

    pub async fn delete_recipe(&self, id: &str) -> Result<(), ApiError> {
        let _: DeleteResponse =
            self.send(Method::DELETE, &format!("/recipes/{id}"), &[], None::<&()>).await?;
        Ok(())
    }

    pub async fn list_favorites(&self) -> Result<Vec<String>, ApiError> {
        self.send(Method::GET, "/favorites", &[], None::<&()>).await
    }

    pub async fn add_favorite(&self, id: &str) -> Result<Vec<String>, ApiError> {
        let request = FavoriteRequest { id: id.to_string() };
        let response: FavoritesResponse =
            self.send(Method::POST, "/favorites", &[], Some(&request)).await?;
        Ok(response.favorites)
    }

    pub async fn remove_favorite(&self, id: &str) -> Result<Vec<String>, ApiError> {
        let response: FavoritesResponse =
            self.send(Method::DELETE, &format!("/favorites/{id}"), &[], None::<&()>).await?;
        Ok(response.favorites)
    }

    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let (verb, url, payload) = (&method, &url, &payload);
        self.retry
            .execute_cancellable(&method, self.cancel.as_ref(), move |attempt| {
                let mut request = self.http.request(verb.clone(), url).query(query);
                if let Some(bytes) = payload {
                    request = request.header(CONTENT_TYPE, "application/json").body(bytes.clone());
                }
                tracing::debug!(method = %verb, %url, attempt = attempt + 1, "sending request");
                self.attempt(request)
            })
            .await
    }

    /// One bounded, cancellable round trip.
    async fn attempt<T>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let timeout = self.timeout;
        let bounded = async move {
            tokio::time::timeout(timeout, exchange(request))
                .await
                .unwrap_or(Err(ApiError::Timeout(timeout)))
        };

        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ApiError::Cancelled),
                outcome = bounded => outcome,
            },
            None => bounded.await,
        }
    }
}

async fn exchange<T>(request: reqwest::RequestBuilder) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(ApiError::from_transport)?;
    let status = response.status();
    let bytes = response.bytes().await.map_err(ApiError::from_transport)?;

    if status.is_success() {
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    } else {
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), body })
    }
}
