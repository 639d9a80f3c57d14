//! Error types for the recipe store and the client layer.
//!
//! [`StoreError`] is what the store signals; the HTTP layer maps each variant to a precise
//! status and body. [`ApiError`] is what the client sees on the other side of the wire, and the
//! only type the retry policy and the failure classifier reason about.

use crate::model::FieldErrors;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Message returned when a referenced recipe id does not exist.
pub const NOT_FOUND_MESSAGE: &str = "Recipe not found";

/// Message returned when an update presents a stale version token.
pub const CONFLICT_MESSAGE: &str =
    "Update Failed: Version Conflict Note: Someone has already updated the recipe";

/// Top-level message carried alongside per-field validation detail.
pub const VALIDATION_MESSAGE: &str = "Invalid recipe";

/// Failures signalled by [`RecipeStore`](crate::store::RecipeStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Input was malformed; nothing was changed.
    #[error("{}: {0}", VALIDATION_MESSAGE)]
    Validation(FieldErrors),
    /// The referenced recipe does not exist.
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound { id: String },
    /// The caller's `updatedAt` no longer matches the stored one.
    #[error("{}", CONFLICT_MESSAGE)]
    Conflict { id: String, expected: String, current: String },
    /// Simulated backend instability, raised before any state is touched.
    #[error("{0}")]
    Transient(String),
}

impl StoreError {
    /// HTTP status code the server answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Transient(_) => 500,
        }
    }

    /// Wire body for this error.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Validation(fields) => ErrorBody {
                error: Some(VALIDATION_MESSAGE.to_string()),
                message: None,
                field_errors: Some(fields.clone()),
            },
            other => ErrorBody::error(other.to_string()),
        }
    }
}

/// JSON body of every non-2xx response.
///
/// All fields are optional on decode: the client must cope with bodies that carry an `error`,
/// a `message`, or nothing readable at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl ErrorBody {
    pub fn error(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }
}

/// Failures observed by [`RecipeClient`](crate::client::RecipeClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received (connection refused, reset, DNS, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The attempt did not complete within the per-call timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status { status: u16, body: ErrorBody },
    /// A success response whose body could not be decoded.
    #[error("could not decode response body: {0}")]
    Decode(String),
    /// The request could not be built (bad URL, unserializable payload).
    #[error("invalid request: {0}")]
    Request(String),
}

impl ApiError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Request(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Status code, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Per-field validation messages from a 400 response.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Status { body, .. } => body.field_errors.as_ref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True when a 409 says the cached version token is stale and the recipe should be reloaded.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let mut fields = FieldErrors::default();
        fields.push("title", "too short");
        assert_eq!(StoreError::Validation(fields).status_code(), 400);
        assert_eq!(StoreError::NotFound { id: "x".into() }.status_code(), 404);
        let conflict =
            StoreError::Conflict { id: "x".into(), expected: "a".into(), current: "b".into() };
        assert_eq!(conflict.status_code(), 409);
        assert_eq!(StoreError::Transient("boom".into()).status_code(), 500);
    }

    #[test]
    fn conflict_body_carries_reload_guidance() {
        let err = StoreError::Conflict { id: "x".into(), expected: "a".into(), current: "b".into() };
        let body = err.body();
        assert_eq!(body.error.as_deref(), Some(CONFLICT_MESSAGE));
        assert!(body.field_errors.is_none());
    }

    #[test]
    fn validation_body_lists_fields() {
        let mut fields = FieldErrors::default();
        fields.push("instructions", "Instructions are required");
        let body = StoreError::Validation(fields).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], VALIDATION_MESSAGE);
        assert_eq!(json["fieldErrors"]["instructions"][0], "Instructions are required");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn error_body_decodes_partial_shapes() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(body.message.as_deref(), Some("nope"));
        assert!(body.error.is_none());

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ErrorBody::default());
    }

    #[test]
    fn api_error_accessors() {
        let err = ApiError::Status { status: 409, body: ErrorBody::error(CONFLICT_MESSAGE) };
        assert!(err.is_conflict());
        assert_eq!(err.status(), Some(409));
        assert!(ApiError::Cancelled.is_cancelled());
        assert!(ApiError::Timeout(Duration::from_secs(5)).is_timeout());
        assert_eq!(ApiError::Network("refused".into()).status(), None);
    }
}
