//! Reduce a terminal client failure to a single user-facing message.
//!
//! The mapping is a pure function from [`Failure`] to the closed set of [`MessageKind`]s, so it
//! can be tested exhaustively without any I/O. Precedence, first match wins:
//!
//! 1. a server-provided `error` field
//! 2. a server-provided `message` field
//! 3. the attempt timed out
//! 4. the caller cancelled (no message at all)
//! 5. no response was received
//! 6. 404
//! 7. 403
//! 8. any other 5xx
//! 9. anything else

use crate::ApiError;

pub const TIMEOUT_MESSAGE: &str = "Request timed out";
pub const NETWORK_MESSAGE: &str = "Network error";
pub const NOT_FOUND_MESSAGE: &str = "Recipe not found";
pub const FORBIDDEN_MESSAGE: &str = "Not authorized";
pub const SERVER_ERROR_MESSAGE: &str = "Server error";
pub const UNEXPECTED_MESSAGE: &str = "Unexpected error";

/// What came back, if anything, from a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFailure {
    pub status: u16,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// The facts classification looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    pub response: Option<ResponseFailure>,
    pub timed_out: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// The server's own `error` or `message` text.
    Server(String),
    Timeout,
    /// Client-initiated cancellation: nothing is shown.
    Silent,
    Network,
    NotFound,
    Forbidden,
    ServerError,
    Unexpected,
}

impl MessageKind {
    /// Text to show, or `None` when nothing should be shown.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageKind::Server(text) => Some(text.as_str()),
            MessageKind::Timeout => Some(TIMEOUT_MESSAGE),
            MessageKind::Silent => None,
            MessageKind::Network => Some(NETWORK_MESSAGE),
            MessageKind::NotFound => Some(NOT_FOUND_MESSAGE),
            MessageKind::Forbidden => Some(FORBIDDEN_MESSAGE),
            MessageKind::ServerError => Some(SERVER_ERROR_MESSAGE),
            MessageKind::Unexpected => Some(UNEXPECTED_MESSAGE),
        }
    }
}

pub fn classify(failure: &Failure) -> MessageKind {
    let response = failure.response.as_ref();

    if let Some(error) = response.and_then(|r| r.error.clone()) {
        return MessageKind::Server(error);
    }
    if let Some(message) = response.and_then(|r| r.message.clone()) {
        return MessageKind::Server(message);
    }
    if failure.timed_out {
        return MessageKind::Timeout;
    }
    if failure.cancelled {
        return MessageKind::Silent;
    }
    match response.map(|r| r.status) {
        None => MessageKind::Network,
        Some(404) => MessageKind::NotFound,
        Some(403) => MessageKind::Forbidden,
        Some(500..=599) => MessageKind::ServerError,
        Some(_) => MessageKind::Unexpected,
    }
}

impl From<&ApiError> for Failure {
    fn from(error: &ApiError) -> Self {
        match error {
            ApiError::Status { status, body } => Failure {
                response: Some(ResponseFailure {
                    status: *status,
                    error: body.error.clone(),
                    message: body.message.clone(),
                }),
                ..Failure::default()
            },
            // a 2xx arrived but its body was unusable
            ApiError::Decode(_) => Failure {
                response: Some(ResponseFailure { status: 200, ..ResponseFailure::default() }),
                ..Failure::default()
            },
            ApiError::Timeout(_) => Failure { timed_out: true, ..Failure::default() },
            ApiError::Cancelled => Failure { cancelled: true, ..Failure::default() },
            // never sent: not a network failure, and carries no status of its own
            ApiError::Request(_) => Failure {
                response: Some(ResponseFailure::default()),
                ..Failure::default()
            },
            ApiError::Network(_) => Failure::default(),
        }
    }
}

impl ApiError {
    pub fn message_kind(&self) -> MessageKind {
        classify(&Failure::from(self))
    }
}
