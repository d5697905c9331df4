use axum::{Json, http::StatusCode, response::IntoResponse};
use reqwest::StatusCode as HttpStatus;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Failures raised by the duplex session transport.
///
/// These never reach the session: the transport logs them and relies on its
/// reconnect policy.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured endpoint is not a usable WebSocket URL.
    #[error("invalid relay url `{0}`")]
    InvalidUrl(String),
    /// Opening the WebSocket failed.
    #[error("failed to connect to `{url}`")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    /// The socket failed while reading or writing a frame.
    #[error("websocket failure")]
    Socket(#[source] tokio_tungstenite::tungstenite::Error),
    /// An outbound frame could not be serialized.
    #[error("failed to encode frame")]
    Encode(#[source] serde_json::Error),
}

/// Reasons an inbound frame was discarded before reaching the session state.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No channel is registered for the topic.
    #[error("no channel registered for topic `{0}`")]
    UnknownTopic(String),
    /// The body is not the expected JSON record.
    #[error("malformed payload")]
    Malformed(#[from] serde_json::Error),
    /// The body parsed but carries an unusable value.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Failures while resolving the content reference of a room.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The content API base url cannot carry a `/rooms/{id}` path.
    #[error("invalid content api url `{0}`")]
    InvalidBaseUrl(String),
    /// Building the HTTP client failed.
    #[error("failed to build content client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[error("failed to query room `{room_id}`")]
    RequestSend {
        room_id: String,
        #[source]
        source: reqwest::Error,
    },
    /// The collaborator answered with an unexpected status code.
    #[error("unexpected status {status} for room `{room_id}`")]
    RequestStatus { room_id: String, status: HttpStatus },
    /// The response body could not be decoded.
    #[error("failed to decode room `{room_id}`")]
    DecodeResponse {
        room_id: String,
        #[source]
        source: reqwest::Error,
    },
    /// The room exists but has no playable content reference.
    #[error("room `{room_id}` has no content reference")]
    MissingContent { room_id: String },
}

/// Errors surfaced to callers of the lobby handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Blank chat messages are rejected before they are published.
    #[error("chat message is empty")]
    EmptyMessage,
    /// The session task already finished.
    #[error("session closed")]
    Closed,
}

/// Errors that can occur in relay service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
