//! Error handling

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Failure reasons for the weathercanvas application.
#[derive(Debug)]
pub enum CanvasError {
    /// No OpenAI API key configured
    MissingApiKey,
    /// Invalid configuration value
    Config(String),
    /// An upstream service answered with an unexpected status
    UpstreamStatus {
        /// Which call failed
        service: &'static str,
        /// The HTTP status it returned
        status: u16,
    },
    /// Image response had no `data` entries
    MissingImageData,
    /// First image entry had no `url`
    MissingImageUrl,
    /// Transport level failure
    Request(String),
    /// Body couldn't be decoded
    Decode(String),
    /// Local file operations failed
    Io(std::io::Error),
    /// A blocking worker panicked or was cancelled
    Worker(String),
    /// A requested resource is not there
    NotFound(String),
}

impl std::fmt::Display for CanvasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "OpenAI API key is not configured"),
            Self::Config(message) => write!(f, "Invalid configuration: {message}"),
            Self::UpstreamStatus { service, status } => {
                write!(f, "{service} returned HTTP {status}")
            }
            Self::MissingImageData => {
                write!(f, "The 'data' key is missing or empty in the response")
            }
            Self::MissingImageUrl => write!(f, "No 'url' key in the response data"),
            Self::Request(message) => write!(f, "Request failed: {message}"),
            Self::Decode(message) => write!(f, "Failed to decode response: {message}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Worker(message) => write!(f, "Worker failed: {message}"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
        }
    }
}

impl std::error::Error for CanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CanvasError {
    fn from(err: std::io::Error) -> Self {
        CanvasError::Io(err)
    }
}

impl From<reqwest::Error> for CanvasError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CanvasError::Decode(err.to_string())
        } else {
            CanvasError::Request(err.to_string())
        }
    }
}

impl CanvasError {
    /// Tags a blocking client failure with the `service` that was being called.
    pub fn from_ureq(service: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => CanvasError::UpstreamStatus { service, status },
            other => CanvasError::Request(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(err: serde_json::Error) -> Self {
        CanvasError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for CanvasError {
    fn from(err: url::ParseError) -> Self {
        CanvasError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CanvasError {
    fn from(err: tokio::task::JoinError) -> Self {
        CanvasError::Worker(err.to_string())
    }
}

impl From<axum::http::Error> for CanvasError {
    fn from(err: axum::http::Error) -> Self {
        CanvasError::Request(err.to_string())
    }
}

impl IntoResponse for CanvasError {
    fn into_response(self) -> Response {
        match self {
            CanvasError::NotFound(what) => {
                tracing::debug!("404 {what}");
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
            CanvasError::MissingApiKey | CanvasError::Config(_) => {
                error!("Configuration error: {self}");
                (StatusCode::SERVICE_UNAVAILABLE, "Not configured").into_response()
            }
            CanvasError::UpstreamStatus { .. }
            | CanvasError::MissingImageData
            | CanvasError::MissingImageUrl
            | CanvasError::Request(_)
            | CanvasError::Decode(_) => {
                error!("Upstream error: {self}");
                (StatusCode::BAD_GATEWAY, "Upstream service error").into_response()
            }
            CanvasError::Io(_) | CanvasError::Worker(_) => {
                error!("Internal server error: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
