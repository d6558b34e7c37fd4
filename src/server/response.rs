use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::Error;

/// Which proxy operation failed; selects the generic failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Top,
    Search,
    Full,
}

impl Endpoint {
    fn failure_message(self) -> &'static str {
        match self {
            Endpoint::Top => "Failed to fetch top headlines",
            Endpoint::Search => "Failed to search news",
            Endpoint::Full => "Failed to fetch article",
        }
    }

    fn timeout_message(self) -> &'static str {
        match self {
            Endpoint::Full => "Timeout fetching article",
            _ => "News API request timed out",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An [`Error`] on its way out of a handler.
///
/// Only fixed messages reach the client. Upstream bodies, transport errors
/// and configuration details stay in the logs.
#[derive(Debug)]
pub struct ApiError {
    endpoint: Endpoint,
    error: Error,
}

impl ApiError {
    pub fn new(endpoint: Endpoint, error: Error) -> Self {
        Self { endpoint, error }
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.error)
    }

    pub fn message(&self) -> String {
        match &self.error {
            Error::InvalidInput(msg) | Error::Forbidden(msg) => msg.clone(),
            Error::PayloadTooLarge(_) => "Article too large".to_string(),
            Error::Misconfigured => "Server misconfiguration".to_string(),
            Error::UpstreamAuth => "News API authentication failed".to_string(),
            Error::UpstreamUnavailable(_) => self.endpoint.failure_message().to_string(),
            Error::Timeout(_) => self.endpoint.timeout_message().to_string(),
            Error::ExtractionFailed(_) => "Unable to extract article content".to_string(),
            Error::Config(_) | Error::Io(_) => "Internal server error".to_string(),
        }
    }
}

pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidInput(_) | Error::Forbidden(_) | Error::PayloadTooLarge(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Misconfigured | Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::UpstreamAuth | Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(
            endpoint = ?self.endpoint,
            code = self.error.error_code(),
            status = status.as_u16(),
            error = %self.error,
            "news request failed"
        );

        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}
