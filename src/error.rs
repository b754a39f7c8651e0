//! Error types for the zone control plane.

use hyper::StatusCode;
use std::net::SocketAddr;
use thiserror::Error;

/// Request-level failures. Each one is turned into a JSON error response by
/// the handler that detects it and never escapes the request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authorization header is missing")]
    MissingCredential,

    #[error("Unauthorized (401)")]
    InvalidCredential,

    #[error("Zone not found")]
    ZoneNotFound,

    #[error("Invalid zone name")]
    InvalidZoneName,

    #[error("{0}")]
    InvalidDocument(String),

    #[error("{0}")]
    Persistence(String),

    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request timed out")]
    Timeout,
}

impl ApiError {
    /// HTTP status code reported for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential | ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::ZoneNotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidZoneName
            | ApiError::InvalidDocument(_)
            | ApiError::Persistence(_)
            | ApiError::BodyTooLarge(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Fatal errors that end the control plane's role in the process.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to bind control listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Control listener accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
