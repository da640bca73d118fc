//! Error types for the endpoints client.

use std::fmt;

use bytes::Bytes;

/// Errors produced by the request pipeline.
///
/// The variants mirror the stages of a request: building it (`Encoding`,
/// `InvalidUrl`, `InvalidHeader`), sending it (`Timeout`, `Connection`,
/// `Transport`), and interpreting the response (`Validation`, `Decode`).
/// Errors are `Clone` so they can be shared between the retry layer and the
/// delivered result.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Parameters could not be encoded into a request body or query.
    Encoding(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// Transport-level failure while sending or receiving.
    Transport(String),
    /// The response was rejected by the validation policy.
    Validation {
        /// The HTTP status code.
        status: u16,
        /// Optional message supplied by the validating policy.
        message: Option<String>,
    },
    /// The response body did not decode into the expected type.
    Decode(String),
    /// The request was cancelled before completion.
    Cancelled,
    /// The retry policy itself failed while evaluating a decision.
    RetryEvaluation(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(msg) => write!(f, "Parameter encoding error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Validation { status, message } => {
                if let Some(msg) = message {
                    write!(f, "Response rejected (HTTP {status}): {msg}")
                } else {
                    write!(f, "Response rejected (HTTP {status})")
                }
            }
            Self::Decode(msg) => write!(f, "Decode error: {msg}"),
            Self::Cancelled => write!(f, "Request was cancelled"),
            Self::RetryEvaluation(msg) => write!(f, "Retry evaluation failed: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ApiError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ApiError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// Terminal failure of an upload, carried inside the upload state stream.
#[derive(Debug, Clone)]
pub enum UploadError {
    /// The upload was cancelled before completion.
    Cancelled,
    /// The server rejected the upload after the body was transferred.
    Server {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: Bytes,
    },
    /// Transport-level failure while sending the body.
    Transport(String),
    /// The source file could not be read.
    Io(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Upload was cancelled"),
            Self::Server { status, .. } => write!(f, "Upload rejected with HTTP {status}"),
            Self::Transport(msg) => write!(f, "Upload transport error: {msg}"),
            Self::Io(msg) => write!(f, "Upload source error: {msg}"),
        }
    }
}

impl std::error::Error for UploadError {}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;
