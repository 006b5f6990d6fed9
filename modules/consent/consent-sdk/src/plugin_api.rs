//! Plugin API for HTTP transports.
//!
//! The consent module builds fully qualified requests and hands them to an
//! [`HttpTransport`]; a plugin only moves bytes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP method used by the consent backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL including the query string.
    pub url: String,
    /// JSON body, if any.
    pub body: Option<String>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body.into()),
            timeout: None,
        }
    }

    #[must_use]
    pub fn delete(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            url: url.into(),
            body: Some(body.into()),
            timeout: None,
        }
    }
}

/// Raw response as received by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failures that prevented a response from being received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connect(String),

    #[error("request error: {0}")]
    Request(String),
}

/// Moves one request over the wire.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute `request`. Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
