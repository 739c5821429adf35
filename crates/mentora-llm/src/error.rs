//! Error types for mentora-llm
//!
//! Every adapter failure is normalized into a [`ProviderError`] carrying a
//! [`ProviderErrorKind`] and a `retriable` flag. Only transport-level
//! failures (timeouts, connection errors) are retriable; anything the
//! provider answered explicitly is not.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credentials missing, invalid or rejected (401/403)
    Auth,
    /// Provider throttled the request (429)
    RateLimit,
    /// The request did not complete in time
    Timeout,
    /// Provider-side failure (5xx)
    Server,
    /// Connection could not be established or was dropped
    Network,
    /// Provider rejected the request as malformed (other 4xx)
    InvalidRequest,
    /// Provider answered with a body we could not interpret
    InvalidResponse,
}

impl ProviderErrorKind {
    /// Whether failures of this kind are transient by default
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }

    /// Returns the string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::Network => "network",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized error from a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{provider} {kind} error: {message}")]
pub struct ProviderError {
    /// Provider that produced the error
    pub provider: String,
    /// Failure classification
    pub kind: ProviderErrorKind,
    /// Whether the caller may resubmit the same request
    pub retriable: bool,
    /// Sanitized, human-readable detail
    pub message: String,
    /// HTTP status code, when the provider answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ProviderError {
    /// Create an error whose retriable flag follows the kind's default
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            retriable: kind.is_transient(),
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Override the retriable flag
    #[must_use]
    pub fn with_retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    /// Shorthand for a timeout error
    #[must_use]
    pub fn timeout(provider: impl Into<String>, after_ms: u64) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("no response after {after_ms}ms"),
        )
    }

    /// Shorthand for a network error
    #[must_use]
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Network, message)
    }

    /// Shorthand for a missing or rejected credential
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Auth, message)
    }

    /// Shorthand for an undecodable provider response
    #[must_use]
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::InvalidResponse, message)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProviderError>;
