//! Common utilities for LLM providers
//!
//! Shared helpers for key masking, error sanitization and mapping HTTP
//! outcomes onto [`ProviderError`].

use crate::error::{ProviderError, ProviderErrorKind};

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Longest provider error detail kept in a message
const MAX_ERROR_DETAIL_LEN: usize = 300;

/// Mask API key for safe display in logs
///
/// Shows first 4 and last 4 characters for keys longer than 8 characters,
/// otherwise shows "****".
///
/// # Examples
/// ```
/// use mentora_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY || !key.is_ascii() {
        return "****".to_string();
    }
    format!(
        "{}...{}",
        &key[..KEY_MASK_VISIBLE_CHARS],
        &key[key.len() - KEY_MASK_VISIBLE_CHARS..]
    )
}

/// Truncate a string at a char boundary no later than `max_bytes`
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitize a provider error body before it becomes part of an error message
///
/// Authentication details and raw server internals are replaced with generic
/// text; anything else is truncated.
#[must_use]
pub fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("apikey")
        || lower.contains("x-api-key")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("bearer")
    {
        return "API authentication error. Please check your API key configuration.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("overloaded") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if lower.contains("internal") || lower.contains("server error") {
        return "API server error. Please try again later.".to_string();
    }

    if error.len() > MAX_ERROR_DETAIL_LEN {
        format!("{}...(truncated)", truncate_safe(error, MAX_ERROR_DETAIL_LEN))
    } else {
        error.to_string()
    }
}

/// Map a non-success HTTP status onto an error kind
#[must_use]
pub fn kind_for_status(status: u16) -> ProviderErrorKind {
    match status {
        401 | 403 => ProviderErrorKind::Auth,
        408 => ProviderErrorKind::Timeout,
        429 => ProviderErrorKind::RateLimit,
        500..=599 => ProviderErrorKind::Server,
        _ => ProviderErrorKind::InvalidRequest,
    }
}

/// Build a [`ProviderError`] from an HTTP status and (already extracted) detail
#[must_use]
pub fn error_for_status(provider: &str, status: u16, detail: &str) -> ProviderError {
    ProviderError::new(
        provider,
        kind_for_status(status),
        sanitize_api_error(&format!("HTTP {status}: {detail}")),
    )
    .with_status(status)
}

/// Map a transport-level reqwest error onto a [`ProviderError`]
#[must_use]
pub fn error_for_transport(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::new(provider, ProviderErrorKind::Timeout, "request timed out");
    }
    if err.is_decode() {
        return ProviderError::invalid_response(provider, sanitize_api_error(&err.to_string()));
    }
    // Connect failures, resets and other body/transport errors are all
    // network-level and safe to resubmit.
    ProviderError::network(provider, sanitize_api_error(&err.without_url().to_string()))
}

/// Resolve the model for a request, falling back to the provider default
#[must_use]
pub fn resolve_model<'a>(requested: &'a str, default_model: &'a str) -> &'a str {
    if requested.is_empty() {
        default_model
    } else {
        requested
    }
}
