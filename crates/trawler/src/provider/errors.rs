use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;
use crate::store::StoreError;

/// Errors a provider reports from `next`, `ack` or `close`.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, timeout).
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The server answered with a status the provider cannot use.
    #[error("Unexpected HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded as the expected JSON or HTML.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Authentication required or failed.
    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    /// The durable store rejected a read or write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The provider was used after `close`.
    #[error("Provider {name} is closed")]
    Closed { name: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProviderError {
    #[inline]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    #[inline]
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a transport error for the given URL.
    pub fn from_http(url: &str, err: HttpError) -> Self {
        Self::network(url, err.to_string())
    }

    /// Check if this error is a rate limit error.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Transient errors leave the provider usable; the caller simply polls again.
    ///
    /// Rejected credentials, misconfiguration and use after `close` do not go
    /// away by polling, so the watcher stops the provider on them.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Closed { .. } | Self::AuthRequired { .. } | Self::Internal { .. }
        )
    }
}

/// A downstream delivery failure, reported back to the provider through `ack`.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The destination refused the mention.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The destination could not be reached or written.
    #[error("delivery failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PersistError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Outcome of handing a mention to the persist function.
pub type Delivery = std::result::Result<(), PersistError>;

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps progress events and
/// log lines compact when the source error carries multi-line detail.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
