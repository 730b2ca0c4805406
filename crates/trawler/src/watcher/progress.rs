//! Progress events emitted by the watcher.
//!
//! Library users that do not care pass no callback; the CLI turns these into
//! log lines or spinners.

/// Progress events emitted while watching providers.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum WatchProgress {
    /// A provider's polling loop started.
    ProviderStarted { provider: String },

    /// A mention was handed to the persist function successfully.
    Delivered { provider: String, endpoint: String },

    /// The persist function failed; the mention will be replayed.
    DeliveryFailed {
        provider: String,
        endpoint: String,
        error: String,
    },

    /// Committing an acknowledgement failed.
    AckRetry {
        provider: String,
        attempt: usize,
        max_retries: usize,
        error: String,
    },

    /// `next` failed; the watcher backs off before polling again.
    FetchError {
        provider: String,
        error: String,
        retry_after_ms: u64,
    },

    /// Nothing available right now; polling resumes after the interval.
    Exhausted { provider: String, poll_after_ms: u64 },

    /// The provider was closed after exhausting its acknowledgement retries.
    FailStopped { provider: String, attempts: usize },

    /// `next` failed in a way polling again cannot fix; the provider was closed.
    ProviderFailed { provider: String, error: String },

    /// The provider's loop ended (cancelled, fail-stopped or closed).
    ProviderStopped { provider: String },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(WatchProgress) + Send + Sync>;

/// Helper to emit progress if a callback is provided.
#[inline]
pub fn emit(callback: Option<&ProgressCallback>, event: WatchProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}
