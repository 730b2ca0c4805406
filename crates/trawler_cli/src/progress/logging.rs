use trawler::WatchProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: WatchProgress) {
        match event {
            WatchProgress::ProviderStarted { provider } => {
                tracing::info!(provider = %provider, "Provider started");
            }

            WatchProgress::Delivered { provider, endpoint } => {
                tracing::debug!(provider = %provider, endpoint = %endpoint, "Delivered");
            }

            WatchProgress::DeliveryFailed {
                provider,
                endpoint,
                error,
            } => {
                tracing::warn!(provider = %provider, endpoint = %endpoint, error = %error, "Delivery failed, will replay");
            }

            WatchProgress::AckRetry {
                provider,
                attempt,
                max_retries,
                error,
            } => {
                tracing::warn!(
                    provider = %provider,
                    attempt,
                    max_retries,
                    error = %error,
                    "Acknowledgement failed"
                );
            }

            WatchProgress::FetchError {
                provider,
                error,
                retry_after_ms,
            } => {
                tracing::warn!(provider = %provider, retry_after_ms, error = %error, "Fetch failed, backing off");
            }

            WatchProgress::Exhausted {
                provider,
                poll_after_ms,
            } => {
                tracing::info!(provider = %provider, poll_after_ms, "Nothing new, waiting");
            }

            WatchProgress::FailStopped { provider, attempts } => {
                tracing::error!(provider = %provider, attempts, "Provider fail-stopped");
            }

            WatchProgress::ProviderFailed { provider, error } => {
                tracing::error!(provider = %provider, error = %error, "Provider failed");
            }

            WatchProgress::ProviderStopped { provider } => {
                tracing::info!(provider = %provider, "Provider stopped");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
