//! The watcher drives many providers concurrently.
//!
//! Each provider gets its own tokio task running an endless poll loop:
//! `next` → persist → `ack`, with bounded acknowledgement retries. A provider
//! that cannot commit `max_retries` times in a row is closed and dropped
//! from the schedule while the others keep running.
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use trawler::watcher::{JsonLinesPersist, Watcher, WatcherConfig};
//!
//! let watcher = Watcher::new(WatcherConfig::default(), JsonLinesPersist::new(std::io::stdout()))
//!     .with_provider(Box::new(github));
//! let report = watcher.run(CancellationToken::new()).await;
//! ```

mod persist;
mod progress;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::provider::{Delivery, ProviderError, RepoProvider, short_error_message};
use crate::retry::{Backoff, RetryConfig};

pub use persist::{JsonLinesPersist, Persist};
pub use progress::{ProgressCallback, WatchProgress, emit};

/// Default number of acknowledgement attempts before a provider is fail-stopped.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Default pause between acknowledgement attempts.
pub const DEFAULT_ACK_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Default pause after a provider reports exhaustion.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Scheduling policy shared by every provider loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Acknowledgement attempts before fail-stop. Values below 1 count as 1.
    pub max_retries: usize,
    /// Pause between acknowledgement attempts, and after a failed delivery.
    pub ack_retry_interval: Duration,
    /// Pause after `next` reports nothing available.
    pub poll_interval: Duration,
    /// Backoff between consecutive `next` errors. Saturates at `max_delay`.
    pub error_backoff: RetryConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            ack_retry_interval: DEFAULT_ACK_RETRY_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_backoff: RetryConfig::default(),
        }
    }
}

/// Why a provider loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// Acknowledgement failed `attempts` times in a row.
    FailStopped { attempts: usize },
    /// `next` returned a permanent error, e.g. rejected credentials.
    Failed { error: String },
    /// The provider reported itself closed.
    Closed,
    /// The provider task panicked.
    Panicked { message: String },
}

impl ProviderOutcome {
    /// Whether the provider stopped because of a failure rather than shutdown.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FailStopped { .. } | Self::Failed { .. } | Self::Panicked { .. }
        )
    }
}

/// Counters collected for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub delivered: usize,
    pub delivery_failures: usize,
    pub fetch_errors: usize,
    pub ack_failures: usize,
    pub exhausted_polls: usize,
}

#[derive(Debug, Clone)]
pub struct ProviderReport {
    pub name: String,
    pub outcome: ProviderOutcome,
    pub stats: ProviderStats,
}

/// Result of [`Watcher::run`], one entry per provider in registration order.
#[derive(Debug, Clone, Default)]
pub struct WatchReport {
    pub providers: Vec<ProviderReport>,
}

impl WatchReport {
    pub fn delivered(&self) -> usize {
        self.providers.iter().map(|p| p.stats.delivered).sum()
    }

    /// Providers that stopped on a failure, in registration order.
    pub fn failed(&self) -> impl Iterator<Item = &ProviderReport> {
        self.providers.iter().filter(|p| p.outcome.is_failure())
    }

    pub fn get(&self, name: &str) -> Option<&ProviderReport> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Composes providers with one shared persist function.
pub struct Watcher {
    config: WatcherConfig,
    persist: Arc<dyn Persist>,
    providers: Vec<Box<dyn RepoProvider>>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl Watcher {
    pub fn new(config: WatcherConfig, persist: impl Persist + 'static) -> Self {
        Self {
            config,
            persist: Arc::new(persist),
            providers: Vec::new(),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn RepoProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run every provider until `cancel` fires or all of them stopped.
    ///
    /// Providers are closed before their loop ends.
    pub async fn run(self, cancel: CancellationToken) -> WatchReport {
        let mut tasks = JoinSet::new();
        let mut names = Vec::with_capacity(self.providers.len());

        for (index, provider) in self.providers.into_iter().enumerate() {
            names.push(provider.name().to_string());
            let worker = Worker {
                name: provider.name().to_string(),
                provider,
                persist: Arc::clone(&self.persist),
                poll_interval: self.config.poll_interval,
                max_retries: self.config.max_retries.max(1),
                ack_retry_interval: self.config.ack_retry_interval,
                fetch_backoff: Backoff::new(self.config.error_backoff.clone()),
                on_progress: self.on_progress.clone(),
                stats: ProviderStats::default(),
            };
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, worker.run(cancel).await) });
        }

        let mut reports: Vec<Option<ProviderReport>> = vec![None; names.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => reports[index] = Some(report),
                Err(e) => tracing::error!(error = %e, "Provider task failed"),
            }
        }

        let providers = reports
            .into_iter()
            .zip(names)
            .map(|(report, name)| {
                report.unwrap_or_else(|| ProviderReport {
                    name,
                    outcome: ProviderOutcome::Panicked {
                        message: "provider task did not complete".to_string(),
                    },
                    stats: ProviderStats::default(),
                })
            })
            .collect();

        WatchReport { providers }
    }
}

enum AckOutcome {
    Committed,
    Cancelled,
    Exhausted { attempts: usize },
}

/// One provider's polling loop.
struct Worker {
    name: String,
    provider: Box<dyn RepoProvider>,
    persist: Arc<dyn Persist>,
    poll_interval: Duration,
    max_retries: usize,
    ack_retry_interval: Duration,
    fetch_backoff: Backoff,
    on_progress: Option<Arc<ProgressCallback>>,
    stats: ProviderStats,
}

impl Worker {
    fn emit(&self, event: WatchProgress) {
        emit(self.on_progress.as_deref(), event);
    }

    #[tracing::instrument(skip_all, fields(provider = %self.name))]
    async fn run(mut self, cancel: CancellationToken) -> ProviderReport {
        self.emit(WatchProgress::ProviderStarted {
            provider: self.name.clone(),
        });

        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break ProviderOutcome::Cancelled,
                next = self.provider.next() => next,
            };

            let mention = match next {
                Ok(Some(mention)) => {
                    self.fetch_backoff.reset();
                    mention
                }
                Ok(None) => {
                    self.fetch_backoff.reset();
                    self.stats.exhausted_polls += 1;
                    tracing::debug!(poll_after = ?self.poll_interval, "Provider exhausted");
                    self.emit(WatchProgress::Exhausted {
                        provider: self.name.clone(),
                        poll_after_ms: self.poll_interval.as_millis() as u64,
                    });
                    if !sleep_or_cancel(&cancel, self.poll_interval).await {
                        break ProviderOutcome::Cancelled;
                    }
                    continue;
                }
                Err(ProviderError::Closed { .. }) => break ProviderOutcome::Closed,
                Err(e) if !e.is_transient() => {
                    self.stats.fetch_errors += 1;
                    tracing::error!(error = %e, "Provider cannot continue, stopping it");
                    let error = short_error_message(&e);
                    self.emit(WatchProgress::ProviderFailed {
                        provider: self.name.clone(),
                        error: error.clone(),
                    });
                    break ProviderOutcome::Failed { error };
                }
                Err(e) => {
                    self.stats.fetch_errors += 1;
                    let delay = self.fetch_backoff.next_delay_saturating();
                    tracing::warn!(
                        attempt = self.fetch_backoff.attempts(),
                        retry_after_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetching next mention failed"
                    );
                    self.emit(WatchProgress::FetchError {
                        provider: self.name.clone(),
                        error: short_error_message(&e),
                        retry_after_ms: delay.as_millis() as u64,
                    });
                    if !sleep_or_cancel(&cancel, delay).await {
                        break ProviderOutcome::Cancelled;
                    }
                    continue;
                }
            };

            let endpoint = mention.endpoint.clone();
            let delivery = tokio::select! {
                biased;
                () = cancel.cancelled() => break ProviderOutcome::Cancelled,
                delivery = self.persist.persist(mention) => delivery,
            };

            match &delivery {
                Ok(()) => {
                    self.stats.delivered += 1;
                    self.emit(WatchProgress::Delivered {
                        provider: self.name.clone(),
                        endpoint: endpoint.clone(),
                    });
                }
                Err(e) => {
                    self.stats.delivery_failures += 1;
                    tracing::warn!(endpoint = %endpoint, error = %e, "Delivery failed");
                    self.emit(WatchProgress::DeliveryFailed {
                        provider: self.name.clone(),
                        endpoint: endpoint.clone(),
                        error: short_error_message(e),
                    });
                }
            }

            match self.acknowledge(&delivery, &cancel).await {
                AckOutcome::Committed => {}
                AckOutcome::Cancelled => break ProviderOutcome::Cancelled,
                AckOutcome::Exhausted { attempts } => {
                    tracing::error!(
                        endpoint = %endpoint,
                        attempts,
                        "Acknowledgement retries exhausted, stopping provider"
                    );
                    self.emit(WatchProgress::FailStopped {
                        provider: self.name.clone(),
                        attempts,
                    });
                    break ProviderOutcome::FailStopped { attempts };
                }
            }

            // A refused delivery is replayed; give the destination time to recover.
            if delivery.is_err() && !sleep_or_cancel(&cancel, self.ack_retry_interval).await {
                break ProviderOutcome::Cancelled;
            }
        };

        if let Err(e) = self.provider.close().await {
            tracing::warn!(error = %e, "Closing provider failed");
        }
        self.emit(WatchProgress::ProviderStopped {
            provider: self.name.clone(),
        });

        ProviderReport {
            name: self.name,
            outcome,
            stats: self.stats,
        }
    }

    async fn acknowledge(&mut self, delivery: &Delivery, cancel: &CancellationToken) -> AckOutcome {
        let mut retries = 0;
        while retries < self.max_retries {
            match self.provider.ack(delivery).await {
                Ok(()) => return AckOutcome::Committed,
                Err(e) => {
                    retries += 1;
                    self.stats.ack_failures += 1;
                    tracing::warn!(
                        attempt = retries,
                        max_retries = self.max_retries,
                        error = %e,
                        "Acknowledgement failed"
                    );
                    self.emit(WatchProgress::AckRetry {
                        provider: self.name.clone(),
                        attempt: retries,
                        max_retries: self.max_retries,
                        error: short_error_message(&e),
                    });
                    if retries < self.max_retries
                        && !sleep_or_cancel(cancel, self.ack_retry_interval).await
                    {
                        return AckOutcome::Cancelled;
                    }
                }
            }
        }
        AckOutcome::Exhausted { attempts: retries }
    }
}

/// Sleep for `duration`; returns `false` if cancelled first.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
