use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use trawler::WatchProgress;

const TICK: Duration = Duration::from_millis(100);

/// Interactive progress reporter using indicatif.
///
/// One spinner per provider. The counter is the number of delivered
/// mentions; the message shows what the provider is doing.
pub struct InteractiveReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar<'a>(&self, bars: &'a mut HashMap<String, ProgressBar>, provider: &str) -> &'a ProgressBar {
        bars.entry(provider.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::counter_style());
            bar.set_prefix(format!("{:10}", provider));
            bar.enable_steady_tick(TICK);
            bar
        })
    }

    pub fn handle(&self, event: WatchProgress) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            WatchProgress::ProviderStarted { provider } => {
                self.bar(&mut bars, &provider).set_message("fetching...");
            }

            WatchProgress::Delivered { provider, endpoint } => {
                let bar = self.bar(&mut bars, &provider);
                bar.inc(1);
                bar.set_message(endpoint);
            }

            WatchProgress::DeliveryFailed { provider, error, .. } => {
                self.bar(&mut bars, &provider)
                    .set_message(format!("delivery failed: {error}"));
            }

            WatchProgress::AckRetry {
                provider,
                attempt,
                max_retries,
                ..
            } => {
                self.bar(&mut bars, &provider)
                    .set_message(format!("ack failed ({attempt}/{max_retries}), retrying"));
            }

            WatchProgress::FetchError {
                provider,
                error,
                retry_after_ms,
            } => {
                self.bar(&mut bars, &provider).set_message(format!(
                    "{error}, retry in {}s",
                    Duration::from_millis(retry_after_ms).as_secs()
                ));
            }

            WatchProgress::Exhausted {
                provider,
                poll_after_ms,
            } => {
                self.bar(&mut bars, &provider).set_message(format!(
                    "up to date, next poll in {}s",
                    Duration::from_millis(poll_after_ms).as_secs()
                ));
            }

            WatchProgress::FailStopped { provider, attempts } => {
                self.bar(&mut bars, &provider).abandon_with_message(format!(
                    "stopped after {attempts} failed acknowledgements"
                ));
            }

            WatchProgress::ProviderFailed { provider, error } => {
                self.bar(&mut bars, &provider)
                    .abandon_with_message(format!("failed: {error}"));
            }

            WatchProgress::ProviderStopped { provider } => {
                let bar = self.bar(&mut bars, &provider);
                if !bar.is_finished() {
                    bar.finish_with_message("stopped");
                }
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for bar in bars.values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>6} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_events_advance_the_provider_counter() {
        let reporter = InteractiveReporter::new();
        reporter.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());

        reporter.handle(WatchProgress::ProviderStarted {
            provider: "github".to_string(),
        });
        for id in 0..3 {
            reporter.handle(WatchProgress::Delivered {
                provider: "github".to_string(),
                endpoint: format!("https://github.com/a/{id}.git"),
            });
        }
        reporter.handle(WatchProgress::ProviderStopped {
            provider: "github".to_string(),
        });

        let bars = reporter.bars.lock().unwrap();
        let bar = &bars["github"];
        assert_eq!(bar.position(), 3);
        assert!(bar.is_finished());
    }
}
