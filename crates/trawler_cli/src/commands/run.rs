use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use trawler::http::HttpTransport;
use trawler::http::reqwest_transport::ReqwestTransport;
use trawler::{
    JsonLinesPersist, ProviderOutcome, RepoProvider, WatchReport, Watcher, connect_and_migrate,
};

use crate::ProviderKind;
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Options for `trawler run`.
pub(crate) struct RunOptions {
    pub providers: Vec<ProviderKind>,
    pub sites: Vec<String>,
}

/// Providers to start: the requested ones in command-line order, or all of them.
fn selected(requested: &[ProviderKind]) -> Vec<ProviderKind> {
    if requested.is_empty() {
        return ProviderKind::all()
            .iter()
            .copied()
            .filter(|kind| kind.is_enabled())
            .collect();
    }
    let mut kinds = Vec::new();
    for kind in requested {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }
    kinds
}

fn build_provider(
    kind: ProviderKind,
    options: &RunOptions,
    config: &Config,
    db: &Arc<DatabaseConnection>,
    transport: &Arc<dyn HttpTransport>,
    explicit: bool,
) -> Option<Box<dyn RepoProvider>> {
    match kind {
        #[cfg(feature = "github")]
        ProviderKind::Github => {
            let github = config.github_config();
            if github.token.is_none() {
                tracing::warn!("No GitHub token configured, using the unauthenticated rate limit");
            }
            Some(Box::new(trawler::github::GitHubProvider::new(
                github,
                Arc::clone(db),
                Arc::clone(transport),
            )))
        }
        #[cfg(feature = "bitbucket")]
        ProviderKind::Bitbucket => Some(Box::new(trawler::bitbucket::BitbucketProvider::new(
            config.bitbucket_config(),
            Arc::clone(db),
            Arc::clone(transport),
        ))),
        #[cfg(feature = "cgit")]
        ProviderKind::Cgit => {
            let cgit = config.cgit_config(&options.sites);
            if cgit.sites.is_empty() {
                if explicit {
                    tracing::warn!("cgit requested but no sites configured, skipping");
                } else {
                    tracing::debug!("No cgit sites configured, skipping");
                }
                return None;
            }
            Some(Box::new(trawler::cgit::CgitProvider::new(
                cgit,
                Arc::clone(db),
                Arc::clone(transport),
            )))
        }
        #[allow(unreachable_patterns)]
        other => {
            tracing::warn!(provider = %other, "Provider not included in this build, skipping");
            None
        }
    }
}

pub(crate) async fn handle_run(
    options: RunOptions,
    config: &Config,
    database_url: &str,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(connect_and_migrate(database_url).await?);
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::with_timeout(config.http_timeout())?);

    let reporter = Arc::new(ProgressReporter::new());
    let mut watcher = Watcher::new(
        config.watcher_config(),
        JsonLinesPersist::new(std::io::stdout()),
    )
    .with_progress(reporter.as_callback());

    let explicit = !options.providers.is_empty();
    for kind in selected(&options.providers) {
        if let Some(provider) = build_provider(kind, &options, config, &db, &transport, explicit) {
            watcher = watcher.with_provider(provider);
        }
    }

    if watcher.is_empty() {
        return Err("no provider to run".into());
    }

    tracing::info!(providers = watcher.len(), "Starting watcher");
    let report = watcher.run(cancel).await;
    reporter.finish();

    log_report(&report);

    let failed: Vec<&str> = report.failed().map(|p| p.name.as_str()).collect();
    if !failed.is_empty() {
        return Err(format!("providers stopped on failure: {}", failed.join(", ")).into());
    }
    Ok(())
}

fn log_report(report: &WatchReport) {
    for provider in &report.providers {
        let stats = &provider.stats;
        match &provider.outcome {
            ProviderOutcome::Cancelled | ProviderOutcome::Closed => tracing::info!(
                provider = %provider.name,
                outcome = ?provider.outcome,
                delivered = stats.delivered,
                delivery_failures = stats.delivery_failures,
                fetch_errors = stats.fetch_errors,
                "Provider finished"
            ),
            outcome => tracing::error!(
                provider = %provider.name,
                outcome = ?outcome,
                delivered = stats.delivered,
                ack_failures = stats.ack_failures,
                "Provider stopped abnormally"
            ),
        }
    }
    tracing::info!(delivered = report.delivered(), "Watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(feature = "github", feature = "bitbucket", feature = "cgit"))]
    #[test]
    fn no_selection_means_every_provider() {
        assert_eq!(selected(&[]), ProviderKind::all());
    }

    #[cfg(all(feature = "github", feature = "cgit"))]
    #[test]
    fn repeated_providers_are_started_once() {
        assert_eq!(
            selected(&[ProviderKind::Cgit, ProviderKind::Github, ProviderKind::Cgit]),
            vec![ProviderKind::Cgit, ProviderKind::Github]
        );
    }
}
