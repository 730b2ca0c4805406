use std::collections::VecDeque;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::time::Instant;
use url::Url;

use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::provider::{ProviderError, Result};
use crate::retry::{Backoff, RetryConfig};
use crate::store;

use super::scrape;
use super::types::ScrapedRepo;

/// GET with the configured user agent; non-2xx is an error.
#[derive(Clone)]
pub(super) struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
}

impl Fetcher {
    pub(super) fn new(transport: Arc<dyn HttpTransport>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
        }
    }

    pub(super) async fn get(&self, url: &Url) -> Result<HttpResponse> {
        let request = HttpRequest::get(url.as_str())
            .header("Accept", "text/html")
            .header("User-Agent", &self.user_agent);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProviderError::from_http(url.as_str(), e))?;
        if !response.is_success() {
            return Err(ProviderError::status(url.as_str(), response.status));
        }
        Ok(response)
    }
}

/// Statuses that mark a single repository page as permanently missing.
fn is_gone(status: u16) -> bool {
    matches!(status, 404 | 410)
}

/// Landing page reached from a seed, with its markup.
pub(super) struct Landing {
    pub url: Url,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SiteStatus {
    Active,
    /// Exhausted, or skipped as already scraped.
    Done,
    /// Too many consecutive failures.
    Dropped,
}

/// Outcome of advancing one site.
pub(super) enum SiteStep {
    Repo(ScrapedRepo),
    Exhausted,
}

/// Per-site scraper: landing page, then listing pages, then repositories.
///
/// Queue heads are only popped once they were fetched successfully, so a
/// failed step is retried from the same place.
pub(super) struct SiteScraper {
    pub seed: Url,
    pub landing: Option<Url>,
    pages: VecDeque<Url>,
    /// Repository pages with the listing page that linked them.
    repos: VecDeque<(Url, Url)>,
    pub status: SiteStatus,
    failures: Backoff,
    pub retry_at: Option<Instant>,
}

impl SiteScraper {
    pub(super) fn new(seed: Url, backoff: RetryConfig) -> Self {
        Self {
            seed,
            landing: None,
            pages: VecDeque::new(),
            repos: VecDeque::new(),
            status: SiteStatus::Active,
            failures: Backoff::new(backoff),
            retry_at: None,
        }
    }

    /// Whether the site is waiting out a backoff at `now`.
    pub(super) fn is_backing_off(&self, now: Instant) -> bool {
        self.retry_at.is_some_and(|at| at > now)
    }

    /// Record a failed step. Returns `false` once the site should be dropped.
    pub(super) fn record_failure(&mut self) -> bool {
        match self.failures.next_delay() {
            Some(delay) => {
                self.retry_at = Some(Instant::now() + delay);
                true
            }
            None => {
                self.status = SiteStatus::Dropped;
                self.retry_at = None;
                false
            }
        }
    }

    pub(super) fn record_success(&mut self) {
        self.failures.reset();
        self.retry_at = None;
    }

    pub(super) fn failures(&self) -> usize {
        self.failures.attempts()
    }

    /// Follow the seed (and its redirects) to the instance's main index.
    pub(super) async fn resolve(&self, fetcher: &Fetcher) -> Result<Landing> {
        let response = fetcher.get(&self.seed).await?;
        let final_url = Url::parse(&response.url).unwrap_or_else(|_| self.seed.clone());
        let html = response.text();

        match scrape::main_link(&html, &final_url)? {
            Some(main) if main != final_url => {
                let html = fetcher.get(&main).await?.text();
                Ok(Landing { url: main, html })
            }
            _ => Ok(Landing {
                url: final_url,
                html,
            }),
        }
    }

    /// Queue the listing pages of a resolved landing page.
    pub(super) fn start(&mut self, landing: &Landing) -> Result<()> {
        let mut pages = scrape::page_links(&landing.html, &landing.url)?;
        if pages.is_empty() {
            pages.push(landing.url.clone());
        }
        tracing::debug!(site = %landing.url, pages = pages.len(), "Scraping cgit site");
        self.pages = pages.into();
        self.landing = Some(landing.url.clone());
        Ok(())
    }

    /// Scrape until the next repository with a usable endpoint.
    ///
    /// Repositories already committed in an earlier run are skipped without
    /// fetching their page.
    pub(super) async fn next_repo(
        &mut self,
        fetcher: &Fetcher,
        db: &DatabaseConnection,
    ) -> Result<SiteStep> {
        let site = self
            .landing
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| self.seed.to_string());

        loop {
            if let Some((repo_url, page_url)) = self.repos.front().cloned() {
                if store::cgit::repo_exists(db, repo_url.as_str()).await? {
                    self.repos.pop_front();
                    continue;
                }

                let html = match fetcher.get(&repo_url).await {
                    Ok(response) => response.text(),
                    Err(ProviderError::Status { status, .. }) if is_gone(status) => {
                        tracing::warn!(
                            site = %site,
                            repo = %repo_url,
                            status,
                            "Repository page is gone, skipping repository"
                        );
                        self.repos.pop_front();
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let aliases = scrape::clone_aliases(&html)?;
                let endpoint = scrape::canonical_endpoint(&aliases);
                self.repos.pop_front();

                if endpoint.is_empty() {
                    tracing::warn!(
                        site = %site,
                        repo = %repo_url,
                        aliases = aliases.len(),
                        "No usable clone URL, skipping repository"
                    );
                    continue;
                }

                return Ok(SiteStep::Repo(ScrapedRepo {
                    url: repo_url.to_string(),
                    site,
                    page: page_url.to_string(),
                    endpoint,
                    aliases,
                    html,
                }));
            }

            let Some(page_url) = self.pages.front().cloned() else {
                return Ok(SiteStep::Exhausted);
            };
            let html = fetcher.get(&page_url).await?.text();
            let repos = scrape::repo_links(&html, &page_url)?;
            tracing::debug!(site = %site, page = %page_url, repos = repos.len(), "Scraped listing page");
            self.pages.pop_front();
            self.repos
                .extend(repos.into_iter().map(|repo| (repo, page_url.clone())));
        }
    }
}
