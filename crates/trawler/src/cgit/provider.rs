use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set};
use tokio::time::Instant;
use url::Url;

use crate::entity::cgit_repository::ActiveModel;
use crate::http::HttpTransport;
use crate::mention::Mention;
use crate::provider::{Delivery, ProviderError, RepoProvider, Result};
use crate::store;

use super::error::ScrapeError;
use super::site::{Fetcher, SiteScraper, SiteStatus, SiteStep};
use super::types::{CgitConfig, PROVIDER_NAME, ScrapedRepo};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCommit {
    url: String,
}

/// Scrapes a growing list of cgit instances, one site after the other.
///
/// A pass walks every active site in order. Sites that fail are retried on a
/// later pass after a per-site backoff and dropped after too many
/// consecutive failures; the provider itself keeps going. When only
/// backing-off sites remain, `next` waits for the earliest of them.
/// `Ok(None)` means every site is finished or dropped.
pub struct CgitProvider {
    name: String,
    config: CgitConfig,
    db: Arc<DatabaseConnection>,
    fetcher: Fetcher,
    sites: Vec<SiteScraper>,
    /// Index of the site the current pass is on.
    position: usize,
    seeds: HashSet<String>,
    /// Landing pages claimed by a site during this run.
    claimed: HashSet<String>,
    /// The yielded repository, held until acknowledged.
    current: Option<ScrapedRepo>,
    pending: Option<PendingCommit>,
    closed: bool,
}

impl CgitProvider {
    pub fn new(
        config: CgitConfig,
        db: Arc<DatabaseConnection>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let fetcher = Fetcher::new(transport, config.user_agent.clone());
        let seeds = config.sites.clone();
        let mut provider = Self {
            name: PROVIDER_NAME.to_string(),
            config,
            db,
            fetcher,
            sites: Vec::new(),
            position: 0,
            seeds: HashSet::new(),
            claimed: HashSet::new(),
            current: None,
            pending: None,
            closed: false,
        };
        provider.push_sites(seeds);
        provider
    }

    /// Append newly discovered seed URLs. Returns how many were new.
    ///
    /// Seeds already known are ignored, as are URLs that do not parse.
    pub fn push_sites<I, S>(&mut self, seeds: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for seed in seeds {
            let seed = seed.as_ref().trim();
            let url = match Url::parse(seed) {
                Ok(url) => url,
                Err(e) => {
                    let err = ScrapeError::invalid_url(seed, e);
                    tracing::warn!(provider = %self.name, error = %err, "Ignoring cgit seed");
                    continue;
                }
            };
            if !self.seeds.insert(url.to_string()) {
                continue;
            }
            self.sites
                .push(SiteScraper::new(url, self.config.site_backoff()));
            added += 1;
        }
        added
    }

    /// Sites still being scraped or retried.
    pub fn active_sites(&self) -> usize {
        self.sites
            .iter()
            .filter(|site| site.status == SiteStatus::Active)
            .count()
    }

    /// Earliest moment an active site may be retried.
    fn next_retry(&self) -> Option<Instant> {
        self.sites
            .iter()
            .filter(|site| site.status == SiteStatus::Active)
            .filter_map(|site| site.retry_at)
            .min()
    }

    fn yield_current(&mut self) -> Option<Mention> {
        let repo = self.current.as_ref()?;
        self.pending = Some(PendingCommit {
            url: repo.url.clone(),
        });
        Some(repo.to_mention(&self.name))
    }

    /// Resolve the landing page and claim it, or report that it was scraped already.
    async fn start_site(&mut self, index: usize) -> Result<bool> {
        let landing = self.sites[index].resolve(&self.fetcher).await?;
        let key = landing.url.to_string();

        if self.claimed.contains(&key) || store::cgit::is_site_finished(&self.db, &key).await? {
            tracing::info!(
                provider = %self.name,
                seed = %self.sites[index].seed,
                site = %key,
                "cgit site already scraped, skipping"
            );
            return Ok(false);
        }

        let seed = self.sites[index].seed.to_string();
        store::cgit::record_site_started(&self.db, &key, &seed).await?;
        self.sites[index].start(&landing)?;
        self.claimed.insert(key);
        Ok(true)
    }

    async fn step_site(&mut self, index: usize) -> Result<SiteStep> {
        if self.sites[index].landing.is_none() && !self.start_site(index).await? {
            self.sites[index].status = SiteStatus::Done;
            return Ok(SiteStep::Exhausted);
        }

        let step = self.sites[index].next_repo(&self.fetcher, &self.db).await?;
        if matches!(step, SiteStep::Exhausted)
            && let Some(landing) = &self.sites[index].landing
        {
            store::cgit::mark_site_finished(&self.db, landing.as_str()).await?;
            tracing::info!(provider = %self.name, site = %landing, "Finished cgit site");
            self.sites[index].status = SiteStatus::Done;
        }
        Ok(step)
    }
}

#[async_trait]
impl RepoProvider for CgitProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip_all, fields(provider = %self.name))]
    async fn next(&mut self) -> Result<Option<Mention>> {
        if self.closed {
            return Err(ProviderError::Closed {
                name: self.name.clone(),
            });
        }
        if let Some(mention) = self.yield_current() {
            return Ok(Some(mention));
        }

        loop {
            let now = Instant::now();
            while self.position < self.sites.len() {
                let index = self.position;
                let site = &self.sites[index];
                if site.status != SiteStatus::Active || site.is_backing_off(now) {
                    self.position += 1;
                    continue;
                }

                match self.step_site(index).await {
                    Ok(SiteStep::Repo(repo)) => {
                        self.sites[index].record_success();
                        self.current = Some(repo);
                        return Ok(self.yield_current());
                    }
                    Ok(SiteStep::Exhausted) => self.position += 1,
                    // The store is shared by every site; its failures are the provider's.
                    Err(e @ ProviderError::Store(_)) => return Err(e),
                    Err(e) => {
                        let site = &mut self.sites[index];
                        if site.record_failure() {
                            tracing::warn!(
                                seed = %site.seed,
                                attempt = site.failures(),
                                error = %e,
                                "Scraping cgit site failed, retrying on a later pass"
                            );
                        } else {
                            tracing::warn!(
                                seed = %site.seed,
                                attempts = self.config.max_site_failures + 1,
                                error = %e,
                                "Dropping cgit site after repeated failures"
                            );
                        }
                        self.position += 1;
                    }
                }
            }

            self.position = 0;
            let Some(retry_at) = self.next_retry() else {
                return Ok(None);
            };
            tracing::debug!(
                wait_ms = retry_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Only backing-off cgit sites left, waiting"
            );
            tokio::time::sleep_until(retry_at).await;
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if delivery.is_err() {
            return Ok(());
        }
        let Some(repo) = self.current.as_ref().filter(|repo| repo.url == pending.url) else {
            return Ok(());
        };

        let model = ActiveModel {
            url: Set(repo.url.clone()),
            site_url: Set(repo.site.clone()),
            endpoint: Set(repo.endpoint.clone()),
            aliases: Set(serde_json::json!(repo.aliases)),
            committed_at: Set(Utc::now().fixed_offset()),
        };
        if let Err(e) = store::cgit::insert_repo(&self.db, model).await {
            self.pending = Some(pending);
            return Err(e.into());
        }
        self.current = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.current = None;
        self.pending = None;
        Ok(())
    }
}
