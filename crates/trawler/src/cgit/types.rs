use std::time::Duration;

use crate::entity::cgit_repository::Model;
use crate::http::DEFAULT_USER_AGENT;
use crate::mention::Mention;
use crate::retry::RetryConfig;

pub const PROVIDER_NAME: &str = "cgit";

/// Retries granted to a failing site; the next consecutive failure drops it.
pub const DEFAULT_MAX_SITE_FAILURES: usize = 5;

pub const DEFAULT_SITE_MIN_BACKOFF: Duration = Duration::from_secs(30);

pub const DEFAULT_SITE_MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgitConfig {
    /// Seed URLs, scraped in this order.
    pub sites: Vec<String>,
    /// Retries before a failing site is dropped.
    pub max_site_failures: usize,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub user_agent: String,
}

impl Default for CgitConfig {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            max_site_failures: DEFAULT_MAX_SITE_FAILURES,
            min_backoff: DEFAULT_SITE_MIN_BACKOFF,
            max_backoff: DEFAULT_SITE_MAX_BACKOFF,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CgitConfig {
    pub(super) fn site_backoff(&self) -> RetryConfig {
        RetryConfig::new(self.min_backoff, self.max_backoff, self.max_site_failures)
            .with_jitter(false)
    }
}

/// A repository summary page that produced a usable endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedRepo {
    /// Summary page URL, the dedup key.
    pub url: String,
    /// Landing page of the instance.
    pub site: String,
    /// Listing page the repository was linked from.
    pub page: String,
    pub endpoint: String,
    pub aliases: Vec<String>,
    pub html: String,
}

impl ScrapedRepo {
    pub fn to_mention(&self, provider: &str) -> Mention {
        Mention::new(provider, self.endpoint.clone())
            .with_aliases(self.aliases.clone())
            .with_context("site", self.site.clone())
            .with_context("page", self.page.clone())
            .with_context("url", self.url.clone())
            .with_context("html", self.html.clone())
    }
}

/// Mention for a committed repository row. The page markup is not stored.
pub fn to_mention(provider: &str, row: &Model) -> Mention {
    Mention::new(provider, row.endpoint.clone())
        .with_aliases(row.alias_list())
        .with_context("site", row.site_url.clone())
        .with_context("url", row.url.clone())
}
