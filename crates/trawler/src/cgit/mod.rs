//! cgit provider: scrapes self-hosted cgit instances.
//!
//! Each seed URL is followed to its landing page, which is checked against
//! the durable `cgit_sites` record so an instance is scraped at most once
//! ever, even when several seeds lead to it. Repositories are committed to
//! `cgit_repositories` only on a successful acknowledgement.
//!
//! # Module Structure
//!
//! - [`scrape`] - Selectors and endpoint preference
//! - `site` - Per-site landing → pages → repositories state machine
//! - `provider` - The outer pass over all sites

mod error;
mod provider;
pub mod scrape;
mod site;
mod types;

pub use error::ScrapeError;
pub use provider::CgitProvider;
pub use scrape::canonical_endpoint;
pub use types::{
    CgitConfig, DEFAULT_MAX_SITE_FAILURES, DEFAULT_SITE_MAX_BACKOFF, DEFAULT_SITE_MIN_BACKOFF,
    PROVIDER_NAME, ScrapedRepo, to_mention,
};
