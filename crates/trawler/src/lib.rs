//! Trawler - resumable repository discovery.
//!
//! Providers turn external sources into a stream of [`Mention`]s:
//!
//! - [`github`] walks GitHub's public repository listing by numeric id.
//! - [`bitbucket`] follows Bitbucket's opaque pagination cursor.
//! - [`cgit`] scrapes self-hosted cgit instances site by site.
//!
//! The [`Watcher`] drives any number of providers concurrently, hands each
//! mention to a caller-supplied [`Persist`] function and acknowledges the
//! outcome back to the provider. Progress is checkpointed in the database,
//! so a restart resumes where the previous run stopped.
//!
//! # Features
//!
//! - `github`, `bitbucket`, `cgit` - The providers.
//! - `sqlite`, `postgres` - Database backends.
//! - `migrate` - Enables [`connect_and_migrate`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use trawler::github::{GitHubConfig, GitHubProvider};
//! use trawler::http::reqwest_transport::ReqwestTransport;
//! use trawler::{JsonLinesPersist, Watcher, WatcherConfig, connect_and_migrate};
//!
//! let db = connect_and_migrate("sqlite://trawler.db?mode=rwc").await?;
//! let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
//! let github = GitHubProvider::new(GitHubConfig::default(), db, transport);
//!
//! let report = Watcher::new(WatcherConfig::default(), JsonLinesPersist::new(std::io::stdout()))
//!     .with_provider(Box::new(github))
//!     .run(CancellationToken::new())
//!     .await;
//! ```

pub mod db;
pub mod entity;
pub mod http;
pub mod mention;
pub mod provider;
pub mod retry;
pub mod store;
pub mod watcher;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "bitbucket")]
pub mod bitbucket;

#[cfg(feature = "cgit")]
pub mod cgit;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use mention::{Mention, Vcs};
pub use provider::{Delivery, PersistError, ProviderError, RepoProvider};
pub use store::StoreError;
pub use watcher::{
    JsonLinesPersist, Persist, ProgressCallback, ProviderOutcome, ProviderReport, ProviderStats,
    WatchProgress, WatchReport, Watcher, WatcherConfig,
};
