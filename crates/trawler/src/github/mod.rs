//! GitHub provider: walks `GET /repositories?since={id}` in id order.
//!
//! # Module Structure
//!
//! - [`types`] - Configuration and the raw page payload
//! - [`convert`] - Page items to store rows, rows to mentions
//! - `provider` - The [`GitHubProvider`] cursor state machine
//!
//! The largest stored id is the cursor. Each fetched page is inserted in one
//! statement before any of its items is yielded, so a restart resumes from
//! the same place and replays rows that were stored but never delivered.
//!
//! ```ignore
//! use std::sync::Arc;
//! use trawler::github::{GitHubConfig, GitHubProvider};
//! use trawler::http::reqwest_transport::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
//! let provider = GitHubProvider::new(GitHubConfig::default(), db, transport);
//! ```

mod convert;
mod provider;
mod types;

pub use convert::{clone_aliases, to_mention};
pub use provider::GitHubProvider;
pub use types::{DEFAULT_API_URL, GitHubConfig, PROVIDER_NAME, RawRepository};
