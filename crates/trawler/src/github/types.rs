//! GitHub configuration and API payloads.

use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_USER_AGENT;

/// Provider name used in mentions, logs and progress events.
pub const PROVIDER_NAME: &str = "github";

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Static configuration for [`GitHubProvider`](super::GitHubProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    /// Personal access token. Unauthenticated requests get a much smaller budget.
    pub token: Option<String>,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl GitHubConfig {
    /// URL of the page following `since`.
    pub fn page_url(&self, since: i64) -> String {
        format!(
            "{}/repositories?since={since}",
            self.api_url.trim_end_matches('/')
        )
    }
}

/// One entry of the `/repositories` listing.
///
/// Only the fields the provider needs; everything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRepository {
    pub id: i64,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub fork: Option<bool>,
}
