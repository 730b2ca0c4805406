use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::DEFAULT_USER_AGENT;

pub const PROVIDER_NAME: &str = "bitbucket";

pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org";

/// Largest page Bitbucket serves for the public listing.
pub const DEFAULT_PAGE_LEN: u32 = 100;

/// Floor between two listing requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitbucketConfig {
    pub api_url: String,
    pub page_len: u32,
    #[serde(rename = "min_interval_ms", with = "duration_millis")]
    pub min_interval: Duration,
    pub user_agent: String,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_len: DEFAULT_PAGE_LEN,
            min_interval: DEFAULT_MIN_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BitbucketConfig {
    /// Listing URL for `after`. An empty cursor is the first page.
    pub fn page_url(&self, after: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}/2.0/repositories",
            self.api_url.trim_end_matches('/')
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pagelen", &self.page_len.to_string());
            if !after.is_empty() {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// One page of `/2.0/repositories`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPage {
    #[serde(default)]
    pub values: Vec<RawRepository>,
    /// Absent on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepository {
    pub uuid: String,
    pub full_name: String,
    #[serde(default)]
    pub scm: String,
    #[serde(default)]
    pub links: Links,
    /// Present only for forks.
    #[serde(default)]
    pub parent: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub clone: Vec<CloneLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloneLink {
    pub href: String,
    #[serde(default)]
    pub name: String,
}
