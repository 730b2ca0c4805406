//! Configuration file support for trawler.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `TRAWLER_`, e.g., `TRAWLER_DATABASE_URL`)
//! 3. Config file (~/.config/trawler/config.toml or ./trawler.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/trawler/trawler.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/trawler/trawler.db"  # optional, this is the default
//!
//! [watcher]
//! retries = 3
//! ack_retry_secs = 10
//! poll_secs = 86400
//! timeout_secs = 30
//!
//! [github]
//! token = "ghp_..."  # or use TRAWLER_GITHUB_TOKEN env var
//!
//! [bitbucket]
//! interval_ms = 1000
//!
//! [cgit]
//! sites = ["https://git.kernel.org/", "https://git.zx2c4.com/"]
//! failures = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

const APP_NAME: &str = "trawler";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Scheduling shared by every provider.
    pub watcher: WatcherSection,
    pub github: GitHubSection,
    pub bitbucket: BitbucketSection,
    pub cgit: CgitSection,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/trawler/trawler.db` if not specified.
    pub url: Option<String>,
}

/// Watcher options.
///
/// The environment separator is `_`, so only single-word keys can be
/// overridden from it (`TRAWLER_WATCHER_RETRIES`).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Acknowledgement attempts before a provider is fail-stopped.
    pub retries: usize,
    /// Pause between acknowledgement attempts, in seconds.
    pub ack_retry_secs: u64,
    /// Wait after a provider reports nothing new, in seconds.
    pub poll_secs: u64,
    /// Per-request HTTP timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            retries: 3,
            ack_retry_secs: 10,
            poll_secs: 24 * 60 * 60,
            timeout_secs: 30,
        }
    }
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    /// GitHub API token.
    /// Can also be set via TRAWLER_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise or a test server.
    pub api: Option<String>,
}

/// Bitbucket configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BitbucketSection {
    /// API base URL.
    pub api: Option<String>,
    /// Minimum time between two listing requests, in milliseconds.
    pub interval_ms: Option<u64>,
}

/// cgit configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CgitSection {
    /// Seed URLs. From the environment as a comma separated list:
    /// `TRAWLER_CGIT_SITES=https://a.example/,https://b.example/`.
    pub sites: Vec<String>,
    /// Retries before a failing site is dropped.
    pub failures: Option<usize>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/trawler/config.toml)
    /// 3. Local config file (./trawler.toml)
    /// 4. Environment variables with TRAWLER_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(config_path) = Self::default_config_path()
            && config_path.exists()
        {
            tracing::debug!("Loading config from {:?}", config_path);
            builder = builder.add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("trawler.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./trawler.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., TRAWLER_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("TRAWLER")
                .separator("_")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cgit.sites"),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file
    /// if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("trawler.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn watcher_config(&self) -> trawler::WatcherConfig {
        trawler::WatcherConfig {
            max_retries: self.watcher.retries,
            ack_retry_interval: Duration::from_secs(self.watcher.ack_retry_secs),
            poll_interval: Duration::from_secs(self.watcher.poll_secs),
            ..trawler::WatcherConfig::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.watcher.timeout_secs.max(1))
    }

    #[cfg(feature = "github")]
    pub fn github_config(&self) -> trawler::github::GitHubConfig {
        let mut config = trawler::github::GitHubConfig {
            token: self.github.token.clone().filter(|t| !t.is_empty()),
            ..Default::default()
        };
        if let Some(api) = &self.github.api {
            config.api_url = api.clone();
        }
        config
    }

    #[cfg(feature = "bitbucket")]
    pub fn bitbucket_config(&self) -> trawler::bitbucket::BitbucketConfig {
        let mut config = trawler::bitbucket::BitbucketConfig::default();
        if let Some(api) = &self.bitbucket.api {
            config.api_url = api.clone();
        }
        if let Some(ms) = self.bitbucket.interval_ms {
            config.min_interval = Duration::from_millis(ms);
        }
        config
    }

    /// cgit settings with `extra` seeds appended after the configured ones.
    #[cfg(feature = "cgit")]
    pub fn cgit_config(&self, extra: &[String]) -> trawler::cgit::CgitConfig {
        let mut config = trawler::cgit::CgitConfig {
            sites: self.cgit.sites.clone(),
            ..Default::default()
        };
        config.sites.extend(extra.iter().cloned());
        if let Some(failures) = self.cgit.failures {
            config.max_site_failures = failures;
        }
        config
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/trawler` or `~/.local/state/trawler`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert_eq!(config.watcher.retries, 3);
        assert_eq!(config.watcher.ack_retry_secs, 10);
        assert_eq!(config.watcher.poll_secs, 86_400);
        assert!(config.github.token.is_none());
        assert!(config.cgit.sites.is_empty());
    }

    #[test]
    fn test_watcher_config_mapping() {
        let config = parse(
            r#"
            [watcher]
            retries = 5
            ack_retry_secs = 2
            poll_secs = 60
        "#,
        );

        let watcher = config.watcher_config();
        assert_eq!(watcher.max_retries, 5);
        assert_eq!(watcher.ack_retry_interval, Duration::from_secs(2));
        assert_eq!(watcher.poll_interval, Duration::from_secs(60));
        // Unset keys keep their defaults.
        assert_eq!(config.watcher.timeout_secs, 30);
    }

    #[test]
    fn test_config_builder_with_defaults() {
        let settings = ConfigBuilder::builder().build().unwrap();
        let config: Config = settings.try_deserialize().unwrap_or_default();
        assert_eq!(config.watcher.retries, 3);
    }

    #[test]
    fn test_database_url_prefers_configured_value() {
        let config = parse(
            r#"
            [database]
            url = "sqlite:///tmp/test.db"
        "#,
        );
        assert_eq!(config.database_url().as_deref(), Some("sqlite:///tmp/test.db"));
    }

    #[test]
    fn test_default_database_url_creates_file() {
        let config = Config::default();
        if let Some(url) = config.database_url() {
            assert!(url.starts_with("sqlite://"));
            assert!(url.ends_with("trawler.db?mode=rwc"));
        }
    }

    #[cfg(feature = "github")]
    #[test]
    fn test_github_section() {
        let config = parse(
            r#"
            [github]
            token = "ghp_test123"
            api = "https://github.example.com/api/v3"
        "#,
        );
        let github = config.github_config();
        assert_eq!(github.token.as_deref(), Some("ghp_test123"));
        assert_eq!(github.api_url, "https://github.example.com/api/v3");
    }

    #[cfg(feature = "github")]
    #[test]
    fn test_empty_github_token_is_anonymous() {
        let config = parse(
            r#"
            [github]
            token = ""
        "#,
        );
        assert!(config.github_config().token.is_none());
    }

    #[cfg(feature = "bitbucket")]
    #[test]
    fn test_bitbucket_section() {
        let config = parse(
            r#"
            [bitbucket]
            interval_ms = 250
        "#,
        );
        let bitbucket = config.bitbucket_config();
        assert_eq!(bitbucket.min_interval, Duration::from_millis(250));
        assert_eq!(bitbucket.api_url, trawler::bitbucket::DEFAULT_API_URL);
    }

    #[cfg(feature = "cgit")]
    #[test]
    fn test_cgit_sites_merge_cli_seeds() {
        let config = parse(
            r#"
            [cgit]
            sites = ["https://git.a.example/"]
            failures = 2
        "#,
        );
        let cgit = config.cgit_config(&["https://git.b.example/".to_string()]);
        assert_eq!(
            cgit.sites,
            vec!["https://git.a.example/", "https://git.b.example/"]
        );
        assert_eq!(cgit.max_site_failures, 2);
    }
}
