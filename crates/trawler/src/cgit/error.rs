use thiserror::Error;

use crate::provider::ProviderError;

/// HTML-level failures while scraping a cgit instance.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid selector {css}: {message}")]
    Selector { css: &'static str, message: String },

    #[error("Invalid site URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl ScrapeError {
    #[inline]
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }

    fn url(&self) -> &str {
        match self {
            Self::Selector { .. } => "",
            Self::InvalidUrl { url, .. } => url,
        }
    }
}

impl From<ScrapeError> for ProviderError {
    fn from(err: ScrapeError) -> Self {
        ProviderError::decode(err.url().to_string(), err.to_string())
    }
}
