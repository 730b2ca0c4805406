use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::entity::bitbucket_repository::Model;
use crate::http::{HttpRequest, HttpTransport};
use crate::mention::Mention;
use crate::provider::{ApiRateLimiter, Delivery, ProviderError, RepoProvider, Result};
use crate::store;

use super::convert::{after_token, to_active_model, to_mention};
use super::types::{BitbucketConfig, PROVIDER_NAME, RepositoryPage};

/// Wait assumed when a 429 carries no `Retry-After`.
const RETRY_AFTER_FALLBACK_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCommit {
    uuid: String,
}

/// A fetched page: its rows and the cursor of the page after it.
struct Page {
    body: RepositoryPage,
    next_token: Option<String>,
}

/// Opaque-token cursor over Bitbucket's public repository listing.
pub struct BitbucketProvider {
    name: String,
    config: BitbucketConfig,
    db: Arc<DatabaseConnection>,
    transport: Arc<dyn HttpTransport>,
    limiter: ApiRateLimiter,
    /// `after` cursor; empty is the first page, `None` until recovered.
    checkpoint: Option<String>,
    cache: VecDeque<Model>,
    pending: Option<PendingCommit>,
    closed: bool,
}

impl BitbucketProvider {
    pub fn new(
        config: BitbucketConfig,
        db: Arc<DatabaseConnection>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let limiter = ApiRateLimiter::with_period(config.min_interval);
        Self {
            name: PROVIDER_NAME.to_string(),
            config,
            db,
            transport,
            limiter,
            checkpoint: None,
            cache: VecDeque::new(),
            pending: None,
            closed: false,
        }
    }

    pub fn checkpoint(&self) -> Option<&str> {
        self.checkpoint.as_deref()
    }

    fn yield_head(&mut self) -> Option<Mention> {
        let head = self.cache.front()?;
        self.pending = Some(PendingCommit {
            uuid: head.uuid.clone(),
        });
        Some(to_mention(&self.name, head))
    }

    async fn recover(&mut self) -> Result<String> {
        let undelivered = store::bitbucket::find_undelivered(&self.db).await?;
        let cursor = store::bitbucket::latest(&self.db)
            .await?
            .map(|row| row.next_token)
            .unwrap_or_default();

        if !undelivered.is_empty() {
            tracing::info!(
                provider = %self.name,
                count = undelivered.len(),
                cursor = %cursor,
                "Recovered undelivered rows"
            );
        }
        self.cache.extend(undelivered);
        self.checkpoint = Some(cursor.clone());
        Ok(cursor)
    }

    async fn fetch_page(&self, after: &str) -> Result<Page> {
        let url = self
            .config
            .page_url(after)
            .map_err(|e| ProviderError::internal(format!("invalid Bitbucket API URL: {e}")))?
            .to_string();

        self.limiter.wait().await;
        let request = HttpRequest::get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", &self.config.user_agent);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProviderError::from_http(&url, e))?;

        match response.status {
            401 | 403 => return Err(ProviderError::AuthRequired { url }),
            429 => {
                let wait = response
                    .header("retry-after")
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .unwrap_or(RETRY_AFTER_FALLBACK_SECS);
                return Err(ProviderError::RateLimited {
                    reset_at: Utc::now() + chrono::Duration::seconds(wait),
                });
            }
            _ if !response.is_success() => {
                return Err(ProviderError::status(url, response.status));
            }
            _ => {}
        }

        let body: RepositoryPage = response
            .json()
            .map_err(|e| ProviderError::decode(&url, e.to_string()))?;
        let next_token = match body.next.as_deref() {
            None | Some("") => None,
            Some(next) => Some(after_token(next).ok_or_else(|| {
                ProviderError::decode(&url, format!("next link without cursor: {next}"))
            })?),
        };
        Ok(Page { body, next_token })
    }
}

#[async_trait]
impl RepoProvider for BitbucketProvider {
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
        if let Some(mention) = self.yield_head() {
            return Ok(Some(mention));
        }

        let mut cursor = match self.checkpoint.clone() {
            Some(cursor) => cursor,
            None => {
                let cursor = self.recover().await?;
                if let Some(mention) = self.yield_head() {
                    return Ok(Some(mention));
                }
                cursor
            }
        };

        loop {
            let page = self.fetch_page(&cursor).await?;
            // The last page is fetched again on the next poll, once it has a successor.
            let Some(next_token) = page.next_token else {
                tracing::debug!(cursor = %cursor, "Reached the end of the listing");
                return Ok(None);
            };

            let fetched_at = Utc::now().fixed_offset();
            let models = page
                .body
                .values
                .iter()
                .map(|raw| to_active_model(raw, &next_token, fetched_at))
                .collect();
            let inserted = store::bitbucket::insert_page(&self.db, models).await?;
            let uuids: Vec<String> = page.body.values.iter().map(|r| r.uuid.clone()).collect();
            let yieldable = store::bitbucket::find_undelivered_in(&self.db, &uuids).await?;

            tracing::debug!(
                cursor = %cursor,
                next = %next_token,
                fetched = uuids.len(),
                inserted,
                yieldable = yieldable.len(),
                "Stored Bitbucket page"
            );

            self.checkpoint = Some(next_token.clone());
            self.cache.extend(yieldable);
            if let Some(mention) = self.yield_head() {
                return Ok(Some(mention));
            }
            cursor = next_token;
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if delivery.is_err() {
            return Ok(());
        }

        if let Err(e) = store::bitbucket::mark_delivered(&self.db, &pending.uuid).await {
            self.pending = Some(pending);
            return Err(e.into());
        }
        if self.cache.front().is_some_and(|row| row.uuid == pending.uuid) {
            self.cache.pop_front();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.cache.clear();
        self.pending = None;
        Ok(())
    }
}
