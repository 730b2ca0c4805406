use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::time::Instant;

use crate::entity::github_repository::Model;
use crate::http::{HttpRequest, HttpTransport};
use crate::mention::Mention;
use crate::provider::{
    Delivery, GITHUB_RATE_WINDOW, HeaderPacer, ProviderError, RateLimitInfo, RepoProvider, Result,
};
use crate::store;

use super::convert::{to_active_model, to_mention, to_row};
use super::types::{GitHubConfig, PROVIDER_NAME, RawRepository};

/// Fallback wait when a rate-limited response carries no reset time.
const RATE_LIMIT_FALLBACK_SECS: i64 = 60;

/// Transition applied when the yielded row is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCommit {
    id: i64,
}

/// Numeric-id cursor over GitHub's public repository listing.
pub struct GitHubProvider {
    name: String,
    config: GitHubConfig,
    db: Arc<DatabaseConnection>,
    transport: Arc<dyn HttpTransport>,
    pacer: HeaderPacer,
    /// Largest stored id; `None` until recovered from the store.
    checkpoint: Option<i64>,
    cache: VecDeque<Model>,
    pending: Option<PendingCommit>,
    closed: bool,
}

impl GitHubProvider {
    pub fn new(
        config: GitHubConfig,
        db: Arc<DatabaseConnection>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            name: PROVIDER_NAME.to_string(),
            config,
            db,
            transport,
            pacer: HeaderPacer::new(GITHUB_RATE_WINDOW),
            checkpoint: None,
            cache: VecDeque::new(),
            pending: None,
            closed: false,
        }
    }

    /// Override the provider name, e.g. to run against several GitHub Enterprise hosts.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Current cursor, if it was recovered already.
    pub fn checkpoint(&self) -> Option<i64> {
        self.checkpoint
    }

    fn yield_head(&mut self) -> Option<Mention> {
        let head = self.cache.front()?;
        self.pending = Some(PendingCommit { id: head.id });
        Some(to_mention(&self.name, head))
    }

    /// Load undelivered rows and the stored cursor.
    async fn recover(&mut self) -> Result<i64> {
        let undelivered = store::github::find_undelivered(&self.db).await?;
        let since = store::github::max_id(&self.db).await?.unwrap_or(0);

        if !undelivered.is_empty() {
            tracing::info!(
                provider = %self.name,
                count = undelivered.len(),
                since,
                "Recovered undelivered rows"
            );
        }
        self.cache.extend(undelivered);
        self.checkpoint = Some(since);
        Ok(since)
    }

    /// Fetch the page after `since`, honoring the pacing recorded by the previous response.
    async fn fetch_page(&mut self, since: i64) -> Result<Vec<RawRepository>> {
        self.pacer.wait().await;

        let url = self.config.page_url(since);
        let mut request = HttpRequest::get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.config.user_agent);
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let started = Instant::now();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProviderError::from_http(&url, e))?;

        let info = RateLimitInfo::from_headers(&response.headers);
        if let Some(info) = &info {
            self.pacer.observe(started, info);
            tracing::debug!(
                limit = info.limit,
                remaining = info.remaining,
                "GitHub rate limit"
            );
        }

        match response.status {
            401 => return Err(ProviderError::AuthRequired { url }),
            403 | 429 if info.as_ref().is_some_and(|i| i.remaining == 0) => {
                let reset_at = info
                    .and_then(|i| i.reset_at)
                    .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(RATE_LIMIT_FALLBACK_SECS));
                self.pacer.defer_until(reset_at);
                return Err(ProviderError::RateLimited { reset_at });
            }
            _ if !response.is_success() => {
                return Err(ProviderError::status(url, response.status));
            }
            _ => {}
        }

        let page: Vec<Option<RawRepository>> = response
            .json()
            .map_err(|e| ProviderError::decode(&url, e.to_string()))?;
        Ok(page.into_iter().flatten().collect())
    }
}

#[async_trait]
impl RepoProvider for GitHubProvider {
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

        let since = match self.checkpoint {
            Some(since) => since,
            None => {
                let since = self.recover().await?;
                if let Some(mention) = self.yield_head() {
                    return Ok(Some(mention));
                }
                since
            }
        };

        let page = self.fetch_page(since).await?;
        let Some(max_id) = page.iter().map(|r| r.id).max() else {
            tracing::debug!(since, "No repositories after cursor");
            return Ok(None);
        };

        let fetched_at = Utc::now().fixed_offset();
        let rows: Vec<Model> = page.iter().map(|raw| to_row(raw, fetched_at)).collect();
        let inserted =
            store::github::insert_page(&self.db, rows.iter().map(to_active_model).collect())
                .await?;
        self.checkpoint = Some(max_id.max(since));

        tracing::debug!(
            since,
            max_id,
            fetched = page.len(),
            inserted,
            "Stored GitHub page"
        );

        self.cache.extend(
            rows.into_iter()
                .filter(|row| row.is_yieldable() && row.id > since),
        );
        Ok(self.yield_head())
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if delivery.is_err() {
            return Ok(());
        }

        if let Err(e) = store::github::mark_delivered(&self.db, pending.id).await {
            self.pending = Some(pending);
            return Err(e.into());
        }
        if self.cache.front().is_some_and(|row| row.id == pending.id) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::http::{MockTransport, mock_response};
    use crate::provider::PersistError;

    const API: &str = "https://api.github.test";

    fn config() -> GitHubConfig {
        GitHubConfig {
            api_url: API.to_string(),
            token: Some("ghp_test".to_string()),
            ..GitHubConfig::default()
        }
    }

    fn page_url(since: i64) -> String {
        format!("{API}/repositories?since={since}")
    }

    #[tokio::test(start_paused = true)]
    async fn next_request_is_spaced_by_rate_limit_headers() {
        let transport = MockTransport::new();
        let headers = vec![
            ("X-RateLimit-Limit", "5000"),
            ("X-RateLimit-Remaining", "4999"),
        ];
        transport.push_get(page_url(0), mock_response(200, headers.clone(), "[]"));
        transport.push_get(page_url(0), mock_response(200, headers, "[]"));

        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let mut provider = GitHubProvider::new(config(), db, Arc::new(transport.clone()));

        let start = Instant::now();
        provider.fetch_page(0).await.expect("first page");
        assert_eq!(Instant::now(), start, "data is returned without waiting");

        provider.fetch_page(0).await.expect("second page");
        assert!(Instant::now() - start >= Duration::from_millis(720));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(
            requests[0]
                .headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer ghp_test")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_defers_until_reset() {
        let transport = MockTransport::new();
        let reset = (Utc::now() + chrono::Duration::seconds(120)).timestamp().to_string();
        transport.push_get(
            page_url(5),
            mock_response(
                403,
                vec![
                    ("X-RateLimit-Limit", "60"),
                    ("X-RateLimit-Remaining", "0"),
                    ("X-RateLimit-Reset", reset.as_str()),
                ],
                r#"{"message":"API rate limit exceeded"}"#,
            ),
        );

        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let mut provider = GitHubProvider::new(config(), db, Arc::new(transport));

        let start = Instant::now();
        let err = provider.fetch_page(5).await.expect_err("rate limited");
        assert!(err.is_rate_limited());
        let not_before = provider.pacer.not_before().expect("deferred");
        assert!(not_before - start >= Duration::from_secs(110));
    }

    #[tokio::test]
    async fn status_and_decode_errors_are_classified() {
        let transport = MockTransport::new();
        transport.push_get(page_url(0), mock_response(401, vec![], "{}"));
        transport.push_get(page_url(0), mock_response(502, vec![], ""));
        transport.push_get(page_url(0), mock_response(200, vec![], "<html>"));

        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let mut provider = GitHubProvider::new(config(), db, Arc::new(transport));

        assert!(matches!(
            provider.fetch_page(0).await,
            Err(ProviderError::AuthRequired { .. })
        ));
        assert!(matches!(
            provider.fetch_page(0).await,
            Err(ProviderError::Status { status: 502, .. })
        ));
        assert!(matches!(
            provider.fetch_page(0).await,
            Err(ProviderError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn next_after_close_is_an_error() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let mut provider = GitHubProvider::new(config(), db, Arc::new(MockTransport::new()));
        provider.close().await.expect("close");
        assert!(matches!(
            provider.next().await,
            Err(ProviderError::Closed { .. })
        ));
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    mod with_store {
        use super::*;

        async fn setup() -> (GitHubProvider, MockTransport, Arc<DatabaseConnection>) {
            let db = Arc::new(
                crate::connect_and_migrate("sqlite::memory:")
                    .await
                    .expect("in-memory database"),
            );
            let transport = MockTransport::new();
            let provider =
                GitHubProvider::new(config(), Arc::clone(&db), Arc::new(transport.clone()));
            (provider, transport, db)
        }

        #[tokio::test]
        async fn repeats_until_acked_then_advances() {
            let (mut provider, transport, _db) = setup().await;
            transport.push_get(
                page_url(0),
                mock_response(
                    200,
                    vec![],
                    r#"[{"id":1,"full_name":"a/one","fork":false},{"id":2,"full_name":"b/two","fork":true}]"#,
                ),
            );

            let first = provider.next().await.expect("next").expect("mention");
            let again = provider.next().await.expect("next").expect("mention");
            assert_eq!(first, again);
            assert_eq!(first.context["id"], "1");

            provider
                .ack(&Err(PersistError::rejected("queue down")))
                .await
                .expect("nack");
            let replayed = provider.next().await.expect("next").expect("mention");
            assert_eq!(first, replayed);

            provider.ack(&Ok(())).await.expect("ack");
            let second = provider.next().await.expect("next").expect("mention");
            assert_eq!(second.context["id"], "2");
            assert_eq!(second.is_fork, Some(true));
            assert_eq!(provider.checkpoint(), Some(2));
            assert_eq!(transport.requests().len(), 1, "page is fetched once");
        }

        #[tokio::test]
        async fn tombstones_and_nulls_advance_the_cursor_silently() {
            let (mut provider, transport, db) = setup().await;
            transport.push_get(
                page_url(0),
                mock_response(
                    200,
                    vec![],
                    r#"[{"id":4},null,{"id":6,"full_name":"c/six"}]"#,
                ),
            );

            let mention = provider.next().await.expect("next").expect("mention");
            assert_eq!(mention.endpoint, "https://github.com/c/six.git");
            assert_eq!(mention.is_fork, None);
            assert_eq!(store::github::max_id(&db).await.expect("max"), Some(6));
            assert!(store::github::exists(&db, 4).await.expect("exists"));
        }

        #[tokio::test]
        async fn rows_are_stored_before_they_are_yielded() {
            let (mut provider, transport, db) = setup().await;
            transport.push_get(
                page_url(0),
                mock_response(200, vec![], r#"[{"id":11,"full_name":"x/y"}]"#),
            );

            provider.next().await.expect("next").expect("mention");
            let undelivered = store::github::find_undelivered(&db).await.expect("query");
            assert_eq!(undelivered.len(), 1);
            assert_eq!(undelivered[0].id, 11);
        }

        #[tokio::test]
        async fn fetch_error_leaves_cursor_unchanged() {
            let (mut provider, transport, _db) = setup().await;
            transport.push_get(page_url(0), mock_response(500, vec![], ""));
            transport.push_get(
                page_url(0),
                mock_response(200, vec![], r#"[{"id":3,"full_name":"a/b"}]"#),
            );

            assert!(provider.next().await.is_err());
            assert_eq!(provider.checkpoint(), Some(0));
            let mention = provider.next().await.expect("next").expect("mention");
            assert_eq!(mention.context["id"], "3");
        }
    }
}
