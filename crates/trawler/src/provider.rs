//! The contract every mention source implements.
//!
//! A provider is driven by exactly one caller, strictly sequentially:
//!
//! ```ignore
//! while let Some(mention) = provider.next().await? {
//!     let delivery = persist(mention).await;
//!     provider.ack(&delivery).await?;
//! }
//! ```
//!
//! Until `ack(&Ok(()))` succeeds, repeated `next` calls return the same
//! mention. `ack(&Err(_))` leaves the provider untouched so the mention is
//! replayed. `Ok(None)` from `next` means nothing is available right now;
//! the caller should poll again later.

mod errors;
mod rate_limit;

use async_trait::async_trait;

use crate::mention::Mention;

pub use errors::{Delivery, PersistError, ProviderError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, GITHUB_RATE_WINDOW, HeaderPacer, RateLimitInfo};

/// A source-specific adapter producing a resumable stream of mentions.
#[async_trait]
pub trait RepoProvider: Send {
    /// Stable identity for logs and progress events.
    fn name(&self) -> &str;

    /// Return the pending mention, or `None` when the source is exhausted.
    ///
    /// A transient error leaves the cursor where it was.
    async fn next(&mut self) -> Result<Option<Mention>>;

    /// Report the delivery outcome of the mention last returned by `next`.
    ///
    /// Returns an error only when committing a successful delivery fails, in
    /// which case the same mention is still pending.
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;

    /// Release held resources. Further `next` calls return
    /// [`ProviderError::Closed`].
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<P: RepoProvider + ?Sized> RepoProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn next(&mut self) -> Result<Option<Mention>> {
        (**self).next().await
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        (**self).ack(delivery).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
