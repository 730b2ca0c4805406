//! Bitbucket provider: follows the opaque `after` cursor of `/2.0/repositories`.
//!
//! Every stored row remembers the `next` cursor of the page it came from, so
//! the latest row is the checkpoint. Only git repositories are yielded;
//! Mercurial rows are stored already delivered and skipped.

mod convert;
mod provider;
mod types;

pub use convert::{after_token, canonical_endpoint, to_mention};
pub use provider::BitbucketProvider;
pub use types::{
    BitbucketConfig, CloneLink, DEFAULT_API_URL, DEFAULT_MIN_INTERVAL, DEFAULT_PAGE_LEN,
    PROVIDER_NAME, RawRepository, RepositoryPage,
};
