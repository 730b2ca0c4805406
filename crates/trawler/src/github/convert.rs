//! Conversion between GitHub payloads, store rows and mentions.

use chrono::{DateTime, FixedOffset};
use sea_orm::Set;

use crate::entity::github_repository::{ActiveModel, Model};
use crate::mention::Mention;

use super::types::RawRepository;

/// Clone URLs for `owner/name`, canonical (https) last.
pub fn clone_aliases(full_name: &str) -> Vec<String> {
    vec![
        format!("git://github.com/{full_name}.git"),
        format!("ssh://git@github.com/{full_name}.git"),
        format!("https://github.com/{full_name}.git"),
    ]
}

/// Build the mention for a stored row.
///
/// Callers only pass rows for which [`Model::is_yieldable`] holds.
pub fn to_mention(provider: &str, row: &Model) -> Mention {
    let full_name = row.full_name.as_deref().unwrap_or_default();
    Mention::new(provider, format!("https://github.com/{full_name}.git"))
        .with_aliases(clone_aliases(full_name))
        .with_fork(row.is_fork)
        .with_context("id", row.id.to_string())
        .with_context("full_name", full_name)
}

/// Convert one page item to a store row.
///
/// Entries without a name can never be yielded; they are stored already
/// delivered so they still advance the cursor.
pub(super) fn to_row(raw: &RawRepository, fetched_at: DateTime<FixedOffset>) -> Model {
    let full_name = raw.full_name.clone().filter(|name| !name.is_empty());
    let delivered_at = full_name.is_none().then_some(fetched_at);
    Model {
        id: raw.id,
        full_name,
        is_fork: raw.fork,
        fetched_at,
        delivered_at,
    }
}

pub(super) fn to_active_model(row: &Model) -> ActiveModel {
    ActiveModel {
        id: Set(row.id),
        full_name: Set(row.full_name.clone()),
        is_fork: Set(row.is_fork),
        fetched_at: Set(row.fetched_at),
        delivered_at: Set(row.delivered_at),
    }
}
