use chrono::{DateTime, FixedOffset};
use sea_orm::{NotSet, Set};
use url::Url;

use crate::entity::bitbucket_repository::{ActiveModel, Model};
use crate::mention::Mention;

use super::types::{CloneLink, RawRepository};

/// Extract the `after` cursor from a page's `next` link.
pub fn after_token(next: &str) -> Option<String> {
    let url = Url::parse(next).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "after")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Prefer the https clone link, else the first one.
pub fn canonical_endpoint(links: &[CloneLink]) -> Option<&str> {
    links
        .iter()
        .find(|link| link.name.eq_ignore_ascii_case("https") || link.href.starts_with("https://"))
        .or_else(|| links.first())
        .map(|link| link.href.as_str())
}

/// Convert one listing entry to a store row tagged with its page cursor.
///
/// Rows that can never be yielded (non-git, no clone links) are stored
/// already delivered.
pub(super) fn to_active_model(
    raw: &RawRepository,
    next_token: &str,
    fetched_at: DateTime<FixedOffset>,
) -> ActiveModel {
    let scm = raw.scm.to_ascii_lowercase();
    let endpoint = canonical_endpoint(&raw.links.clone)
        .unwrap_or_default()
        .to_string();
    let aliases: Vec<&str> = raw.links.clone.iter().map(|l| l.href.as_str()).collect();
    let yieldable = scm == "git" && !endpoint.is_empty();

    ActiveModel {
        seq: NotSet,
        uuid: Set(raw.uuid.clone()),
        full_name: Set(raw.full_name.clone()),
        scm: Set(scm),
        is_fork: Set(raw.parent.as_ref().map(|_| true)),
        endpoint: Set(endpoint),
        aliases: Set(serde_json::json!(aliases)),
        next_token: Set(next_token.to_string()),
        fetched_at: Set(fetched_at),
        delivered_at: Set((!yieldable).then_some(fetched_at)),
    }
}

pub fn to_mention(provider: &str, row: &Model) -> Mention {
    Mention::new(provider, row.endpoint.clone())
        .with_aliases(row.alias_list())
        .with_fork(row.is_fork)
        .with_context("uuid", row.uuid.clone())
        .with_context("full_name", row.full_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::ActiveValue;

    fn link(href: &str, name: &str) -> CloneLink {
        CloneLink {
            href: href.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn after_token_reads_cursor_from_next_link() {
        assert_eq!(
            after_token(
                "https://api.bitbucket.org/2.0/repositories?pagelen=100&after=2011-08-10T01%3A22%3A19.981227%2B00%3A00"
            )
            .as_deref(),
            Some("2011-08-10T01:22:19.981227+00:00")
        );
        assert_eq!(after_token("https://api.bitbucket.org/2.0/repositories?pagelen=100"), None);
        assert_eq!(after_token("not a url"), None);
    }

    #[test]
    fn canonical_endpoint_prefers_https() {
        let links = vec![
            link("git@bitbucket.org:a/b.git", "ssh"),
            link("https://someone@bitbucket.org/a/b.git", "https"),
        ];
        assert_eq!(
            canonical_endpoint(&links),
            Some("https://someone@bitbucket.org/a/b.git")
        );

        let links = vec![link("ssh://hg@bitbucket.org/a/b", "ssh")];
        assert_eq!(canonical_endpoint(&links), Some("ssh://hg@bitbucket.org/a/b"));
        assert_eq!(canonical_endpoint(&[]), None);
    }

    #[test]
    fn non_git_rows_are_stored_delivered() {
        let now = Utc::now().fixed_offset();
        let raw: RawRepository = serde_json::from_value(serde_json::json!({
            "uuid": "{9}", "full_name": "m/hg", "scm": "hg",
            "links": {"clone": [{"href": "https://bitbucket.org/m/hg", "name": "https"}]}
        }))
        .expect("raw repository");

        let model = to_active_model(&raw, "cursor", now);
        assert_eq!(model.delivered_at, ActiveValue::Set(Some(now)));
        assert_eq!(model.next_token, ActiveValue::Set("cursor".to_string()));
        assert_eq!(model.is_fork, ActiveValue::Set(None));
    }
}
