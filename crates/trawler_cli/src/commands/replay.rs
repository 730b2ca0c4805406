use std::io::{BufWriter, Write};

use sea_orm::DatabaseConnection;
use trawler::{Mention, store};

use crate::ProviderKind;

/// Rows fetched per query.
const PAGE_SIZE: u64 = 500;

/// Options for `trawler replay`.
pub(crate) struct ReplayOptions {
    pub provider: ProviderKind,
    /// Resume after this cursor (GitHub id, Bitbucket sequence or cgit page URL).
    pub after: Option<String>,
    pub limit: Option<usize>,
}

/// Writes stored, delivered mentions of one provider as JSON lines.
///
/// Returns how many mentions were written.
pub(crate) async fn replay<W: Write>(
    db: &DatabaseConnection,
    options: &ReplayOptions,
    out: W,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut out = BufWriter::new(out);
    let mut written = 0;
    let mut cursor = options.after.clone();
    let limit = options.limit.unwrap_or(usize::MAX);

    while written < limit {
        let page_size = PAGE_SIZE.min((limit - written) as u64);
        let (mentions, next) = fetch_page(db, options.provider, cursor.as_deref(), page_size).await?;
        if mentions.is_empty() {
            break;
        }
        for mention in &mentions {
            serde_json::to_writer(&mut out, mention)?;
            out.write_all(b"\n")?;
        }
        written += mentions.len();
        tracing::debug!(provider = %options.provider, written, cursor = ?next, "Replayed page");
        cursor = next;
    }

    out.flush()?;
    Ok(written)
}

/// One page of mentions after `after`, with the cursor of its last row.
async fn fetch_page(
    db: &DatabaseConnection,
    provider: ProviderKind,
    after: Option<&str>,
    limit: u64,
) -> Result<(Vec<Mention>, Option<String>), Box<dyn std::error::Error>> {
    match provider {
        #[cfg(feature = "github")]
        ProviderKind::Github => {
            use trawler::github::{PROVIDER_NAME, to_mention};

            let after = after.map(str::parse::<i64>).transpose()?;
            let rows = store::github::find_delivered_after(db, after, limit).await?;
            let next = rows.last().map(|row| row.id.to_string());
            let mentions = rows.iter().map(|row| to_mention(PROVIDER_NAME, row)).collect();
            Ok((mentions, next))
        }
        #[cfg(feature = "bitbucket")]
        ProviderKind::Bitbucket => {
            use trawler::bitbucket::{PROVIDER_NAME, to_mention};

            let after = after.map(str::parse::<i32>).transpose()?;
            let rows = store::bitbucket::find_delivered_after(db, after, limit).await?;
            let next = rows.last().map(|row| row.seq.to_string());
            let mentions = rows.iter().map(|row| to_mention(PROVIDER_NAME, row)).collect();
            Ok((mentions, next))
        }
        #[cfg(feature = "cgit")]
        ProviderKind::Cgit => {
            use trawler::cgit::{PROVIDER_NAME, to_mention};

            let rows = store::cgit::find_repos_after(db, after, limit).await?;
            let next = rows.last().map(|row| row.url.clone());
            let mentions = rows.iter().map(|row| to_mention(PROVIDER_NAME, row)).collect();
            Ok((mentions, next))
        }
        #[allow(unreachable_patterns)]
        other => Err(format!("{other} is not included in this build").into()),
    }
}

pub(crate) async fn handle_replay(
    options: ReplayOptions,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = trawler::connect_and_migrate(database_url).await?;
    let written = replay(&db, &options, std::io::stdout().lock()).await?;
    tracing::info!(provider = %options.provider, written, "Replay complete");
    Ok(())
}

#[cfg(all(test, feature = "github", feature = "sqlite"))]
mod tests {
    use super::*;

    use chrono::Utc;
    use sea_orm::Set;
    use trawler::entity::github_repository;

    async fn seeded_db(ids: &[i64]) -> DatabaseConnection {
        let db = trawler::connect_and_migrate("sqlite::memory:")
            .await
            .expect("in-memory database");
        let rows = ids
            .iter()
            .map(|&id| github_repository::ActiveModel {
                id: Set(id),
                full_name: Set(Some(format!("owner/repo{id}"))),
                is_fork: Set(Some(false)),
                fetched_at: Set(Utc::now().fixed_offset()),
                delivered_at: Set(None),
            })
            .collect();
        store::github::insert_page(&db, rows).await.expect("insert");
        db
    }

    fn lines(out: &[u8]) -> Vec<Mention> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[tokio::test]
    async fn only_delivered_rows_are_replayed() {
        let db = seeded_db(&[1, 2, 3]).await;
        store::github::mark_delivered(&db, 1).await.expect("mark");
        store::github::mark_delivered(&db, 3).await.expect("mark");

        let options = ReplayOptions {
            provider: ProviderKind::Github,
            after: None,
            limit: None,
        };
        let mut out = Vec::new();
        assert_eq!(replay(&db, &options, &mut out).await.expect("replay"), 2);

        let endpoints: Vec<String> = lines(&out).into_iter().map(|m| m.endpoint).collect();
        assert_eq!(
            endpoints,
            vec![
                "https://github.com/owner/repo1.git",
                "https://github.com/owner/repo3.git"
            ]
        );
    }

    #[tokio::test]
    async fn cursor_and_limit_bound_the_replay() {
        let db = seeded_db(&[1, 2, 3, 4]).await;
        for id in 1..=4 {
            store::github::mark_delivered(&db, id).await.expect("mark");
        }

        let options = ReplayOptions {
            provider: ProviderKind::Github,
            after: Some("1".to_string()),
            limit: Some(2),
        };
        let mut out = Vec::new();
        assert_eq!(replay(&db, &options, &mut out).await.expect("replay"), 2);
        let ids: Vec<String> = lines(&out)
            .into_iter()
            .map(|m| m.context["id"].clone())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn malformed_cursor_is_an_error() {
        let db = seeded_db(&[]).await;
        let options = ReplayOptions {
            provider: ProviderKind::Github,
            after: Some("not-a-number".to_string()),
            limit: None,
        };
        assert!(replay(&db, &options, Vec::<u8>::new()).await.is_err());
    }
}
